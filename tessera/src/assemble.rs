use crate::{
    bitheap::{BitHeap, HeapTerm, TileInstance, TileRealizer},
    tiling::{Solution, TilingProblem},
    Error,
};

/// The part of one tile output that lands in the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct OutputSlice {
    /// Heap column of the first kept bit
    pub column: usize,
    pub skip: usize,
    pub keep: usize,
    /// Set if bits above the heap were cut off
    pub top_clipped: bool,
}

/// Slices an output of `width` bits whose bit 0 has weight `2^lsb`,
/// dropping bits below column `cut` and above `msb`
pub(crate) fn slice_output(lsb: i64, width: usize, cut: usize, msb: usize) -> Option<OutputSlice> {
    let skip = (-lsb).max(0) + (cut as i64 - lsb.max(0)).max(0);
    let skip = usize::try_from(skip).ok()?;
    if skip >= width {
        return None
    }
    let column = usize::try_from(lsb + skip as i64).ok()?;
    if column > msb {
        return None
    }
    let keep = (width - skip).min(msb + 1 - column);
    Some(OutputSlice {
        column,
        skip,
        keep,
        top_clipped: skip + keep < width,
    })
}

/// Emits a tiling into a bit heap. Column `c` of the product lands in heap
/// column `offset + c`, so a product can be added to a heap that already
/// holds other terms.
#[derive(Debug, Clone, Default)]
pub struct BitHeapAssembler {
    pub offset: usize,
}

impl BitHeapAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// The heap columns needed to take `solution`
    pub fn required_range(
        &self,
        solution: &Solution,
        problem: &TilingProblem,
        round_bit: Option<usize>,
    ) -> (usize, usize) {
        let lsb = round_bit.map_or(solution.bit_heap_lsb, |r| r.min(solution.bit_heap_lsb));
        (self.offset + lsb, self.offset + problem.prodsize() - 1)
    }

    fn precheck<H: BitHeap + ?Sized>(
        &self,
        solution: &Solution,
        problem: &TilingProblem,
        round_bit: Option<usize>,
        heap: &H,
    ) -> Result<(), Error> {
        let (lsb, msb) = self.required_range(solution, problem, round_bit);
        if (heap.lsb() > lsb) || (heap.msb() < msb) {
            return Err(Error::BitHeapRange {
                needed_lsb: lsb,
                needed_msb: msb,
                lsb: heap.lsb(),
                msb: heap.msb(),
            })
        }
        for p in &solution.placements {
            let w = p.kind.weight.unsigned_abs();
            if (w != 1) && (w != 2) {
                return Err(Error::ShapeMismatch(format!(
                    "{} has tiling weight {} which the bit heap cannot take",
                    p.kind, p.kind.weight
                )))
            }
            let (x, y) = p.anchor();
            problem.check_placement(&p.kind, x, y)?;
        }
        Ok(())
    }

    /// Adds the correction constant, every tile output and the round bit to
    /// `heap`. Nothing is emitted unless every placement and the heap range
    /// check out. Outputs are kept up to the top column of the heap, so the
    /// product is sign extended through a heap wider than it.
    pub fn assemble<R: TileRealizer + ?Sized, H: BitHeap + ?Sized>(
        &self,
        solution: &Solution,
        problem: &TilingProblem,
        round_bit: Option<usize>,
        realizer: &mut R,
        heap: &mut H,
    ) -> Result<Vec<TileInstance>, Error> {
        self.precheck(solution, problem, round_bit, heap)?;
        let offset = self.offset;
        let h = solution.bit_heap_lsb;
        let constant = (solution.error_correction_constant >> h) << h;
        heap.add_constant(constant, offset)?;
        // relative to the product
        let msb = heap.msb() - offset;
        let mut instances = vec![];
        for (index, p) in solution.placements.iter().enumerate() {
            let inst = realizer.generate(p, index, problem)?;
            let (ax, ay) = p.anchor();
            let raise = i64::from(p.kind.weight.unsigned_abs() == 2);
            let blocks = p.kind.blocks();
            if blocks.len() != inst.outputs.len() {
                return Err(Error::OtherString(format!(
                    "realizer returned {} outputs for the {} blocks of {}",
                    inst.outputs.len(),
                    blocks.len(),
                    p.kind
                )))
            }
            for (o, block) in inst.outputs.iter().zip(&blocks) {
                let lsb = ax + ay + o.relative_weight as i64 + raise;
                let Some(slice) = slice_output(lsb, o.width, h, msb) else {
                    continue
                };
                let term = HeapTerm {
                    signal: o.signal,
                    column: offset + slice.column,
                    skip: slice.skip,
                    keep: slice.keep,
                    signed: o.is_signed(block.width, block.height) && !slice.top_clipped,
                };
                if p.kind.weight > 0 {
                    heap.add_signal(term)?;
                } else {
                    heap.subtract_signal(term)?;
                }
            }
            instances.push(inst);
        }
        if let Some(round_bit) = round_bit {
            heap.add_constant_bit(offset + round_bit)?;
        }
        tracing::debug!(
            tiles = instances.len(),
            constant = %constant,
            bit_heap_lsb = h,
            offset,
            ?round_bit,
            "assembled bit heap"
        );
        Ok(instances)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slicing() {
        assert_eq!(
            slice_output(-2, 6, 0, 10),
            Some(OutputSlice {
                column: 0,
                skip: 2,
                keep: 4,
                top_clipped: false
            })
        );
        assert_eq!(
            slice_output(1, 6, 3, 4),
            Some(OutputSlice {
                column: 3,
                skip: 2,
                keep: 2,
                top_clipped: true
            })
        );
        assert_eq!(slice_output(0, 3, 3, 10), None);
        assert_eq!(slice_output(11, 3, 0, 10), None);
    }
}
