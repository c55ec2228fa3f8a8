use awint::awi::*;

use crate::{
    bitheap::{BitHeap, CompressionPlan, HeapSum, HeapTerm, Netlist, PSignal, SignalValues},
    Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct HeapBit {
    signal: PSignal,
    index: usize,
    column: usize,
    inverted: bool,
}

/// A bit heap that records its terms and evaluates them exactly. Signed
/// and subtracted terms are turned into plain bits by inverting some of them
/// and folding a correction into the constant, so every column is a count
/// of bits plus one constant bit.
#[derive(Debug, Clone)]
pub struct EvalBitHeap {
    lsb: usize,
    msb: usize,
    bits: Vec<HeapBit>,
    /// Bits `0..=msb`, everything below `lsb` stays zero
    constant: Awi,
    plan: Option<CompressionPlan>,
}

impl EvalBitHeap {
    pub fn new(lsb: usize, msb: usize) -> Result<Self, Error> {
        if lsb > msb {
            return Err(Error::BitHeapRange {
                needed_lsb: lsb,
                needed_msb: lsb,
                lsb,
                msb,
            })
        }
        Ok(Self {
            lsb,
            msb,
            bits: vec![],
            constant: Awi::zero(bw(msb + 1)),
            plan: None,
        })
    }

    fn range_err(&self, lo: usize, hi: usize) -> Error {
        Error::BitHeapRange {
            needed_lsb: lo,
            needed_msb: hi,
            lsb: self.lsb,
            msb: self.msb,
        }
    }

    fn check_term(&self, term: &HeapTerm) -> Result<(), Error> {
        let top = term.column + term.keep - 1;
        if (term.column < self.lsb) || (top > self.msb) {
            return Err(self.range_err(term.column, top))
        }
        Ok(())
    }

    /// Adds `value * 2^column` modulo `2^(msb + 1)`
    fn add_shifted(&mut self, value: i128, column: usize) -> Result<(), Error> {
        if value == 0 {
            return Ok(())
        }
        let w = self.msb + 1;
        if column >= w {
            return Ok(())
        }
        if column + (value.trailing_zeros() as usize) < self.lsb {
            return Err(self.range_err(column + value.trailing_zeros() as usize, self.msb))
        }
        let mut tmp = Awi::zero(bw(w));
        tmp.i128_(value);
        tmp.shl_(column)
            .ok_or(Error::OtherStr("constant shift out of range"))?;
        self.constant
            .add_(&tmp)
            .ok_or(Error::OtherStr("constant width mismatch"))?;
        Ok(())
    }

    fn push_bits(&mut self, term: &HeapTerm, invert: impl Fn(usize) -> bool) {
        for i in 0..term.keep {
            self.bits.push(HeapBit {
                signal: term.signal,
                index: term.skip + i,
                column: term.column + i,
                inverted: invert(i),
            });
        }
    }

    /// Number of bits in every column from `lsb` to `msb`, counting the
    /// constant bit
    pub fn heights(&self) -> Vec<usize> {
        let mut heights = vec![1; self.msb + 1 - self.lsb];
        for bit in &self.bits {
            heights[bit.column - self.lsb] += 1;
        }
        heights
    }

    pub fn constant(&self) -> &Awi {
        &self.constant
    }

    pub fn plan(&self) -> Option<&CompressionPlan> {
        self.plan.as_ref()
    }

    fn columns(&self, values: &SignalValues) -> Result<Vec<Vec<bool>>, Error> {
        let mut columns = vec![vec![]; self.msb + 1 - self.lsb];
        for bit in &self.bits {
            let value = values
                .get(&bit.signal)
                .ok_or(Error::OtherStr("a heap signal has no value"))?;
            let b = value
                .get(bit.index)
                .ok_or(Error::OtherStr("a heap bit is past its signal"))?;
            columns[bit.column - self.lsb].push(b != bit.inverted);
        }
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(self.constant.get(self.lsb + i).unwrap_or(false));
        }
        Ok(columns)
    }

    fn sum_columns(&self, columns: &[Vec<bool>]) -> Result<Awi, Error> {
        let w = bw(self.msb + 1);
        let mut res = Awi::zero(w);
        let mut one = Awi::zero(w);
        for (i, column) in columns.iter().enumerate() {
            for &b in column {
                if b {
                    one.zero_();
                    one.set(self.lsb + i, true)
                        .ok_or(Error::OtherStr("column out of range"))?;
                    res.add_(&one)
                        .ok_or(Error::OtherStr("sum width mismatch"))?;
                }
            }
        }
        Ok(res)
    }

    /// The exact sum of all terms modulo `2^(msb + 1)`, without compression
    pub fn evaluate_direct(&self, values: &SignalValues) -> Result<Awi, Error> {
        let columns = self.columns(values)?;
        self.sum_columns(&columns)
    }

    /// Simulates the compression plan bit by bit and the final two row
    /// addition. The result always equals [EvalBitHeap::evaluate_direct].
    pub fn evaluate_compressed(&self, values: &SignalValues) -> Result<Awi, Error> {
        let mut columns = self.columns(values)?;
        let plan = match self.plan.as_ref() {
            Some(plan) => plan.clone(),
            None => CompressionPlan::dadda(self.lsb, &self.heights())?,
        };
        for stage in &plan.stages {
            let mut next = vec![vec![]; columns.len()];
            for (i, column) in columns.iter().enumerate() {
                let counters = (self.lsb + i)
                    .checked_sub(plan.lsb)
                    .and_then(|j| stage.get(j))
                    .copied()
                    .unwrap_or_default();
                let needed = 3 * counters.full as usize + 2 * counters.half as usize;
                if needed > column.len() {
                    return Err(Error::OtherString(format!(
                        "column {} has {} bits but its counters need {needed}",
                        self.lsb + i,
                        column.len()
                    )))
                }
                let mut rest = column.iter().copied();
                let mut carries = vec![];
                for _ in 0..counters.full {
                    let (a, b, c) = match (rest.next(), rest.next(), rest.next()) {
                        (Some(a), Some(b), Some(c)) => (a, b, c),
                        _ => return Err(Error::OtherStr("full adder ran out of bits")),
                    };
                    next[i].push(a ^ b ^ c);
                    carries.push((a & b) | (a & c) | (b & c));
                }
                for _ in 0..counters.half {
                    let (a, b) = match (rest.next(), rest.next()) {
                        (Some(a), Some(b)) => (a, b),
                        _ => return Err(Error::OtherStr("half adder ran out of bits")),
                    };
                    next[i].push(a ^ b);
                    carries.push(a & b);
                }
                next[i].extend(rest);
                // carries out of the top column fall off the modular sum
                if let Some(above) = next.get_mut(i + 1) {
                    above.extend(carries);
                }
            }
            columns = next;
        }
        if let Some(i) = columns.iter().position(|column| column.len() > 2) {
            return Err(Error::OtherString(format!(
                "column {} holds {} bits at the final adder",
                self.lsb + i,
                columns[i].len()
            )))
        }
        self.sum_columns(&columns)
    }

    /// Evaluates the heap for concrete operands
    pub fn evaluate(&self, netlist: &Netlist, x: &Bits, y: &Bits) -> Result<Awi, Error> {
        let values = netlist.evaluate(x, y)?;
        self.evaluate_compressed(&values)
    }
}

impl BitHeap for EvalBitHeap {
    fn lsb(&self) -> usize {
        self.lsb
    }

    fn msb(&self) -> usize {
        self.msb
    }

    fn add_signal(&mut self, term: HeapTerm) -> Result<(), Error> {
        if term.keep == 0 {
            return Ok(())
        }
        self.check_term(&term)?;
        if term.signed {
            // -s*2^(w-1) = (1 - s)*2^(w-1) - 2^(w-1)
            let top = term.keep - 1;
            self.push_bits(&term, |i| i == top);
            self.add_shifted(-1, term.column + top)?;
        } else {
            self.push_bits(&term, |_| false);
        }
        Ok(())
    }

    fn subtract_signal(&mut self, term: HeapTerm) -> Result<(), Error> {
        if term.keep == 0 {
            return Ok(())
        }
        self.check_term(&term)?;
        let w = term.keep;
        if term.signed {
            // -v = s*2^(w-1) + sum of the inverted low bits + 1 - 2^(w-1)
            self.push_bits(&term, |i| i + 1 < w);
            self.add_shifted(1, term.column)?;
            self.add_shifted(-1, term.column + w - 1)?;
        } else {
            // -v = sum of the inverted bits + 1 - 2^w
            self.push_bits(&term, |_| true);
            self.add_shifted(1, term.column)?;
            self.add_shifted(-1, term.column + w)?;
        }
        Ok(())
    }

    fn add_constant(&mut self, value: i128, column: usize) -> Result<(), Error> {
        self.add_shifted(value, column)
    }

    fn add_constant_bit(&mut self, column: usize) -> Result<(), Error> {
        if (column < self.lsb) || (column > self.msb) {
            return Err(self.range_err(column, column))
        }
        self.add_shifted(1, column)
    }

    fn start_compression(&mut self, plan: Option<&CompressionPlan>) -> Result<HeapSum, Error> {
        let heights = self.heights();
        let (plan, from_solver) = match plan {
            Some(plan) => {
                plan.validate(self.lsb, &heights)?;
                (plan.clone(), true)
            }
            None => (CompressionPlan::dadda(self.lsb, &heights)?, false),
        };
        tracing::debug!(
            lsb = self.lsb,
            msb = self.msb,
            bits = self.bits.len(),
            stages = plan.stages.len(),
            full_adders = plan.full_adders(),
            half_adders = plan.half_adders(),
            from_solver,
            "starting compression"
        );
        self.plan = Some(plan.clone());
        Ok(HeapSum {
            lsb: self.lsb,
            msb: self.msb,
            heights,
            full_adders: plan.full_adders(),
            half_adders: plan.half_adders(),
            plan,
            from_solver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        bitheap::TileRealizer,
        catalog::{TileFamily, TileId, TileKind},
        tiling::{Placement, TilingProblem},
    };

    #[test]
    fn sign_tricks() {
        let problem = TilingProblem::new(4, 4, true, 0).unwrap();
        let kind = TileKind::new(TileFamily::Lut, 4, 4, 1);
        let p = Placement::new(TileId(0), kind, 0, 0).unwrap();
        let mut net = Netlist::new();
        let inst = net.generate(&p, 0, &problem).unwrap();
        let signal = inst.outputs[0].signal;
        let mut heap = EvalBitHeap::new(0, 9).unwrap();
        let term = HeapTerm {
            signal,
            column: 1,
            skip: 0,
            keep: 8,
            signed: true,
        };
        // 2v - 2v + 2v
        heap.add_signal(term).unwrap();
        heap.subtract_signal(term).unwrap();
        heap.add_signal(term).unwrap();
        heap.add_constant(-3, 0).unwrap();
        let mut x = Awi::zero(bw(4));
        let mut y = Awi::zero(bw(4));
        for (a, b) in [(-8i8, 7i8), (5, -3), (-1, -1), (0, 6)] {
            x.i8_(a);
            y.i8_(b);
            let values = net.evaluate(&x, &y).unwrap();
            let expected = 2 * i16::from(a) * i16::from(b) - 3;
            let direct = heap.evaluate_direct(&values).unwrap();
            assert_eq!(direct.to_i16(), expected);
            assert_eq!(heap.evaluate_compressed(&values).unwrap(), direct);
        }
        let sum = heap.start_compression(None).unwrap();
        assert!(!sum.from_solver);
        assert_eq!(sum.heights.len(), 10);
        assert!(heap.add_constant_bit(10).is_err());
        assert!(matches!(
            heap.add_signal(HeapTerm { column: 3, ..term }),
            Err(Error::BitHeapRange { .. })
        ));
    }
}
