use crate::{
    catalog::{TileFamily, TileKind},
    tiling::TilingProblem,
};

/// The resources one placed tile is estimated to consume
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileCost {
    /// LUT equivalent area, including the estimated cost of compressing the
    /// output bits
    pub area: f64,
    pub hard_blocks: u32,
}

/// The target model consumed by the tiling strategies. Nothing in the
/// strategies depends on the formulas behind it.
pub trait CostOracle {
    /// Cost of `kind` anchored at `anchor` in `problem`. Edge clipped and
    /// signed edge tiles may cost differently from interior ones.
    fn cost(&self, kind: &TileKind, anchor: (i64, i64), problem: &TilingProblem) -> TileCost;

    fn hard_blocks(&self, kind: &TileKind) -> u32 {
        kind.dsp_count()
    }

    /// Cost of one 3:2 counter in the bit heap
    fn full_adder_cost(&self) -> f64;

    /// Cost of one 2:2 counter in the bit heap
    fn half_adder_cost(&self) -> f64;

    /// Cost of one constant bit added to the bit heap
    fn constant_bit_cost(&self) -> f64;
}

/// The default cost model, all numbers are configuration data
#[derive(Debug, Clone, PartialEq)]
pub struct TargetModel {
    pub compression_cost_per_bit: f64,
    pub full_adder_luts: f64,
    pub half_adder_luts: f64,
    /// LUTs of a squarer of `n` bits, indexed by `n - 1`
    pub squarer_luts: [f64; 6],
    /// LUTs of the pre adders per Karatsuba pair
    pub karatsuba_pair_luts: f64,
    pub dsp_size: (u32, u32),
}

impl Default for TargetModel {
    fn default() -> Self {
        Self {
            compression_cost_per_bit: 0.65,
            full_adder_luts: 1.0,
            half_adder_luts: 0.5,
            squarer_luts: [0.0, 2.0, 4.0, 6.0, 9.0, 12.0],
            karatsuba_pair_luts: 41.0,
            dsp_size: (24, 17),
        }
    }
}

/// The clipped extent of a block along one axis
fn clip(anchor: i64, len: u32, w: usize) -> (i64, i64) {
    let w = w as i64;
    (anchor.max(0).min(w), (anchor + i64::from(len)).max(0).min(w))
}

impl TargetModel {
    pub fn with_compression_cost_per_bit(mut self, cost: f64) -> Self {
        self.compression_cost_per_bit = cost;
        self
    }

    pub fn with_adder_luts(mut self, full: f64, half: f64) -> Self {
        self.full_adder_luts = full;
        self.half_adder_luts = half;
        self
    }

    /// Number of output bits of `kind` that land inside the product once
    /// every block is clipped to the grid
    pub fn clipped_output_bits(kind: &TileKind, anchor: (i64, i64), problem: &TilingProblem) -> u32 {
        let mut bits = 0;
        for block in kind.blocks() {
            let (x0, x1) = clip(anchor.0 + i64::from(block.dx), block.width, problem.wx);
            let (y0, y1) = clip(anchor.1 + i64::from(block.dy), block.height, problem.wy);
            let (w, h) = (x1 - x0, y1 - y0);
            if (w <= 0) || (h <= 0) {
                continue
            }
            let b = if w == 1 {
                h
            } else if h == 1 {
                w
            } else {
                w + h
            };
            bits += b as u32;
        }
        bits
    }

    fn lut_luts(kind: &TileKind, signed_edge: (bool, bool)) -> f64 {
        let (w, h) = (kind.width(), kind.height());
        let ws = if (w == 1) && !signed_edge.0 {
            h
        } else if (h == 1) && !signed_edge.1 {
            w
        } else {
            w + h
        };
        let luts = if ws <= 5 { ws.div_ceil(2) } else { ws };
        // the 3x3 multiplier fits in one less LUT than its output size suggests
        let saved = u32::from((w == 3) && (h == 3));
        f64::from(luts.saturating_sub(saved))
    }
}

impl CostOracle for TargetModel {
    fn cost(&self, kind: &TileKind, anchor: (i64, i64), problem: &TilingProblem) -> TileCost {
        let signed_edge = (
            problem.signed && (anchor.0 + i64::from(kind.width()) >= problem.wx as i64),
            problem.signed && (anchor.1 + i64::from(kind.height()) >= problem.wy as i64),
        );
        let compression = f64::from(Self::clipped_output_bits(kind, anchor, problem))
            * self.compression_cost_per_bit;
        let luts = match kind.family {
            TileFamily::Lut => Self::lut_luts(kind, signed_edge),
            TileFamily::AndRow => {
                let n = kind.width().max(kind.height());
                f64::from(n.div_ceil(2)) + f64::from(u32::from(signed_edge.0 || signed_edge.1))
            }
            TileFamily::Booth | TileFamily::TwoByK => {
                let mut luts = kind.width().max(kind.height()) + 1;
                if signed_edge.0 || signed_edge.1 {
                    luts += 1;
                }
                f64::from(luts)
            }
            TileFamily::Dsp | TileFamily::SuperTile => 0.0,
            TileFamily::Karatsuba => {
                let n = kind.params.variant;
                f64::from(n * (n + 1) / 2) * self.karatsuba_pair_luts
            }
            TileFamily::SquarerLut => {
                let n = kind.width() as usize;
                self.squarer_luts
                    .get(n.wrapping_sub(1))
                    .copied()
                    .unwrap_or(f64::from(kind.width() * kind.width()))
            }
        };
        TileCost {
            area: luts + compression,
            hard_blocks: self.hard_blocks(kind),
        }
    }

    fn full_adder_cost(&self) -> f64 {
        self.full_adder_luts
    }

    fn half_adder_cost(&self) -> f64 {
        self.half_adder_luts
    }

    fn constant_bit_cost(&self) -> f64 {
        self.compression_cost_per_bit
    }
}
