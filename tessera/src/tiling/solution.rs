use std::cmp::Ordering;

use crate::{
    analysis::{
        error_bounds, minimal_bit_heap_lsb, recenter_constant, sliced_bounds, ErrorBounds,
    },
    bitheap::CompressionPlan,
    catalog::{CostOracle, TileId, TileKind},
    tiling::{CoverageMatrix, TilingProblem},
    Error,
};

/// One tile instance in the grid. Anchors can be negative or protrude past
/// the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Placement {
    pub tile: TileId,
    pub kind: TileKind,
    pub x: i32,
    pub y: i32,
}

impl Placement {
    pub fn new(tile: TileId, kind: TileKind, x: i64, y: i64) -> Result<Self, Error> {
        let conv = |v: i64| {
            i32::try_from(v).map_err(|_| Error::OtherString(format!("anchor {v} is out of range")))
        };
        Ok(Self {
            tile,
            kind,
            x: conv(x)?,
            y: conv(y)?,
        })
    }

    pub fn anchor(&self) -> (i64, i64) {
        (i64::from(self.x), i64::from(self.y))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal for the model
    Optimal,
    /// Produced by a heuristic
    Heuristic,
    /// The solver hit a limit and the best incumbent was used
    Suboptimal,
    /// Reconstructed from a replay record
    Replayed,
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub placements: Vec<Placement>,
    /// Every cell in a column at or above this has exact coverage
    pub actual_lsb: usize,
    /// Exactly covered cells in column `actual_lsb - 1`
    pub keep_bits: usize,
    pub error_correction_constant: i128,
    /// Worst case error of the bit heap sum, with the constant and the
    /// output bits below `bit_heap_lsb` dropped. Never above the budget.
    pub achieved_error: u128,
    /// The deviation of the coverage alone
    pub bounds: ErrorBounds,
    /// The deviation of the bit heap, `bounds` widened by the dropped bits
    pub heap_bounds: ErrorBounds,
    /// The lowest column the bit heap has to keep
    pub bit_heap_lsb: usize,
    pub area: f64,
    pub dsp_count: u32,
    pub status: SolveStatus,
    pub compression: Option<CompressionPlan>,
}

impl Solution {
    /// Derives everything besides the placements. This is shared by all
    /// strategies so that equal placement lists always give equal
    /// solutions.
    pub fn finalize(
        placements: Vec<Placement>,
        problem: &TilingProblem,
        oracle: &dyn CostOracle,
        status: SolveStatus,
    ) -> Result<Self, Error> {
        let coverage = CoverageMatrix::from_placements(&placements, problem)?;
        let bounds = error_bounds(&coverage, problem);
        let actual_lsb = coverage.actual_lsb(problem);
        let keep_bits = coverage.keep_bits(problem, actual_lsb);
        let budget = problem.error_budget;
        let constant =
            recenter_constant(&bounds, budget, actual_lsb).ok_or(Error::BudgetExceeded {
                negative: bounds.negative,
                positive: bounds.positive,
                budget,
            })?;
        let (bit_heap_lsb, heap_bounds) =
            minimal_bit_heap_lsb(&placements, problem, &bounds, constant, actual_lsb);
        let achieved_error = heap_bounds.achieved((constant >> bit_heap_lsb) << bit_heap_lsb);
        let mut area = 0.0;
        let mut dsp_count = 0;
        for p in &placements {
            let cost = oracle.cost(&p.kind, p.anchor(), problem);
            area += cost.area;
            dsp_count += cost.hard_blocks;
        }
        if let Some(cap) = problem.max_dsp {
            if dsp_count > cap {
                return Err(Error::infeasible(format!(
                    "the DSP cap of {cap} hard blocks, the tiling uses {dsp_count}"
                )))
            }
        }
        tracing::debug!(
            placements = placements.len(),
            actual_lsb,
            constant = %constant,
            achieved_error = %achieved_error,
            bit_heap_lsb,
            area,
            dsp_count,
            ?status,
            "finalized tiling"
        );
        Ok(Self {
            placements,
            actual_lsb,
            keep_bits,
            error_correction_constant: constant,
            achieved_error,
            bounds,
            heap_bounds,
            bit_heap_lsb,
            area,
            dsp_count,
            status,
            compression: None,
        })
    }

    pub fn coverage(&self, problem: &TilingProblem) -> Result<CoverageMatrix, Error> {
        CoverageMatrix::from_placements(&self.placements, problem)
    }

    /// Checks the coverage invariant against the placements
    pub fn check(&self, problem: &TilingProblem) -> Result<(), Error> {
        self.coverage(problem)?
            .check_exact_from(problem, self.actual_lsb)
    }

    /// How far below the budget the achieved error stays
    pub fn slack(&self, problem: &TilingProblem) -> u128 {
        problem.error_budget.saturating_sub(self.achieved_error)
    }

    /// Moves the bit heap cut to column `h`, recentering the constant onto a
    /// multiple of `2^h` for the bounds of the sliced heap
    pub fn with_bit_heap_lsb(mut self, h: usize, problem: &TilingProblem) -> Result<Self, Error> {
        if h == self.bit_heap_lsb {
            return Ok(self)
        }
        let budget = problem.error_budget;
        let heap_bounds = sliced_bounds(&self.placements, problem, &self.bounds, h);
        let exceeded = Error::BudgetExceeded {
            negative: heap_bounds.negative,
            positive: heap_bounds.positive,
            budget,
        };
        if h > 0 && (budget >> h) == 0 {
            return Err(exceeded)
        }
        let constant = match recenter_constant(&heap_bounds, budget, h) {
            Some(c) if (c.rem_euclid(1 << h) == 0) && heap_bounds.is_faithful(budget, c) => c,
            _ => return Err(exceeded),
        };
        self.error_correction_constant = constant;
        self.achieved_error = heap_bounds.achieved(constant);
        self.heap_bounds = heap_bounds;
        self.bit_heap_lsb = h;
        Ok(self)
    }

    pub fn with_compression(mut self, plan: CompressionPlan) -> Self {
        self.compression = Some(plan);
        self
    }

    /// The tie break order shared by all strategies: lower area, fewer DSPs,
    /// fewer placements, then more slack
    pub fn cmp_cost(&self, rhs: &Self, problem: &TilingProblem) -> Ordering {
        self.area
            .total_cmp(&rhs.area)
            .then(self.dsp_count.cmp(&rhs.dsp_count))
            .then(self.placements.len().cmp(&rhs.placements.len()))
            .then(rhs.slack(problem).cmp(&self.slack(problem)))
    }
}
