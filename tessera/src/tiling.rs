mod beam;
mod compression;
mod coverage;
mod greedy;
mod ilp;
mod problem;
mod render;
mod replay;
mod solution;
mod strategies;

pub use beam::BeamTiling;
pub use compression::IlpCompressionTiling;
pub use coverage::CoverageMatrix;
pub use greedy::GreedyTiling;
pub use ilp::IlpTiling;
pub use problem::{OutputShape, TilingProblem, MAX_PRODUCT_WIDTH};
pub use render::render_solution;
pub use replay::{parse_record, write_record, CsvReplay};
pub use solution::{Placement, Solution, SolveStatus};
pub use strategies::{StrategyConfig, StrategyConstructor, StrategyRegistry};

use crate::{
    catalog::{CostOracle, TileCatalog},
    Error,
};

/// A way of choosing tile placements
pub trait TilingStrategy {
    fn name(&self) -> &str;

    fn solve(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
    ) -> Result<Solution, Error>;
}

/// A `1 x w` or `w x 1` product is a single row of AND gates, which every
/// strategy returns as is
pub(crate) fn trivial_solution(
    problem: &TilingProblem,
    catalog: &TileCatalog,
    oracle: &dyn CostOracle,
) -> Result<Option<Solution>, Error> {
    if problem.wx.min(problem.wy) != 1 {
        return Ok(None)
    }
    let Some((tile, kind)) = catalog.and_row() else {
        return Ok(None)
    };
    if !problem.is_legal(&kind, 0, 0) {
        return Ok(None)
    }
    tracing::debug!(%kind, "trivial tiling");
    let placement = Placement::new(tile, kind, 0, 0)?;
    Solution::finalize(vec![placement], problem, oracle, SolveStatus::Optimal).map(Some)
}
