use std::cmp::Ordering;

use crate::{
    analysis::{error_bounds, recenter_constant},
    catalog::{CostOracle, TileCatalog},
    tiling::{
        greedy::{solve_heuristic, Search, TilingState},
        Solution, TilingProblem, TilingStrategy,
    },
    Error,
};

/// Score of a rollout, lower is better
#[derive(Debug, Clone, Copy)]
struct Score {
    /// Total area for complete rollouts, area per covered unit otherwise
    area: f64,
    dsp: u32,
    placements: usize,
    slack: u128,
}

impl Score {
    fn cmp(&self, rhs: &Self) -> Ordering {
        self.area
            .total_cmp(&rhs.area)
            .then(self.dsp.cmp(&rhs.dsp))
            .then(self.placements.cmp(&rhs.placements))
            .then(rhs.slack.cmp(&self.slack))
    }
}

/// Greedy tiling with lookahead. At every decision the best `beam_width`
/// candidates are each rolled out greedily for `beam_range` further steps,
/// or to completion if `beam_range == 0`, and the candidate with the best
/// rollout is committed. With complete rollouts the result never costs more
/// than the plain greedy tiling.
#[derive(Debug, Clone)]
pub struct BeamTiling {
    pub beam_width: usize,
    pub beam_range: usize,
}

impl Default for BeamTiling {
    fn default() -> Self {
        Self {
            beam_width: 4,
            beam_range: 0,
        }
    }
}

impl BeamTiling {
    pub fn new(beam_width: usize, beam_range: usize) -> Self {
        Self {
            beam_width: beam_width.max(1),
            beam_range,
        }
    }

    fn score(&self, search: &Search, problem: &TilingProblem, state: &TilingState) -> Score {
        let complete = search.next_cell(state).is_none();
        let area = if complete {
            state.area
        } else {
            state.area / (state.units.max(1) as f64)
        };
        let mut slack = 0;
        if complete {
            let bounds = error_bounds(&state.coverage, problem);
            let actual_lsb = state.coverage.actual_lsb(problem);
            if let Some(c) = recenter_constant(&bounds, problem.error_budget, actual_lsb) {
                slack = problem.error_budget.saturating_sub(bounds.achieved(c));
            }
        }
        Score {
            area,
            dsp: state.dsp,
            placements: state.placements.len(),
            slack,
        }
    }

    fn fill(&self, search: &Search, problem: &TilingProblem) -> Result<TilingState, Error> {
        let steps = if self.beam_range == 0 {
            None
        } else {
            Some(self.beam_range)
        };
        let mut state = search.initial()?;
        while let Some(cell) = search.next_cell(&state) {
            let (cands, _) = search.candidates(&state, cell);
            let mut best: Option<(Score, usize)> = None;
            let mut first_err = None;
            for (i, cand) in cands.iter().take(self.beam_width).enumerate() {
                let mut next = state.clone();
                search.apply(&mut next, cand)?;
                match search.rollout(next, steps) {
                    Ok(rolled) => {
                        let score = self.score(search, problem, &rolled);
                        if best
                            .as_ref()
                            .map_or(true, |(prev, _)| score.cmp(prev) == Ordering::Less)
                        {
                            best = Some((score, i));
                        }
                    }
                    Err(e) => {
                        first_err.get_or_insert(e);
                    }
                }
            }
            match best {
                Some((score, i)) => {
                    tracing::trace!(beam_choice = i, score = score.area, "beam step");
                    search.apply(&mut state, &cands[i])?;
                }
                None => {
                    // every rollout failed or there was nothing to roll out,
                    // the greedy rollout reports why
                    return match first_err {
                        Some(e) => Err(e),
                        None => search.rollout(state, None),
                    }
                }
            }
        }
        Ok(state)
    }
}

impl TilingStrategy for BeamTiling {
    fn name(&self) -> &str {
        "beam"
    }

    fn solve(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
    ) -> Result<Solution, Error> {
        tracing::debug!(
            beam_width = self.beam_width,
            beam_range = self.beam_range,
            "beam tiling"
        );
        solve_heuristic(problem, catalog, oracle, |search| self.fill(search, problem))
    }
}
