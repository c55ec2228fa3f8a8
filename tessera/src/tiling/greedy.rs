use crate::{
    analysis::{compute_truncation_params, TruncationParams},
    catalog::{CostOracle, TileCatalog, TileId, TileKind},
    tiling::{
        trivial_solution, CoverageMatrix, Placement, Solution, SolveStatus, TilingProblem,
        TilingStrategy,
    },
    Error, Grid,
};

/// The cells a heuristic has to fill exactly. Everything in a column above
/// `col` is required, column `col` itself requires its first `keep` units by
/// ascending `y`, and everything below is optional.
#[derive(Debug, Clone)]
pub(crate) struct Targets {
    required: Grid<bool>,
    col: usize,
    keep: usize,
}

impl Targets {
    pub fn new(problem: &TilingProblem, params: &TruncationParams) -> Result<Self, Error> {
        let mut res = Self {
            required: Grid::new((problem.wx, problem.wy), |_| false)
                .ok_or(Error::InvalidWidth(problem.wx, problem.wy))?,
            col: params.actual_lsb,
            keep: params.keep_bits,
        };
        res.rebuild(problem);
        Ok(res)
    }

    fn rebuild(&mut self, problem: &TilingProblem) {
        let mut units = 0;
        for (x, y) in problem.cells() {
            let col = x + y;
            let required = if col > self.col {
                true
            } else if (col == self.col) && (units < self.keep) {
                units += problem.required(x, y) as usize;
                true
            } else {
                false
            };
            self.required[(x, y)] = required;
        }
    }

    /// Makes the partial column fully required and moves the truncation line
    /// down by one. Returns `false` if nothing was optional.
    pub fn lower(&mut self, problem: &TilingProblem) -> bool {
        if problem.cells().iter().all(|&xy| self.required[xy]) {
            return false
        }
        if self.col == 0 {
            self.keep = usize::MAX;
        } else {
            self.col -= 1;
            self.keep = 0;
        }
        self.rebuild(problem);
        true
    }

    pub fn is_required(&self, x: usize, y: usize) -> bool {
        self.required.get((x, y)).copied().unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub tile: TileId,
    pub kind: TileKind,
    pub x: i64,
    pub y: i64,
    pub area: f64,
    pub dsp: u32,
    pub units: u32,
}

impl Candidate {
    fn ratio(&self) -> f64 {
        self.area / f64::from(self.units.max(1))
    }
}

/// A partial tiling
#[derive(Debug, Clone)]
pub(crate) struct TilingState {
    pub coverage: CoverageMatrix,
    pub placements: Vec<Placement>,
    pub area: f64,
    pub dsp: u32,
    pub units: u64,
}

/// Shared machinery of the greedy and beam heuristics
pub(crate) struct Search<'a> {
    problem: &'a TilingProblem,
    oracle: &'a dyn CostOracle,
    /// Required cells in fill order
    order: Vec<(usize, usize)>,
    kinds: Vec<(TileId, TileKind, Vec<(u32, u32)>)>,
}

impl<'a> Search<'a> {
    pub fn new(
        problem: &'a TilingProblem,
        catalog: &TileCatalog,
        oracle: &'a dyn CostOracle,
        targets: &Targets,
    ) -> Self {
        let order = problem
            .cells()
            .into_iter()
            .filter(|&(x, y)| targets.is_required(x, y))
            .collect();
        let kinds = catalog
            .iter()
            .filter(|(_, kind)| kind.weight > 0)
            .map(|(id, kind)| (id, *kind, kind.cells()))
            .collect();
        Self {
            problem,
            oracle,
            order,
            kinds,
        }
    }

    pub fn initial(&self) -> Result<TilingState, Error> {
        Ok(TilingState {
            coverage: CoverageMatrix::new(self.problem)?,
            placements: vec![],
            area: 0.0,
            dsp: 0,
            units: 0,
        })
    }

    /// The first required cell that is not filled yet
    pub fn next_cell(&self, state: &TilingState) -> Option<(usize, usize)> {
        self.order
            .iter()
            .copied()
            .find(|&(x, y)| state.coverage.deviation(self.problem, x, y) > 0)
    }

    /// Returns the weight `kind` at `(ax, ay)` adds if it keeps every cell
    /// within its required weight
    fn fits(
        &self,
        state: &TilingState,
        kind: &TileKind,
        cells: &[(u32, u32)],
        ax: i64,
        ay: i64,
    ) -> Option<u32> {
        let p = self.problem;
        let w = i32::from(kind.weight);
        let mut units = 0u32;
        let mut folded = vec![];
        for &(dx, dy) in cells {
            let x = ax + i64::from(dx);
            let y = ay + i64::from(dy);
            if (x < 0) || (y < 0) || (x >= p.wx as i64) || (y >= p.wy as i64) {
                continue
            }
            let (x, y) = p.fold(x as usize, y as usize);
            if p.squarer {
                folded.push((x, y));
                continue
            }
            if state.coverage.get(x, y) + w > p.required(x, y) {
                return None
            }
            units += w as u32;
        }
        // mirrored cells of one tile can land on the same folded cell
        folded.sort_unstable();
        for run in folded.chunk_by(|a, b| a == b) {
            let (x, y) = run[0];
            let add = w * run.len() as i32;
            if state.coverage.get(x, y) + add > p.required(x, y) {
                return None
            }
            units += add as u32;
        }
        Some(units)
    }

    /// Every placement covering `cell` that keeps all cells within their
    /// required weight, best first. The flag is set if candidates were
    /// excluded by the DSP cap.
    pub fn candidates(&self, state: &TilingState, cell: (usize, usize)) -> (Vec<Candidate>, bool) {
        let (cx, cy) = (cell.0 as i64, cell.1 as i64);
        let mut res = vec![];
        let mut capped = false;
        for (tile, kind, cells) in &self.kinds {
            for ay in (cy - i64::from(kind.height()) + 1)..=cy {
                for ax in (cx - i64::from(kind.width()) + 1)..=cx {
                    if !kind.shape_valid(cx - ax, cy - ay) {
                        continue
                    }
                    let Some(units) = self.fits(state, kind, cells, ax, ay) else {
                        continue
                    };
                    if !self.problem.is_legal(kind, ax, ay) {
                        continue
                    }
                    let cost = self.oracle.cost(kind, (ax, ay), self.problem);
                    if let Some(cap) = self.problem.max_dsp {
                        if state.dsp + cost.hard_blocks > cap {
                            capped = true;
                            continue
                        }
                    }
                    res.push(Candidate {
                        tile: *tile,
                        kind: *kind,
                        x: ax,
                        y: ay,
                        area: cost.area,
                        dsp: cost.hard_blocks,
                        units,
                    });
                }
            }
        }
        // stable, ties stay in catalog and anchor order
        res.sort_by(|a, b| {
            a.ratio()
                .total_cmp(&b.ratio())
                .then(a.area.total_cmp(&b.area))
                .then(a.dsp.cmp(&b.dsp))
        });
        (res, capped)
    }

    pub fn apply(&self, state: &mut TilingState, cand: &Candidate) -> Result<(), Error> {
        tracing::trace!(kind = %cand.kind, x = cand.x, y = cand.y, area = cand.area, "placing tile");
        state.placements.push(Placement::new(cand.tile, cand.kind, cand.x, cand.y)?);
        state.coverage.add(self.problem, &cand.kind, cand.x, cand.y);
        state.area += cand.area;
        state.dsp += cand.dsp;
        state.units += u64::from(cand.units);
        Ok(())
    }

    fn stuck(&self, cell: (usize, usize), capped: bool) -> Error {
        match (capped, self.problem.max_dsp) {
            (true, Some(cap)) => Error::infeasible(format!(
                "the DSP cap of {cap} hard blocks leaves cell ({}, {}) uncoverable",
                cell.0, cell.1
            )),
            _ => Error::infeasible(format!(
                "no tile in the catalog can cover cell ({}, {})",
                cell.0, cell.1
            )),
        }
    }

    /// Places the best candidate up to `steps` times, or until every required
    /// cell is filled if `steps` is `None`
    pub fn rollout(&self, mut state: TilingState, steps: Option<usize>) -> Result<TilingState, Error> {
        let mut placed = 0;
        while steps.map_or(true, |steps| placed < steps) {
            let Some(cell) = self.next_cell(&state) else {
                break
            };
            let (cands, capped) = self.candidates(&state, cell);
            let Some(best) = cands.first() else {
                return Err(self.stuck(cell, capped))
            };
            self.apply(&mut state, best)?;
            placed += 1;
        }
        Ok(state)
    }
}

/// Runs `fill` against successively larger required cell sets until the
/// finalized tiling is faithful
pub(crate) fn solve_heuristic<F>(
    problem: &TilingProblem,
    catalog: &TileCatalog,
    oracle: &dyn CostOracle,
    mut fill: F,
) -> Result<Solution, Error>
where
    F: FnMut(&Search) -> Result<TilingState, Error>,
{
    problem.validate()?;
    catalog.ensure_non_empty()?;
    if let Some(solution) = trivial_solution(problem, catalog, oracle)? {
        return Ok(solution)
    }
    let params = compute_truncation_params(problem.wx, problem.wy, problem.error_budget)?;
    tracing::debug!(?params, catalog = catalog.len(), "heuristic tiling");
    let mut targets = Targets::new(problem, &params)?;
    loop {
        let search = Search::new(problem, catalog, oracle, &targets);
        let state = fill(&search)?;
        match Solution::finalize(state.placements, problem, oracle, SolveStatus::Heuristic) {
            Err(Error::BudgetExceeded { .. }) if targets.lower(problem) => {
                tracing::debug!("tiling was not faithful, requiring one more column");
            }
            res => return res,
        }
    }
}

/// Fills the lowest unfilled cell with the placement of lowest area per
/// covered unit
#[derive(Debug, Clone, Default)]
pub struct GreedyTiling {}

impl GreedyTiling {
    pub fn new() -> Self {
        Self {}
    }
}

impl TilingStrategy for GreedyTiling {
    fn name(&self) -> &str {
        "greedy"
    }

    fn solve(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
    ) -> Result<Solution, Error> {
        solve_heuristic(problem, catalog, oracle, |search| {
            search.rollout(search.initial()?, None)
        })
    }
}
