use std::{collections::HashMap, fmt, time::Duration};

use crate::{
    analysis::{compute_truncation_params, error_bounds},
    catalog::{CostOracle, TileCatalog, TileId, TileKind},
    milp::{BranchAndBound, Cmp, MilpProblem, MilpSolver, MilpStatus, SolveLimits},
    tiling::{
        greedy::Targets, trivial_solution, CoverageMatrix, GreedyTiling, Placement, Solution,
        SolveStatus, TilingProblem, TilingStrategy,
    },
    Error, Grid,
};

/// Objective weight per hard block, breaking area ties towards fewer DSPs
const DSP_EPSILON: f64 = 1e-2;
/// Objective weight per placement, breaking the remaining ties
const PLACEMENT_EPSILON: f64 = 1e-3;
/// Constant bits are free in the plain model apart from this tie break
const CONSTANT_EPSILON: f64 = 1e-4;

/// One placement variable
#[derive(Debug, Clone, Copy)]
pub(crate) struct Choice {
    pub tile: TileId,
    pub kind: TileKind,
    pub x: i64,
    pub y: i64,
    pub var: usize,
}

/// The 0/1 covering model shared by the ILP strategies
#[derive(Debug, Clone)]
pub(crate) struct TilingModel {
    pub milp: MilpProblem,
    pub choices: Vec<Choice>,
    /// Truncation binaries, `1` if the cell is fully covered
    pub kept: Vec<((usize, usize), usize)>,
    /// The bits of the correction constant as `(var, exponent)`
    pub constant_bits: Vec<(usize, usize)>,
    /// Indices of the negative and positive error rows
    pub error_rows: Option<(usize, usize)>,
    pub budget: u128,
}

impl TilingModel {
    /// Builds the model for `budget`, which can be lower than the budget of
    /// `problem` when retrying after a numeric residue
    pub fn build(
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
        budget: u128,
        optimal_truncation: bool,
    ) -> Result<Self, Error> {
        let mut milp = MilpProblem::new();
        let mut choices = vec![];
        let mut cell_terms: Grid<Vec<(usize, f64)>> =
            Grid::new((problem.wx, problem.wy), |_| vec![])
                .ok_or(Error::InvalidWidth(problem.wx, problem.wy))?;
        let mut dsp_terms = vec![];
        for (tile, kind) in catalog.iter() {
            for (x, y) in problem.anchors(kind) {
                let cost = oracle.cost(kind, (x, y), problem);
                let var = milp.add_binary(
                    format!("d_{tile}_{x}_{y}"),
                    cost.area + DSP_EPSILON * f64::from(cost.hard_blocks) + PLACEMENT_EPSILON,
                );
                let w = f64::from(kind.weight);
                problem.for_each_cell(kind, x, y, |cx, cy| cell_terms[(cx, cy)].push((var, w)));
                if cost.hard_blocks > 0 {
                    dsp_terms.push((var, f64::from(cost.hard_blocks)));
                }
                choices.push(Choice {
                    tile,
                    kind: *kind,
                    x,
                    y,
                    var,
                });
            }
        }

        // which cells may be left uncovered
        let droppable: Grid<bool> = if optimal_truncation {
            Grid::new((problem.wx, problem.wy), |(x, y)| {
                (budget > 0) && ((1u128 << (x + y)) <= budget)
            })
            .ok_or(Error::InvalidWidth(problem.wx, problem.wy))?
        } else {
            let params = compute_truncation_params(problem.wx, problem.wy, budget)?;
            let targets = Targets::new(problem, &params)?;
            Grid::new((problem.wx, problem.wy), |(x, y)| !targets.is_required(x, y))
                .ok_or(Error::InvalidWidth(problem.wx, problem.wy))?
        };

        let mut kept = vec![];
        // error terms of the cells off and on the signed edges, and the
        // constant part of their deviation
        let mut neg_terms = vec![];
        let mut pos_terms = vec![];
        let mut neg_const = 0.0;
        let mut pos_const = 0.0;
        let mut any_droppable = false;
        for (x, y) in problem.cells() {
            let r = problem.required(x, y);
            let rf = f64::from(r);
            let mut terms = cell_terms[(x, y)].clone();
            let name = format!("cover_{x}_{y}");
            if !droppable[(x, y)] {
                milp.add_constraint(name, terms, Cmp::Eq, rf);
                continue
            }
            any_droppable = true;
            let scale = (x + y) as f64;
            let scale = scale.exp2();
            let edge = problem.sign_factor(x, y) < 0;
            let (err_terms, err_const) = if edge {
                (&mut pos_terms, &mut pos_const)
            } else {
                (&mut neg_terms, &mut neg_const)
            };
            *err_const += rf * scale;
            if optimal_truncation {
                let b = milp.add_binary(format!("b_{x}_{y}"), 0.0);
                kept.push(((x, y), b));
                err_terms.push((b, -rf * scale));
                terms.push((b, -rf));
                milp.add_constraint(name, terms, Cmp::Eq, 0.0);
            } else {
                for &(var, w) in &terms {
                    err_terms.push((var, -w * scale));
                }
                milp.add_constraint(name, terms, Cmp::Le, rf);
            }
        }

        let mut constant_bits = vec![];
        let mut error_rows = None;
        if any_droppable {
            let cost = if optimal_truncation {
                oracle.constant_bit_cost()
            } else {
                CONSTANT_EPSILON
            };
            let mut i = 0;
            while (1u128 << i) < budget {
                constant_bits.push((milp.add_binary(format!("c_{i}"), cost), i));
                i += 1;
            }
            let b = budget as f64;
            for &(var, i) in &constant_bits {
                let w = (i as f64).exp2();
                neg_terms.push((var, -w));
                pos_terms.push((var, w));
            }
            let first = milp.constraints.len();
            milp.add_constraint("error_negative", neg_terms, Cmp::Le, b - neg_const);
            milp.add_constraint("error_positive", pos_terms, Cmp::Le, b - 1.0 - pos_const);
            error_rows = Some((first, first + 1));
        }
        if let Some(cap) = problem.max_dsp {
            if !dsp_terms.is_empty() {
                milp.add_constraint("dsp_cap", dsp_terms, Cmp::Le, f64::from(cap));
            }
        }
        Ok(Self {
            milp,
            choices,
            kept,
            constant_bits,
            error_rows,
            budget,
        })
    }

    /// Encodes `placements` as a start assignment, `None` if the model cannot
    /// represent them
    pub fn start_from(&self, placements: &[Placement], problem: &TilingProblem) -> Option<Vec<i64>> {
        let index: HashMap<(TileId, i64, i64), usize> = self
            .choices
            .iter()
            .map(|c| ((c.tile, c.x, c.y), c.var))
            .collect();
        let mut values = vec![0; self.milp.vars.len()];
        for p in placements {
            let var = *index.get(&(p.tile, i64::from(p.x), i64::from(p.y)))?;
            if values[var] != 0 {
                return None
            }
            values[var] = 1;
        }
        let coverage = CoverageMatrix::from_placements(placements, problem).ok()?;
        for &((x, y), var) in &self.kept {
            let dev = coverage.deviation(problem, x, y);
            if dev == 0 {
                values[var] = 1;
            } else if dev != problem.required(x, y) {
                return None
            }
        }
        if !self.constant_bits.is_empty() {
            let bounds = error_bounds(&coverage, problem);
            let c = bounds.negative.saturating_sub(self.budget);
            if c >> self.constant_bits.len() != 0 {
                return None
            }
            for &(var, i) in &self.constant_bits {
                values[var] = ((c >> i) & 1) as i64;
            }
        }
        Some(values)
    }

    pub fn placements(&self, values: &[i64]) -> Result<Vec<Placement>, Error> {
        let mut res = vec![];
        for c in &self.choices {
            if values.get(c.var).copied().unwrap_or(0) != 0 {
                res.push(Placement::new(c.tile, c.kind, c.x, c.y)?);
            }
        }
        Ok(res)
    }
}

/// Additional variables and rows on top of the covering model
pub(crate) trait ModelExtension {
    /// Adds to `model`. `start` holds the start assignment of the covering
    /// model built from `warm`, the extension appends values for its own
    /// variables or clears it if `warm` cannot be represented.
    fn extend(
        &mut self,
        model: &mut TilingModel,
        problem: &TilingProblem,
        oracle: &dyn CostOracle,
        warm: Option<&[Placement]>,
        start: &mut Option<Vec<i64>>,
    ) -> Result<(), Error>;

    fn finish(
        &mut self,
        model: &TilingModel,
        problem: &TilingProblem,
        values: &[i64],
        solution: Solution,
    ) -> Result<Solution, Error>;
}

struct Plain;

impl ModelExtension for Plain {
    fn extend(
        &mut self,
        _: &mut TilingModel,
        _: &TilingProblem,
        _: &dyn CostOracle,
        _: Option<&[Placement]>,
        _: &mut Option<Vec<i64>>,
    ) -> Result<(), Error> {
        Ok(())
    }

    fn finish(
        &mut self,
        _: &TilingModel,
        _: &TilingProblem,
        _: &[i64],
        solution: Solution,
    ) -> Result<Solution, Error> {
        Ok(solution)
    }
}

/// The exact covering model solved by a [MilpSolver]. The model is warm
/// started from the greedy tiling, so a solver limit never gives a worse
/// tiling than the greedy one.
pub struct IlpTiling {
    pub limits: SolveLimits,
    /// How often the budget is reduced and the model solved again when the
    /// reconstructed error exceeds the budget
    pub max_retries: usize,
    /// Lets the model choose which low cells to drop instead of using the
    /// truncation scan
    pub optimal_truncation: bool,
    pub solver: Box<dyn MilpSolver + Send>,
}

impl fmt::Debug for IlpTiling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IlpTiling")
            .field("limits", &self.limits)
            .field("max_retries", &self.max_retries)
            .field("optimal_truncation", &self.optimal_truncation)
            .field("solver", &self.solver.name())
            .finish()
    }
}

impl Default for IlpTiling {
    fn default() -> Self {
        Self {
            limits: SolveLimits::default().with_timeout(Some(Duration::from_secs(30))),
            max_retries: 3,
            optimal_truncation: false,
            solver: Box::new(BranchAndBound::default()),
        }
    }
}

impl IlpTiling {
    pub fn new(limits: SolveLimits) -> Self {
        Self {
            limits,
            ..Default::default()
        }
    }

    pub fn with_max_retries(mut self, max_retries: usize) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_optimal_truncation(mut self, optimal_truncation: bool) -> Self {
        self.optimal_truncation = optimal_truncation;
        self
    }

    pub fn with_solver(mut self, solver: Box<dyn MilpSolver + Send>) -> Self {
        self.solver = solver;
        self
    }

    pub(crate) fn solve_extended<E: ModelExtension>(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
        ext: &mut E,
    ) -> Result<Solution, Error> {
        problem.validate()?;
        catalog.ensure_non_empty()?;
        if let Some(solution) = trivial_solution(problem, catalog, oracle)? {
            return Ok(solution)
        }
        let warm = match GreedyTiling::new().solve(problem, catalog, oracle) {
            Ok(solution) => Some(solution.placements),
            Err(e) => {
                tracing::debug!(%e, "no greedy warm start");
                None
            }
        };
        let mut budget = problem.error_budget;
        for attempt in 0..=self.max_retries {
            let mut model =
                TilingModel::build(problem, catalog, oracle, budget, self.optimal_truncation)?;
            let mut start = warm
                .as_deref()
                .and_then(|warm| model.start_from(warm, problem));
            ext.extend(&mut model, problem, oracle, warm.as_deref(), &mut start)?;
            tracing::debug!(
                vars = model.milp.vars.len(),
                rows = model.milp.constraints.len(),
                warm_start = start.is_some(),
                budget = %budget,
                solver = self.solver.name(),
                "solving tiling model"
            );
            let res = self.solver.solve(&model.milp, start.as_deref(), &self.limits)?;
            let status = match res.status {
                MilpStatus::Optimal => SolveStatus::Optimal,
                MilpStatus::Feasible => {
                    tracing::warn!(
                        nodes = res.nodes,
                        objective = res.objective,
                        "solver hit its limit, using the best incumbent"
                    );
                    SolveStatus::Suboptimal
                }
                MilpStatus::Infeasible => {
                    return Err(match problem.max_dsp {
                        Some(cap) => Error::infeasible(format!(
                            "the DSP cap of {cap} hard blocks admits no faithful covering"
                        )),
                        None => Error::infeasible("the tiling model has no feasible covering"),
                    })
                }
                MilpStatus::Timeout => return Err(Error::SolverTimeout),
            };
            let placements = model.placements(&res.values)?;
            let solution = Solution::finalize(placements, problem, oracle, status)
                .and_then(|solution| ext.finish(&model, problem, &res.values, solution));
            match solution {
                Ok(solution) => return Ok(solution),
                Err(Error::BudgetExceeded {
                    negative,
                    positive,
                    budget: b,
                }) => {
                    if attempt == self.max_retries {
                        break
                    }
                    let excess = negative
                        .saturating_add(positive)
                        .saturating_sub(b.saturating_mul(2).saturating_sub(1))
                        .max(1);
                    budget = budget.saturating_sub(excess);
                    tracing::info!(
                        attempt,
                        excess = %excess,
                        budget = %budget,
                        "numeric residue exceeded the error budget, solving again"
                    );
                }
                Err(e) => return Err(e),
            }
        }
        Err(Error::ResidueRetriesExhausted(self.max_retries))
    }
}

impl TilingStrategy for IlpTiling {
    fn name(&self) -> &str {
        "ilp"
    }

    fn solve(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
    ) -> Result<Solution, Error> {
        self.solve_extended(problem, catalog, oracle, &mut Plain)
    }
}
