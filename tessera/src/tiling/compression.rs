use crate::{
    analysis::{log2_floor, slice_error, sliced_bounds},
    assemble::slice_output,
    bitheap::{CompressionPlan, Counters},
    catalog::{CostOracle, TileCatalog, TileKind},
    milp::Cmp,
    tiling::{
        ilp::{ModelExtension, TilingModel},
        IlpTiling, Placement, Solution, SolveStatus, TilingProblem, TilingStrategy,
    },
    Error,
};

/// Number of bits `kind` at `(x, y)` puts into every column of a heap
/// spanning `cut..=msb`
fn column_bits(
    problem: &TilingProblem,
    kind: &TileKind,
    x: i64,
    y: i64,
    cut: usize,
    msb: usize,
) -> Vec<usize> {
    let mut bits = vec![0; msb + 1 - cut];
    let raise = i64::from(kind.weight.unsigned_abs() == 2);
    for o in problem.outputs(kind, x, y) {
        let lsb = x + y + o.relative_weight as i64 + raise;
        if let Some(slice) = slice_output(lsb, o.width, cut, msb) {
            let first = slice.column - cut;
            for bit in &mut bits[first..(first + slice.keep)] {
                *bit += 1;
            }
        }
    }
    bits
}

/// Column heights of the heap `placements` give, with the constant bit
fn heights(
    problem: &TilingProblem,
    placements: &[Placement],
    cut: usize,
    msb: usize,
) -> Vec<usize> {
    let mut heights = vec![1; msb + 1 - cut];
    for p in placements {
        let (x, y) = p.anchor();
        for (h, b) in heights
            .iter_mut()
            .zip(column_bits(problem, &p.kind, x, y, cut, msb))
        {
            *h += b;
        }
    }
    heights
}

#[derive(Debug, Clone, Default)]
struct StageVars {
    /// `n[s][c]` for `s` in `0..=stages`
    n: Vec<Vec<usize>>,
    full: Vec<Vec<usize>>,
    half: Vec<Vec<usize>>,
}

#[derive(Debug, Default)]
struct Stages {
    max_stages: Option<usize>,
    /// The lowest heap column, fixed before solving so that the columns the
    /// counters work on are the ones the assembler fills
    cut: usize,
    vars: StageVars,
}

impl Stages {
    /// Charges the output bits below `cut` to the error rows and keeps the
    /// correction constant a multiple of `2^cut`
    fn slice_model(&self, model: &mut TilingModel, problem: &TilingProblem) {
        let Some((neg_row, pos_row)) = model.error_rows else {
            return
        };
        for choice in &model.choices {
            let e = slice_error(problem, &choice.kind, choice.x, choice.y, self.cut);
            if e.negative > 0 {
                model.milp.constraints[neg_row]
                    .terms
                    .push((choice.var, e.negative as f64));
            }
            if e.positive > 0 {
                model.milp.constraints[pos_row]
                    .terms
                    .push((choice.var, e.positive as f64));
            }
        }
        for &(var, i) in &model.constant_bits {
            if i < self.cut {
                model
                    .milp
                    .add_constraint(format!("cut_c_{i}"), vec![(var, 1.0)], Cmp::Le, 0.0);
            }
        }
    }
}

impl ModelExtension for Stages {
    fn extend(
        &mut self,
        model: &mut TilingModel,
        problem: &TilingProblem,
        oracle: &dyn CostOracle,
        warm: Option<&[Placement]>,
        start: &mut Option<Vec<i64>>,
    ) -> Result<(), Error> {
        // the warm start decides where the heap is cut
        let warm = match warm {
            Some(warm) => {
                Solution::finalize(warm.to_vec(), problem, oracle, SolveStatus::Heuristic).ok()
            }
            None => None,
        };
        self.cut = match (warm.as_ref(), model.error_rows) {
            (Some(warm), Some(_)) => warm
                .bit_heap_lsb
                .min(log2_floor(model.budget).unwrap_or(0)),
            _ => 0,
        };
        if self.cut > 0 {
            self.slice_model(model, problem);
        }
        let cut = self.cut;
        let msb = problem.prodsize() - 1;
        let cols = msb + 1 - cut;
        let mut col_terms = vec![vec![]; cols];
        let mut col_max = vec![1usize; cols];
        for choice in &model.choices {
            let bits = column_bits(problem, &choice.kind, choice.x, choice.y, cut, msb);
            for (c, b) in bits.into_iter().enumerate() {
                if b > 0 {
                    col_terms[c].push((choice.var, -(b as f64)));
                    col_max[c] += b;
                }
            }
        }
        let total = col_max.iter().sum::<usize>() as i64;
        let warm_plan = match warm.as_ref() {
            Some(warm) => Some(CompressionPlan::dadda(
                cut,
                &heights(problem, &warm.placements, cut, msb),
            )?),
            None => None,
        };
        let stages = match (self.max_stages, warm_plan.as_ref()) {
            (Some(s), _) => s,
            (None, Some(plan)) => plan.stages.len() + 1,
            (None, None) => CompressionPlan::dadda(cut, &col_max)?.stages.len() + 1,
        }
        .max(1);

        let first = model.milp.vars.len();
        let milp = &mut model.milp;
        let mut vars = StageVars::default();
        for s in 0..=stages {
            let hi = if s == stages { 2 } else { total };
            vars.n.push(
                (0..cols)
                    .map(|c| milp.add_integer(format!("n_{s}_{}", cut + c), 0, hi, 0.0))
                    .collect(),
            );
        }
        for s in 0..stages {
            vars.full.push(
                (0..cols)
                    .map(|c| {
                        milp.add_integer(
                            format!("fa_{s}_{}", cut + c),
                            0,
                            total / 3,
                            oracle.full_adder_cost(),
                        )
                    })
                    .collect(),
            );
            vars.half.push(
                (0..cols)
                    .map(|c| {
                        milp.add_integer(
                            format!("ha_{s}_{}", cut + c),
                            0,
                            total / 2,
                            oracle.half_adder_cost(),
                        )
                    })
                    .collect(),
            );
        }
        for (c, mut terms) in col_terms.into_iter().enumerate() {
            terms.push((vars.n[0][c], 1.0));
            milp.add_constraint(format!("bits_{}", cut + c), terms, Cmp::Eq, 1.0);
        }
        for s in 0..stages {
            for c in 0..cols {
                milp.add_constraint(
                    format!("counters_{s}_{}", cut + c),
                    vec![
                        (vars.full[s][c], 3.0),
                        (vars.half[s][c], 2.0),
                        (vars.n[s][c], -1.0),
                    ],
                    Cmp::Le,
                    0.0,
                );
                let mut terms = vec![
                    (vars.n[s + 1][c], 1.0),
                    (vars.n[s][c], -1.0),
                    (vars.full[s][c], 2.0),
                    (vars.half[s][c], 1.0),
                ];
                if c > 0 {
                    terms.push((vars.full[s][c - 1], -1.0));
                    terms.push((vars.half[s][c - 1], -1.0));
                }
                milp.add_constraint(format!("stage_{s}_{}", cut + c), terms, Cmp::Eq, 0.0);
            }
        }
        tracing::debug!(stages, cut, columns = cols, "compression stage model");

        let added = match (warm, warm_plan) {
            (Some(warm), Some(plan)) if plan.stages.len() <= stages => {
                let mut values = vec![0; milp.vars.len() - first];
                let mut n = heights(problem, &warm.placements, cut, msb);
                for s in 0..=stages {
                    for c in 0..cols {
                        values[vars.n[s][c] - first] = n[c] as i64;
                    }
                    if s == stages {
                        break
                    }
                    let stage = plan.stages.get(s);
                    let mut next = n.clone();
                    for c in 0..cols {
                        let k = stage.and_then(|st| st.get(c)).copied().unwrap_or_default();
                        values[vars.full[s][c] - first] = i64::from(k.full);
                        values[vars.half[s][c] - first] = i64::from(k.half);
                        next[c] -= 2 * k.full as usize + k.half as usize;
                        if c + 1 < cols {
                            next[c + 1] += (k.full + k.half) as usize;
                        }
                    }
                    n = next;
                }
                // the smallest constant that is a multiple of `2^cut` and
                // covers the sliced deficit of the warm start
                let bounds = sliced_bounds(&warm.placements, problem, &warm.bounds, cut);
                let step = 1u128 << cut;
                let c = bounds.negative.saturating_sub(model.budget).div_ceil(step) * step;
                let fits = model
                    .constant_bits
                    .last()
                    .map_or(c == 0, |&(_, i)| (c >> (i + 1)) == 0);
                fits.then_some((values, c))
            }
            _ => None,
        };
        match (added, start.as_mut()) {
            (Some((values, c)), Some(base)) => {
                for &(var, i) in &model.constant_bits {
                    base[var] = ((c >> i) & 1) as i64;
                }
                base.extend(values);
            }
            _ => *start = None,
        }
        self.vars = vars;
        Ok(())
    }

    fn finish(
        &mut self,
        _: &TilingModel,
        problem: &TilingProblem,
        values: &[i64],
        solution: Solution,
    ) -> Result<Solution, Error> {
        let value = |var: usize| -> Result<u32, Error> {
            let v = values.get(var).copied().unwrap_or(0);
            u32::try_from(v).map_err(|_| Error::OtherString(format!("counter count {v} is invalid")))
        };
        let mut plan = CompressionPlan {
            lsb: self.cut,
            stages: vec![],
        };
        for (full, half) in self.vars.full.iter().zip(&self.vars.half) {
            let mut stage = vec![];
            for (&fa, &ha) in full.iter().zip(half) {
                stage.push(Counters {
                    full: value(fa)?,
                    half: value(ha)?,
                });
            }
            plan.stages.push(stage);
        }
        plan.trim();
        tracing::debug!(
            stages = plan.stages.len(),
            cut = self.cut,
            full_adders = plan.full_adders(),
            half_adders = plan.half_adders(),
            "compression plan from the solver"
        );
        Ok(solution
            .with_bit_heap_lsb(self.cut, problem)?
            .with_compression(plan))
    }
}

/// The covering model of [IlpTiling] extended by the compressor tree. The
/// counts of full and half adders in every stage and column are part of
/// the model, and the solved schedule is attached to the solution as a
/// [CompressionPlan]. The heap is cut where the greedy tiling would cut it,
/// the bits dropped there are part of the error rows, and the stage count
/// defaults to one more than the Dadda schedule of the greedy tiling needs.
#[derive(Debug, Default)]
pub struct IlpCompressionTiling {
    pub ilp: IlpTiling,
    pub max_stages: Option<usize>,
}

impl IlpCompressionTiling {
    pub fn new(ilp: IlpTiling, max_stages: Option<usize>) -> Self {
        Self { ilp, max_stages }
    }
}

impl TilingStrategy for IlpCompressionTiling {
    fn name(&self) -> &str {
        "ilp-compression"
    }

    fn solve(
        &mut self,
        problem: &TilingProblem,
        catalog: &TileCatalog,
        oracle: &dyn CostOracle,
    ) -> Result<Solution, Error> {
        let mut stages = Stages {
            max_stages: self.max_stages,
            ..Default::default()
        };
        self.ilp.solve_extended(problem, catalog, oracle, &mut stages)
    }
}
