use std::time::Instant;

use crate::{
    milp::{Cmp, MilpProblem, MilpSolution, MilpSolver, MilpStatus, SolveLimits, FEASIBILITY_TOL},
    Error,
};

/// Depth first branch and bound with bound propagation.
///
/// Nodes are variable domains. Every node propagates all rows to a fixpoint,
/// is pruned against the incumbent using the fixed part of the objective
/// plus a dual bound from the covering rows, and then branches on a variable
/// of the row with the fewest free variables. Binaries are tried at 1 first,
/// integers at their warm start value first.
#[derive(Debug, Clone)]
pub struct BranchAndBound {
    /// Bound on row visits per propagation, relative to the number of rows
    pub propagation_factor: usize,
}

impl Default for BranchAndBound {
    fn default() -> Self {
        Self {
            propagation_factor: 16,
        }
    }
}

#[derive(Debug, Clone)]
struct Node {
    lo: Vec<i64>,
    hi: Vec<i64>,
}

struct Context<'a> {
    problem: &'a MilpProblem,
    /// The rows each variable appears in
    col_rows: Vec<Vec<usize>>,
    hint: Option<&'a [i64]>,
    max_visits: usize,
}

fn floor_i64(x: f64) -> i64 {
    // `as` saturates
    x.floor() as i64
}

fn ceil_i64(x: f64) -> i64 {
    x.ceil() as i64
}

impl<'a> Context<'a> {
    /// Tightens the domains of `node`, returns `false` if a row cannot be
    /// satisfied
    fn propagate(&self, node: &mut Node) -> bool {
        let rows = &self.problem.constraints;
        let mut queued = vec![true; rows.len()];
        let mut queue: Vec<usize> = (0..rows.len()).rev().collect();
        let mut visits = 0;
        while let Some(r) = queue.pop() {
            queued[r] = false;
            visits += 1;
            if visits > self.max_visits {
                break
            }
            let row = &rows[r];
            let mut min_act = 0.0;
            let mut max_act = 0.0;
            for &(i, a) in &row.terms {
                let (l, h) = (node.lo[i] as f64, node.hi[i] as f64);
                if a > 0.0 {
                    min_act += a * l;
                    max_act += a * h;
                } else {
                    min_act += a * h;
                    max_act += a * l;
                }
            }
            let tol = FEASIBILITY_TOL * (1.0 + row.rhs.abs());
            let le = matches!(row.cmp, Cmp::Le | Cmp::Eq);
            let ge = matches!(row.cmp, Cmp::Ge | Cmp::Eq);
            if (le && (min_act > row.rhs + tol)) || (ge && (max_act < row.rhs - tol)) {
                return false
            }
            for &(i, a) in &row.terms {
                let (l, h) = (node.lo[i], node.hi[i]);
                if l == h {
                    continue
                }
                let (mut nl, mut nh) = (l, h);
                if le {
                    let own = if a > 0.0 { a * l as f64 } else { a * h as f64 };
                    let room = row.rhs - (min_act - own) + tol;
                    if a > 0.0 {
                        nh = nh.min(floor_i64(room / a));
                    } else {
                        nl = nl.max(ceil_i64(room / a));
                    }
                }
                if ge {
                    let own = if a > 0.0 { a * h as f64 } else { a * l as f64 };
                    let need = row.rhs - (max_act - own) - tol;
                    if a > 0.0 {
                        nl = nl.max(ceil_i64(need / a));
                    } else {
                        nh = nh.min(floor_i64(need / a));
                    }
                }
                if nl > nh {
                    return false
                }
                if (nl, nh) != (l, h) {
                    node.lo[i] = nl;
                    node.hi[i] = nh;
                    for &r1 in &self.col_rows[i] {
                        if !queued[r1] {
                            queued[r1] = true;
                            queue.push(r1);
                        }
                    }
                }
            }
        }
        true
    }

    /// A lower bound on the objective of every completion of `node`
    fn lower_bound(&self, node: &Node) -> f64 {
        let vars = &self.problem.vars;
        let mut bound = 0.0;
        for (i, v) in vars.iter().enumerate() {
            let c = v.objective;
            bound += if c >= 0.0 {
                c * node.lo[i] as f64
            } else {
                c * node.hi[i] as f64
            };
        }
        // Dual bound of the covering relaxation: rows needing more activity
        // where every free variable has a positive coefficient and a
        // nonnegative cost
        let rows = &self.problem.constraints;
        let mut covering = vec![];
        let mut colsum = vec![0.0; vars.len()];
        for row in rows {
            if row.cmp == Cmp::Le {
                continue
            }
            let mut residual = row.rhs;
            let mut usable = true;
            let mut free = false;
            for &(i, a) in &row.terms {
                if node.lo[i] == node.hi[i] {
                    residual -= a * node.lo[i] as f64;
                    continue
                }
                if (a < 0.0) || (vars[i].objective < 0.0) {
                    usable = false;
                    break
                }
                free = true;
                residual -= a * node.lo[i] as f64;
            }
            if usable && free && (residual > FEASIBILITY_TOL) {
                covering.push((row, residual));
                for &(i, a) in &row.terms {
                    if node.lo[i] != node.hi[i] {
                        colsum[i] += a;
                    }
                }
            }
        }
        for (row, residual) in covering {
            let mut y = f64::INFINITY;
            for &(i, _) in &row.terms {
                if (node.lo[i] != node.hi[i]) && (colsum[i] > 0.0) {
                    y = y.min(vars[i].objective / colsum[i]);
                }
            }
            if y.is_finite() {
                bound += residual * y;
            }
        }
        bound
    }

    /// Picks the variable to branch on, `None` if everything is fixed
    fn branch_var(&self, node: &Node) -> Option<usize> {
        let mut best_row: Option<(usize, usize)> = None;
        for (r, row) in self.problem.constraints.iter().enumerate() {
            let free = row
                .terms
                .iter()
                .filter(|&&(i, _)| node.lo[i] != node.hi[i])
                .count();
            if (free > 0) && best_row.map_or(true, |(_, f)| free < f) {
                best_row = Some((r, free));
            }
        }
        if let Some((r, _)) = best_row {
            let vars = &self.problem.vars;
            let mut best: Option<(usize, f64)> = None;
            for &(i, a) in &self.problem.constraints[r].terms {
                if node.lo[i] == node.hi[i] {
                    continue
                }
                let score = vars[i].objective / a.abs();
                if best.map_or(true, |(_, s)| score < s) {
                    best = Some((i, score));
                }
            }
            return best.map(|(i, _)| i)
        }
        (0..node.lo.len()).find(|&i| node.lo[i] != node.hi[i])
    }

    /// Children of `node` branching on `i`, in the order they should be
    /// explored
    fn children(&self, node: &Node, i: usize) -> Vec<Node> {
        let (l, h) = (node.lo[i], node.hi[i]);
        let with = |lo: i64, hi: i64| {
            let mut child = node.clone();
            child.lo[i] = lo;
            child.hi[i] = hi;
            child
        };
        if (l == 0) && (h == 1) {
            return vec![with(1, 1), with(0, 0)]
        }
        match self.hint.and_then(|hint| hint.get(i).copied()) {
            Some(v) if (l..=h).contains(&v) => {
                let mut res = vec![with(v, v)];
                if v > l {
                    res.push(with(l, v - 1));
                }
                if v < h {
                    res.push(with(v + 1, h));
                }
                res
            }
            _ => vec![with(l, l), with(l + 1, h)],
        }
    }
}

impl MilpSolver for BranchAndBound {
    fn name(&self) -> &str {
        "branch-and-bound"
    }

    fn solve(
        &mut self,
        problem: &MilpProblem,
        start: Option<&[i64]>,
        limits: &SolveLimits,
    ) -> Result<MilpSolution, Error> {
        let mut col_rows = vec![vec![]; problem.vars.len()];
        for (r, row) in problem.constraints.iter().enumerate() {
            for &(i, _) in &row.terms {
                let Some(rows) = col_rows.get_mut(i) else {
                    return Err(Error::OtherString(format!(
                        "row {} refers to variable {i} which does not exist",
                        row.name
                    )))
                };
                rows.push(r);
            }
        }
        let ctx = Context {
            problem,
            col_rows,
            hint: start,
            max_visits: self
                .propagation_factor
                .saturating_mul(problem.constraints.len())
                .saturating_add(64),
        };
        let mut incumbent: Option<(Vec<i64>, f64)> = None;
        if let Some(start) = start {
            match problem.check(start) {
                Ok(()) => incumbent = Some((start.to_vec(), problem.objective(start))),
                Err(e) => tracing::debug!(%e, "warm start is infeasible"),
            }
        }
        let begin = Instant::now();
        let mut stack = vec![Node {
            lo: problem.vars.iter().map(|v| v.bounds().0).collect(),
            hi: problem.vars.iter().map(|v| v.bounds().1).collect(),
        }];
        let mut nodes = 0u64;
        let mut hit_limit = false;
        while let Some(mut node) = stack.pop() {
            if limits.node_limit.is_some_and(|limit| nodes >= limit)
                || limits.timeout.is_some_and(|t| (nodes % 64 == 0) && (begin.elapsed() >= t))
            {
                hit_limit = true;
                break
            }
            nodes += 1;
            if !ctx.propagate(&mut node) {
                continue
            }
            if let Some((_, best)) = incumbent.as_ref() {
                if ctx.lower_bound(&node) >= *best - 1e-9 {
                    continue
                }
            }
            match ctx.branch_var(&node) {
                Some(i) => {
                    // reversed so that the preferred child is popped first
                    stack.extend(ctx.children(&node, i).into_iter().rev());
                }
                None => {
                    let values = node.lo;
                    if problem.check(&values).is_ok() {
                        let obj = problem.objective(&values);
                        if incumbent.as_ref().map_or(true, |(_, best)| obj < *best - 1e-9) {
                            tracing::trace!(nodes, obj, "new incumbent");
                            incumbent = Some((values, obj));
                        }
                    }
                }
            }
        }
        let status = match (hit_limit, incumbent.is_some()) {
            (false, true) => MilpStatus::Optimal,
            (false, false) => MilpStatus::Infeasible,
            (true, true) => MilpStatus::Feasible,
            (true, false) => MilpStatus::Timeout,
        };
        tracing::debug!(
            vars = problem.vars.len(),
            rows = problem.constraints.len(),
            nodes,
            ?status,
            elapsed = ?begin.elapsed(),
            "branch and bound finished"
        );
        Ok(match incumbent {
            Some((values, objective)) => MilpSolution {
                status,
                values,
                objective,
                nodes,
            },
            None => MilpSolution {
                status,
                values: vec![],
                objective: f64::INFINITY,
                nodes,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_cover() {
        // elements 0..4, sets {0,1} {1,2} {2,3} {0,1,2,3} {3}
        let mut p = MilpProblem::new();
        let sets: [(&[usize], f64); 5] = [
            (&[0, 1], 1.0),
            (&[1, 2], 1.0),
            (&[2, 3], 1.0),
            (&[0, 1, 2, 3], 2.5),
            (&[3], 0.4),
        ];
        let vars: Vec<usize> = sets
            .iter()
            .enumerate()
            .map(|(i, (_, c))| p.add_binary(format!("s{i}"), *c))
            .collect();
        for e in 0..4 {
            let terms = sets
                .iter()
                .zip(&vars)
                .filter(|((elems, _), _)| elems.contains(&e))
                .map(|(_, &v)| (v, 1.0))
                .collect();
            p.add_constraint(format!("e{e}"), terms, Cmp::Ge, 1.0);
        }
        let sol = BranchAndBound::default()
            .solve(&p, None, &SolveLimits::default())
            .unwrap();
        assert_eq!(sol.status, MilpStatus::Optimal);
        assert_eq!(sol.values, vec![1, 0, 1, 0, 0]);
        assert!((sol.objective - 2.0).abs() < 1e-9);
    }

    #[test]
    fn infeasible_and_limits() {
        let mut p = MilpProblem::new();
        let x = p.add_binary("x", 1.0);
        let y = p.add_binary("y", 1.0);
        p.add_constraint("too much", vec![(x, 1.0), (y, 1.0)], Cmp::Ge, 3.0);
        let sol = BranchAndBound::default()
            .solve(&p, None, &SolveLimits::default())
            .unwrap();
        assert_eq!(sol.status, MilpStatus::Infeasible);
        assert!(sol.values.is_empty());

        let mut p = MilpProblem::new();
        let x = p.add_integer("x", 0, 5, 1.0);
        let y = p.add_integer("y", 0, 5, 1.0);
        p.add_constraint("c", vec![(x, 3.0), (y, 2.0)], Cmp::Ge, 7.0);
        let limits = SolveLimits::default().with_node_limit(Some(0));
        let sol = BranchAndBound::default().solve(&p, None, &limits).unwrap();
        assert_eq!(sol.status, MilpStatus::Timeout);
        let sol = BranchAndBound::default()
            .solve(&p, Some(&[5, 5]), &limits)
            .unwrap();
        assert_eq!(sol.status, MilpStatus::Feasible);
        assert_eq!(sol.values, vec![5, 5]);
        let sol = BranchAndBound::default()
            .solve(&p, Some(&[5, 5]), &SolveLimits::default())
            .unwrap();
        assert_eq!(sol.status, MilpStatus::Optimal);
        assert!((sol.objective - 3.0).abs() < 1e-9);
    }
}
