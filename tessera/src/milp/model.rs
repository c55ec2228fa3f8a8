use std::time::Duration;

use crate::Error;

/// Absolute tolerance used when checking rows
pub const FEASIBILITY_TOL: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VarKind {
    Binary,
    Integer { lo: i64, hi: i64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Var {
    pub name: String,
    pub kind: VarKind,
    pub objective: f64,
}

impl Var {
    pub fn bounds(&self) -> (i64, i64) {
        match self.kind {
            VarKind::Binary => (0, 1),
            VarKind::Integer { lo, hi } => (lo, hi),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cmp {
    Le,
    Eq,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub name: String,
    pub terms: Vec<(usize, f64)>,
    pub cmp: Cmp,
    pub rhs: f64,
}

impl Constraint {
    pub fn activity(&self, values: &[i64]) -> f64 {
        self.terms
            .iter()
            .map(|&(i, a)| a * values.get(i).copied().unwrap_or(0) as f64)
            .sum()
    }

    pub fn is_satisfied(&self, values: &[i64]) -> bool {
        let act = self.activity(values);
        let tol = FEASIBILITY_TOL * (1.0 + self.rhs.abs());
        match self.cmp {
            Cmp::Le => act <= self.rhs + tol,
            Cmp::Eq => (act - self.rhs).abs() <= tol,
            Cmp::Ge => act >= self.rhs - tol,
        }
    }
}

/// A minimization problem over bounded integer variables with linear rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MilpProblem {
    pub vars: Vec<Var>,
    pub constraints: Vec<Constraint>,
}

impl MilpProblem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_binary<S: Into<String>>(&mut self, name: S, objective: f64) -> usize {
        self.vars.push(Var {
            name: name.into(),
            kind: VarKind::Binary,
            objective,
        });
        self.vars.len() - 1
    }

    pub fn add_integer<S: Into<String>>(&mut self, name: S, lo: i64, hi: i64, objective: f64) -> usize {
        self.vars.push(Var {
            name: name.into(),
            kind: VarKind::Integer { lo, hi },
            objective,
        });
        self.vars.len() - 1
    }

    /// Adds a row, terms with the same variable are merged and zero
    /// coefficients dropped
    pub fn add_constraint<S: Into<String>>(&mut self, name: S, terms: Vec<(usize, f64)>, cmp: Cmp, rhs: f64) {
        let mut terms = terms;
        terms.sort_by_key(|&(i, _)| i);
        let mut merged: Vec<(usize, f64)> = Vec::with_capacity(terms.len());
        for (i, a) in terms {
            match merged.last_mut() {
                Some(last) if last.0 == i => last.1 += a,
                _ => merged.push((i, a)),
            }
        }
        merged.retain(|&(_, a)| a != 0.0);
        self.constraints.push(Constraint {
            name: name.into(),
            terms: merged,
            cmp,
            rhs,
        });
    }

    pub fn objective(&self, values: &[i64]) -> f64 {
        self.vars
            .iter()
            .zip(values)
            .map(|(v, &x)| v.objective * x as f64)
            .sum()
    }

    /// Checks bounds and rows, returning the name of the first violated one
    pub fn check(&self, values: &[i64]) -> Result<(), Error> {
        if values.len() != self.vars.len() {
            return Err(Error::OtherString(format!(
                "assignment has {} values but the problem has {} variables",
                values.len(),
                self.vars.len()
            )))
        }
        for (v, &x) in self.vars.iter().zip(values) {
            let (lo, hi) = v.bounds();
            if (x < lo) || (x > hi) {
                return Err(Error::infeasible(format!("bounds of {}", v.name)))
            }
        }
        for c in &self.constraints {
            if !c.is_satisfied(values) {
                return Err(Error::infeasible(c.name.clone()))
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MilpStatus {
    Optimal,
    /// A limit was hit with an incumbent
    Feasible,
    Infeasible,
    /// A limit was hit without any incumbent
    Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MilpSolution {
    pub status: MilpStatus,
    /// Empty unless the status is `Optimal` or `Feasible`
    pub values: Vec<i64>,
    pub objective: f64,
    pub nodes: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolveLimits {
    pub timeout: Option<Duration>,
    pub node_limit: Option<u64>,
}

impl SolveLimits {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_node_limit(mut self, node_limit: Option<u64>) -> Self {
        self.node_limit = node_limit;
        self
    }
}

/// A MILP backend
pub trait MilpSolver {
    fn name(&self) -> &str;

    /// Minimizes `problem`. `start` is an optional warm start, used as the
    /// first incumbent if it is feasible.
    fn solve(
        &mut self,
        problem: &MilpProblem,
        start: Option<&[i64]>,
        limits: &SolveLimits,
    ) -> Result<MilpSolution, Error>;
}
