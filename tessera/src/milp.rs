//! A small mixed integer linear programming layer. The tiling and
//! compression models are built against [MilpProblem] and solved through the
//! [MilpSolver] trait, with [BranchAndBound] as the bundled backend.

mod branch_bound;
mod model;

pub use branch_bound::BranchAndBound;
pub use model::{
    Cmp, Constraint, MilpProblem, MilpSolution, MilpSolver, MilpStatus, SolveLimits, Var, VarKind,
    FEASIBILITY_TOL,
};
