use core::fmt;
use std::fmt::Debug;

// Use the dedicated variants for things callers will want to match against,
// and `OtherStr` or `OtherString` for internal failures

#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, thiserror::Error)]
pub enum Error {
    /// No tile family was enabled, or every enabled family was filtered out
    /// for the requested word sizes
    #[error("the tile catalog is empty, nothing can be tiled")]
    EmptyCatalog,
    /// A word size was zero or otherwise unusable
    #[error("invalid word sizes wX: {0}, wY: {1}")]
    InvalidWidth(usize, usize),
    /// The full product would not fit in the internal error arithmetic
    #[error("product width {0} exceeds the supported maximum of {1} bits")]
    WidthTooLarge(usize, usize),
    /// A strategy name that is not present in the `StrategyRegistry`
    #[error("tiling strategy \"{0}\" is unknown")]
    UnknownStrategy(String),
    /// No covering exists under the given constraints
    #[error("no covering exists under the constraint: {constraint}")]
    Infeasible { constraint: String },
    /// The solver kept returning solutions whose error exceeds the budget
    #[error(
        "the reconstructed truncation error still exceeded the budget after {0} retries with \
         reduced budgets"
    )]
    ResidueRetriesExhausted(usize),
    /// The solver ran into its limits before any feasible solution was found
    #[error("the solver hit its time or node limit before finding any feasible solution")]
    SolverTimeout,
    /// A signed quantity appeared where the problem does not allow one
    #[error("signedness mismatch: {0}")]
    SignednessMismatch(String),
    /// A tile or problem shape that cannot be used as requested
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    /// The bit heap does not have the column range that the assembler needs
    #[error(
        "the bit heap covers columns {lsb}..={msb} but columns {needed_lsb}..={needed_msb} are \
         needed"
    )]
    BitHeapRange {
        needed_lsb: usize,
        needed_msb: usize,
        lsb: usize,
        msb: usize,
    },
    /// A cell that must have exact coverage does not
    #[error("cell ({x}, {y}) has coverage {found} but requires {required}")]
    CoverageViolation {
        x: usize,
        y: usize,
        found: i32,
        required: i32,
    },
    /// No correction constant can make the tiling faithful
    #[error(
        "truncation error bounds (negative {negative}, positive {positive}) cannot be recentered \
         within the error budget {budget}"
    )]
    BudgetExceeded {
        negative: u128,
        positive: u128,
        budget: u128,
    },
    /// The error budget is so large that every partial product would be
    /// removed
    #[error(
        "an error budget that removes every column of the {0}x{1} product was requested, remove \
         the multiplier instead"
    )]
    BudgetRemovesProduct(usize, usize),
    /// A malformed replay record
    #[error("replay record line {line}: {msg}")]
    Replay { line: usize, msg: String },
    /// For miscellanious errors
    #[error("{0}")]
    OtherStr(&'static str),
    /// For miscellanious errors
    #[error("{0}")]
    OtherString(String),
}

impl Error {
    pub(crate) fn infeasible<S: Into<String>>(constraint: S) -> Self {
        Self::Infeasible {
            constraint: constraint.into(),
        }
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
