// NOTE: remember to update the README when updating this

//! Tiling and bit heap synthesis for FPGA integer multipliers.
//!
//! A `wx x wy` multiplication is a rectangle of partial product cells (a
//! triangle for squarers). This crate covers that rectangle with a catalog of
//! heterogeneous tiles (DSP blocks, LUT multipliers, Karatsuba pairs, Booth
//! rows, super tiles and more) so that a resource cost is minimized. Low
//! weight cells may be left uncovered as long as a correction constant keeps
//! the rounded output faithful. The chosen tiling is then emitted into a
//! weighted column structure, the bit heap, which is compressed to the final
//! sum.
//!
//! The parts can be used separately:
//!
//! - [catalog] enumerates the tile kinds and prices them through a
//!   [catalog::CostOracle]
//! - [tiling] holds the [tiling::TilingProblem] and the strategies that solve
//!   it: greedy, beam search, the ILP models over the in-crate [milp] solver,
//!   and replay of recorded tilings
//! - [analysis] derives truncation parameters, error bounds and correction
//!   constants
//! - [BitHeapAssembler] feeds a solved tiling into anything implementing
//!   [bitheap::BitHeap]
//! - [multiplier] runs all of it, and [bitheap::EvalBitHeap] together with
//!   [bitheap::Netlist] can simulate the result bit for bit
//!
//! ```rust
//! use tessera::{
//!     awi::*,
//!     multiplier::{IntMultiplier, MultiplierConfig},
//! };
//!
//! // an 8x8 signed multiplier with the full 16 bit output
//! let m = IntMultiplier::new(8, 8, 0, true).unwrap();
//! let eval = m.generate_eval(&MultiplierConfig::default()).unwrap();
//! assert_eq!(eval.report.solution.achieved_error, 0);
//! let res = eval
//!     .evaluate(&Awi::from_i8(-64), &Awi::from_i8(3))
//!     .unwrap();
//! assert_eq!(res.to_i16(), -192);
//! ```

#![allow(clippy::needless_range_loop)]
#![allow(clippy::comparison_chain)]
#![allow(clippy::too_many_arguments)]

pub mod analysis;
mod assemble;
pub mod bitheap;
/// Tile kinds and their costs
pub mod catalog;
pub mod milp;
/// The multiplier driver
pub mod multiplier;
/// Tiling problems and the strategies solving them
pub mod tiling;
/// Miscellanious utilities
pub mod utils;
pub use assemble::BitHeapAssembler;
pub use awint::{self, awint_dag, awint_dag::triple_arena};
pub use utils::{Error, Grid, StarRng};

/// Reexports all the regular arbitrary width integer structs, macros, common
/// enums, and most of `core::primitive::*`. This is useful for glob importing
/// everything.
pub mod awi {
    pub use awint::awi::*;
    pub use Option::{None, Some};
    pub use Result::{Err, Ok};
}
