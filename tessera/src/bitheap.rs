//! Bit heaps and the tile realization they sum up

mod compress;
mod eval;
mod netlist;

pub use compress::{CompressionPlan, Counters};
pub use eval::EvalBitHeap;
pub use netlist::{
    Netlist, Operand, OperandSlice, PSignal, Signal, SignalValues, TileInstance, TileOutput,
    TileRealizer,
};

use crate::Error;

/// Bits `skip..(skip + keep)` of a signal, placed so that bit `skip` lands
/// in `column`. If `signed` is set the top kept bit is a two's complement
/// sign bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapTerm {
    pub signal: PSignal,
    pub column: usize,
    pub skip: usize,
    pub keep: usize,
    pub signed: bool,
}

/// What compression was started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeapSum {
    pub lsb: usize,
    pub msb: usize,
    /// Column heights before compression, starting at `lsb`
    pub heights: Vec<usize>,
    pub plan: CompressionPlan,
    pub full_adders: u64,
    pub half_adders: u64,
    /// Set if the plan came from the solver rather than the heap's own
    /// scheduling
    pub from_solver: bool,
}

/// Weighted columns of bits summed modulo `2^(msb + 1)`
pub trait BitHeap {
    fn lsb(&self) -> usize;

    fn msb(&self) -> usize;

    fn add_signal(&mut self, term: HeapTerm) -> Result<(), Error>;

    fn subtract_signal(&mut self, term: HeapTerm) -> Result<(), Error>;

    /// Adds `value * 2^column`
    fn add_constant(&mut self, value: i128, column: usize) -> Result<(), Error>;

    fn add_constant_bit(&mut self, column: usize) -> Result<(), Error>;

    /// Finishes the heap. A given `plan` must fit the column heights, without
    /// one the heap schedules its own compression.
    fn start_compression(&mut self, plan: Option<&CompressionPlan>) -> Result<HeapSum, Error>;
}
