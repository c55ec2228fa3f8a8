//! This is here as a library so that local test binaries can use it

use std::sync::Once;

use tessera::{
    awi::*,
    catalog::{CatalogFlags, TargetModel, TileCatalog},
    tiling::{Solution, TilingProblem, TilingStrategy},
    Error, StarRng,
};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

static INIT: Once = Once::new();

/// Installs a subscriber that writes through the test harness, filtered by
/// `RUST_LOG`. Can be called from every test.
pub fn init_tracing() {
    INIT.call_once(|| {
        // another binary in the same process may have installed one already
        let _ = tracing_subscriber::registry()
            .with(fmt::layer().with_test_writer())
            .with(EnvFilter::from_default_env())
            .try_init();
    });
}

/// `bits` as an integer, sign extended if `signed`
pub fn to_i128(bits: &Bits, signed: bool) -> i128 {
    let mut val = 0i128;
    for i in (0..bits.bw()).rev() {
        val = (val << 1) | i128::from(bits.get(i).unwrap());
    }
    if signed && bits.msb() {
        val - (1i128 << bits.bw())
    } else {
        val
    }
}

/// The exact product modulo `2^prodsize`
pub fn exact_product(x: &Bits, y: &Bits, signed: bool, prodsize: usize) -> u128 {
    let p = to_i128(x, signed) * to_i128(y, signed);
    (p as u128) & ((1u128 << prodsize) - 1)
}

/// Checks that `out`, the bits `lsb_out..prodsize` of a product, is the
/// exact product `p` rounded up or down to a multiple of `2^lsb_out`. The
/// comparison is modulo `2^prodsize`.
pub fn is_faithful(out: &Bits, lsb_out: usize, prodsize: usize, p: u128) -> bool {
    let modulus = 1u128 << prodsize;
    let r = (to_i128(out, false) as u128) << lsb_out;
    let d = r.wrapping_sub(p) & (modulus - 1);
    let ulp = 1u128 << lsb_out;
    (d < ulp) || (d > modulus - ulp)
}

/// A random `w` bit operand
pub fn operand(rng: &mut StarRng, w: usize) -> Awi {
    rng.next_operand(bw(w))
}

/// Solves `problem` with `strategy` over the default catalog of `flags`
pub fn solve(
    strategy: &mut dyn TilingStrategy,
    problem: &TilingProblem,
    flags: &CatalogFlags,
) -> Result<Solution, Error> {
    let flags = flags.clone().with_squarer(problem.squarer);
    let catalog = TileCatalog::new_default(problem.wx, problem.wy, &flags);
    strategy.solve(problem, &catalog, &TargetModel::default())
}
