//! Error budget analysis. Everything here is a pure function of its
//! arguments.
//!
//! Errors are measured in ulps of the exact product. A tiling that leaves
//! cells uncovered (or covers some twice) deviates from the exact product by
//! at most `negative` below and `positive` above it, see [ErrorBounds]. The
//! correction constant `C` added to the bit heap together with the round bit
//! makes the truncated output faithful exactly when
//! `C - negative >= -budget` and `C + positive <= budget - 1`.

use crate::{
    catalog::TileKind,
    tiling::{CoverageMatrix, Placement, TilingProblem},
    Error,
};

/// Width of the product of a `wx` bit and a `wy` bit operand
pub fn prodsize(wx: usize, wy: usize, signed_x: bool, signed_y: bool) -> usize {
    if (wx == 0) || (wy == 0) {
        0
    } else if (wx == 1) && (wy == 1) {
        1
    } else if (wx == 1) && !signed_x {
        wy
    } else if (wy == 1) && !signed_y {
        wx
    } else {
        wx + wy
    }
}

/// `floor(log2(x))`, `None` for zero
pub fn log2_floor(x: u128) -> Option<usize> {
    x.checked_ilog2().map(|l| l as usize)
}

/// Height of column `col` of a plain array multiplier
pub fn column_height(wx: usize, wy: usize, col: usize) -> Result<usize, Error> {
    let (lo, hi) = (wx.min(wy), wx.max(wy));
    if col < lo {
        Ok(col + 1)
    } else if col < hi {
        Ok(lo)
    } else if col + 1 < wx + wy {
        // truncating this far means the inputs themselves should have been
        // truncated, but it is still well defined
        Ok(wx + wy - 1 - col)
    } else {
        Err(Error::BudgetRemovesProduct(wx, wy))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TruncationParams {
    /// The column from which bits are kept
    pub actual_lsb: usize,
    /// How many bits of column `actual_lsb` are kept
    pub keep_bits: usize,
    pub constant: u128,
}

/// Truncation parameters of a plain `wx x wy` multiplier
pub fn compute_truncation_params(
    wx: usize,
    wy: usize,
    budget: u128,
) -> Result<TruncationParams, Error> {
    compute_truncation_params_with(budget, |col| column_height(wx, wy, col))
}

/// Removes bits from column 0 upwards for as long as the worst case sum of
/// the removed bits minus the correction constant stays within `budget`.
/// The constant starts at `budget - 1` and is truncated to a multiple of
/// `2^actual_lsb` every time a column is emptied.
pub fn compute_truncation_params_with<F: FnMut(usize) -> Result<usize, Error>>(
    budget: u128,
    mut height: F,
) -> Result<TruncationParams, Error> {
    if budget == 0 {
        return Ok(TruncationParams {
            actual_lsb: 0,
            keep_bits: 1,
            constant: 0,
        })
    }
    let mut actual_lsb = 0;
    let mut weight = 1u128;
    let mut removed = 0u128;
    let mut constant = budget - 1;
    let mut col_height = height(0)?;
    loop {
        while col_height == 0 {
            actual_lsb += 1;
            weight = weight.checked_mul(2).ok_or(Error::OtherStr(
                "truncation scan overflowed the error arithmetic",
            ))?;
            col_height = height(actual_lsb)?;
            constant = ((budget - 1) >> actual_lsb) << actual_lsb;
        }
        let tentative = removed.saturating_add(weight);
        if tentative > budget.saturating_add(constant) {
            break
        }
        removed = tentative;
        col_height -= 1;
    }
    tracing::trace!(actual_lsb, keep_bits = col_height, %constant, %removed, "truncation scan");
    Ok(TruncationParams {
        actual_lsb,
        keep_bits: col_height,
        constant,
    })
}

/// The worst case deviation of a tiling from the exact product, on either
/// side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ErrorBounds {
    pub negative: u128,
    pub positive: u128,
}

impl ErrorBounds {
    pub fn max(&self) -> u128 {
        self.negative.max(self.positive)
    }

    /// `max(negative, positive) <= budget + constant`
    pub fn within(&self, budget: u128, constant: i128) -> bool {
        let bound = (budget as i128).saturating_add(constant);
        (bound >= 0) && (self.max() <= bound as u128)
    }

    /// The two sided condition that makes the rounded output faithful
    pub fn is_faithful(&self, budget: u128, constant: i128) -> bool {
        if budget == 0 {
            return (self.negative == 0) && (self.positive == 0) && (constant == 0)
        }
        let (Ok(b), Ok(neg), Ok(pos)) = (
            i128::try_from(budget),
            i128::try_from(self.negative),
            i128::try_from(self.positive),
        ) else {
            return false
        };
        (constant - neg >= -b) && (constant + pos <= b - 1)
    }

    /// The worst case error once `constant` is added
    pub fn achieved(&self, constant: i128) -> u128 {
        let neg = self.negative as i128;
        let pos = self.positive as i128;
        (constant - neg)
            .unsigned_abs()
            .max((constant + pos).unsigned_abs())
    }
}

/// Accumulates the deviation of every cell. Missing weight in a cell with a
/// positive sign factor lowers the result, missing weight in a cell of a
/// signed edge raises it, and over-coverage does the opposite.
pub fn error_bounds(coverage: &CoverageMatrix, problem: &TilingProblem) -> ErrorBounds {
    let mut res = ErrorBounds::default();
    for (x, y) in problem.cells() {
        let d = coverage.deviation(problem, x, y) * problem.sign_factor(x, y);
        let mag = u128::from(d.unsigned_abs()) << (x + y);
        if d > 0 {
            res.negative += mag;
        } else if d < 0 {
            res.positive += mag;
        }
    }
    res
}

/// Reconstructs the coverage from `placements` alone and returns the larger
/// side of the error bounds
pub fn verify_error(placements: &[Placement], problem: &TilingProblem) -> Result<u128, Error> {
    let coverage = CoverageMatrix::from_placements(placements, problem)?;
    Ok(error_bounds(&coverage, problem).max())
}

/// The canonical correction constant: the value closest to the center of
/// the bounds that keeps the two sided condition, preferring multiples of
/// `2^actual_lsb`. Returns `None` if no constant works.
pub fn recenter_constant(bounds: &ErrorBounds, budget: u128, actual_lsb: usize) -> Option<i128> {
    if budget == 0 {
        return ((bounds.negative == 0) && (bounds.positive == 0)).then_some(0)
    }
    let b = i128::try_from(budget).ok()?;
    let neg = i128::try_from(bounds.negative).ok()?;
    let pos = i128::try_from(bounds.positive).ok()?;
    let lo = neg - b;
    let hi = b - 1 - pos;
    if lo > hi {
        return None
    }
    let center = (neg - pos).div_euclid(2);
    let step = 1i128.checked_shl(u32::try_from(actual_lsb).ok()?)?;
    let below = center.div_euclid(step) * step;
    let above = below + step;
    let mut best: Option<i128> = None;
    for c in [below, above] {
        if (lo..=hi).contains(&c) {
            best = match best {
                Some(prev) if (prev - center).abs() <= (c - center).abs() => Some(prev),
                _ => Some(c),
            };
        }
    }
    Some(best.unwrap_or(center.clamp(lo, hi)))
}

fn pow2(k: i64) -> u128 {
    if k < 0 {
        0
    } else {
        1u128 << k
    }
}

/// How far the heap sum can move when every output bit of `kind` at
/// `(ax, ay)` below column `h` is dropped. Outputs are placed the way the
/// assembler places them, a tiling weight of magnitude 2 raises them by one
/// column.
pub fn slice_error(
    problem: &TilingProblem,
    kind: &TileKind,
    ax: i64,
    ay: i64,
    h: usize,
) -> ErrorBounds {
    let mut res = ErrorBounds::default();
    let hh = h as i64;
    let raise = i64::from(kind.weight.unsigned_abs() == 2);
    for o in problem.outputs(kind, ax, ay) {
        let lsb = ax + ay + o.relative_weight as i64 + raise;
        if lsb >= hh {
            continue
        }
        let top = lsb + o.width as i64;
        let lo = pow2(lsb.max(0));
        // the largest and smallest value of the dropped part
        let (high, low) = if (top <= hh) && o.is_signed() {
            // the whole two's complement value disappears
            (pow2(top - 1).saturating_sub(lo), pow2(top - 1))
        } else {
            (pow2(top.min(hh)).saturating_sub(lo), 0)
        };
        if kind.weight > 0 {
            res.negative += high;
            res.positive += low;
        } else {
            res.positive += high;
            res.negative += low;
        }
    }
    res
}

/// `bounds` widened by the [slice_error] of every placement
pub fn sliced_bounds(
    placements: &[Placement],
    problem: &TilingProblem,
    bounds: &ErrorBounds,
    h: usize,
) -> ErrorBounds {
    let mut res = *bounds;
    if h == 0 {
        return res
    }
    for p in placements {
        let (ax, ay) = p.anchor();
        let e = slice_error(problem, &p.kind, ax, ay, h);
        res.negative += e.negative;
        res.positive += e.positive;
    }
    res
}

/// The highest column `h <= min(actual_lsb, floor(log2(budget)))` such that
/// dropping every tile output bit and constant bit below `h` keeps the two
/// sided condition, together with the bounds of the heap sliced at `h`
pub fn minimal_bit_heap_lsb(
    placements: &[Placement],
    problem: &TilingProblem,
    bounds: &ErrorBounds,
    constant: i128,
    actual_lsb: usize,
) -> (usize, ErrorBounds) {
    if let Some(log2_budget) = log2_floor(problem.error_budget) {
        for h in (1..=actual_lsb.min(log2_budget)).rev() {
            let sliced = sliced_bounds(placements, problem, bounds, h);
            if sliced.is_faithful(problem.error_budget, (constant >> h) << h) {
                return (h, sliced)
            }
        }
    }
    (0, *bounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncation_params() {
        assert_eq!(
            compute_truncation_params(8, 8, 128).unwrap(),
            TruncationParams {
                actual_lsb: 5,
                keep_bits: 4,
                constant: 96
            }
        );
        assert_eq!(
            compute_truncation_params(8, 8, 0).unwrap(),
            TruncationParams {
                actual_lsb: 0,
                keep_bits: 1,
                constant: 0
            }
        );
        // one ulp of budget removes the single bit of column 0
        assert_eq!(
            compute_truncation_params(4, 4, 1).unwrap(),
            TruncationParams {
                actual_lsb: 1,
                keep_bits: 2,
                constant: 0
            }
        );
        assert_eq!(
            compute_truncation_params(2, 2, 1 << 10),
            Err(Error::BudgetRemovesProduct(2, 2))
        );
    }

    #[test]
    fn heights() {
        assert_eq!(column_height(2, 6, 0).unwrap(), 1);
        assert_eq!(column_height(2, 6, 3).unwrap(), 2);
        assert_eq!(column_height(2, 6, 6).unwrap(), 1);
        assert!(column_height(2, 6, 7).is_err());
        assert_eq!(prodsize(1, 5, false, false), 5);
        assert_eq!(prodsize(1, 5, true, true), 6);
        assert_eq!(prodsize(1, 1, true, false), 1);
        assert_eq!(prodsize(0, 5, false, false), 0);
    }

    #[test]
    fn bounds() {
        let b = ErrorBounds {
            negative: 100,
            positive: 0,
        };
        assert!(b.within(64, 40));
        assert!(!b.within(64, 30));
        assert!(b.is_faithful(64, 40));
        assert!(!b.is_faithful(64, 64));
        assert_eq!(recenter_constant(&b, 64, 3), Some(48));
        assert_eq!(recenter_constant(&b, 64, 5), Some(50));
        assert_eq!(recenter_constant(&b, 64, 0), Some(50));
        assert_eq!(b.achieved(50), 50);
        let b = ErrorBounds {
            negative: 100,
            positive: 40,
        };
        assert_eq!(recenter_constant(&b, 128, 0), Some(30));
        assert_eq!(recenter_constant(&b, 64, 0), None);
        assert_eq!(recenter_constant(&ErrorBounds::default(), 0, 0), Some(0));
        assert_eq!(recenter_constant(&ErrorBounds::default(), 8, 3), Some(0));
    }

    #[test]
    fn slicing() {
        use crate::catalog::{TileFamily, TileId};
        let b = |negative, positive| ErrorBounds { negative, positive };
        let lut = TileKind::new(TileFamily::Lut, 2, 2, 1);
        let p = TilingProblem::new(4, 4, false, 8).unwrap();
        assert_eq!(slice_error(&p, &lut, 0, 0, 2), b(3, 0));
        assert_eq!(slice_error(&p, &lut, 2, 0, 2), ErrorBounds::default());

        // doubled tiles land one column higher
        let q = TilingProblem::squarer(6, 32).unwrap();
        let doubled = TileKind::new(TileFamily::Lut, 2, 2, 2);
        assert_eq!(slice_error(&q, &doubled, 2, 0, 5), b(32 - 8, 0));
        assert_eq!(slice_error(&q, &doubled, 2, 0, 3), ErrorBounds::default());
        let negated = TileKind::new(TileFamily::Lut, 2, 2, -2);
        assert_eq!(slice_error(&q, &negated, 2, 0, 5), b(0, 32 - 8));

        // `-x_3 * y_0 * 2^3` is dropped as a whole
        let s = TilingProblem::new(4, 4, true, 8).unwrap();
        let one = TileKind::new(TileFamily::Lut, 1, 1, 1);
        assert_eq!(slice_error(&s, &one, 3, 0, 4), b(0, 8));
        let placements = [Placement::new(TileId(0), one, 3, 0).unwrap()];
        let base = b(5, 1);
        assert_eq!(sliced_bounds(&placements, &s, &base, 0), base);
        assert_eq!(sliced_bounds(&placements, &s, &base, 4), b(5, 9));
    }
}
