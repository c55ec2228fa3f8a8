use tessera::{
    analysis::{
        column_height, compute_truncation_params, error_bounds, recenter_constant,
        ErrorBounds, TruncationParams,
    },
    tiling::{CoverageMatrix, TilingProblem},
    StarRng,
};
use testcrate::init_tracing;

#[test]
fn recentering() {
    init_tracing();
    let mut rng = StarRng::new(0);
    for _ in 0..2000 {
        let budget = rng.next_in(0..=64) as u128;
        let bounds = ErrorBounds {
            negative: rng.next_in(0..=96) as u128,
            positive: rng.next_in(0..=96) as u128,
        };
        let actual_lsb = rng.next_in(0..=6) as usize;
        let any = (-200i128..=200).any(|c| bounds.is_faithful(budget, c));
        match recenter_constant(&bounds, budget, actual_lsb) {
            Some(c) => {
                assert!(bounds.is_faithful(budget, c), "{bounds:?} {budget} {c}");
                assert!(bounds.achieved(c) <= budget);
            }
            None => assert!(!any, "{bounds:?} {budget}"),
        }
    }
}

#[test]
fn truncation_scan() {
    init_tracing();
    for wx in 1..=10 {
        for wy in 1..=10 {
            let total: usize = (0..(wx + wy - 1))
                .map(|c| column_height(wx, wy, c).unwrap())
                .sum();
            assert_eq!(total, wx * wy);
            // a single cell cannot be truncated at all
            if wx * wy == 1 {
                continue
            }
            for log2 in 0..(wx.min(wy) as u32) {
                let budget = 1u128 << log2;
                let TruncationParams {
                    actual_lsb,
                    keep_bits,
                    constant,
                } = compute_truncation_params(wx, wy, budget).unwrap();
                assert!(keep_bits <= column_height(wx, wy, actual_lsb).unwrap());
                assert!(actual_lsb >= 1);
                assert!(constant < budget);
                assert_eq!(constant % (1 << actual_lsb), 0);
            }
        }
    }
}

#[test]
fn untiled_bounds() {
    init_tracing();
    // nothing placed deviates by the whole product in the worst case
    let problem = TilingProblem::new(4, 3, false, 0).unwrap();
    let bounds = error_bounds(&CoverageMatrix::new(&problem).unwrap(), &problem);
    assert_eq!(
        bounds,
        ErrorBounds {
            negative: 15 * 7,
            positive: 0
        }
    );
    // signed edges contribute the other way around
    let problem = TilingProblem::new(4, 3, true, 0).unwrap();
    let bounds = error_bounds(&CoverageMatrix::new(&problem).unwrap(), &problem);
    // cells off the edges sum to 7 * 3, the two edges to 8 * 3 + 4 * 7 and
    // the corner counts positive again
    assert_eq!(
        bounds,
        ErrorBounds {
            negative: 7 * 3 + 8 * 4,
            positive: 8 * 3 + 4 * 7
        }
    );
}
