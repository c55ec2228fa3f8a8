use tessera::{
    awi::*,
    catalog::CatalogFlags,
    multiplier::{IntMultiplier, MultiplierConfig},
    Error, StarRng,
};
use testcrate::{exact_product, init_tracing, is_faithful, operand};

#[cfg(debug_assertions)]
const N: usize = 64;

#[cfg(not(debug_assertions))]
const N: usize = 512;

/// Checks every operand pair against the exact product, and the error of the
/// heap sum against the error the solution claims
fn check_exhaustive(m: &IntMultiplier, config: &MultiplierConfig) {
    let eval = m.generate_eval(config).unwrap();
    let p = m.prodsize();
    let solution = &eval.report.solution;
    assert!(solution.achieved_error <= m.error_budget(), "{m:?}");
    let mask = (1u128 << p) - 1;
    let round = m.round_bit().map_or(0, |b| 1u128 << b);
    let mut worst = 0u128;
    for x in 0..(1u64 << m.wx) {
        for y in 0..(1u64 << m.wy) {
            let mut xa = Awi::zero(bw(m.wx));
            xa.u64_(x);
            let mut ya = Awi::zero(bw(m.wy));
            // squarers only read `x`
            ya.u64_(if m.squarer { x } else { y });
            let out = eval.evaluate(&xa, &ya).unwrap();
            let exact = exact_product(&xa, &ya, m.signed, p);
            if m.w_out == p {
                assert_eq!(out.to_u128(), exact, "{m:?} {x} {y}");
            } else {
                assert!(is_faithful(&out, m.lsb_out(), p, exact), "{m:?} {x} {y}");
            }
            // the heap sum minus the rounding bit, modulo `2^p`
            let sum = eval.heap.evaluate(&eval.netlist, &xa, &ya).unwrap();
            let d = sum.to_u128().wrapping_sub(round).wrapping_sub(exact) & mask;
            let err = if (d >> (p - 1)) != 0 { mask - d + 1 } else { d };
            worst = worst.max(err);
        }
    }
    // partial products are correlated, so the bound need not be reached
    assert!(
        worst <= solution.achieved_error,
        "{m:?} measured {worst} > {}",
        solution.achieved_error
    );
}

#[test]
fn exact_small() {
    init_tracing();
    let config = MultiplierConfig::default();
    for signed in [false, true] {
        for (wx, wy) in [(2, 2), (3, 2), (4, 4), (5, 3), (1, 4), (4, 1)] {
            let m = IntMultiplier::new(wx, wy, 0, signed).unwrap();
            check_exhaustive(&m, &config);
        }
    }
}

#[test]
fn exact_lut_only() {
    init_tracing();
    let config = MultiplierConfig::default().with_flags(CatalogFlags::lut_only());
    for signed in [false, true] {
        let m = IntMultiplier::new(6, 5, 0, signed).unwrap();
        check_exhaustive(&m, &config);
    }
}

#[test]
fn single_bit_operands() {
    init_tracing();
    let config = MultiplierConfig::default();
    // a 1x1 signed product is the AND of the two sign bits
    let m = IntMultiplier::new(1, 1, 0, true).unwrap();
    assert_eq!(m.prodsize(), 1);
    check_exhaustive(&m, &config);
    for w in 2..6 {
        for signed in [false, true] {
            check_exhaustive(&IntMultiplier::new(1, w, 0, signed).unwrap(), &config);
            check_exhaustive(&IntMultiplier::new(w, 1, 0, signed).unwrap(), &config);
        }
    }
}

#[test]
fn truncated_faithful() {
    init_tracing();
    let config = MultiplierConfig::default();
    for signed in [false, true] {
        for (wx, wy) in [(4, 4), (5, 4)] {
            let p = IntMultiplier::new(wx, wy, 0, signed).unwrap().prodsize();
            for w_out in wx.max(wy)..p {
                let m = IntMultiplier::new(wx, wy, w_out, signed).unwrap();
                check_exhaustive(&m, &config);
            }
        }
    }
}

#[test]
fn signed_8x8() {
    init_tracing();
    for flags in [CatalogFlags::default(), CatalogFlags::lut_only()] {
        let config = MultiplierConfig::default().with_flags(flags);
        for w_out in [0, 8, 10, 12] {
            let m = IntMultiplier::new(8, 8, w_out, true).unwrap();
            check_exhaustive(&m, &config);
        }
    }
}

#[test]
fn unsigned_8x8_truncated() {
    init_tracing();
    let m = IntMultiplier::new(8, 8, 8, false).unwrap();
    check_exhaustive(
        &m,
        &MultiplierConfig::default().with_flags(CatalogFlags::lut_only()),
    );
    let m = IntMultiplier::new(8, 8, 9, false).unwrap();
    check_exhaustive(&m, &MultiplierConfig::default().with_strategy("beam"));
}

#[test]
fn truncated_random() {
    init_tracing();
    let mut rng = StarRng::new(0);
    for signed in [false, true] {
        for (wx, wy, w_out) in [(8, 8, 8), (8, 8, 10), (10, 7, 9), (12, 12, 12)] {
            let m = IntMultiplier::new(wx, wy, w_out, signed).unwrap();
            let eval = m.generate_eval(&MultiplierConfig::default()).unwrap();
            let solution = &eval.report.solution;
            assert!(solution.achieved_error <= m.error_budget());
            assert!(solution
                .bounds
                .is_faithful(m.error_budget(), solution.error_correction_constant));
            let p = m.prodsize();
            for _ in 0..N {
                let x = operand(&mut rng, wx);
                let y = operand(&mut rng, wy);
                let out = eval.evaluate(&x, &y).unwrap();
                assert_eq!(out.bw(), w_out);
                assert!(is_faithful(&out, m.lsb_out(), p, exact_product(&x, &y, signed, p)));
            }
        }
    }
}

#[test]
fn squarers() {
    init_tracing();
    let config = MultiplierConfig::default();
    for w in 1..=6 {
        check_exhaustive(&IntMultiplier::squarer(w, 0).unwrap(), &config);
    }
    for w_out in 6..12 {
        check_exhaustive(&IntMultiplier::squarer(6, w_out).unwrap(), &config);
    }
}

#[test]
fn strategies_agree() {
    init_tracing();
    let mut rng = StarRng::new(0);
    let m = IntMultiplier::new(5, 5, 0, true).unwrap();
    let base = MultiplierConfig::default()
        .with_flags(CatalogFlags::lut_only())
        .with_node_limit(Some(300));
    for strategy in ["greedy", "beam", "ilp", "ilp-compression"] {
        let eval = m
            .generate_eval(&base.clone().with_strategy(strategy))
            .unwrap();
        if strategy == "ilp-compression" {
            assert!(eval.report.solution.compression.is_some());
        }
        for _ in 0..N {
            let x = operand(&mut rng, 5);
            let y = operand(&mut rng, 5);
            assert_eq!(
                eval.evaluate(&x, &y).unwrap().to_u128(),
                exact_product(&x, &y, true, 10)
            );
        }
    }
}

#[test]
fn compression_truncated() {
    init_tracing();
    let config = MultiplierConfig::default()
        .with_strategy("ilp-compression")
        .with_flags(CatalogFlags::lut_only())
        .with_node_limit(Some(300));
    for signed in [false, true] {
        let m = IntMultiplier::new(6, 6, 6, signed).unwrap();
        let eval = m.generate_eval(&config).unwrap();
        let solution = &eval.report.solution;
        let plan = solution.compression.clone().unwrap();
        // the plan is built for the columns the heap keeps
        assert_eq!(plan.lsb, solution.bit_heap_lsb);
        assert_eq!(eval.report.sum.lsb, solution.bit_heap_lsb);
        assert!(eval.report.sum.from_solver);
        assert_eq!(eval.report.sum.plan, plan);
        check_exhaustive(&m, &config);
    }
}

#[test]
fn configuration_errors() {
    init_tracing();
    let m = IntMultiplier::new(4, 4, 0, false).unwrap();
    assert!(matches!(
        m.generate_eval(&MultiplierConfig::default().with_strategy("annealing")),
        Err(Error::UnknownStrategy(_))
    ));
    assert!(matches!(
        m.generate_eval(&MultiplierConfig::default().with_flags(CatalogFlags::none())),
        Err(Error::EmptyCatalog)
    ));
    assert!(matches!(
        IntMultiplier::new(60, 61, 0, true),
        Err(Error::WidthTooLarge(121, 120))
    ));
    let eval = m.generate_eval(&MultiplierConfig::default()).unwrap();
    assert!(matches!(
        eval.evaluate(&Awi::zero(bw(3)), &Awi::zero(bw(4))),
        Err(Error::ShapeMismatch(_))
    ));
}
