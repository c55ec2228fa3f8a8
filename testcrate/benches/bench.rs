#![feature(test)]

extern crate test;
use tessera::{
    catalog::{CatalogFlags, TargetModel, TileCatalog},
    milp::SolveLimits,
    multiplier::{IntMultiplier, MultiplierConfig},
    tiling::{BeamTiling, GreedyTiling, IlpTiling, TilingProblem, TilingStrategy},
    StarRng,
};
use test::Bencher;

fn bench_strategy(bencher: &mut Bencher, strategy: &mut dyn TilingStrategy, flags: CatalogFlags) {
    let problem = TilingProblem::new(8, 8, true, 0).unwrap();
    let catalog = TileCatalog::new_default(8, 8, &flags);
    let oracle = TargetModel::default();
    bencher.iter(|| {
        let solution = strategy.solve(&problem, &catalog, &oracle).unwrap();
        solution.check(&problem).unwrap();
    })
}

#[bench]
fn greedy_8x8(bencher: &mut Bencher) {
    bench_strategy(bencher, &mut GreedyTiling::new(), CatalogFlags::default())
}

#[bench]
fn beam_8x8(bencher: &mut Bencher) {
    bench_strategy(bencher, &mut BeamTiling::new(3, 0), CatalogFlags::default())
}

#[bench]
fn ilp_8x8(bencher: &mut Bencher) {
    let mut ilp = IlpTiling::new(SolveLimits::default().with_node_limit(Some(500)));
    bench_strategy(bencher, &mut ilp, CatalogFlags::lut_only())
}

#[bench]
fn greedy_truncated_24x24(bencher: &mut Bencher) {
    let problem = TilingProblem::new(24, 24, false, 1 << 22).unwrap();
    let catalog = TileCatalog::new_default(24, 24, &CatalogFlags::default());
    let oracle = TargetModel::default();
    bencher.iter(|| {
        let solution = GreedyTiling::new()
            .solve(&problem, &catalog, &oracle)
            .unwrap();
        assert!(solution.achieved_error <= problem.error_budget);
    })
}

#[bench]
fn generate_eval_12x12(bencher: &mut Bencher) {
    let m = IntMultiplier::new(12, 12, 12, true).unwrap();
    let config = MultiplierConfig::default();
    let mut rng = StarRng::new(0);
    bencher.iter(|| {
        let eval = m.generate_eval(&config).unwrap();
        let x = rng.next_operand(tessera::awi::bw(12));
        let y = rng.next_operand(tessera::awi::bw(12));
        eval.evaluate(&x, &y).unwrap();
    })
}
