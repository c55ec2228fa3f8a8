use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use tessera::{
    analysis::verify_error,
    catalog::{CatalogFlags, TargetModel, TileCatalog},
    milp::{BranchAndBound, MilpProblem, MilpSolution, MilpSolver, MilpStatus, SolveLimits},
    tiling::{
        render_solution, write_record, BeamTiling, CsvReplay, GreedyTiling, IlpTiling,
        SolveStatus, StrategyConfig, StrategyRegistry, TilingProblem, TilingStrategy,
    },
    Error, StarRng,
};
use testcrate::{init_tracing, solve};

#[cfg(debug_assertions)]
const N: usize = 24;

#[cfg(not(debug_assertions))]
const N: usize = 200;

/// A random problem whose budget is half an ulp of an output that keeps
/// more than `max(wx, wy)` bits
fn random_problem(rng: &mut StarRng) -> TilingProblem {
    let wx = rng.next_in(1..=9) as usize;
    if rng.next_bool() && (wx > 1) {
        let lsb_out = rng.next_in(0..=(wx as u64 - 1)) as usize;
        let budget = if lsb_out == 0 { 0 } else { 1 << (lsb_out - 1) };
        TilingProblem::squarer(wx, budget).unwrap()
    } else {
        let wy = rng.next_in(1..=9) as usize;
        let signed = rng.next_bool();
        let lsb_out = rng.next_in(0..=(wx.min(wy) as u64 - 1)) as usize;
        let budget = if lsb_out == 0 { 0 } else { 1 << (lsb_out - 1) };
        TilingProblem::new(wx, wy, signed, budget).unwrap()
    }
}

#[test]
fn coverage_invariants() {
    init_tracing();
    let mut rng = StarRng::new(0);
    for _ in 0..N {
        let problem = random_problem(&mut rng);
        for flags in [CatalogFlags::default(), CatalogFlags::lut_only()] {
            let solution = solve(&mut GreedyTiling::new(), &problem, &flags).unwrap();
            solution.check(&problem).unwrap();
            assert!(solution.achieved_error <= problem.error_budget);
            assert!(solution
                .bounds
                .is_faithful(problem.error_budget, solution.error_correction_constant));
            assert_eq!(
                verify_error(&solution.placements, &problem).unwrap(),
                solution.bounds.max()
            );
            assert!(solution.bit_heap_lsb <= solution.actual_lsb);
            // the constant bits below the heap are dropped as well
            let h = solution.bit_heap_lsb;
            let kept = (solution.error_correction_constant >> h) << h;
            assert!(solution.heap_bounds.is_faithful(problem.error_budget, kept));
            assert_eq!(solution.achieved_error, solution.heap_bounds.achieved(kept));
            assert!(solution.heap_bounds.negative >= solution.bounds.negative);
            assert!(solution.heap_bounds.positive >= solution.bounds.positive);
            if problem.error_budget == 0 {
                assert_eq!(solution.actual_lsb, 0);
                assert_eq!(solution.error_correction_constant, 0);
            }
        }
    }
}

#[test]
fn squarer_symmetry() {
    init_tracing();
    for w in 2..=8 {
        let problem = TilingProblem::squarer(w, 0).unwrap();
        let solution = solve(&mut GreedyTiling::new(), &problem, &CatalogFlags::lut_only()).unwrap();
        let coverage = solution.coverage(&problem).unwrap();
        let mirrored = coverage.mirrored(&problem);
        assert!(mirrored.is_symmetric());
        mirrored.for_each(|c, (x, y)| {
            assert_eq!(*c, if x == y { 1 } else { 2 }, "{w} ({x}, {y})");
        });
    }
}

#[test]
fn and_rows() {
    init_tracing();
    for (wx, wy) in [(1, 7), (7, 1), (1, 1)] {
        for signed in [false, true] {
            let problem = TilingProblem::new(wx, wy, signed, 0).unwrap();
            let solution = solve(&mut GreedyTiling::new(), &problem, &CatalogFlags::default()).unwrap();
            assert_eq!(solution.placements.len(), 1);
            assert_eq!(solution.status, SolveStatus::Optimal);
            solution.check(&problem).unwrap();
        }
    }
}

#[test]
fn beam_not_worse_than_greedy() {
    init_tracing();
    let mut rng = StarRng::new(0);
    for _ in 0..(N / 2) {
        let wx = rng.next_in(2..=8) as usize;
        let wy = rng.next_in(2..=8) as usize;
        let problem = TilingProblem::new(wx, wy, rng.next_bool(), 0).unwrap();
        let flags = CatalogFlags::lut_only();
        let greedy = solve(&mut GreedyTiling::new(), &problem, &flags).unwrap();
        let beam = solve(&mut BeamTiling::new(3, 0), &problem, &flags).unwrap();
        beam.check(&problem).unwrap();
        assert!(beam.area <= greedy.area, "{problem:?}");
    }
}

#[test]
fn ilp_not_worse_than_greedy() {
    init_tracing();
    let flags = CatalogFlags::lut_only();
    for (wx, wy, signed, budget) in [(4, 4, false, 0), (5, 4, true, 0), (6, 6, false, 8)] {
        let problem = TilingProblem::new(wx, wy, signed, budget).unwrap();
        let greedy = solve(&mut GreedyTiling::new(), &problem, &flags).unwrap();
        let mut ilp = IlpTiling::new(SolveLimits::default().with_node_limit(Some(400)));
        let solution = solve(&mut ilp, &problem, &flags).unwrap();
        solution.check(&problem).unwrap();
        assert!(solution.achieved_error <= budget);
        assert!(matches!(
            solution.status,
            SolveStatus::Optimal | SolveStatus::Suboptimal
        ));
        // the objective breaks ties with small per placement terms
        assert!(solution.area <= greedy.area + 0.05, "{problem:?}");
    }
}

#[test]
fn ilp_optimal_truncation() {
    init_tracing();
    let flags = CatalogFlags::lut_only();
    let problem = TilingProblem::new(5, 5, false, 8).unwrap();
    let mut ilp = IlpTiling::new(SolveLimits::default().with_node_limit(Some(400)))
        .with_optimal_truncation(true);
    let solution = solve(&mut ilp, &problem, &flags).unwrap();
    solution.check(&problem).unwrap();
    assert!(solution
        .bounds
        .is_faithful(8, solution.error_correction_constant));
}

#[test]
fn dsp_cap() {
    init_tracing();
    let flags = CatalogFlags::none().with_dsp(true);
    let problem = TilingProblem::new(8, 8, false, 0)
        .unwrap()
        .with_max_dsp(Some(0));
    let names_cap = |res: Result<_, Error>| match res {
        Err(Error::Infeasible { constraint }) => constraint.contains("DSP cap"),
        _ => false,
    };
    assert!(names_cap(solve(&mut GreedyTiling::new(), &problem, &flags)));
    assert!(names_cap(solve(&mut IlpTiling::default(), &problem, &flags)));

    // a single DSP covers the whole grid
    let problem = problem.with_max_dsp(Some(1));
    let solution = solve(&mut GreedyTiling::new(), &problem, &flags).unwrap();
    assert_eq!(solution.dsp_count, 1);
}

#[test]
fn replay() {
    init_tracing();
    let mut rng = StarRng::new(0);
    for _ in 0..N {
        let problem = random_problem(&mut rng);
        let flags = CatalogFlags::default().with_squarer(problem.squarer);
        let catalog = TileCatalog::new_default(problem.wx, problem.wy, &flags);
        let oracle = TargetModel::default();
        let original = GreedyTiling::new()
            .solve(&problem, &catalog, &oracle)
            .unwrap();
        let record = write_record(&original);
        let replayed = CsvReplay::new(record)
            .solve(&problem, &catalog, &oracle)
            .unwrap();
        assert_eq!(replayed.status, SolveStatus::Replayed);
        assert_eq!(replayed.placements, original.placements);
        assert_eq!(
            replayed.error_correction_constant,
            original.error_correction_constant
        );
        assert_eq!(replayed.actual_lsb, original.actual_lsb);
        assert_eq!(replayed.bit_heap_lsb, original.bit_heap_lsb);
        assert_eq!(replayed.achieved_error, original.achieved_error);
        assert_eq!(replayed.heap_bounds, original.heap_bounds);
        assert!(replayed.achieved_error <= problem.error_budget);
    }

    let problem = TilingProblem::new(4, 4, false, 0).unwrap();
    let catalog = TileCatalog::new_default(4, 4, &CatalogFlags::lut_only());
    let oracle = TargetModel::default();
    let res = CsvReplay::new("0,0,0;\n9999,0,0;\n").solve(&problem, &catalog, &oracle);
    assert!(matches!(res, Err(Error::Replay { line: 2, .. })));
    // far outside of the grid
    let res = CsvReplay::new("0,40,0;\n").solve(&problem, &catalog, &oracle);
    assert!(matches!(res, Err(Error::Replay { line: 1, .. })));
}

#[test]
fn registry_strategies() {
    init_tracing();
    let registry = StrategyRegistry::with_defaults();
    let config = StrategyConfig::default()
        .with_timeout(Some(Duration::from_secs(10)))
        .with_node_limit(Some(200));
    let problem = TilingProblem::new(4, 3, true, 0).unwrap();
    let flags = CatalogFlags::lut_only();
    let greedy = solve(&mut GreedyTiling::new(), &problem, &flags).unwrap();
    for name in ["greedy", "beam", "ilp", "ilp-compression"] {
        let mut strategy = registry.create(name, &config).unwrap();
        let solution = solve(strategy.as_mut(), &problem, &flags).unwrap();
        solution.check(&problem).unwrap();
    }
    let config = config.with_replay(Some(write_record(&greedy)));
    let mut strategy = registry.create("csv", &config).unwrap();
    let solution = solve(strategy.as_mut(), &problem, &flags).unwrap();
    assert_eq!(solution.placements, greedy.placements);
}

#[test]
fn render() {
    init_tracing();
    let problem = TilingProblem::new(6, 5, false, 4).unwrap();
    let solution = solve(&mut GreedyTiling::new(), &problem, &CatalogFlags::lut_only()).unwrap();
    let svg = render_solution(&solution, &problem);
    assert!(svg.starts_with("<?xml"));
    assert!(svg.ends_with("</svg>"));
    assert_eq!(
        svg.matches("fill-opacity").count(),
        solution
            .placements
            .iter()
            .map(|p| p.kind.blocks().len())
            .sum::<usize>()
    );
}

/// Claims an empty assignment is feasible for the first `bad` calls, then
/// hands over to [BranchAndBound]
struct EmptyFirst {
    bad: usize,
    calls: Arc<AtomicUsize>,
}

impl MilpSolver for EmptyFirst {
    fn name(&self) -> &str {
        "empty-first"
    }

    fn solve(
        &mut self,
        problem: &MilpProblem,
        start: Option<&[i64]>,
        limits: &SolveLimits,
    ) -> Result<MilpSolution, Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.bad {
            return Ok(MilpSolution {
                status: MilpStatus::Feasible,
                values: vec![0; problem.vars.len()],
                objective: 0.0,
                nodes: 1,
            })
        }
        BranchAndBound::default().solve(problem, start, limits)
    }
}

/// Drops the warm start
struct Cold;

impl MilpSolver for Cold {
    fn name(&self) -> &str {
        "cold"
    }

    fn solve(
        &mut self,
        problem: &MilpProblem,
        _: Option<&[i64]>,
        limits: &SolveLimits,
    ) -> Result<MilpSolution, Error> {
        BranchAndBound::default().solve(problem, None, limits)
    }
}

#[test]
fn ilp_residue_retry() {
    init_tracing();
    let flags = CatalogFlags::lut_only();
    let problem = TilingProblem::new(4, 4, false, 0).unwrap();
    let limits = SolveLimits::default().with_node_limit(Some(400));

    // an assignment that covers nothing leaves the whole product as error
    let calls = Arc::new(AtomicUsize::new(0));
    let mut ilp = IlpTiling::new(limits.clone())
        .with_max_retries(3)
        .with_solver(Box::new(EmptyFirst {
            bad: 1,
            calls: calls.clone(),
        }));
    let solution = solve(&mut ilp, &problem, &flags).unwrap();
    solution.check(&problem).unwrap();
    assert_eq!(solution.achieved_error, 0);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    let calls = Arc::new(AtomicUsize::new(0));
    let mut ilp = IlpTiling::new(limits.clone())
        .with_max_retries(2)
        .with_solver(Box::new(EmptyFirst {
            bad: 3,
            calls: calls.clone(),
        }));
    assert!(matches!(
        solve(&mut ilp, &problem, &flags),
        Err(Error::ResidueRetriesExhausted(2))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 3);

    let calls = Arc::new(AtomicUsize::new(0));
    let mut ilp = IlpTiling::new(limits)
        .with_max_retries(0)
        .with_solver(Box::new(EmptyFirst {
            bad: 1,
            calls: calls.clone(),
        }));
    assert!(matches!(
        solve(&mut ilp, &problem, &flags),
        Err(Error::ResidueRetriesExhausted(0))
    ));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn ilp_timeout() {
    init_tracing();
    let flags = CatalogFlags::lut_only();
    let problem = TilingProblem::new(5, 5, false, 8).unwrap();
    // no incumbent when the time is up
    let limits = SolveLimits::default().with_timeout(Some(Duration::ZERO));
    let mut ilp = IlpTiling::new(limits.clone()).with_solver(Box::new(Cold));
    assert!(matches!(
        solve(&mut ilp, &problem, &flags),
        Err(Error::SolverTimeout)
    ));
    // the warm start is kept as the incumbent
    let problem = TilingProblem::new(4, 4, false, 4).unwrap();
    let solution = solve(&mut IlpTiling::new(limits), &problem, &flags).unwrap();
    solution.check(&problem).unwrap();
    assert_eq!(solution.status, SolveStatus::Suboptimal);
    assert!(solution.achieved_error <= 4);
}
