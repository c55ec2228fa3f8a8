use tessera::{
    milp::{BranchAndBound, Cmp, MilpProblem, MilpSolver, MilpStatus, SolveLimits},
    Error,
};
use testcrate::init_tracing;

fn solve(
    problem: &MilpProblem,
    start: Option<&[i64]>,
    limits: &SolveLimits,
) -> (MilpStatus, Vec<i64>, f64) {
    let res = BranchAndBound::default()
        .solve(problem, start, limits)
        .unwrap();
    (res.status, res.values, res.objective)
}

#[test]
fn knapsack() {
    init_tracing();
    let values = [10.0, 13.0, 7.0, 8.0];
    let weights = [5.0, 6.0, 3.0, 4.0];
    let mut problem = MilpProblem::new();
    let vars: Vec<usize> = values
        .iter()
        .enumerate()
        .map(|(i, v)| problem.add_binary(format!("item_{i}"), -v))
        .collect();
    problem.add_constraint(
        "capacity",
        vars.iter().copied().zip(weights).collect(),
        Cmp::Le,
        10.0,
    );
    let (status, values, objective) = solve(&problem, None, &SolveLimits::default());
    assert_eq!(status, MilpStatus::Optimal);
    assert_eq!(values, vec![0, 1, 0, 1]);
    assert!((objective + 21.0).abs() < 1e-9);
}

#[test]
fn general_integers() {
    init_tracing();
    let mut problem = MilpProblem::new();
    let a = problem.add_integer("a", 0, 10, 3.0);
    let b = problem.add_integer("b", 0, 10, 2.0);
    problem.add_constraint("demand", vec![(a, 1.0), (b, 1.0)], Cmp::Ge, 7.0);
    problem.add_constraint("b_cap", vec![(b, 1.0)], Cmp::Le, 5.0);
    let (status, values, objective) = solve(&problem, None, &SolveLimits::default());
    assert_eq!(status, MilpStatus::Optimal);
    assert_eq!(values, vec![2, 5]);
    assert!((objective - 16.0).abs() < 1e-9);

    let mut problem = MilpProblem::new();
    let x = problem.add_integer("x", 0, 10, 1.1);
    let y = problem.add_integer("y", 0, 10, 1.0);
    let z = problem.add_integer("z", 0, 10, 1.0);
    problem.add_constraint("sum", vec![(x, 1.0), (y, 2.0), (z, 3.0)], Cmp::Eq, 10.0);
    let (status, values, objective) = solve(&problem, None, &SolveLimits::default());
    assert_eq!(status, MilpStatus::Optimal);
    assert_eq!(values, vec![0, 2, 2]);
    assert!((objective - 4.0).abs() < 1e-9);
}

#[test]
fn warm_starts_and_limits() {
    init_tracing();
    let mut problem = MilpProblem::new();
    let a = problem.add_integer("a", 0, 10, 3.0);
    let b = problem.add_integer("b", 0, 10, 2.0);
    problem.add_constraint("demand", vec![(a, 1.0), (b, 1.0)], Cmp::Ge, 7.0);
    problem.add_constraint("b_cap", vec![(b, 1.0)], Cmp::Le, 5.0);

    let no_nodes = SolveLimits::default().with_node_limit(Some(0));
    let (status, values, objective) = solve(&problem, Some(&[7, 0]), &no_nodes);
    assert_eq!(status, MilpStatus::Feasible);
    assert_eq!(values, vec![7, 0]);
    assert!((objective - 21.0).abs() < 1e-9);

    // an infeasible start is ignored
    let (status, values, _) = solve(&problem, Some(&[0, 0]), &no_nodes);
    assert_eq!(status, MilpStatus::Timeout);
    assert!(values.is_empty());

    // the start is improved on once nodes are allowed
    let (status, values, _) = solve(&problem, Some(&[7, 0]), &SolveLimits::default());
    assert_eq!(status, MilpStatus::Optimal);
    assert_eq!(values, vec![2, 5]);
}

#[test]
fn infeasible() {
    init_tracing();
    let mut problem = MilpProblem::new();
    let vars: Vec<usize> = (0..4)
        .map(|i| problem.add_binary(format!("d_{i}"), 1.0))
        .collect();
    problem.add_constraint(
        "cover",
        vars.iter().map(|&v| (v, 1.0)).collect(),
        Cmp::Eq,
        1.0,
    );
    problem.add_constraint(
        "cap",
        vars.iter().map(|&v| (v, 1.0)).collect(),
        Cmp::Le,
        0.0,
    );
    let (status, values, _) = solve(&problem, None, &SolveLimits::default());
    assert_eq!(status, MilpStatus::Infeasible);
    assert!(values.is_empty());
    assert!(matches!(
        problem.check(&[0, 0, 0, 0]),
        Err(Error::Infeasible { .. })
    ));

    problem.add_constraint("broken", vec![(17, 1.0)], Cmp::Le, 1.0);
    assert!(BranchAndBound::default()
        .solve(&problem, None, &SolveLimits::default())
        .is_err());
}
