use laplace_hybrid::comm::Cluster;
use laplace_hybrid::config::{RunSize, SolverConfig};
use laplace_hybrid::error::Error;
use laplace_hybrid::grid::{BoundaryConditions, InitialCondition};
use laplace_hybrid::report::{CellReport, Reporter, RunSummary, SilentReporter};
use laplace_hybrid::solver::{self, RankOutcome, RankSolver};
use laplace_hybrid::topology::Topology;

use float_cmp::assert_approx_eq;
use std::sync::Mutex;

fn test_config(global_rows: usize, columns: usize, processes: usize) -> SolverConfig {
    SolverConfig {
        threads: 2,
        max_iterations: 60,
        initial: InitialCondition::Random {
            seed: 1234,
            max: 100.0,
        },
        ..SolverConfig::for_global_rows(global_rows, columns, processes).unwrap()
    }
}

/// Interiors of every rank stacked in rank order.
fn global_interior(mut outcomes: Vec<RankOutcome>) -> Vec<f64> {
    outcomes.sort_by_key(|o| o.rank);
    outcomes.iter().flat_map(|o| o.grid.interior()).collect()
}

#[test]
fn strip_count_does_not_change_result() {
    let rows = 16;
    let columns = 12;

    let reference = solver::run_cluster(1, &test_config(rows, columns, 1), &SilentReporter, None)
        .unwrap();
    let reference_summary = reference[0].summary;
    let reference_field = global_interior(reference);

    for processes in [2, 4, 8] {
        let config = test_config(rows, columns, processes);
        let outcomes = solver::run_cluster(processes, &config, &SilentReporter, None).unwrap();
        assert_eq!(outcomes.len(), processes);
        for outcome in &outcomes {
            assert_eq!(outcome.summary.iterations, reference_summary.iterations);
            assert_eq!(outcome.summary.global_delta, reference_summary.global_delta);
        }
        let field = global_interior(outcomes);
        assert_eq!(field.len(), reference_field.len());
        for (a, b) in field.iter().zip(&reference_field) {
            assert_eq!(a, b);
        }
    }
}

#[test]
fn more_threads_same_result() {
    let base = test_config(12, 9, 3);
    let a = solver::run_cluster(3, &base, &SilentReporter, None).unwrap();
    let wide = SolverConfig { threads: 5, ..base };
    let b = solver::run_cluster(3, &wide, &SilentReporter, None).unwrap();
    assert_eq!(global_interior(a), global_interior(b));
}

#[test]
fn process_count_mismatch_fails_every_rank() {
    let config = SolverConfig {
        threads: 2,
        ..SolverConfig::preset(RunSize::Small)
    };
    let result = solver::run_cluster(3, &config, &SilentReporter, None);
    match result {
        Err(Error::ProcessCount {
            expected, actual, ..
        }) => {
            assert_eq!(expected, 2);
            assert_eq!(actual, 3);
        }
        Err(e) => panic!("unexpected error: {e}"),
        Ok(_) => panic!("run should have been refused"),
    }
}

#[test]
fn single_thread_is_refused() {
    let config = SolverConfig {
        threads: 1,
        ..test_config(8, 4, 2)
    };
    assert!(matches!(
        solver::run_cluster(2, &config, &SilentReporter, None),
        Err(Error::Concurrency {
            threads: 1,
            required: 2
        })
    ));
}

#[test]
fn boundaries_are_never_written() {
    let (rows, columns) = (12, 6);
    let config = test_config(rows, columns, 3);
    let boundary = config.boundary;
    let outcomes = solver::run_cluster(3, &config, &SilentReporter, None).unwrap();
    for outcome in &outcomes {
        let grid = &outcome.grid;
        let first_row = outcome.rank * grid.local_rows();
        for i in 0..grid.height() {
            let g = first_row + i;
            assert_eq!(grid.value(i, 0), boundary.left(g, rows));
            assert_eq!(grid.value(i, columns + 1), boundary.right(g, rows));
        }
        if outcome.rank == 0 {
            for j in 1..=columns {
                assert_eq!(grid.value(0, j), boundary.top(j, columns));
            }
        }
        if outcome.rank == 2 {
            for j in 1..=columns {
                assert_eq!(grid.value(grid.local_rows() + 1, j), boundary.bottom(j, columns));
            }
            assert_eq!(grid.value(grid.local_rows(), columns + 1), 100.0);
            assert_eq!(grid.value(grid.local_rows() + 1, columns), 100.0);
        }
    }
}

#[test]
fn iteration_budget_bounds_the_run() {
    let config = SolverConfig {
        max_iterations: 9,
        threshold: -1.0,
        ..test_config(8, 5, 2)
    };
    let outcomes = solver::run_cluster(2, &config, &SilentReporter, None).unwrap();
    for outcome in outcomes {
        assert_eq!(outcome.summary.iterations, 10);
    }
}

#[test]
fn first_iteration_is_exact() {
    let config = SolverConfig {
        max_iterations: 0,
        boundary: BoundaryConditions::HOT_TOP,
        initial: InitialCondition::Uniform(0.0),
        ..test_config(8, 5, 2)
    };
    let outcomes = solver::run_cluster(2, &config, &SilentReporter, None).unwrap();
    for outcome in &outcomes {
        assert_eq!(outcome.summary.iterations, 1);
        assert_eq!(outcome.summary.global_delta, 25.0);
    }
    let field = global_interior(outcomes);
    for (k, v) in field.iter().enumerate() {
        let expected = if k < 5 { 25.0 } else { 0.0 };
        assert_eq!(*v, expected);
    }
}

#[test]
fn converged_run_stays_converged() {
    let config = SolverConfig {
        max_iterations: 4000,
        threshold: 0.01,
        ..test_config(10, 6, 1)
    };
    let comm = Cluster::links(1).pop().unwrap();
    let topology = Topology::new(comm, &config).unwrap();
    let mut rank = RankSolver::new(&topology, &config).unwrap();

    let summary = rank.run(&SilentReporter).unwrap();
    assert!(summary.iterations < config.max_iterations);
    assert!(rank.converged());
    assert!(summary.global_delta <= config.threshold);

    let delta = rank.step(&SilentReporter).unwrap();
    assert!(delta <= summary.global_delta);
}

#[test]
fn converged_field_is_harmonic() {
    let config = SolverConfig {
        max_iterations: 20000,
        threshold: 1e-9,
        boundary: BoundaryConditions::HOT_TOP,
        initial: InitialCondition::Uniform(0.0),
        ..test_config(8, 8, 2)
    };
    let mut outcomes = solver::run_cluster(2, &config, &SilentReporter, None).unwrap();
    outcomes.sort_by_key(|o| o.rank);
    assert!(outcomes[0].summary.global_delta <= 1e-9);

    // Mirror symmetry across the vertical centre line.
    for outcome in &outcomes {
        let grid = &outcome.grid;
        for i in 1..=grid.local_rows() {
            for j in 1..=grid.columns() {
                assert_approx_eq!(
                    f64,
                    grid.value(i, j),
                    grid.value(i, grid.columns() + 1 - j),
                    epsilon = 1e-12
                );
            }
        }
    }
    // Discrete mean value property in the middle of the grid.
    let g = &outcomes[0].grid;
    let mean = 0.25 * (g.value(1, 4) + g.value(3, 4) + g.value(2, 3) + g.value(2, 5));
    assert_approx_eq!(f64, g.value(2, 4), mean, epsilon = 1e-6);
}

#[test]
fn gathered_csv_matches_strips() {
    let path = std::env::temp_dir().join(format!(
        "laplace_hybrid_strip_compare_{}.csv",
        std::process::id()
    ));
    let config = test_config(9, 4, 3);
    let outcomes = solver::run_cluster(3, &config, &SilentReporter, Some(path.as_path())).unwrap();
    let field = global_interior(outcomes);

    let text = std::fs::read_to_string(&path).unwrap();
    let _ = std::fs::remove_file(&path);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 9);
    let parsed: Vec<f64> = lines
        .iter()
        .flat_map(|line| line.split(", ").map(|v| v.parse::<f64>().unwrap()))
        .collect();
    assert_eq!(parsed, field);
}

#[derive(Debug, Clone, PartialEq)]
enum Event {
    Startup(usize),
    Progress(usize, CellReport),
    Summary(RunSummary),
    Verification(CellReport),
}

#[derive(Default)]
struct RecordingReporter {
    events: Mutex<Vec<Event>>,
}

impl RecordingReporter {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Reporter for RecordingReporter {
    fn startup(&self, processes: usize) {
        self.push(Event::Startup(processes));
    }

    fn track_progress(&self, iteration: usize, cell: &CellReport) {
        self.push(Event::Progress(iteration, *cell));
    }

    fn summarize(&self, summary: &RunSummary) {
        self.push(Event::Summary(*summary));
    }

    fn verification(&self, cell: &CellReport) {
        self.push(Event::Verification(*cell));
    }
}

#[test]
fn output_comes_from_the_right_ranks() {
    let config = SolverConfig {
        max_iterations: 5,
        threshold: -1.0,
        print_interval: 2,
        ..test_config(12, 5, 3)
    };
    let reporter = RecordingReporter::default();
    let mut outcomes = solver::run_cluster(3, &config, &reporter, None).unwrap();
    outcomes.sort_by_key(|o| o.rank);
    let events = reporter.events.into_inner().unwrap();

    assert_eq!(events.first(), Some(&Event::Startup(3)));

    let progress: Vec<(usize, CellReport)> = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(i, c) => Some((*i, *c)),
            _ => None,
        })
        .collect();
    let iterations: Vec<usize> = progress.iter().map(|(i, _)| *i).collect();
    assert_eq!(iterations, vec![2, 4, 6]);
    for (_, cell) in &progress {
        // Last rank, last interior cell.
        assert_eq!((cell.row, cell.column), (11, 4));
    }
    let last = &outcomes[2].grid;
    assert_eq!(progress[2].1.value, last.value(4, 5));

    let summaries: Vec<&RunSummary> = events
        .iter()
        .filter_map(|e| match e {
            Event::Summary(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(summaries.len(), 1);
    assert_eq!(summaries[0].iterations, 6);
    assert!(summaries[0].elapsed.is_some());

    // Verification comes after the summary, from the second to last rank.
    let verification = events.last().unwrap();
    let middle = &outcomes[1].grid;
    assert_eq!(
        verification,
        &Event::Verification(CellReport {
            row: 7,
            column: 4,
            value: middle.value(4, 5),
        })
    );
}

fn ramp_config(global_rows: usize, columns: usize, processes: usize) -> SolverConfig {
    SolverConfig {
        threads: 2,
        print_interval: 0,
        ..SolverConfig::for_global_rows(global_rows, columns, processes).unwrap()
    }
}

fn verification_of(reporter: RecordingReporter) -> CellReport {
    match reporter.events.into_inner().unwrap().pop() {
        Some(Event::Verification(cell)) => cell,
        other => panic!("run did not end with a verification line: {other:?}"),
    }
}

#[test]
fn default_ramp_run_is_pinned() {
    let config = ramp_config(40, 60, 2);
    assert_eq!(config.boundary, BoundaryConditions::Ramp { max: 100.0 });
    assert_eq!(config.threshold, 0.01);

    let reporter = RecordingReporter::default();
    let outcomes = solver::run_cluster(2, &config, &reporter, None).unwrap();
    for outcome in &outcomes {
        assert_eq!(outcome.summary.iterations, 1033);
        assert_eq!(outcome.summary.global_delta, 0.009993733504330748);
    }

    let cell = verification_of(reporter);
    assert_eq!((cell.row, cell.column), (19, 59));
    assert_eq!(cell.value, 48.9019494468845);
}

#[test]
fn pinned_values_hold_across_three_ranks() {
    let reporter = RecordingReporter::default();
    let config = ramp_config(24, 16, 3);
    let outcomes = solver::run_cluster(3, &config, &reporter, None).unwrap();
    assert!(outcomes.iter().all(|o| o.summary.iterations == 318));

    let cell = verification_of(reporter);
    assert_eq!((cell.row, cell.column), (15, 15));
    assert_eq!(cell.value, 62.67036918613959);

    let loose = SolverConfig {
        threshold: 0.05,
        ..config
    };
    let reporter = RecordingReporter::default();
    let outcomes = solver::run_cluster(3, &loose, &reporter, None).unwrap();
    assert!(outcomes.iter().all(|o| o.summary.iterations == 191));
    assert_eq!(verification_of(reporter).value, 62.1281570241929);
}

#[test]
fn ramp_progress_is_not_flat() {
    let config = SolverConfig {
        max_iterations: 10,
        threshold: -1.0,
        print_interval: 5,
        ..ramp_config(8, 6, 2)
    };
    let reporter = RecordingReporter::default();
    solver::run_cluster(2, &config, &reporter, None).unwrap();
    let events = reporter.events.into_inner().unwrap();
    let values: Vec<f64> = events
        .iter()
        .filter_map(|e| match e {
            Event::Progress(_, cell) => Some(cell.value),
            Event::Verification(cell) => Some(cell.value),
            _ => None,
        })
        .collect();
    assert_eq!(values.len(), 3);
    assert!(values.iter().all(|v| *v > 0.0));
}

#[test]
#[ignore = "runs the full small preset"]
fn small_preset_is_reproducible() {
    let config = SolverConfig::preset(RunSize::Small);
    let first = solver::run_cluster(2, &config, &SilentReporter, None).unwrap();
    let second = solver::run_cluster(2, &config, &SilentReporter, None).unwrap();
    let (a, b) = (&first[0].summary, &second[0].summary);
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.global_delta, b.global_delta);
    assert!(a.iterations <= config.max_iterations + 1);
    let verifying = &first.iter().find(|o| o.rank == 0).unwrap().grid;
    assert!(verifying.value(verifying.local_rows(), verifying.columns()) > 0.0);
    assert_eq!(global_interior(first), global_interior(second));
}
