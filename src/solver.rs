//! Per-rank driver of the Jacobi iteration.
//!
//! Each iteration forks the rank's pool into two groups:
//!
//! - the edge task completes the previous halo exchange on each side,
//!   recomputes the edge row that depends on it, then posts the next
//!   exchange so the neighbors can start their own edge rows early;
//! - the bulk group recomputes the rows in between, which only read rows
//!   already resident on this rank.
//!
//! The join of both groups is the barrier before the fused
//! max-change / copy pass. The rank-local change is then posted to a
//! global max reduction that overlaps the progress print and is waited
//! on before the loop test, so every rank tests the same value.

use crate::comm::{Cluster, Communicator, Side, Wait};
#[cfg(feature = "mpi")]
use crate::comm::MpiComm;
use crate::config::SolverConfig;
use crate::convergence;
use crate::csv;
use crate::error::{Error, Result};
use crate::grid::{RowView, StripGrid};
use crate::halo::HaloExchange;
use crate::report::{CellReport, Reporter, RunSummary, Timer};
use crate::stencil;
use crate::topology::Topology;
use std::path::Path;

/// Global change assumed before the first iteration. A threshold at or
/// above it runs no iterations at all.
pub const INITIAL_GLOBAL_DELTA: f64 = 100.0;

pub struct RankSolver<'t, C: Communicator> {
    topology: &'t Topology<C>,
    halo: HaloExchange<'t, C>,
    grid: StripGrid,
    pool: rayon::ThreadPool,
    max_iterations: usize,
    threshold: f64,
    print_interval: usize,
    iteration: usize,
    global_delta: f64,
}

/// Pieces of the strip the edge task owns for one sweep.
struct EdgeRows<'a> {
    top_halo: &'a mut [f64],
    bottom_halo: &'a mut [f64],
    previous: RowView<'a>,
    top_edge: &'a mut [f64],
    bottom_edge: &'a mut [f64],
}

fn relax_edges<'t, C: Communicator>(
    halo: &mut HaloExchange<'t, C>,
    comm: &'t C,
    rows: EdgeRows<'_>,
    local_rows: usize,
) -> Result<()> {
    profiling::scope!("solver::relax_edges");
    let previous = rows.previous;

    halo.complete(Side::Top, rows.top_halo)?;
    stencil::relax_row(rows.top_halo, previous.row(1), previous.row(2), rows.top_edge);

    halo.complete(Side::Bottom, rows.bottom_halo)?;
    stencil::relax_row(
        previous.row(local_rows - 1),
        previous.row(local_rows),
        rows.bottom_halo,
        rows.bottom_edge,
    );

    halo.post(comm, Side::Top, rows.top_edge);
    halo.post(comm, Side::Bottom, rows.bottom_edge);
    Ok(())
}

impl<'t, C: Communicator> RankSolver<'t, C> {
    pub fn new(topology: &'t Topology<C>, config: &SolverConfig) -> Result<Self> {
        let rank = topology.rank();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(move |i| format!("rank_{}_rayon_{}", rank, i))
            .build()?;

        let mut grid = StripGrid::new(topology.local_rows(), topology.columns());
        pool.install(|| {
            grid.initialise(
                &config.boundary,
                &config.initial,
                topology.first_row(),
                topology.global_rows(),
            )
        });

        tracing::debug!(
            rank,
            first_row = topology.first_row(),
            local_rows = topology.local_rows(),
            columns = topology.columns(),
            threads = config.threads,
            "rank initialised"
        );

        Ok(RankSolver {
            topology,
            halo: HaloExchange::new(),
            grid,
            pool,
            max_iterations: config.max_iterations,
            threshold: config.threshold,
            print_interval: config.print_interval,
            iteration: 0,
            global_delta: INITIAL_GLOBAL_DELTA,
        })
    }

    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Global max change of the last iteration, `INITIAL_GLOBAL_DELTA`
    /// before the first.
    pub fn global_delta(&self) -> f64 {
        self.global_delta
    }

    pub fn grid(&self) -> &StripGrid {
        &self.grid
    }

    pub fn into_grid(self) -> StripGrid {
        self.grid
    }

    pub fn converged(&self) -> bool {
        self.global_delta <= self.threshold
    }

    /// One sweep over the strip, returns the rank-local max change.
    fn sweep(&mut self) -> Result<f64> {
        let topology: &'t Topology<C> = self.topology;
        let comm = topology.comm();
        let local_rows = topology.local_rows();
        let width = self.grid.width();

        let halo = &mut self.halo;
        let split = self.grid.split_for_sweep();
        let previous = split.previous;
        let bulk = split.bulk;
        let edges = EdgeRows {
            top_halo: split.top_halo,
            bottom_halo: split.bottom_halo,
            previous,
            top_edge: split.top_edge,
            bottom_edge: split.bottom_edge,
        };

        let (edge_result, ()) = self.pool.install(|| {
            rayon::join(
                || relax_edges(halo, comm, edges, local_rows),
                || stencil::relax_rows(previous, bulk, 2),
            )
        });
        edge_result?;

        let (current, previous) = self.grid.buffers_mut();
        Ok(self
            .pool
            .install(|| convergence::local_max_delta(current, previous, width, local_rows)))
    }

    /// Run one full iteration and return the new global max change.
    pub fn step(&mut self, reporter: &dyn Reporter) -> Result<f64> {
        let topology: &'t Topology<C> = self.topology;
        self.iteration += 1;

        let local_delta = self.sweep()?;
        let reduce = topology.comm().iallreduce_max(local_delta);

        if self.print_interval != 0
            && self.iteration % self.print_interval == 0
            && topology.rank() == topology.progress_rank()
        {
            reporter.track_progress(self.iteration, &self.last_cell());
        }

        self.global_delta = reduce.wait()?;
        tracing::trace!(
            rank = topology.rank(),
            iteration = self.iteration,
            local_delta,
            global_delta = self.global_delta,
            "iteration done"
        );
        Ok(self.global_delta)
    }

    /// Iterate until the global change drops to the threshold or the
    /// iteration budget runs out, then report.
    pub fn run(&mut self, reporter: &dyn Reporter) -> Result<RunSummary> {
        let topology: &'t Topology<C> = self.topology;
        let mut timer = Timer::new();
        if topology.is_root() {
            timer.start();
        }

        while self.global_delta > self.threshold && self.iteration <= self.max_iterations {
            self.step(reporter)?;
        }

        self.drain()?;
        topology.comm().barrier()?;

        let elapsed = if topology.is_root() {
            Some(timer.stop())
        } else {
            None
        };
        let summary = RunSummary {
            iterations: self.iteration,
            global_delta: self.global_delta,
            elapsed,
        };
        if topology.is_root() {
            reporter.summarize(&summary);
        }
        tracing::info!(
            rank = topology.rank(),
            iterations = self.iteration,
            global_delta = self.global_delta,
            converged = self.converged(),
            "rank finished"
        );

        topology.comm().barrier()?;
        if topology.rank() == topology.verification_rank() {
            reporter.verification(&self.last_cell());
        }
        Ok(summary)
    }

    /// Wait for any halo exchange still in flight.
    pub fn drain(&mut self) -> Result<()> {
        let split = self.grid.split_for_sweep();
        self.halo.drain(split.top_halo, split.bottom_halo)
    }

    /// The last interior cell of this strip, in global coordinates.
    pub fn last_cell(&self) -> CellReport {
        let local_rows = self.grid.local_rows();
        let columns = self.grid.columns();
        CellReport {
            row: self.topology.first_row() + local_rows - 1,
            column: columns - 1,
            value: self.grid.value(local_rows, columns),
        }
    }

    /// Collect the whole interior on rank 0, row-major. Collective.
    pub fn gather_interior(&self) -> Result<Option<Vec<f64>>> {
        let gathered = self.topology.comm().gather(0, self.grid.interior())?;
        Ok(gathered.map(|strips| strips.concat()))
    }
}

/// What a rank hands back from `solve`.
pub struct RankOutcome {
    pub rank: usize,
    pub summary: RunSummary,
    pub grid: StripGrid,
}

/// Everything one rank does in a run: validate, report startup, iterate,
/// report, and optionally gather the final field on rank 0 as CSV.
pub fn solve<C: Communicator>(
    comm: C,
    config: &SolverConfig,
    reporter: &dyn Reporter,
    output_csv: Option<&Path>,
) -> Result<RankOutcome> {
    let topology = Topology::new(comm, config)?;
    if topology.is_root() {
        reporter.startup(topology.size());
    }
    let mut solver = RankSolver::new(&topology, config)?;
    let summary = solver.run(reporter)?;
    if let Some(path) = output_csv {
        if let Some(field) = solver.gather_interior()? {
            csv::write_csv(&field, topology.global_rows(), topology.columns(), &path)?;
        }
    }
    Ok(RankOutcome {
        rank: topology.rank(),
        summary,
        grid: solver.into_grid(),
    })
}

/// Run `processes` ranks to completion. Any rank failing fails the run; a
/// misconfiguration is preferred over the follow-on errors it causes.
pub fn run_cluster(
    processes: usize,
    config: &SolverConfig,
    reporter: &dyn Reporter,
    output_csv: Option<&Path>,
) -> Result<Vec<RankOutcome>> {
    if processes == 0 {
        return Err(Error::invalid_config("need at least one process"));
    }
    let results = Cluster::launch(processes, |comm| solve(comm, config, reporter, output_csv));

    let mut outcomes = Vec::with_capacity(processes);
    let mut first_error: Option<Error> = None;
    for result in results {
        match result {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => {
                tracing::error!("{}", e);
                let replace = match &first_error {
                    None => true,
                    Some(prev) => !prev.is_misconfiguration() && e.is_misconfiguration(),
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }
    }
    match first_error {
        Some(e) => Err(e),
        None => Ok(outcomes),
    }
}

/// Run this process's rank of an MPI group started by `mpirun`. The group
/// size is only known once MPI is up, so the configuration is built from it.
#[cfg(feature = "mpi")]
pub fn run_mpi<F>(
    row_len: usize,
    config_for: F,
    reporter: &dyn Reporter,
    output_csv: Option<&Path>,
) -> Result<RankOutcome>
where
    F: FnOnce(usize) -> Result<SolverConfig>,
{
    MpiComm::launch(row_len, |comm| {
        let config = config_for(comm.size())?;
        solve(comm, &config, reporter, output_csv)
    })
}
