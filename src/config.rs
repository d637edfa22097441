//! Run constants for the solver.
//!
//! Every value here is fixed for the duration of a run. The presets mirror the
//! two supported launch sizes; a custom configuration carries no run size and
//! therefore skips the process-count check.

use crate::error::{Error, Result};
use crate::grid::{BoundaryConditions, InitialCondition};
use clap::ValueEnum;
use std::time::Duration;

/// One coordinating thread for halo traffic and edge rows, at least one
/// worker for the bulk rows.
pub const MIN_THREADS_PER_RANK: usize = 2;

/// Edge rows and bulk rows only separate cleanly with two or more rows.
pub const MIN_LOCAL_ROWS: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RunSize {
    Small,
    Big,
}

impl RunSize {
    pub fn name(&self) -> &'static str {
        match self {
            RunSize::Small => "small",
            RunSize::Big => "big",
        }
    }

    pub fn expected_processes(&self) -> usize {
        match self {
            RunSize::Small => 2,
            RunSize::Big => 8,
        }
    }

    pub fn local_rows(&self) -> usize {
        match self {
            RunSize::Small => 500,
            RunSize::Big => 500,
        }
    }

    pub fn columns(&self) -> usize {
        match self {
            RunSize::Small => 1000,
            RunSize::Big => 4000,
        }
    }

    pub fn global_rows(&self) -> usize {
        self.local_rows() * self.expected_processes()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SolverConfig {
    /// Interior rows owned by each rank, halos excluded.
    pub local_rows: usize,

    /// Interior columns, boundary columns excluded.
    pub columns: usize,

    pub max_iterations: usize,

    /// The run stops once the global max change is at or below this.
    pub threshold: f64,

    /// Progress is printed every `print_interval` iterations, never when 0.
    pub print_interval: usize,

    /// Only used to check the number of ranks at startup.
    pub run_size: Option<RunSize>,

    /// Worker pool size per rank, coordinating thread included.
    pub threads: usize,

    pub boundary: BoundaryConditions,

    pub initial: InitialCondition,

    /// Upper bound on any single halo or collective wait, unbounded when None.
    pub halo_timeout: Option<Duration>,
}

impl SolverConfig {
    pub const DEFAULT_MAX_ITERATIONS: usize = 4000;
    pub const DEFAULT_THRESHOLD: f64 = 0.01;
    pub const DEFAULT_PRINT_INTERVAL: usize = 200;
    pub const DEFAULT_THREADS: usize = 4;

    pub fn preset(run_size: RunSize) -> Self {
        SolverConfig {
            local_rows: run_size.local_rows(),
            columns: run_size.columns(),
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            threshold: Self::DEFAULT_THRESHOLD,
            print_interval: Self::DEFAULT_PRINT_INTERVAL,
            run_size: Some(run_size),
            threads: Self::DEFAULT_THREADS,
            boundary: BoundaryConditions::default(),
            initial: InitialCondition::default(),
            halo_timeout: None,
        }
    }

    /// Configuration for a global grid split across `processes` ranks.
    /// The split has to be exact.
    pub fn for_global_rows(
        global_rows: usize,
        columns: usize,
        processes: usize,
    ) -> Result<Self> {
        if processes == 0 || global_rows % processes != 0 {
            return Err(Error::Decomposition {
                global_rows,
                processes,
            });
        }
        Ok(SolverConfig {
            local_rows: global_rows / processes,
            columns,
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            threshold: Self::DEFAULT_THRESHOLD,
            print_interval: Self::DEFAULT_PRINT_INTERVAL,
            run_size: None,
            threads: Self::DEFAULT_THREADS,
            boundary: BoundaryConditions::default(),
            initial: InitialCondition::default(),
            halo_timeout: None,
        })
    }

    pub fn global_rows(&self, processes: usize) -> usize {
        self.local_rows * processes
    }

    /// Checks that do not depend on the number of ranks.
    pub fn validate(&self) -> Result<()> {
        if self.threads < MIN_THREADS_PER_RANK {
            return Err(Error::Concurrency {
                threads: self.threads,
                required: MIN_THREADS_PER_RANK,
            });
        }
        if self.local_rows < MIN_LOCAL_ROWS {
            return Err(Error::InvalidConfig(format!(
                "each rank needs at least {} rows, got {}",
                MIN_LOCAL_ROWS, self.local_rows
            )));
        }
        if self.columns == 0 {
            return Err(Error::invalid_config("columns must be positive"));
        }
        if self.threshold.is_nan() {
            return Err(Error::invalid_config("threshold must be a number"));
        }
        Ok(())
    }
}
