use crate::build_info;
use crate::config::{RunSize, SolverConfig};
use crate::error::Result;
use crate::grid::{BoundaryConditions, InitialCondition};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BoundaryRule {
    /// Right column and bottom row rise linearly from 0 to 100.
    Ramp,
    /// Top row at 100, other sides at 0.
    HotTop,
}

impl BoundaryRule {
    pub fn conditions(&self) -> BoundaryConditions {
        match self {
            BoundaryRule::Ramp => BoundaryConditions::default(),
            BoundaryRule::HotTop => BoundaryConditions::HOT_TOP,
        }
    }
}

/// Hybrid strip-decomposed Jacobi solver for the 2D Laplace equation
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Run size preset. Also fixes how many processes the run expects.
    #[arg(short, long, value_enum, default_value = "small")]
    pub size: RunSize,

    /// Number of in-process ranks to launch, the preset's count when
    /// omitted. Ignored under MPI, where `mpirun` decides.
    #[arg(short, long)]
    pub processes: Option<usize>,

    /// Threads per process, the coordinating thread included.
    #[arg(short, long, default_value = "4")]
    pub threads: usize,

    /// Global interior rows. Replaces the preset grid and its process check.
    #[arg(long, requires("columns"))]
    pub rows: Option<usize>,

    /// Interior columns. Replaces the preset grid and its process check.
    #[arg(long, requires("rows"))]
    pub columns: Option<usize>,

    /// Fixed boundary values.
    #[arg(short, long, value_enum, default_value = "ramp")]
    pub boundary: BoundaryRule,

    /// Iteration budget.
    #[arg(long)]
    pub max_iterations: Option<usize>,

    /// Convergence threshold on the max per-cell change.
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Print progress every N iterations, 0 to disable.
    #[arg(long)]
    pub print_interval: Option<usize>,

    /// Fill the interior with random values from this seed.
    #[arg(short, long)]
    pub rand_init: Option<u64>,

    /// Give up on a halo or reduction wait after this many milliseconds.
    #[arg(long)]
    pub halo_timeout_ms: Option<u64>,

    /// Write the final interior to this CSV file.
    #[arg(short, long)]
    pub output_csv: Option<PathBuf>,

    /// Debug level diagnostics on stderr.
    #[arg(short, long)]
    pub verbose: bool,

    /// Only errors on stderr.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Print build information and quit
    #[arg(long)]
    pub build_info: bool,
}

impl Args {
    pub fn cli_setup(name: &str) -> Self {
        let args = Args::parse();

        if args.build_info {
            build_info::print_report(name);
            std::process::exit(0);
        }

        setup_logging(args.verbose, args.quiet);
        args
    }

    pub fn processes(&self) -> usize {
        self.processes
            .unwrap_or_else(|| self.size.expected_processes())
    }

    /// Interior columns of the run.
    pub fn columns(&self) -> usize {
        self.columns.unwrap_or_else(|| self.size.columns())
    }

    /// Preset values, overridden by whatever was given on the command line.
    /// A custom grid is split over `processes` ranks.
    pub fn solver_config(&self, processes: usize) -> Result<SolverConfig> {
        let mut config = match (self.rows, self.columns) {
            (Some(rows), Some(columns)) => {
                SolverConfig::for_global_rows(rows, columns, processes)?
            }
            _ => SolverConfig::preset(self.size),
        };

        config.threads = self.threads;
        config.boundary = self.boundary.conditions();
        if let Some(max_iterations) = self.max_iterations {
            config.max_iterations = max_iterations;
        }
        if let Some(threshold) = self.threshold {
            config.threshold = threshold;
        }
        if let Some(print_interval) = self.print_interval {
            config.print_interval = print_interval;
        }
        if let Some(seed) = self.rand_init {
            config.initial = InitialCondition::Random {
                seed,
                max: config.boundary.max(),
            };
        }
        config.halo_timeout = self.halo_timeout_ms.map(Duration::from_millis);
        Ok(config)
    }
}

/// Diagnostics go to stderr so stdout only carries the run's report.
fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        "error"
    } else if verbose {
        "debug"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_names(true)
        .without_time()
        .init();
}

/// Keeps the profiling server alive for the whole run.
#[cfg(feature = "profile-with-puffin")]
pub fn start_profiler() -> Option<puffin_http::Server> {
    let server_addr = format!("127.0.0.1:{}", puffin_http::DEFAULT_PORT);
    match puffin_http::Server::new(&server_addr) {
        Ok(server) => {
            println!("Run this to view profiling data:  puffin_viewer {server_addr}");
            profiling::puffin::set_scopes_on(true);
            Some(server)
        }
        Err(e) => {
            tracing::warn!("could not start profiling server: {}", e);
            None
        }
    }
}
