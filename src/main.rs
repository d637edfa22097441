use laplace_hybrid::cli::Args;
use laplace_hybrid::error::Result;
use laplace_hybrid::report::ConsoleReporter;
use laplace_hybrid::solver;

#[cfg(not(feature = "mpi"))]
fn run(args: &Args) -> Result<()> {
    let processes = args.processes();
    let config = args.solver_config(processes)?;
    tracing::info!(
        processes,
        threads = config.threads,
        local_rows = config.local_rows,
        columns = config.columns,
        "launching"
    );
    solver::run_cluster(
        processes,
        &config,
        &ConsoleReporter,
        args.output_csv.as_deref(),
    )?;
    Ok(())
}

#[cfg(feature = "mpi")]
fn run(args: &Args) -> Result<()> {
    if args.processes.is_some() {
        tracing::warn!("--processes is ignored under MPI, the launcher sets the group size");
    }
    solver::run_mpi(
        args.columns(),
        |size| {
            let config = args.solver_config(size)?;
            tracing::info!(
                size,
                threads = config.threads,
                local_rows = config.local_rows,
                columns = config.columns,
                "joined"
            );
            Ok(config)
        },
        &ConsoleReporter,
        args.output_csv.as_deref(),
    )?;
    Ok(())
}

fn main() {
    let args = Args::cli_setup("laplace-hybrid");

    #[cfg(feature = "profile-with-puffin")]
    let _profiler = laplace_hybrid::cli::start_profiler();

    if let Err(e) = run(&args) {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}
