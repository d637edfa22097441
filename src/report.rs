//! Console output and timing.

use std::time::{Duration, Instant};

/// Wall clock around the timed region.
#[derive(Debug, Default)]
pub struct Timer {
    started: Option<Instant>,
}

impl Timer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
    }

    /// Zero if the timer was not running.
    pub fn stop(&mut self) -> Duration {
        self.started
            .take()
            .map(|start| start.elapsed())
            .unwrap_or_default()
    }
}

/// One cell of the global interior, 0-based coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellReport {
    pub row: usize,
    pub column: usize,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunSummary {
    pub iterations: usize,
    pub global_delta: f64,
    /// Only measured on rank 0.
    pub elapsed: Option<Duration>,
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Max error at iteration {} was {:.6}",
            self.iterations, self.global_delta
        )?;
        if let Some(elapsed) = self.elapsed {
            write!(f, "\nTotal time was {:.6} seconds.", elapsed.as_secs_f64())?;
        }
        Ok(())
    }
}

/// Receives the solver's observable output. Shared by every rank of a run.
pub trait Reporter: Sync {
    fn startup(&self, processes: usize);

    fn track_progress(&self, iteration: usize, cell: &CellReport);

    fn summarize(&self, summary: &RunSummary);

    fn verification(&self, cell: &CellReport);
}

/// Prints to stdout.
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn startup(&self, processes: usize) {
        println!("Running on {} processes\n", processes);
    }

    fn track_progress(&self, iteration: usize, cell: &CellReport) {
        println!("---------- Iteration number: {} ------------", iteration);
        println!("[{},{}]: {:5.2}", cell.row, cell.column, cell.value);
    }

    fn summarize(&self, summary: &RunSummary) {
        println!("\n{}", summary);
    }

    fn verification(&self, cell: &CellReport) {
        println!(
            "Value of halo swap verification cell [{}][{}] is {:.18}",
            cell.row, cell.column, cell.value
        );
    }
}

/// Discards everything.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn startup(&self, _processes: usize) {}

    fn track_progress(&self, _iteration: usize, _cell: &CellReport) {}

    fn summarize(&self, _summary: &RunSummary) {}

    fn verification(&self, _cell: &CellReport) {}
}
