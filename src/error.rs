use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The launcher started a different number of ranks than the run size needs.
    #[error("The {run_size} version is meant to be run with {expected} processes, not {actual}.")]
    ProcessCount {
        run_size: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Each rank needs one coordinating thread plus at least one worker.
    #[error("The threading support level is lesser than that demanded: {threads} thread(s) per rank, need at least {required}")]
    Concurrency { threads: usize, required: usize },

    /// MPI could not grant concurrent calls from several threads.
    #[error("The threading support level is lesser than that demanded: MPI provides {0}")]
    ThreadSupport(String),

    #[error("Cannot split {global_rows} rows evenly across {processes} processes")]
    Decomposition {
        global_rows: usize,
        processes: usize,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Rank {rank} lost its link to rank {peer}")]
    PeerDisconnected { rank: usize, peer: usize },

    #[error("Rank {rank} timed out after {millis} ms waiting on rank {peer}")]
    Timeout {
        rank: usize,
        peer: usize,
        millis: u128,
    },

    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),

    #[error("Rank {0} panicked")]
    RankPanicked(usize),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_config(msg: &str) -> Self {
        Error::InvalidConfig(msg.to_string())
    }

    /// True for errors that every rank detects on its own before any
    /// message is exchanged.
    pub fn is_misconfiguration(&self) -> bool {
        matches!(
            self,
            Error::ProcessCount { .. }
                | Error::Concurrency { .. }
                | Error::ThreadSupport(_)
                | Error::Decomposition { .. }
                | Error::InvalidConfig(_)
        )
    }
}
