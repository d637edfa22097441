use crate::comm::Communicator;
use crate::config::SolverConfig;
use crate::error::{Error, Result};

/// A rank's place in the strip decomposition, built once at startup and
/// handed to every phase of the solver.
pub struct Topology<C> {
    comm: C,
    local_rows: usize,
    columns: usize,
}

impl<C: Communicator> Topology<C> {
    /// Validate the run against this group of ranks. Every rank reaches the
    /// same verdict, so a misconfigured run fails everywhere before any
    /// message is exchanged.
    pub fn new(mut comm: C, config: &SolverConfig) -> Result<Self> {
        if let Some(run_size) = config.run_size {
            if comm.size() != run_size.expected_processes() {
                return Err(Error::ProcessCount {
                    run_size: run_size.name(),
                    expected: run_size.expected_processes(),
                    actual: comm.size(),
                });
            }
        }
        config.validate()?;
        comm.set_timeout(config.halo_timeout);

        let topology = Topology {
            comm,
            local_rows: config.local_rows,
            columns: config.columns,
        };
        debug_assert_eq!(
            topology.global_rows(),
            topology.size() * topology.local_rows()
        );
        Ok(topology)
    }

    pub fn comm(&self) -> &C {
        &self.comm
    }

    pub fn rank(&self) -> usize {
        self.comm.rank()
    }

    pub fn size(&self) -> usize {
        self.comm.size()
    }

    pub fn local_rows(&self) -> usize {
        self.local_rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn global_rows(&self) -> usize {
        self.size() * self.local_rows
    }

    /// Global index of this rank's first interior row.
    pub fn first_row(&self) -> usize {
        self.rank() * self.local_rows
    }

    pub fn is_root(&self) -> bool {
        self.rank() == 0
    }

    /// The rank that prints progress lines.
    pub fn progress_rank(&self) -> usize {
        self.size() - 1
    }

    /// The rank that prints the verification cell: the second to last, so
    /// its last interior row is fed by a halo, or rank 0 when alone.
    pub fn verification_rank(&self) -> usize {
        self.size().saturating_sub(2)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::comm::{ChannelComm, Cluster};
    use crate::config::RunSize;

    #[test]
    fn strip_placement() {
        let config = SolverConfig::for_global_rows(12, 4, 3).unwrap();
        let topologies: Vec<Topology<ChannelComm>> = Cluster::links(3)
            .into_iter()
            .map(|comm| Topology::new(comm, &config).unwrap())
            .collect();

        for (rank, t) in topologies.iter().enumerate() {
            assert_eq!(t.rank(), rank);
            assert_eq!(t.local_rows(), 4);
            assert_eq!(t.global_rows(), 12);
            assert_eq!(t.first_row(), rank * 4);
            assert_eq!(t.progress_rank(), 2);
            assert_eq!(t.verification_rank(), 1);
        }
        assert!(topologies[0].is_root());
        assert!(!topologies[1].is_root());
    }

    #[test]
    fn process_count_mismatch() {
        let config = SolverConfig::preset(RunSize::Small);
        for comm in Cluster::links(3) {
            match Topology::new(comm, &config) {
                Err(Error::ProcessCount {
                    expected, actual, ..
                }) => {
                    assert_eq!(expected, 2);
                    assert_eq!(actual, 3);
                }
                _ => panic!("expected a process count error"),
            }
        }
    }

    #[test]
    fn single_rank_verification() {
        let config = SolverConfig::for_global_rows(4, 4, 1).unwrap();
        let comm = Cluster::links(1).pop().unwrap();
        let t = Topology::new(comm, &config).unwrap();
        assert_eq!(t.verification_rank(), 0);
        assert_eq!(t.progress_rank(), 0);
    }
}
