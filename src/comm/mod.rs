//! Message passing between ranks.
//!
//! Ranks share no grid memory. All traffic goes through a [`Communicator`]:
//! halo rows to the two vertical neighbors, and collectives (max reduction,
//! barrier, gather) over the whole group. Collectives must be called in the
//! same order on every rank.
//!
//! Two backends implement it. [`ChannelComm`] runs a group of ranks inside
//! one process over channels, launched by [`Cluster`]. With the `mpi`
//! feature, `MpiComm` takes rank and group size from the MPI world, so the
//! group is whatever `mpirun` started.

mod channel;
mod cluster;
#[cfg(feature = "mpi")]
mod mpi_comm;
mod request;

pub use channel::*;
pub use cluster::*;
#[cfg(feature = "mpi")]
pub use mpi_comm::*;
pub use request::*;

use crate::error::Result;
use std::time::Duration;

/// Which vertical neighbor a halo operation talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Rank - 1, owner of the rows above.
    Top,
    /// Rank + 1, owner of the rows below.
    Bottom,
}

/// A posted operation. Consumed by `wait`, so a completed operation can not
/// be waited on again and a pending one can not be reposted.
pub trait Wait {
    type Output;

    fn wait(self) -> Result<Self::Output>;
}

/// One rank's view of the group.
pub trait Communicator: Sync {
    type SendRequest: Wait<Output = ()> + Send;
    type RecvRequest<'c>: Wait<Output = Vec<f64>> + Send
    where
        Self: 'c;
    type ReduceRequest<'c>: Wait<Output = f64>
    where
        Self: 'c;

    fn rank(&self) -> usize;

    fn size(&self) -> usize;

    /// Bound every later wait on this rank's requests.
    fn set_timeout(&mut self, timeout: Option<Duration>);

    /// Rank of the neighbor on `side`, if there is one.
    fn neighbor(&self, side: Side) -> Option<usize> {
        match side {
            Side::Top => self.rank().checked_sub(1),
            Side::Bottom => Some(self.rank() + 1).filter(|&r| r < self.size()),
        }
    }

    /// Post a send of `row` to the neighbor on `side`.
    /// None when there is no neighbor on that side.
    fn isend(&self, side: Side, row: &[f64]) -> Option<Self::SendRequest>;

    /// Post a receive of a `len` value row from the neighbor on `side`.
    /// None when there is no neighbor on that side.
    fn irecv(&self, side: Side, len: usize) -> Option<Self::RecvRequest<'_>>;

    /// Post this rank's contribution to a global maximum.
    fn iallreduce_max(&self, value: f64) -> Self::ReduceRequest<'_>;

    /// Block until every rank has reached the same barrier.
    fn barrier(&self) -> Result<()>;

    /// Collect one buffer per rank on `root`, indexed by rank.
    /// Other ranks get None.
    fn gather(&self, root: usize, data: Vec<f64>) -> Result<Option<Vec<Vec<f64>>>>;
}
