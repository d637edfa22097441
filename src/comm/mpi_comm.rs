//! MPI backend: one rank per MPI process, group size set by `mpirun`.
//!
//! Halo sends are buffered sends, so like the channel backend they copy the
//! row out when posted and complete locally. Receives and the max reduction
//! block in `wait`.

use super::{Communicator, Side, Wait};
use crate::error::{Error, Result};
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::{Communicator as _, CommunicatorCollectives, Destination, Root, Source};
use mpi::{Tag, Threading};
use std::time::Duration;

/// Halo rows travelling to the rank below.
const TAG_DOWN: Tag = 1;
/// Halo rows travelling to the rank above.
const TAG_UP: Tag = 2;

/// Rows a rank can have in flight per side before its neighbor receives them.
const BSEND_ROWS: usize = 8;
/// Per message bookkeeping reserved by the MPI library, rounded up.
const BSEND_OVERHEAD: usize = 1024;

pub struct MpiComm {
    world: SimpleCommunicator,
    rank: usize,
    size: usize,
}

// SAFETY: `launch` refuses to run unless MPI granted MPI_THREAD_MULTIPLE, so
// the world communicator may be used from any thread, concurrently.
unsafe impl Send for MpiComm {}
unsafe impl Sync for MpiComm {}

impl MpiComm {
    fn world(universe: &Universe) -> Self {
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size }
    }

    /// Initialise MPI, run `body` on this process's rank and finalise.
    /// An error on any rank is logged and takes the whole group down with
    /// `MPI_Abort`, so peers never wait on a rank that is gone.
    /// `row_len` is the longest halo row, used to size the send buffer.
    pub fn launch<F, R>(row_len: usize, body: F) -> Result<R>
    where
        F: FnOnce(MpiComm) -> Result<R>,
    {
        let (mut universe, threading) = mpi::initialize_with_threading(Threading::Multiple)
            .ok_or_else(|| Error::invalid_config("MPI was already initialised"))?;

        if threading != Threading::Multiple {
            let e = Error::ThreadSupport(format!("{:?}", threading));
            tracing::error!("{}", e);
            universe.world().abort(1);
        }

        let per_message = row_len * std::mem::size_of::<f64>() + BSEND_OVERHEAD;
        universe.set_buffer_size(2 * BSEND_ROWS * per_message);

        let comm = MpiComm::world(&universe);
        tracing::debug!(rank = comm.rank, size = comm.size, "joined MPI world");
        match body(comm) {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::error!("{}", e);
                universe.world().abort(1)
            }
        }
    }

    fn tags(side: Side) -> (Tag, Tag) {
        // (send, receive)
        match side {
            Side::Top => (TAG_UP, TAG_DOWN),
            Side::Bottom => (TAG_DOWN, TAG_UP),
        }
    }
}

/// Completed when posted.
#[must_use]
pub struct MpiSend;

impl Wait for MpiSend {
    type Output = ();

    fn wait(self) -> Result<()> {
        Ok(())
    }
}

#[must_use]
pub struct MpiRecv<'c> {
    comm: &'c MpiComm,
    peer: usize,
    len: usize,
    tag: Tag,
}

impl Wait for MpiRecv<'_> {
    type Output = Vec<f64>;

    fn wait(self) -> Result<Vec<f64>> {
        let mut row = vec![0.0; self.len];
        self.comm
            .world
            .process_at_rank(self.peer as i32)
            .receive_into_with_tag(&mut row[..], self.tag);
        Ok(row)
    }
}

#[must_use]
pub struct MpiReduce<'c> {
    comm: &'c MpiComm,
    local: f64,
}

impl Wait for MpiReduce<'_> {
    type Output = f64;

    fn wait(self) -> Result<f64> {
        let mut global = self.local;
        self.comm
            .world
            .all_reduce_into(&self.local, &mut global, SystemOperation::max());
        Ok(global)
    }
}

impl Communicator for MpiComm {
    type SendRequest = MpiSend;
    type RecvRequest<'c> = MpiRecv<'c>;
    type ReduceRequest<'c> = MpiReduce<'c>;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        if timeout.is_some() {
            tracing::warn!("MPI waits can not time out, ignoring the halo timeout");
        }
    }

    fn isend(&self, side: Side, row: &[f64]) -> Option<MpiSend> {
        let peer = self.neighbor(side)?;
        let (tag, _) = Self::tags(side);
        self.world
            .process_at_rank(peer as i32)
            .buffered_send_with_tag(row, tag);
        Some(MpiSend)
    }

    fn irecv(&self, side: Side, len: usize) -> Option<MpiRecv<'_>> {
        let peer = self.neighbor(side)?;
        let (_, tag) = Self::tags(side);
        Some(MpiRecv {
            comm: self,
            peer,
            len,
            tag,
        })
    }

    fn iallreduce_max(&self, value: f64) -> MpiReduce<'_> {
        MpiReduce {
            comm: self,
            local: value,
        }
    }

    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    /// Every rank must contribute the same number of values.
    fn gather(&self, root: usize, data: Vec<f64>) -> Result<Option<Vec<Vec<f64>>>> {
        let root_process = self.world.process_at_rank(root as i32);
        if self.rank != root {
            root_process.gather_into(&data[..]);
            return Ok(None);
        }

        let n = data.len();
        let mut all = vec![0.0; n * self.size];
        root_process.gather_into_root(&data[..], &mut all[..]);
        Ok(Some(
            (0..self.size).map(|r| all[r * n..(r + 1) * n].to_vec()).collect(),
        ))
    }
}
