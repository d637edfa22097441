use super::request::{self, ChannelRecv, ChannelReduce, ChannelSend};
use super::{Communicator, Side, Wait};
use crate::error::Result;
use crossbeam_channel::{Receiver, Sender};
use std::time::Duration;

pub(crate) struct Link {
    pub(crate) peer: usize,
    pub(crate) tx: Sender<Vec<f64>>,
    pub(crate) rx: Receiver<Vec<f64>>,
}

/// Endpoints of one rank in a group running inside this process.
///
/// Each adjacent pair is joined by two halo links (one per direction) and
/// every ordered pair of ranks by one collective link. Dropping a rank's
/// endpoints disconnects its peers, so their waits fail instead of hanging.
pub struct ChannelComm {
    rank: usize,
    size: usize,
    top: Option<Link>,
    bottom: Option<Link>,
    peers: Vec<Link>,
    timeout: Option<Duration>,
}

impl ChannelComm {
    pub(crate) fn new(
        rank: usize,
        size: usize,
        top: Option<Link>,
        bottom: Option<Link>,
        peers: Vec<Link>,
    ) -> Self {
        ChannelComm {
            rank,
            size,
            top,
            bottom,
            peers,
            timeout: None,
        }
    }

    fn halo_link(&self, side: Side) -> Option<&Link> {
        match side {
            Side::Top => self.top.as_ref(),
            Side::Bottom => self.bottom.as_ref(),
        }
    }

    #[cfg(test)]
    pub(crate) fn peers(&self) -> &[Link] {
        &self.peers
    }
}

impl Communicator for ChannelComm {
    type SendRequest = ChannelSend;
    type RecvRequest<'c> = ChannelRecv<'c>;
    type ReduceRequest<'c> = ChannelReduce<'c>;

    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.size
    }

    fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    fn isend(&self, side: Side, row: &[f64]) -> Option<ChannelSend> {
        self.halo_link(side).map(|link| {
            let delivered = link.tx.send(row.to_vec()).is_ok();
            ChannelSend::new(self.rank, link.peer, delivered)
        })
    }

    fn irecv(&self, side: Side, len: usize) -> Option<ChannelRecv<'_>> {
        self.halo_link(side)
            .map(|link| ChannelRecv::new(self.rank, link.peer, len, &link.rx, self.timeout))
    }

    fn iallreduce_max(&self, value: f64) -> ChannelReduce<'_> {
        let mut undelivered = None;
        for link in &self.peers {
            if link.tx.send(vec![value]).is_err() && undelivered.is_none() {
                undelivered = Some(link.peer);
            }
        }
        let sources = self.peers.iter().map(|l| (l.peer, &l.rx)).collect();
        ChannelReduce::new(self.rank, value, undelivered, sources, self.timeout)
    }

    /// An all-reduce of nothing, so a lost peer fails it.
    fn barrier(&self) -> Result<()> {
        self.iallreduce_max(0.0).wait().map(|_| ())
    }

    fn gather(&self, root: usize, data: Vec<f64>) -> Result<Option<Vec<Vec<f64>>>> {
        if self.rank != root {
            if let Some(link) = self.peers.iter().find(|l| l.peer == root) {
                let delivered = link.tx.send(data).is_ok();
                ChannelSend::new(self.rank, root, delivered).wait()?;
            }
            return Ok(None);
        }

        let mut result = vec![Vec::new(); self.size];
        result[root] = data;
        for link in &self.peers {
            result[link.peer] = request::receive(self.rank, link.peer, &link.rx, self.timeout)?;
        }
        Ok(Some(result))
    }
}
