//! In-flight operation handles of the channel backend.

use super::Wait;
use crate::error::{Error, Result};
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::time::Duration;

pub(crate) fn receive(
    rank: usize,
    peer: usize,
    rx: &Receiver<Vec<f64>>,
    timeout: Option<Duration>,
) -> Result<Vec<f64>> {
    match timeout {
        None => rx.recv().map_err(|_| Error::PeerDisconnected { rank, peer }),
        Some(limit) => rx.recv_timeout(limit).map_err(|e| match e {
            RecvTimeoutError::Timeout => Error::Timeout {
                rank,
                peer,
                millis: limit.as_millis(),
            },
            RecvTimeoutError::Disconnected => {
                Error::PeerDisconnected { rank, peer }
            }
        }),
    }
}

/// A posted send. The row was copied out when the send was posted, so
/// completion only reports whether the peer was still there to take it.
#[must_use]
#[derive(Debug)]
pub struct ChannelSend {
    rank: usize,
    peer: usize,
    delivered: bool,
}

impl ChannelSend {
    pub(crate) fn new(rank: usize, peer: usize, delivered: bool) -> Self {
        ChannelSend {
            rank,
            peer,
            delivered,
        }
    }
}

impl Wait for ChannelSend {
    type Output = ();

    fn wait(self) -> Result<()> {
        if self.delivered {
            Ok(())
        } else {
            Err(Error::PeerDisconnected {
                rank: self.rank,
                peer: self.peer,
            })
        }
    }
}

/// A posted receive of one row.
#[must_use]
pub struct ChannelRecv<'c> {
    rank: usize,
    peer: usize,
    len: usize,
    rx: &'c Receiver<Vec<f64>>,
    timeout: Option<Duration>,
}

impl<'c> ChannelRecv<'c> {
    pub(crate) fn new(
        rank: usize,
        peer: usize,
        len: usize,
        rx: &'c Receiver<Vec<f64>>,
        timeout: Option<Duration>,
    ) -> Self {
        ChannelRecv {
            rank,
            peer,
            len,
            rx,
            timeout,
        }
    }
}

impl Wait for ChannelRecv<'_> {
    type Output = Vec<f64>;

    fn wait(self) -> Result<Vec<f64>> {
        let row = receive(self.rank, self.peer, self.rx, self.timeout)?;
        debug_assert_eq!(row.len(), self.len);
        Ok(row)
    }
}

/// A posted global max reduction.
#[must_use]
pub struct ChannelReduce<'c> {
    rank: usize,
    local: f64,
    undelivered: Option<usize>,
    sources: Vec<(usize, &'c Receiver<Vec<f64>>)>,
    timeout: Option<Duration>,
}

impl<'c> ChannelReduce<'c> {
    pub(crate) fn new(
        rank: usize,
        local: f64,
        undelivered: Option<usize>,
        sources: Vec<(usize, &'c Receiver<Vec<f64>>)>,
        timeout: Option<Duration>,
    ) -> Self {
        ChannelReduce {
            rank,
            local,
            undelivered,
            sources,
            timeout,
        }
    }
}

impl Wait for ChannelReduce<'_> {
    type Output = f64;

    /// Block until every rank's contribution is in, return the maximum.
    fn wait(self) -> Result<f64> {
        if let Some(peer) = self.undelivered {
            return Err(Error::PeerDisconnected {
                rank: self.rank,
                peer,
            });
        }
        let mut result = self.local;
        for (peer, rx) in self.sources {
            let message = receive(self.rank, peer, rx, self.timeout)?;
            for v in message {
                result = result.max(v);
            }
        }
        Ok(result)
    }
}
