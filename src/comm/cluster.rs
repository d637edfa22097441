use super::channel::{ChannelComm, Link};
use super::Communicator;
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Launches a group of ranks inside this process.
/// Every rank runs on its own named OS thread and only holds its own
/// `ChannelComm`, so ranks can only cooperate through messages.
pub struct Cluster;

impl Cluster {
    /// Wire up the endpoints for `size` ranks, indexed by rank.
    pub fn links(size: usize) -> Vec<ChannelComm> {
        let mut tops: Vec<Option<Link>> = (0..size).map(|_| None).collect();
        let mut bottoms: Vec<Option<Link>> = (0..size).map(|_| None).collect();
        for r in 1..size {
            let (down_tx, down_rx) = unbounded();
            let (up_tx, up_rx) = unbounded();
            bottoms[r - 1] = Some(Link {
                peer: r,
                tx: down_tx,
                rx: up_rx,
            });
            tops[r] = Some(Link {
                peer: r - 1,
                tx: up_tx,
                rx: down_rx,
            });
        }

        // senders[src][dst], receivers[dst][src]
        let mut senders: Vec<Vec<Option<Sender<Vec<f64>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        let mut receivers: Vec<Vec<Option<Receiver<Vec<f64>>>>> =
            (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
        for src in 0..size {
            for dst in 0..size {
                if src != dst {
                    let (tx, rx) = unbounded();
                    senders[src][dst] = Some(tx);
                    receivers[dst][src] = Some(rx);
                }
            }
        }

        tops.into_iter()
            .zip(bottoms)
            .zip(senders.into_iter().zip(receivers))
            .enumerate()
            .map(|(rank, ((top, bottom), (txs, rxs)))| {
                let peers = txs
                    .into_iter()
                    .zip(rxs)
                    .enumerate()
                    .filter_map(|(peer, (tx, rx))| {
                        Some(Link {
                            peer,
                            tx: tx?,
                            rx: rx?,
                        })
                    })
                    .collect();
                ChannelComm::new(rank, size, top, bottom, peers)
            })
            .collect()
    }

    /// Run `body` once per rank and collect the results, indexed by rank.
    /// A rank that panics reports `Error::RankPanicked`; its links close,
    /// so ranks waiting on it fail instead of hanging.
    pub fn launch<F, R>(size: usize, body: F) -> Vec<Result<R>>
    where
        F: Fn(ChannelComm) -> Result<R> + Sync,
        R: Send,
    {
        let comms = Self::links(size);
        let body = &body;
        std::thread::scope(|s| {
            let handles: Vec<_> = comms
                .into_iter()
                .map(|comm| {
                    let rank = comm.rank();
                    let handle = std::thread::Builder::new()
                        .name(format!("rank_{}", rank))
                        .spawn_scoped(s, move || body(comm));
                    (rank, handle)
                })
                .collect();

            handles
                .into_iter()
                .map(|(rank, handle)| match handle {
                    Ok(h) => h
                        .join()
                        .unwrap_or_else(|_| Err(Error::RankPanicked(rank))),
                    Err(e) => Err(Error::Io(e)),
                })
                .collect()
        })
    }
}
