//! Halo exchange with the two vertical neighbors.
//!
//! Each side has a send slot and a receive slot. A slot is filled when the
//! exchange for an iteration is posted and emptied by `complete`, which has
//! to run before the matching edge row is recomputed: the receive fills the
//! halo row the edge row reads, and the send must be finished before the
//! edge row it carried is overwritten.

use crate::comm::{Communicator, Side, Wait};
use crate::error::Result;

struct Channel<'c, C: Communicator + 'c> {
    send: Option<C::SendRequest>,
    recv: Option<C::RecvRequest<'c>>,
}

impl<'c, C: Communicator + 'c> Channel<'c, C> {
    fn empty() -> Self {
        Channel {
            send: None,
            recv: None,
        }
    }

    fn pending(&self) -> usize {
        self.send.is_some() as usize + self.recv.is_some() as usize
    }
}

pub struct HaloExchange<'c, C: Communicator + 'c> {
    top: Channel<'c, C>,
    bottom: Channel<'c, C>,
}

impl<'c, C: Communicator + 'c> HaloExchange<'c, C> {
    pub fn new() -> Self {
        HaloExchange {
            top: Channel::empty(),
            bottom: Channel::empty(),
        }
    }

    fn channel(&mut self, side: Side) -> &mut Channel<'c, C> {
        match side {
            Side::Top => &mut self.top,
            Side::Bottom => &mut self.bottom,
        }
    }

    /// Number of operations still in flight.
    pub fn pending(&self) -> usize {
        self.top.pending() + self.bottom.pending()
    }

    /// Wait for the last exchange on `side` and store the received row in
    /// `halo_row` (a full grid row, boundary columns included). A side that
    /// was never posted leaves `halo_row` untouched.
    pub fn complete(&mut self, side: Side, halo_row: &mut [f64]) -> Result<()> {
        let channel = self.channel(side);
        if let Some(send) = channel.send.take() {
            tracing::trace!(?side, "waiting on halo send");
            send.wait()?;
        }
        if let Some(recv) = channel.recv.take() {
            tracing::trace!(?side, "waiting on halo receive");
            let columns = halo_row.len() - 2;
            let row = recv.wait()?;
            halo_row[1..=columns].copy_from_slice(&row);
        }
        Ok(())
    }

    /// Post the next exchange on `side`: receive the neighbor's row into the
    /// halo and send `edge_row` (a full grid row) to it. Nothing is posted
    /// when there is no neighbor on that side.
    pub fn post(&mut self, comm: &'c C, side: Side, edge_row: &[f64]) {
        let columns = edge_row.len() - 2;
        let channel = self.channel(side);
        debug_assert!(channel.pending() == 0, "halo {:?} reposted while pending", side);
        channel.recv = comm.irecv(side, columns);
        channel.send = comm.isend(side, &edge_row[1..=columns]);
    }

    /// Complete everything still in flight.
    pub fn drain(&mut self, top_halo: &mut [f64], bottom_halo: &mut [f64]) -> Result<()> {
        self.complete(Side::Top, top_halo)?;
        self.complete(Side::Bottom, bottom_halo)
    }
}

impl<'c, C: Communicator + 'c> Default for HaloExchange<'c, C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::comm::{ChannelComm, Cluster};

    #[test]
    fn exchange_between_two_ranks() {
        let comms = Cluster::links(2);
        let (upper, lower) = (&comms[0], &comms[1]);
        let mut upper_halo: HaloExchange<ChannelComm> = HaloExchange::new();
        let mut lower_halo: HaloExchange<ChannelComm> = HaloExchange::new();

        // Rows are full width: boundary, 3 cells, boundary.
        upper_halo.post(upper, Side::Top, &[9.0, 9.0, 9.0, 9.0, 9.0]);
        upper_halo.post(upper, Side::Bottom, &[-1.0, 1.0, 2.0, 3.0, -1.0]);
        lower_halo.post(lower, Side::Top, &[-2.0, 4.0, 5.0, 6.0, -2.0]);
        lower_halo.post(lower, Side::Bottom, &[9.0, 9.0, 9.0, 9.0, 9.0]);
        assert_eq!(upper_halo.pending(), 2);
        assert_eq!(lower_halo.pending(), 2);

        let mut top_halo = [7.0; 5];
        let mut bottom_halo = [0.0; 5];
        upper_halo.drain(&mut top_halo, &mut bottom_halo).unwrap();
        assert_eq!(top_halo, [7.0; 5]);
        assert_eq!(bottom_halo, [0.0, 4.0, 5.0, 6.0, 0.0]);
        assert_eq!(upper_halo.pending(), 0);

        let mut top_halo = [0.0; 5];
        lower_halo.complete(Side::Top, &mut top_halo).unwrap();
        assert_eq!(top_halo, [0.0, 1.0, 2.0, 3.0, 0.0]);
        assert_eq!(lower_halo.pending(), 0);
    }

    #[test]
    fn complete_without_post_is_a_no_op() {
        let mut halo: HaloExchange<ChannelComm> = HaloExchange::new();
        let mut row = [1.0, 2.0, 3.0];
        halo.complete(Side::Top, &mut row).unwrap();
        assert_eq!(row, [1.0, 2.0, 3.0]);
    }
}
