//! In-process runtime: every rank lives in the same process.
//!
//! Ranks are connected pairwise by unbounded tokio channels, so a group can
//! be driven from tasks of one runtime. When a rank is dropped, peers
//! waiting on it observe [`Error::Disconnected`] instead of stalling.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::group::{Group, Transport};
use crate::wire::Frame;
use crate::{Error, RankContext};

pub type LocalCommunicator = Group<ChannelTransport>;

/// Channel endpoints of one rank, indexed by peer rank.
pub struct ChannelTransport {
    outboxes: Vec<Option<UnboundedSender<Frame>>>,
    inboxes: Vec<Option<Mutex<UnboundedReceiver<Frame>>>>,
}

/// Creates a fully connected group of `size` in-process communicators.
///
/// The communicator at index `i` has rank `i`.
pub fn group(size: usize) -> Result<Vec<LocalCommunicator>, Error> {
    if size == 0 {
        return Err(Error::InvalidSize(size));
    }

    let mut outboxes: Vec<Vec<Option<UnboundedSender<Frame>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();
    let mut inboxes: Vec<Vec<Option<Mutex<UnboundedReceiver<Frame>>>>> =
        (0..size).map(|_| (0..size).map(|_| None).collect()).collect();

    for src in 0..size {
        for dst in 0..size {
            if src != dst {
                let (tx, rx) = unbounded_channel();
                outboxes[src][dst] = Some(tx);
                inboxes[dst][src] = Some(Mutex::new(rx));
            }
        }
    }

    outboxes
        .into_iter()
        .zip(inboxes)
        .enumerate()
        .map(|(rank, (outboxes, inboxes))| {
            let ctx = RankContext::new(rank, size)?;
            Ok(Group::new(ctx, ChannelTransport { outboxes, inboxes }))
        })
        .collect()
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&self, peer: usize, frame: Frame) -> Result<(), Error> {
        let size = self.outboxes.len();
        let tx = self
            .outboxes
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidRank { rank: peer, size })?;
        tx.send(frame).map_err(|_| Error::Disconnected(peer))
    }

    async fn recv(&self, peer: usize) -> Result<Frame, Error> {
        let size = self.inboxes.len();
        let inbox = self
            .inboxes
            .get(peer)
            .and_then(Option::as_ref)
            .ok_or(Error::InvalidRank { rank: peer, size })?;
        inbox
            .lock()
            .await
            .recv()
            .await
            .ok_or(Error::Disconnected(peer))
    }
}
