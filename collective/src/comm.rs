//! The collective contract consumed by SPMD programs.

use async_trait::async_trait;

use crate::{Error, RankContext};

/// A group of cooperating processes seen from one participant.
///
/// Every method is a collective: all participants must call the same
/// operation, with the same root and the same counts, in the same order.
/// There are no timeouts; a participant that never arrives stalls the group.
/// Any error leaves the group in an unknown state and must be treated as
/// fatal for the run.
#[async_trait]
pub trait Communicator: Send + Sync {
    /// Rank identity of this participant.
    fn context(&self) -> RankContext;

    /// Replaces every participant's `buf` with the root's contents.
    ///
    /// All participants must pass buffers of the same length.
    async fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), Error>;

    /// Distributes contiguous segments of the root's `send` buffer.
    ///
    /// `counts` and `offsets` are element counts, one entry per rank. The
    /// root passes `Some(send)`, every other rank passes `None`. Each
    /// participant's `recv` must hold exactly `counts[rank]` elements.
    async fn scatter_variable(
        &self,
        send: Option<&[f64]>,
        counts: &[usize],
        offsets: &[usize],
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), Error>;

    /// Inverse of [`scatter_variable`](Communicator::scatter_variable).
    ///
    /// Each participant's `send` is written into the segment of the root's
    /// `recv` described by `counts[rank]`/`offsets[rank]`. Only the root
    /// passes `Some(recv)`.
    async fn gather_variable(
        &self,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        offsets: &[usize],
        root: usize,
    ) -> Result<(), Error>;

    /// Returns once every participant has entered the barrier.
    async fn barrier(&self) -> Result<(), Error>;
}
