//! Collectives built on point-to-point frame delivery.

use async_trait::async_trait;
use tracing::debug;

use crate::wire::{Frame, Tag};
use crate::{Communicator, Error, RankContext};

/// Ordered, reliable frame delivery between this rank and one peer.
///
/// Frames sent to the same peer must arrive in the order they were sent.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, peer: usize, frame: Frame) -> Result<(), Error>;

    async fn recv(&self, peer: usize) -> Result<Frame, Error>;
}

/// A [`Communicator`] over any [`Transport`].
///
/// Every collective is a star through its root: the root exchanges exactly
/// one frame with each peer, including peers whose segment is empty. The
/// barrier is a gather to rank 0 followed by a release from rank 0.
pub struct Group<T> {
    ctx: RankContext,
    transport: T,
}

impl<T: Transport> Group<T> {
    pub fn new(ctx: RankContext, transport: T) -> Self {
        Self { ctx, transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    async fn send(&self, peer: usize, tag: Tag, payload: Vec<f64>) -> Result<(), Error> {
        debug!(peer, ?tag, elements = payload.len(), "send");
        self.transport
            .send(peer, Frame::new(tag, self.ctx.rank(), payload))
            .await
    }

    async fn expect(&self, peer: usize, tag: Tag) -> Result<Vec<f64>, Error> {
        let frame = self.transport.recv(peer).await?;
        if frame.tag != tag || frame.source != peer {
            return Err(Error::Desync {
                peer,
                expected: tag,
                actual: frame.tag,
                source_rank: frame.source,
            });
        }
        debug!(peer, ?tag, elements = frame.payload.len(), "recv");
        Ok(frame.payload)
    }

    fn check_layout(&self, counts: &[usize], offsets: &[usize]) -> Result<(), Error> {
        let size = self.ctx.size();
        if counts.len() != size {
            return Err(Error::SizeMismatch {
                op: "counts",
                expected: size,
                actual: counts.len(),
            });
        }
        if offsets.len() != size {
            return Err(Error::SizeMismatch {
                op: "offsets",
                expected: size,
                actual: offsets.len(),
            });
        }
        Ok(())
    }
}

/// Bounds of rank `r`'s segment inside a buffer of `capacity` elements.
fn segment(
    op: &'static str,
    counts: &[usize],
    offsets: &[usize],
    r: usize,
    capacity: usize,
) -> Result<std::ops::Range<usize>, Error> {
    let start = offsets[r];
    let end = start.checked_add(counts[r]).unwrap_or(usize::MAX);
    if end > capacity {
        return Err(Error::SizeMismatch {
            op,
            expected: end,
            actual: capacity,
        });
    }
    Ok(start..end)
}

fn copy_exact(op: &'static str, dst: &mut [f64], src: &[f64]) -> Result<(), Error> {
    if dst.len() != src.len() {
        return Err(Error::SizeMismatch {
            op,
            expected: dst.len(),
            actual: src.len(),
        });
    }
    dst.copy_from_slice(src);
    Ok(())
}

#[async_trait]
impl<T: Transport> Communicator for Group<T> {
    fn context(&self) -> RankContext {
        self.ctx
    }

    async fn broadcast(&self, buf: &mut [f64], root: usize) -> Result<(), Error> {
        self.ctx.check_root(root)?;
        if self.ctx.is_root(root) {
            for peer in self.ctx.peers() {
                self.send(peer, Tag::Broadcast, buf.to_vec()).await?;
            }
        } else {
            let payload = self.expect(root, Tag::Broadcast).await?;
            copy_exact("broadcast", buf, &payload)?;
        }
        Ok(())
    }

    async fn scatter_variable(
        &self,
        send: Option<&[f64]>,
        counts: &[usize],
        offsets: &[usize],
        recv: &mut [f64],
        root: usize,
    ) -> Result<(), Error> {
        self.ctx.check_root(root)?;
        self.check_layout(counts, offsets)?;
        let me = self.ctx.rank();
        if recv.len() != counts[me] {
            return Err(Error::SizeMismatch {
                op: "scatter receive buffer",
                expected: counts[me],
                actual: recv.len(),
            });
        }

        if self.ctx.is_root(root) {
            let send = send.ok_or_else(|| {
                Error::Protocol("scatter root must supply a send buffer".to_string())
            })?;
            for peer in self.ctx.peers() {
                let range = segment("scatter send buffer", counts, offsets, peer, send.len())?;
                self.send(peer, Tag::Scatter, send[range].to_vec()).await?;
            }
            let own = segment("scatter send buffer", counts, offsets, me, send.len())?;
            recv.copy_from_slice(&send[own]);
        } else {
            let payload = self.expect(root, Tag::Scatter).await?;
            copy_exact("scatter", recv, &payload)?;
        }
        Ok(())
    }

    async fn gather_variable(
        &self,
        send: &[f64],
        recv: Option<&mut [f64]>,
        counts: &[usize],
        offsets: &[usize],
        root: usize,
    ) -> Result<(), Error> {
        self.ctx.check_root(root)?;
        self.check_layout(counts, offsets)?;
        let me = self.ctx.rank();
        if send.len() != counts[me] {
            return Err(Error::SizeMismatch {
                op: "gather send buffer",
                expected: counts[me],
                actual: send.len(),
            });
        }

        if self.ctx.is_root(root) {
            let recv = recv.ok_or_else(|| {
                Error::Protocol("gather root must supply a receive buffer".to_string())
            })?;
            let capacity = recv.len();
            let own = segment("gather receive buffer", counts, offsets, me, capacity)?;
            recv[own].copy_from_slice(send);
            for peer in self.ctx.peers() {
                let range = segment("gather receive buffer", counts, offsets, peer, capacity)?;
                let payload = self.expect(peer, Tag::Gather).await?;
                copy_exact("gather", &mut recv[range], &payload)?;
            }
        } else {
            self.send(root, Tag::Gather, send.to_vec()).await?;
        }
        Ok(())
    }

    async fn barrier(&self) -> Result<(), Error> {
        if self.ctx.rank() == 0 {
            for peer in self.ctx.peers() {
                self.expect(peer, Tag::Barrier).await?;
            }
            for peer in self.ctx.peers() {
                self.send(peer, Tag::Barrier, Vec::new()).await?;
            }
        } else {
            self.send(0, Tag::Barrier, Vec::new()).await?;
            self.expect(0, Tag::Barrier).await?;
        }
        Ok(())
    }
}
