//! Rank identity of a process within its group.

use crate::Error;

/// The `(rank, size)` pair of one participant.
///
/// Established once before any collective and valid for the whole run.
/// Components receive it by value instead of reading ambient state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankContext {
    rank: usize,
    size: usize,
}

impl RankContext {
    /// Creates a context, rejecting empty groups and out-of-range ranks.
    pub fn new(rank: usize, size: usize) -> Result<Self, Error> {
        if size == 0 {
            return Err(Error::InvalidSize(size));
        }
        if rank >= size {
            return Err(Error::InvalidRank { rank, size });
        }
        Ok(Self { rank, size })
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_root(&self, root: usize) -> bool {
        self.rank == root
    }

    /// Every rank except this one, in ascending order.
    pub fn peers(&self) -> impl Iterator<Item = usize> + use<> {
        let me = self.rank;
        (0..self.size).filter(move |&r| r != me)
    }

    pub(crate) fn check_root(&self, root: usize) -> Result<(), Error> {
        if root >= self.size {
            return Err(Error::InvalidRoot {
                root,
                size: self.size,
            });
        }
        Ok(())
    }
}
