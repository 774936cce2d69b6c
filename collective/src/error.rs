//! Error types for collective operations.

use thiserror::Error;

use crate::wire::Tag;

#[derive(Debug, Error)]
pub enum Error {
    #[error("collective runtime unavailable: {0}")]
    Unavailable(String),

    #[error("invalid group size {0}: at least one process is required")]
    InvalidSize(usize),

    #[error("rank {rank} is out of range for a group of {size}")]
    InvalidRank { rank: usize, size: usize },

    #[error("root rank {root} is out of range for a group of {size}")]
    InvalidRoot { root: usize, size: usize },

    #[error("{op}: expected {expected} elements, got {actual}")]
    SizeMismatch {
        op: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("expected {expected:?} frame from rank {peer}, got {actual:?} from rank {source_rank}")]
    Desync {
        peer: usize,
        expected: Tag,
        actual: Tag,
        source_rank: usize,
    },

    #[error("rank {0} disconnected")]
    Disconnected(usize),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("address parse error: {0}")]
    AddrParse(#[from] std::net::AddrParseError),
}
