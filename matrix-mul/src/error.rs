//! Error types for matrix-mul operations.

use thiserror::Error;

use crate::verify::Mismatch;

#[derive(Debug, Error)]
pub enum Error {
    #[error("collective error: {0}")]
    Comm(#[from] collective::Error),

    #[error("matrix dimension mismatch: A is {0}x{1}, B is {2}x{3}")]
    DimensionMismatch(usize, usize, usize, usize),

    #[error("matrix data has {actual} elements, expected {rows}x{cols}")]
    Shape {
        rows: usize,
        cols: usize,
        actual: usize,
    },

    #[error("operands must be {n}x{n}, got {rows}x{cols}")]
    OperandSize { n: usize, rows: usize, cols: usize },

    #[error("degenerate process count {0}: at least one process is required")]
    DegenerateSize(usize),

    #[error("rank {0} is the root and must supply both operands")]
    MissingOperands(usize),

    #[error("matrix multiplication result mismatch: {0}")]
    VerificationFailed(Mismatch),

    #[error("rank task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
