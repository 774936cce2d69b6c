//! Distributed dense matrix multiplication.
//!
//! `matrix-mul` computes C = A × B for N×N matrices over a group of
//! cooperating processes. The coordinator (rank 0) broadcasts B, scatters
//! contiguous row blocks of A, every rank multiplies its block by B, and the
//! blocks of C are gathered back at the coordinator, which checks them
//! against a sequential product.
//!
//! # Protocol
//!
//! Every rank performs the same sequence of collectives:
//!
//! 1. **broadcast** B from rank 0
//! 2. **scatter** rows of A according to [`partition::plan`]
//! 3. **barrier**, start the clock, compute the local block
//! 4. **gather** the blocks of C at rank 0
//! 5. **barrier**, stop the clock
//!
//! The row assignment is derived independently on every rank from N and the
//! group size and never sent over the wire.
//!
//! # Example
//!
//! ```no_run
//! use matrix_mul::{RunConfig, run_in_process};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = run_in_process(4, RunConfig::with_n(8)).await?;
//!     assert!(report.is_verified());
//!     Ok(())
//! }
//! ```

pub mod config;
mod error;
mod matrix;
mod matrix_mul;
pub mod partition;
pub mod verify;
pub mod worker;

pub use config::{ComputeMode, RunConfig, VerifyMode};
pub use error::Error;
pub use matrix::Matrix;
pub use matrix_mul::{
    MatrixMul, Operands, Product, ROOT, Report, Verification, generate_operands, run_in_process,
    run_tcp,
};
