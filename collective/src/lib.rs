//! Collective communication for groups of cooperating processes.
//!
//! `collective` provides the small set of collective operations a
//! single-program-multiple-data run needs: broadcast, variable-size scatter,
//! variable-size gather and barrier. Every participant must call the same
//! collectives in the same order; a participant that never arrives stalls the
//! whole group.
//!
//! # Runtimes
//!
//! - [`local`]: an in-process group of communicators wired by channels, one
//!   per rank. Each rank is typically driven by its own tokio task.
//! - [`tcp`]: one process per rank, fully meshed over TCP. Launch parameters
//!   are read from `MATMUL_RANK`, `MATMUL_SIZE` and `MATMUL_PEERS`.
//!
//! Both runtimes implement [`Communicator`] through [`Group`], which builds
//! every collective as a star through the collective's root on top of a
//! point-to-point [`Transport`].
//!
//! # Example
//!
//! ```no_run
//! use collective::{Communicator, local};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut handles = Vec::new();
//!     for comm in local::group(2)? {
//!         handles.push(tokio::spawn(async move {
//!             let mut buf = if comm.context().is_root(0) { vec![1.0, 2.0] } else { vec![0.0; 2] };
//!             comm.broadcast(&mut buf, 0).await?;
//!             Ok::<_, collective::Error>(buf)
//!         }));
//!     }
//!     for handle in handles {
//!         assert_eq!(handle.await??, vec![1.0, 2.0]);
//!     }
//!     Ok(())
//! }
//! ```

mod comm;
mod context;
mod error;
mod group;
pub mod local;
pub mod tcp;
pub mod wire;

pub use comm::Communicator;
pub use context::RankContext;
pub use error::Error;
pub use group::{Group, Transport};
pub use wire::{Frame, Tag};
