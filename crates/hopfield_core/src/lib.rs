//! Discrete Hopfield associative memory with one concurrent worker per unit.
//!
//! Units never share memory. Every pair is joined by a [`link`]: two
//! single-slot channels, one per direction. Each round a unit sends its
//! potential to every peer and only then receives from every peer, so rounds
//! act as global barriers without any barrier object.
//!
//! ```no_run
//! use hopfield_core::Network;
//!
//! # async fn demo() -> hopfield_core::Result<()> {
//! let mut network = Network::new(4)?;
//! network.train(&[[1.0f32, -1.0, 1.0, -1.0]]).await?;
//! let settled = network.recall(&[1.0, -1.0, -1.0, -1.0], 10).await?;
//! assert_eq!(settled, vec![1.0, -1.0, 1.0, -1.0]);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod energy;
pub mod error;
pub mod link;
pub mod network;
pub mod unit;

pub use config::HopfieldConfig;
pub use error::{ConnectionError, HopfieldError, Result, ValidationError, WaitPoint};
pub use network::Network;
pub use unit::{Mode, Unit};
