//! Error taxonomy for the Hopfield engine.
//!
//! Validation and connection errors are raised synchronously, before any unit
//! is mutated. `DeadlockTimeout` is how a stalled rendezvous (a missing feed,
//! a peer that never arrives) surfaces instead of hanging forever.

use core::fmt;
use std::time::Duration;

use thiserror::Error;

pub type Result<T> = core::result::Result<T, HopfieldError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HopfieldError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("connection failed: {0}")]
    Connection(#[from] ConnectionError),

    /// A bounded wait inside a worker (or the training feeder) elapsed.
    #[error("unit {unit} stalled {wait_point} for {waited:?}")]
    DeadlockTimeout {
        unit: usize,
        wait_point: WaitPoint,
        waited: Duration,
    },

    #[error("link {from} -> {to} closed mid-exchange")]
    LinkClosed { from: usize, to: usize },

    /// A worker was lost, so the network no longer holds all of its units.
    #[error("network poisoned: {lost} unit worker(s) never reported back")]
    Poisoned { lost: usize },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("pattern has {actual} values, network has {expected} units")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("pattern {pattern} has {actual} values, network has {expected} units")]
    TrainingLengthMismatch {
        pattern: usize,
        expected: usize,
        actual: usize,
    },

    #[error("value {value} at position {index} is not bipolar (-1 or 1)")]
    NotBipolar { index: usize, value: f32 },

    #[error("unit {unit} out of range for a network of {len}")]
    UnitOutOfRange { unit: usize, len: usize },

    #[error("unit {unit} cannot carry a weight to itself")]
    SelfWeight { unit: usize },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("link from unit {from} to unit {to} already exists")]
    AlreadyLinked { from: usize, to: usize },

    #[error("unit {unit} cannot link to itself")]
    SelfLink { unit: usize },
}

/// Every place a worker can suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPoint {
    /// Waiting for the fed stimulus value.
    Stimulus { round: usize },
    /// Waiting for a peer to drain our outbound slot.
    Send { peer: usize, round: usize },
    /// Waiting for a peer's value on our inbound slot.
    Receive { peer: usize, round: usize },
    /// The coordinator waiting for a unit to accept a training pattern value.
    Feed { pattern: usize },
}

impl fmt::Display for WaitPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaitPoint::Stimulus { round } => write!(f, "on stimulus (round {})", round),
            WaitPoint::Send { peer, round } => {
                write!(f, "sending to unit {} (round {})", peer, round)
            }
            WaitPoint::Receive { peer, round } => {
                write!(f, "receiving from unit {} (round {})", peer, round)
            }
            WaitPoint::Feed { pattern } => write!(f, "accepting pattern {}", pattern),
        }
    }
}
