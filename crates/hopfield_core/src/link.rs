//! Point-to-point exchange primitives.
//!
//! A link between two units is two capacity-1 tokio channels, one per
//! direction. The single slot keeps at most one value in flight per directed
//! edge: a sender that runs a round ahead parks on `send` until its peer has
//! drained the previous value.
//!
//! Every wait goes through [`within`] so a configured exchange timeout turns a
//! stalled rendezvous into [`HopfieldError::DeadlockTimeout`].

use std::future::Future;
use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver, Sender};
use tracing::trace;

use crate::error::{HopfieldError, Result, WaitPoint};

/// Slots per directed edge
pub const AXON_CAPACITY: usize = 1;

/// Inbound end of a directed edge
pub type Dendrite = Receiver<f32>;
/// Outbound end of a directed edge
pub type Axon = Sender<f32>;

/// One directed edge.
pub fn axon() -> (Axon, Dendrite) {
    mpsc::channel(AXON_CAPACITY)
}

/// Await `fut`, bounded by `limit` when one is set.
///
/// Returns `DeadlockTimeout` attributed to `unit` at `wait_point` when the
/// bound elapses.
pub async fn within<F: Future>(
    limit: Option<Duration>,
    unit: usize,
    wait_point: WaitPoint,
    fut: F,
) -> Result<F::Output> {
    match limit {
        None => Ok(fut.await),
        Some(waited) => tokio::time::timeout(waited, fut).await.map_err(|_| {
            HopfieldError::DeadlockTimeout {
                unit,
                wait_point,
                waited,
            }
        }),
    }
}

/// Push `value` from `from` to `to`, parking while the slot is occupied.
pub async fn transmit(
    axon: &Axon,
    value: f32,
    from: usize,
    to: usize,
    round: usize,
    limit: Option<Duration>,
) -> Result<()> {
    let wait_point = WaitPoint::Send { peer: to, round };
    within(limit, from, wait_point, axon.send(value))
        .await?
        .map_err(|_| HopfieldError::LinkClosed { from, to })?;
    trace!(unit = from, peer = to, round, value, "sent");
    Ok(())
}

/// Take the value `from` left for `to`, parking until it arrives.
pub async fn receive(
    dendrite: &mut Dendrite,
    from: usize,
    to: usize,
    round: usize,
    limit: Option<Duration>,
) -> Result<f32> {
    let wait_point = WaitPoint::Receive { peer: from, round };
    let value = within(limit, to, wait_point, dendrite.recv())
        .await?
        .ok_or(HopfieldError::LinkClosed { from, to })?;
    trace!(unit = to, peer = from, round, value, "received");
    Ok(value)
}

/// Discard anything left in the slot, returning how many values were dropped.
pub fn drain(dendrite: &mut Dendrite) -> usize {
    let mut dropped = 0;
    while dendrite.try_recv().is_ok() {
        dropped += 1;
    }
    dropped
}
