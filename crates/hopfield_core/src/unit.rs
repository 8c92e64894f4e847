//! A single Hopfield unit and the per-round protocols its worker runs.
//!
//! Each unit owns its potential, threshold and per-peer weights outright.
//! Nothing else ever writes them: while a worker runs, the unit itself is
//! moved into the task and handed back through the completion channel.
//!
//! Peers are keyed by id in `BTreeMap`s, so both the send sweep and the
//! receive sweep visit peers in ascending id order.

use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc::Sender;
use tracing::{debug, warn};

use crate::error::{ConnectionError, HopfieldError, Result, ValidationError, WaitPoint};
use crate::link::{self, Axon, Dendrite};

/// Potential a unit holds before it has ever been fed
pub const QUIESCENT: f32 = -1.0;

/// Which protocol the worker runs on the next launch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mode {
    /// Weights are learned from fed patterns (Hebb's rule)
    Training,
    /// Potentials evolve under fixed weights and thresholds
    #[default]
    Recall,
}

/// What a worker reports when it stops: the unit itself plus how it went.
#[derive(Debug)]
pub(crate) struct Completion {
    pub unit: Unit,
    pub outcome: Result<()>,
}

#[derive(Debug)]
pub struct Unit {
    id: usize,
    weights: BTreeMap<usize, f32>,
    inbound: BTreeMap<usize, Dendrite>,
    outbound: BTreeMap<usize, Axon>,
    potential: f32,
    threshold: f32,
    mode: Mode,
    stimulus_tx: Axon,
    stimulus: Dendrite,
}

/// `value` must be exactly -1 or 1.
pub fn ensure_bipolar(index: usize, value: f32) -> core::result::Result<(), ValidationError> {
    if value == 1.0 || value == -1.0 {
        Ok(())
    } else {
        Err(ValidationError::NotBipolar { index, value })
    }
}

impl Unit {
    pub fn new(id: usize) -> Self {
        let (stimulus_tx, stimulus) = link::axon();
        Self {
            id,
            weights: BTreeMap::new(),
            inbound: BTreeMap::new(),
            outbound: BTreeMap::new(),
            potential: QUIESCENT,
            threshold: 0.0,
            mode: Mode::Recall,
            stimulus_tx,
            stimulus,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn potential(&self) -> f32 {
        self.potential
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Weight towards `peer`, if one has been recorded
    pub fn weight(&self, peer: usize) -> Option<f32> {
        self.weights.get(&peer).copied()
    }

    /// `(peer, weight)` pairs in ascending peer order
    pub fn weights(&self) -> impl Iterator<Item = (usize, f32)> + '_ {
        self.weights.iter().map(|(&peer, &w)| (peer, w))
    }

    /// Ids this unit sends to, ascending
    pub fn peers(&self) -> impl Iterator<Item = usize> + '_ {
        self.outbound.keys().copied()
    }

    pub fn is_linked_to(&self, peer: usize) -> bool {
        self.outbound.contains_key(&peer) && self.inbound.contains_key(&peer)
    }

    /// Link this unit and `peer` with one single-slot channel in each direction.
    ///
    /// Fails without touching either unit if any half of the link already
    /// exists, or if `peer` carries this unit's own id.
    pub fn connect(&mut self, peer: &mut Unit) -> Result<()> {
        if self.id == peer.id {
            return Err(ConnectionError::SelfLink { unit: self.id }.into());
        }
        if self.outbound.contains_key(&peer.id) || peer.inbound.contains_key(&self.id) {
            return Err(ConnectionError::AlreadyLinked {
                from: self.id,
                to: peer.id,
            }
            .into());
        }
        if peer.outbound.contains_key(&self.id) || self.inbound.contains_key(&peer.id) {
            return Err(ConnectionError::AlreadyLinked {
                from: peer.id,
                to: self.id,
            }
            .into());
        }

        let (to_peer, from_self) = link::axon();
        let (to_self, from_peer) = link::axon();
        self.outbound.insert(peer.id, to_peer);
        peer.inbound.insert(self.id, from_self);
        peer.outbound.insert(self.id, to_self);
        self.inbound.insert(peer.id, from_peer);

        self.weights.entry(peer.id).or_insert(0.0);
        peer.weights.entry(self.id).or_insert(0.0);
        Ok(())
    }

    /// Place one bipolar stimulus in the input cell, replacing any unread one.
    pub fn feed(&mut self, value: f32) -> Result<()> {
        ensure_bipolar(self.id, value)?;
        link::drain(&mut self.stimulus);
        self.stimulus_tx
            .try_send(value)
            .map_err(|_| HopfieldError::LinkClosed {
                from: self.id,
                to: self.id,
            })
    }

    pub(crate) fn stimulus_sender(&self) -> Axon {
        self.stimulus_tx.clone()
    }

    pub(crate) fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
    }

    pub(crate) fn set_weight(&mut self, peer: usize, w: f32) {
        self.weights.insert(peer, w);
    }

    pub(crate) fn set_threshold(&mut self, th: f32) {
        self.threshold = th;
    }

    /// Empty every inbound slot and the stimulus cell. Returns values dropped.
    pub(crate) fn drain(&mut self) -> usize {
        let mut dropped = link::drain(&mut self.stimulus);
        for dendrite in self.inbound.values_mut() {
            dropped += link::drain(dendrite);
        }
        dropped
    }

    /// Worker body: run `rounds` rounds of the current mode, then hand the
    /// unit back on `done`. Exactly one completion is sent per launch.
    pub(crate) async fn run(mut self, rounds: usize, limit: Option<Duration>, done: Sender<Completion>) {
        debug!(unit = self.id, mode = ?self.mode, rounds, "worker start");

        let outcome = match self.mode {
            Mode::Training => self.train(rounds, limit).await,
            Mode::Recall => self.recall(rounds, limit).await,
        };

        match &outcome {
            Ok(()) => debug!(unit = self.id, potential = self.potential, "worker finish"),
            Err(e) => warn!(unit = self.id, error = %e, "worker aborted"),
        }

        // The coordinator owns the receiver for the whole launch.
        let _ = done.send(Completion { unit: self, outcome }).await;
    }

    /// Hebbian accumulation: one fed pattern value per round.
    async fn train(&mut self, rounds: usize, limit: Option<Duration>) -> Result<()> {
        for w in self.weights.values_mut() {
            *w = 0.0;
        }

        for round in 0..rounds {
            self.potential = self.next_stimulus(round, limit).await?;
            self.broadcast(round, limit).await?;

            for (&peer, dendrite) in self.inbound.iter_mut() {
                let theirs = link::receive(dendrite, peer, self.id, round, limit).await?;
                *self.weights.entry(peer).or_insert(0.0) += self.potential * theirs;
            }
        }
        Ok(())
    }

    /// Synchronous threshold update, seeded by a single fed value.
    async fn recall(&mut self, rounds: usize, limit: Option<Duration>) -> Result<()> {
        self.potential = self.next_stimulus(0, limit).await?;

        for round in 0..rounds {
            self.broadcast(round, limit).await?;

            let mut net = 0.0f32;
            for (&peer, dendrite) in self.inbound.iter_mut() {
                let theirs = link::receive(dendrite, peer, self.id, round, limit).await?;
                net += self.weights.get(&peer).copied().unwrap_or(0.0) * theirs;
            }
            net -= self.threshold;

            // Ties (net == 0) fall to -1
            self.potential = if net > 0.0 { 1.0 } else { -1.0 };
            debug!(unit = self.id, round, net, potential = self.potential, "update");
        }
        Ok(())
    }

    async fn next_stimulus(&mut self, round: usize, limit: Option<Duration>) -> Result<f32> {
        let wait_point = WaitPoint::Stimulus { round };
        link::within(limit, self.id, wait_point, self.stimulus.recv())
            .await?
            .ok_or(HopfieldError::LinkClosed {
                from: self.id,
                to: self.id,
            })
    }

    /// Send the current potential to every peer before receiving from any.
    async fn broadcast(&self, round: usize, limit: Option<Duration>) -> Result<()> {
        for (&peer, axon) in &self.outbound {
            link::transmit(axon, self.potential, self.id, peer, round, limit).await?;
        }
        Ok(())
    }
}
