//! The network coordinator.
//!
//! `Network` owns every unit, wires them into a complete graph and drives
//! training and recall. A launch moves each unit into its own tokio task and
//! waits on a completion channel created for that launch alone; the units
//! come back through it, in whatever order they finish, and are re-sorted by
//! id. Nothing is shared between workers except the links themselves.

use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::HopfieldConfig;
use crate::energy;
use crate::error::{ConnectionError, HopfieldError, Result, ValidationError, WaitPoint};
use crate::link::{self, Axon};
use crate::unit::{ensure_bipolar, Completion, Mode, Unit};

#[derive(Debug)]
pub struct Network {
    units: Vec<Unit>,
    config: HopfieldConfig,
    /// Units not back from a launch; non-zero poisons the network
    lost: usize,
}

/// Length and domain check for one pattern against an `n`-unit network.
pub fn validate_pattern(pattern: &[f32], n: usize) -> core::result::Result<(), ValidationError> {
    if pattern.len() != n {
        return Err(ValidationError::LengthMismatch {
            expected: n,
            actual: pattern.len(),
        });
    }
    for (index, &value) in pattern.iter().enumerate() {
        ensure_bipolar(index, value)?;
    }
    Ok(())
}

impl Network {
    /// Fully connected network of `n` units with the default config.
    pub fn new(n: usize) -> Result<Self> {
        Self::with_config(n, HopfieldConfig::default())
    }

    /// Fully connected network of `n` units.
    pub fn with_config(n: usize, config: HopfieldConfig) -> Result<Self> {
        let mut network = Self::isolated(n, config);
        for i in 0..n {
            for j in (i + 1)..n {
                network.connect(i, j)?;
            }
        }
        info!(units = n, links = n * n.saturating_sub(1) / 2, "network built");
        Ok(network)
    }

    /// `n` units with no links at all; wire them with [`Network::connect`].
    pub fn isolated(n: usize, config: HopfieldConfig) -> Self {
        Self {
            units: (0..n).map(Unit::new).collect(),
            config,
            lost: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn config(&self) -> &HopfieldConfig {
        &self.config
    }

    pub fn unit(&self, id: usize) -> Option<&Unit> {
        self.units.get(id).filter(|u| u.id() == id)
    }

    pub fn units(&self) -> impl Iterator<Item = &Unit> + '_ {
        self.units.iter()
    }

    /// Link units `i` and `j`.
    pub fn connect(&mut self, i: usize, j: usize) -> Result<()> {
        self.ensure_whole()?;
        self.check_unit(i)?;
        self.check_unit(j)?;
        if i == j {
            return Err(ConnectionError::SelfLink { unit: i }.into());
        }
        let (a, b) = pair_mut(&mut self.units, i, j);
        a.connect(b)
    }

    /// Feed one value per unit. Nothing is fed unless the whole pattern is valid.
    pub fn feed(&mut self, pattern: &[f32]) -> Result<()> {
        self.ensure_whole()?;
        validate_pattern(pattern, self.units.len())?;
        for (unit, &value) in self.units.iter_mut().zip(pattern) {
            unit.feed(value)?;
        }
        Ok(())
    }

    pub fn feed_unit(&mut self, id: usize, value: f32) -> Result<()> {
        self.ensure_whole()?;
        self.check_unit(id)?;
        self.units[id].feed(value)
    }

    /// Feed a uniformly random bipolar pattern and return it.
    pub fn feed_random<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<Vec<f32>> {
        let pattern: Vec<f32> = (0..self.units.len())
            .map(|_| if rng.gen_bool(0.5) { 1.0 } else { -1.0 })
            .collect();
        self.feed(&pattern)?;
        Ok(pattern)
    }

    /// Learn `patterns` by Hebb's rule, discarding any earlier weights.
    ///
    /// Every pattern is validated before a single unit changes. Units are put
    /// back in recall mode afterwards, whether or not training succeeded.
    pub async fn train<P: AsRef<[f32]>>(&mut self, patterns: &[P]) -> Result<()> {
        self.ensure_whole()?;
        let n = self.units.len();
        for (pattern, p) in patterns.iter().enumerate() {
            let p = p.as_ref();
            if p.len() != n {
                return Err(ValidationError::TrainingLengthMismatch {
                    pattern,
                    expected: n,
                    actual: p.len(),
                }
                .into());
            }
            for (index, &value) in p.iter().enumerate() {
                ensure_bipolar(index, value)?;
            }
        }

        // An unread stimulus would shift every training round by one
        for unit in &mut self.units {
            unit.drain();
            unit.set_mode(Mode::Training);
        }
        let feeders: Vec<Axon> = self.units.iter().map(Unit::stimulus_sender).collect();

        debug!(units = n, patterns = patterns.len(), "training launch");
        let completions = self.launch(patterns.len());
        let fed = feed_patterns(&feeders, patterns, self.config.exchange_timeout()).await;
        drop(feeders);
        let joined = self.join(n, completions).await;

        for unit in &mut self.units {
            unit.set_mode(Mode::Recall);
        }
        joined.and(fed)?;

        info!(units = n, patterns = patterns.len(), "training complete");
        Ok(())
    }

    /// Run `rounds` recall rounds from the values already fed.
    pub async fn run(&mut self, rounds: usize) -> Result<()> {
        self.ensure_whole()?;
        let n = self.units.len();
        debug!(units = n, rounds, "recall launch");
        let completions = self.launch(rounds);
        self.join(n, completions).await?;
        info!(
            units = n,
            rounds,
            energy = energy::energy(&self.units, &self.potentials()),
            "recall complete"
        );
        Ok(())
    }

    /// Feed `pattern`, run `rounds` recall rounds and return the settled state.
    pub async fn recall(&mut self, pattern: &[f32], rounds: usize) -> Result<Vec<f32>> {
        self.feed(pattern)?;
        self.run(rounds).await?;
        Ok(self.potentials())
    }

    /// Current potentials. A poisoned network only holds the units that came back.
    pub fn potentials(&self) -> Vec<f32> {
        self.units.iter().map(Unit::potential).collect()
    }

    /// Energy of the current potentials.
    pub fn energy(&self) -> Result<f32> {
        self.ensure_whole()?;
        Ok(energy::energy(&self.units, &self.potentials()))
    }

    /// Energy `state` would have under the current weights and thresholds.
    pub fn energy_of(&self, state: &[f32]) -> Result<f32> {
        self.ensure_whole()?;
        if state.len() != self.units.len() {
            return Err(ValidationError::LengthMismatch {
                expected: self.units.len(),
                actual: state.len(),
            }
            .into());
        }
        Ok(energy::energy(&self.units, state))
    }

    pub fn weight(&self, i: usize, j: usize) -> Option<f32> {
        self.unit(i).and_then(|u| u.weight(j))
    }

    /// Dense weight matrix; missing entries and the diagonal read as zero.
    pub fn weight_matrix(&self) -> Vec<Vec<f32>> {
        let n = self.units.len();
        let mut w = vec![vec![0.0f32; n]; n];
        for (row, unit) in w.iter_mut().zip(&self.units) {
            for (peer, weight) in unit.weights() {
                if let Some(cell) = row.get_mut(peer) {
                    *cell = weight;
                }
            }
        }
        w
    }

    pub fn threshold(&self, id: usize) -> Option<f32> {
        self.unit(id).map(Unit::threshold)
    }

    /// Set `w_ij` and `w_ji` directly, bypassing training.
    pub fn set_weight(&mut self, i: usize, j: usize, w: f32) -> Result<()> {
        self.ensure_whole()?;
        self.check_unit(i)?;
        self.check_unit(j)?;
        if i == j {
            return Err(ValidationError::SelfWeight { unit: i }.into());
        }
        self.units[i].set_weight(j, w);
        self.units[j].set_weight(i, w);
        Ok(())
    }

    pub fn set_threshold(&mut self, id: usize, th: f32) -> Result<()> {
        self.ensure_whole()?;
        self.check_unit(id)?;
        self.units[id].set_threshold(th);
        Ok(())
    }

    /// Move every unit into its own task.
    ///
    /// The network counts as poisoned until `join` has every unit
    /// back, so dropping the launching future part-way leaves it poisoned
    /// rather than silently empty.
    fn launch(&mut self, rounds: usize) -> mpsc::Receiver<Completion> {
        let limit = self.config.exchange_timeout();
        self.lost = self.units.len();
        let (done, completions) = mpsc::channel(self.units.len().max(1));
        for unit in self.units.drain(..) {
            tokio::spawn(unit.run(rounds, limit, done.clone()));
        }
        completions
    }

    /// Collect `expected` completions and put the units back in id order.
    async fn join(
        &mut self,
        expected: usize,
        mut completions: mpsc::Receiver<Completion>,
    ) -> Result<()> {
        let mut units = Vec::with_capacity(expected);
        let mut failure = None;

        // Closes once every worker has reported (or died)
        while let Some(Completion { unit, outcome }) = completions.recv().await {
            if let Err(e) = outcome {
                failure.get_or_insert(e);
            }
            units.push(unit);
        }
        units.sort_by_key(Unit::id);
        self.units = units;

        let lost = expected - self.units.len();
        self.lost = lost;
        if lost > 0 {
            warn!(lost, "workers lost, network poisoned");
            return Err(HopfieldError::Poisoned { lost });
        }

        if let Some(e) = failure {
            let dropped: usize = self.units.iter_mut().map(Unit::drain).sum();
            warn!(error = %e, dropped, "launch aborted, links drained");
            return Err(e);
        }
        Ok(())
    }

    fn ensure_whole(&self) -> Result<()> {
        if self.lost > 0 {
            return Err(HopfieldError::Poisoned { lost: self.lost });
        }
        Ok(())
    }

    fn check_unit(&self, id: usize) -> Result<()> {
        if id >= self.units.len() {
            return Err(ValidationError::UnitOutOfRange {
                unit: id,
                len: self.units.len(),
            }
            .into());
        }
        Ok(())
    }
}

/// Hand pattern `k` to every unit before pattern `k + 1`. Each send parks
/// until the unit has taken the previous value out of its cell.
async fn feed_patterns<P: AsRef<[f32]>>(
    feeders: &[Axon],
    patterns: &[P],
    limit: Option<Duration>,
) -> Result<()> {
    for (k, pattern) in patterns.iter().enumerate() {
        for (unit, (axon, &value)) in feeders.iter().zip(pattern.as_ref()).enumerate() {
            link::within(limit, unit, WaitPoint::Feed { pattern: k }, axon.send(value))
                .await?
                .map_err(|_| HopfieldError::LinkClosed {
                    from: unit,
                    to: unit,
                })?;
        }
        debug!(pattern = k, "pattern fed");
    }
    Ok(())
}

fn pair_mut(units: &mut [Unit], i: usize, j: usize) -> (&mut Unit, &mut Unit) {
    if i < j {
        let (lo, hi) = units.split_at_mut(j);
        (&mut lo[i], &mut hi[0])
    } else {
        let (lo, hi) = units.split_at_mut(i);
        (&mut hi[0], &mut lo[j])
    }
}
