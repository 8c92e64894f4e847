use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default bound on a single blocking exchange (30 s)
pub const DEFAULT_EXCHANGE_TIMEOUT_MS: u64 = 30_000;

/// Default recall iteration budget
pub const DEFAULT_RECALL_ROUNDS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HopfieldConfig {
    /// Upper bound (ms) on any single stimulus/send/receive wait; omit for no bound
    pub exchange_timeout_ms: Option<u64>,

    /// Recall rounds used when the caller does not pick a budget
    pub recall_rounds: usize,
}

impl Default for HopfieldConfig {
    fn default() -> Self {
        Self {
            exchange_timeout_ms: Some(DEFAULT_EXCHANGE_TIMEOUT_MS),
            recall_rounds: DEFAULT_RECALL_ROUNDS,
        }
    }
}

impl HopfieldConfig {
    /// Config that blocks indefinitely at every wait point, like a bare rendezvous.
    pub fn unbounded() -> Self {
        Self {
            exchange_timeout_ms: None,
            ..Self::default()
        }
    }

    pub fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn exchange_timeout(&self) -> Option<Duration> {
        self.exchange_timeout_ms.map(Duration::from_millis)
    }
}
