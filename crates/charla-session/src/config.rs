use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tuning knobs for workers, the idle sweep, and intake pacing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum transcript lines kept per conversation.
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Seconds without activity before a worker becomes reapable.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Seconds between idle sweeps.
    #[serde(default = "default_reap_interval_secs")]
    pub reap_interval_secs: u64,
    /// Milliseconds a drain loop waits for an event before re-checking its
    /// stop flag.
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// Seconds to back off after a failed intake poll.
    #[serde(default = "default_poll_backoff_secs")]
    pub poll_backoff_secs: u64,
}

fn default_history_capacity() -> usize {
    6
}

fn default_idle_timeout_secs() -> u64 {
    300
}

fn default_reap_interval_secs() -> u64 {
    10
}

fn default_recv_timeout_ms() -> u64 {
    1000
}

fn default_poll_backoff_secs() -> u64 {
    1
}

impl SessionConfig {
    /// Idle threshold as a [`Duration`].
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    /// Sweep interval as a [`Duration`].
    pub fn reap_interval(&self) -> Duration {
        Duration::from_secs(self.reap_interval_secs)
    }

    /// Drain-loop receive timeout as a [`Duration`].
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    /// Intake poll backoff as a [`Duration`].
    pub fn poll_backoff(&self) -> Duration {
        Duration::from_secs(self.poll_backoff_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            idle_timeout_secs: default_idle_timeout_secs(),
            reap_interval_secs: default_reap_interval_secs(),
            recv_timeout_ms: default_recv_timeout_ms(),
            poll_backoff_secs: default_poll_backoff_secs(),
        }
    }
}
