use crate::registry::SessionRegistry;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Background task that periodically evicts idle conversation workers.
pub struct IdleReaper {
    registry: Arc<SessionRegistry>,
    interval: Duration,
}

impl IdleReaper {
    /// Creates a reaper sweeping `registry` every `interval`.
    pub fn new(registry: Arc<SessionRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    /// Starts the sweep loop. The task runs until the process exits.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.interval).await;
                let reaped = self.registry.sweep_idle().await;
                if reaped > 0 {
                    let live = self.registry.len().await;
                    tracing::info!(reaped, live, "evicted idle sessions");
                }
            }
        })
    }
}
