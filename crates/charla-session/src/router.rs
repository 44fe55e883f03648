use crate::config::SessionConfig;
use crate::registry::SessionRegistry;
use charla_core::{CharlaResult, EventSource, InboundEvent};
use std::sync::Arc;

/// Intake loop: pulls platform updates and hands them to the registry.
///
/// The cursor advances past an update once it has been enqueued (or found
/// to carry no message), never waiting for the reply, so one slow
/// conversation cannot stall intake for the rest.
pub struct EventRouter {
    source: Arc<dyn EventSource>,
    registry: Arc<SessionRegistry>,
    config: SessionConfig,
    offset: i64,
}

impl EventRouter {
    /// Creates a router starting from the platform's pending backlog.
    pub fn new(
        source: Arc<dyn EventSource>,
        registry: Arc<SessionRegistry>,
        config: SessionConfig,
    ) -> Self {
        Self {
            source,
            registry,
            config,
            offset: 0,
        }
    }

    /// Runs the intake loop.
    ///
    /// Poll failures are logged and retried after a backoff. A dispatch
    /// failure means a worker could not be brought up for a conversation;
    /// that is not survivable and propagates.
    pub async fn run(&mut self) -> CharlaResult<()> {
        loop {
            let updates = match self.source.poll(self.offset).await {
                Ok(updates) => updates,
                Err(error) => {
                    tracing::error!(%error, "polling for updates failed");
                    tokio::time::sleep(self.config.poll_backoff()).await;
                    continue;
                }
            };

            for update in updates {
                let next = update.sequence() + 1;
                if let InboundEvent::Message(event) = update {
                    self.registry.dispatch(event).await?;
                }
                self.offset = next;
            }
        }
    }
}
