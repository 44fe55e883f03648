use crate::config::SessionConfig;
use crate::store::HistoryStore;
use crate::worker::{Collaborators, SessionWorker};
use charla_core::{CharlaResult, ChatEvent};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Owns the map of live conversation workers.
///
/// Every transition in or out of the map (first-contact creation, event
/// hand-off, idle eviction, shutdown) runs under one async mutex. Holding
/// it across worker construction and across eviction means a worker can
/// never be stopped between lookup and enqueue. Nothing inside the lock
/// calls an external collaborator; the awaited work is history I/O only.
pub struct SessionRegistry {
    workers: Mutex<HashMap<String, Arc<SessionWorker>>>,
    collaborators: Collaborators,
    store: Arc<dyn HistoryStore>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new(
        collaborators: Collaborators,
        store: Arc<dyn HistoryStore>,
        config: SessionConfig,
    ) -> Self {
        Self {
            workers: Mutex::new(HashMap::new()),
            collaborators,
            store,
            config,
        }
    }

    /// Hands `event` to its conversation's worker, creating the worker on
    /// first contact.
    ///
    /// Worker creation loads persisted history; a failure there means the
    /// event cannot be served and propagates to the caller.
    pub async fn dispatch(&self, event: ChatEvent) -> CharlaResult<()> {
        let mut workers = self.workers.lock().await;
        let worker = self
            .resolve_or_create_locked(&mut workers, &event.chat_id)
            .await?;
        worker.enqueue(event);
        Ok(())
    }

    /// Returns the worker for `chat_id`, creating it on first contact.
    pub async fn resolve_or_create(&self, chat_id: &str) -> CharlaResult<Arc<SessionWorker>> {
        let mut workers = self.workers.lock().await;
        self.resolve_or_create_locked(&mut workers, chat_id).await
    }

    async fn resolve_or_create_locked(
        &self,
        workers: &mut HashMap<String, Arc<SessionWorker>>,
        chat_id: &str,
    ) -> CharlaResult<Arc<SessionWorker>> {
        if let Some(worker) = workers.get(chat_id) {
            return Ok(Arc::clone(worker));
        }
        let worker = SessionWorker::spawn(
            chat_id,
            self.collaborators.clone(),
            Arc::clone(&self.store),
            &self.config,
        )
        .await?;
        workers.insert(chat_id.to_string(), Arc::clone(&worker));
        tracing::info!(chat_id = %chat_id, live = workers.len(), "created session worker");
        Ok(worker)
    }

    /// Evicts workers idle past the configured threshold with no queued or
    /// in-flight events. Returns how many were evicted.
    ///
    /// Eviction persists the worker's window. A failed save is logged and
    /// the worker is evicted anyway; its durable state stays at the last
    /// successful save.
    pub async fn sweep_idle(&self) -> usize {
        let idle_timeout = self.config.idle_timeout();
        let mut workers = self.workers.lock().await;
        let expired: Vec<String> = workers
            .iter()
            .filter(|(_, worker)| worker.pending() == 0 && worker.idle_for() > idle_timeout)
            .map(|(chat_id, _)| chat_id.clone())
            .collect();

        for chat_id in &expired {
            if let Some(worker) = workers.remove(chat_id) {
                if let Err(error) = worker.stop().await {
                    tracing::error!(
                        chat_id = %chat_id,
                        %error,
                        "failed to persist history while evicting worker"
                    );
                }
            }
        }
        expired.len()
    }

    /// Stops every worker and persists its window. Used on process exit.
    pub async fn shutdown(&self) {
        let mut workers = self.workers.lock().await;
        for (chat_id, worker) in workers.drain() {
            if let Err(error) = worker.stop().await {
                tracing::error!(
                    chat_id = %chat_id,
                    %error,
                    "failed to persist history during shutdown"
                );
            }
        }
    }

    /// Number of live workers.
    pub async fn len(&self) -> usize {
        self.workers.lock().await.len()
    }

    /// Whether a worker currently exists for `chat_id`.
    pub async fn contains(&self, chat_id: &str) -> bool {
        self.workers.lock().await.contains_key(chat_id)
    }
}
