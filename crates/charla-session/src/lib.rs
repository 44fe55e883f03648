//! Conversation lifecycle for the Charla relay.
//!
//! Each active conversation is owned by a [`SessionWorker`]: a spawned task
//! draining an unbounded queue, so events within one chat are processed
//! strictly in arrival order while separate chats proceed concurrently.
//! The [`SessionRegistry`] maps chat ids to live workers and serializes
//! creation against eviction; the [`IdleReaper`] evicts quiet workers and
//! persists their history; the [`EventRouter`] feeds the registry from a
//! platform event source.
//!
//! # Main types
//!
//! - [`SessionWorker`] — Per-conversation queue and drain task.
//! - [`SessionRegistry`] — Chat id to worker map, the only place workers
//!   are created or removed.
//! - [`IdleReaper`] — Background eviction of idle workers.
//! - [`EventRouter`] — Intake loop with cursor management.
//! - [`HistoryWindow`] — Bounded sliding window of transcript lines.
//! - [`HistoryStore`] / [`FileHistoryStore`] — Persistence of windows.

/// Timing and capacity knobs.
pub mod config;
/// Bounded sliding window of transcript lines.
pub mod history;
/// Background eviction of idle workers.
pub mod reaper;
/// Chat id to worker map.
pub mod registry;
/// Intake loop and cursor management.
pub mod router;
/// History persistence.
pub mod store;
/// Transcript line model and on-disk tags.
pub mod transcript;
/// Per-conversation queue and drain task.
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::SessionConfig;
pub use history::HistoryWindow;
pub use reaper::IdleReaper;
pub use registry::SessionRegistry;
pub use router::EventRouter;
pub use store::{FileHistoryStore, HistoryStore};
pub use transcript::{Speaker, TranscriptLine};
pub use worker::{Collaborators, SessionWorker};
