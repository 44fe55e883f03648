//! Core types and error definitions for the Charla relay.
//!
//! This crate provides the foundational types shared across all Charla
//! crates: error handling, the inbound event model produced by a chat
//! platform, and the collaborator traits the conversation pipeline is
//! built against.
//!
//! # Main types
//!
//! - [`CharlaError`] — Unified error enum for all Charla subsystems.
//! - [`CharlaResult`] — Convenience alias for `Result<T, CharlaError>`.
//! - [`InboundEvent`] — A platform update, tagged by whether it carries a
//!   conversation message.
//! - [`ChatEvent`] — A message addressed to one conversation.
//! - [`EventPayload`] — Text, audio, or unsupported message content.

/// Collaborator traits for generation, speech, delivery and intake.
pub mod traits;

pub use traits::{DeliveryChannel, EventSource, ReplyGenerator, SpeechService};

// --- Error types ---

/// Top-level error type for the Charla relay.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum CharlaError {
    /// An error from the chat platform adapter (polling, sending, downloads).
    #[error("Channel error: {0}")]
    Channel(String),

    /// An error reported by a generation or speech backend.
    #[error("Provider error: {0}")]
    Provider(String),

    /// An error from an outbound HTTP request before the backend answered.
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error in session bookkeeping (worker spawn, registry state).
    #[error("Session error: {0}")]
    Session(String),

    /// An error reading or writing persisted conversation history.
    #[error("History error: {0}")]
    History(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A convenience `Result` alias using [`CharlaError`].
pub type CharlaResult<T> = Result<T, CharlaError>;

// --- Inbound events ---

/// The content of a [`ChatEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventPayload {
    /// A plain text message.
    Text(String),
    /// A voice or audio message, identified by a platform file handle.
    Audio {
        /// Platform identifier used to download the audio bytes.
        file_id: String,
    },
    /// A message of a kind the relay does not handle (stickers, photos, ...).
    Unsupported,
}

/// A single inbound message addressed to one conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEvent {
    /// Conversation identifier; all events with the same id are serialized.
    pub chat_id: String,
    /// Monotonic platform sequence number of the update that carried this.
    pub update_id: i64,
    /// What the user sent.
    pub payload: EventPayload,
}

impl ChatEvent {
    /// Creates a text event.
    pub fn text(chat_id: impl Into<String>, update_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            update_id,
            payload: EventPayload::Text(text.into()),
        }
    }

    /// Creates an audio event carrying a platform file handle.
    pub fn audio(chat_id: impl Into<String>, update_id: i64, file_id: impl Into<String>) -> Self {
        Self {
            chat_id: chat_id.into(),
            update_id,
            payload: EventPayload::Audio {
                file_id: file_id.into(),
            },
        }
    }
}

/// One update received from the chat platform.
///
/// Updates that do not carry a conversation message (member joins, edits,
/// callback queries) still advance the intake cursor, so they are kept as
/// [`InboundEvent::Other`] rather than dropped at the wire boundary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// An update carrying a message for one conversation.
    Message(ChatEvent),
    /// Any other update; only its sequence number matters.
    Other {
        /// Monotonic platform sequence number of the update.
        update_id: i64,
    },
}

impl InboundEvent {
    /// The platform sequence number, used to advance the intake cursor.
    pub fn sequence(&self) -> i64 {
        match self {
            Self::Message(event) => event.update_id,
            Self::Other { update_id } => *update_id,
        }
    }
}
