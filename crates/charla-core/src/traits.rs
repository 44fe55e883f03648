use crate::{CharlaResult, InboundEvent};
use async_trait::async_trait;

/// Produces an assistant reply from a user query and conversation context.
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    /// Generates a reply to `query`, given the newline-joined `context` of
    /// prior conversation turns (oldest first, possibly empty).
    async fn generate(&self, query: &str, context: &str) -> CharlaResult<String>;

    /// Detects the language of `text` as an ISO 639-1 code.
    ///
    /// Infallible: implementations fall back to their default language
    /// rather than failing a reply over detection.
    async fn detect_language(&self, text: &str) -> String;
}

/// Converts between audio bytes and text.
#[async_trait]
pub trait SpeechService: Send + Sync {
    /// Transcribes spoken audio to text.
    async fn transcribe(&self, audio: Vec<u8>) -> CharlaResult<String>;

    /// Synthesizes `text` to audio using a voice appropriate for
    /// `language` (ISO 639-1).
    async fn synthesize(&self, text: &str, language: &str) -> CharlaResult<Vec<u8>>;
}

/// Outbound side of the chat platform.
#[async_trait]
pub trait DeliveryChannel: Send + Sync {
    /// Sends a text reply to one conversation.
    ///
    /// Implementations split `text` into platform-sized chunks and deliver
    /// them in order; callers never chunk.
    async fn send_text(&self, chat_id: &str, text: &str) -> CharlaResult<()>;

    /// Sends synthesized audio to one conversation.
    async fn send_audio(&self, chat_id: &str, audio: Vec<u8>) -> CharlaResult<()>;

    /// Downloads a platform-hosted file (for example a voice note).
    async fn download_file(&self, file_id: &str) -> CharlaResult<Vec<u8>>;
}

/// Inbound side of the chat platform.
#[async_trait]
pub trait EventSource: Send + Sync {
    /// Long-polls for updates with a sequence number of at least `offset`.
    ///
    /// Returns an empty vec on quiet periods. Updates are returned in
    /// ascending sequence order.
    async fn poll(&self, offset: i64) -> CharlaResult<Vec<InboundEvent>>;
}
