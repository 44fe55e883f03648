//! Generation and speech backends for the Charla relay.
//!
//! [`GeminiClient`] produces replies, optionally grounded in a file search
//! store, pinned to the language of the question. [`SpeechClient`]
//! talks to an OpenWebUI-compatible audio endpoint for Whisper
//! transcription and neural voice synthesis.

/// Gemini generation backend with language detection.
pub mod gemini;
/// Whisper transcription and voice synthesis client.
pub mod speech;

pub use gemini::{GeminiClient, GenerationConfig};
pub use speech::{SpeechClient, SpeechConfig};
