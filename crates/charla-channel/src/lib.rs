//! Telegram Bot API adapter for the Charla relay.
//!
//! Implements both sides of the platform seam: long-polling `getUpdates`
//! as the event source, and `sendMessage` / `sendAudio` / file downloads
//! as the delivery channel. Outbound text is split into platform-sized
//! chunks here, so the conversation pipeline never needs to know the
//! message length limit.

/// Telegram client, wire types, and message chunking.
pub mod telegram;

pub use telegram::{split_message, TelegramChannel, TelegramConfig, TELEGRAM_TEXT_LIMIT};
