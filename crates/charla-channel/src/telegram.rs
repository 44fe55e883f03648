use async_trait::async_trait;
use charla_core::{
    CharlaError, CharlaResult, ChatEvent, DeliveryChannel, EventPayload, EventSource, InboundEvent,
};
use serde::{Deserialize, Serialize};

/// Telegram rejects messages above 4096 chars; stay safely under it.
pub const TELEGRAM_TEXT_LIMIT: usize = 4000;

/// Connection settings for the Telegram Bot API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token obtained from @BotFather.
    pub bot_token: String,
    /// API host, overridable for tests.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Server-side long-poll timeout for `getUpdates`, in seconds.
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout_secs() -> u64 {
    10
}

/// Telegram Bot API channel adapter.
///
/// Uses the Bot HTTP API for sending and long-polling (`getUpdates`) for
/// receiving. One instance serves every conversation; the bot token picks
/// the bot.
pub struct TelegramChannel {
    config: TelegramConfig,
    client: reqwest::Client,
}

// ── Telegram API wire types ─────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    #[serde(default)]
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<MessagePayload>,
}

#[derive(Debug, Deserialize)]
struct MessagePayload {
    chat: Chat,
    text: Option<String>,
    audio: Option<FileRef>,
    voice: Option<FileRef>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct FileInfo {
    file_path: String,
}

#[derive(Debug, Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
}

fn event_from_update(update: Update) -> InboundEvent {
    let Some(message) = update.message else {
        return InboundEvent::Other {
            update_id: update.update_id,
        };
    };
    // Audio wins over voice when both are present, and either wins over a
    // caption text.
    let payload = if let Some(audio) = message.audio {
        EventPayload::Audio {
            file_id: audio.file_id,
        }
    } else if let Some(voice) = message.voice {
        EventPayload::Audio {
            file_id: voice.file_id,
        }
    } else if let Some(text) = message.text {
        EventPayload::Text(text)
    } else {
        EventPayload::Unsupported
    };
    InboundEvent::Message(ChatEvent {
        chat_id: message.chat.id.to_string(),
        update_id: update.update_id,
        payload,
    })
}

/// Splits `text` into chunks of at most `limit` chars, preserving order and
/// content. Empty input yields no chunks; nothing is worth sending.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for ch in text.chars() {
        if count == limit {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

// ── Implementation ──────────────────────────────────────────────────────────

impl TelegramChannel {
    /// Creates an adapter for the bot described by `config`.
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base, self.config.bot_token, method
        )
    }

    fn file_url(&self, file_path: &str) -> String {
        format!(
            "{}/file/bot{}/{}",
            self.config.api_base, self.config.bot_token, file_path
        )
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        method: &str,
        request: reqwest::RequestBuilder,
    ) -> CharlaResult<Option<T>> {
        let response = request
            .send()
            .await
            .map_err(|e| CharlaError::Channel(format!("Telegram {method} error: {e}")))?;

        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|e| CharlaError::Channel(format!("Telegram {method} parse error: {e}")))?;

        if !body.ok {
            return Err(CharlaError::Channel(format!(
                "Telegram {method} failed: {}",
                body.description.unwrap_or_default()
            )));
        }
        Ok(body.result)
    }
}

#[async_trait]
impl EventSource for TelegramChannel {
    async fn poll(&self, offset: i64) -> CharlaResult<Vec<InboundEvent>> {
        let mut params: Vec<(&str, String)> =
            vec![("timeout", self.config.poll_timeout_secs.to_string())];
        // Offset zero means the server-side backlog; only send it once we
        // have confirmed an update.
        if offset > 0 {
            params.push(("offset", offset.to_string()));
        }

        let request = self.client.get(self.api_url("getUpdates")).query(&params);
        let updates: Vec<Update> = self
            .call("getUpdates", request)
            .await?
            .unwrap_or_default();

        if !updates.is_empty() {
            tracing::debug!(count = updates.len(), "received updates");
        }
        Ok(updates.into_iter().map(event_from_update).collect())
    }
}

#[async_trait]
impl DeliveryChannel for TelegramChannel {
    async fn send_text(&self, chat_id: &str, text: &str) -> CharlaResult<()> {
        for chunk in split_message(text, TELEGRAM_TEXT_LIMIT) {
            let payload = SendMessageRequest {
                chat_id,
                text: &chunk,
            };
            let request = self.client.post(self.api_url("sendMessage")).json(&payload);
            self.call::<serde_json::Value>("sendMessage", request)
                .await?;
        }
        Ok(())
    }

    async fn send_audio(&self, chat_id: &str, audio: Vec<u8>) -> CharlaResult<()> {
        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| CharlaError::Channel(format!("Telegram sendAudio part error: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("audio", part);

        let request = self.client.post(self.api_url("sendAudio")).multipart(form);
        self.call::<serde_json::Value>("sendAudio", request).await?;
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> CharlaResult<Vec<u8>> {
        let request = self
            .client
            .get(self.api_url("getFile"))
            .query(&[("file_id", file_id)]);
        let info: FileInfo = self
            .call("getFile", request)
            .await?
            .ok_or_else(|| CharlaError::Channel("getFile returned no result".to_string()))?;

        let response = self
            .client
            .get(self.file_url(&info.file_path))
            .send()
            .await
            .map_err(|e| CharlaError::Channel(format!("Telegram download error: {e}")))?;
        if !response.status().is_success() {
            return Err(CharlaError::Channel(format!(
                "Telegram download failed: {}",
                response.status()
            )));
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|e| CharlaError::Channel(format!("Telegram download error: {e}")))?;
        Ok(bytes.to_vec())
    }
}
