use async_trait::async_trait;
use charla_core::{CharlaError, CharlaResult, SpeechService};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Settings for the speech endpoint (OpenWebUI-compatible audio API).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Endpoint base, e.g. `https://webui.example.com`.
    pub base_url: String,
    /// Bearer token for the audio API.
    pub bearer_token: String,
    /// Whisper model used for transcription.
    #[serde(default = "default_stt_model")]
    pub stt_model: String,
    /// Synthesis model.
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    /// ISO 639-1 code to neural voice name.
    #[serde(default = "default_voices")]
    pub voices: HashMap<String, String>,
    /// Voice used for languages missing from the table.
    #[serde(default = "default_voice")]
    pub default_voice: String,
}

fn default_stt_model() -> String {
    "base".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_voice() -> String {
    "es-ES-AlvaroNeural".to_string()
}

fn default_voices() -> HashMap<String, String> {
    [
        ("es", "es-ES-AlvaroNeural"),
        ("en", "en-US-GuyNeural"),
        ("fr", "fr-FR-DeniseNeural"),
        ("de", "de-DE-KatjaNeural"),
        ("it", "it-IT-ElsaNeural"),
    ]
    .into_iter()
    .map(|(code, voice)| (code.to_string(), voice.to_string()))
    .collect()
}

/// Whisper transcription and voice synthesis client.
pub struct SpeechClient {
    config: SpeechConfig,
    http: reqwest::Client,
}

impl SpeechClient {
    /// Creates a client for the configured endpoint.
    pub fn new(config: SpeechConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    fn voice_for(&self, language: &str) -> String {
        self.config
            .voices
            .get(language)
            .cloned()
            .unwrap_or_else(|| self.config.default_voice.clone())
    }
}

#[async_trait]
impl SpeechService for SpeechClient {
    async fn transcribe(&self, audio: Vec<u8>) -> CharlaResult<String> {
        let url = format!("{}/api/v1/audio/transcriptions", self.config.base_url);

        let part = reqwest::multipart::Part::bytes(audio)
            .file_name("audio.mp3")
            .mime_str("audio/mpeg")
            .map_err(|e| CharlaError::Provider(format!("transcription upload error: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .text("model", self.config.stt_model.clone())
            .part("file", part);

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.bearer_token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| CharlaError::Http(e.to_string()))?;

        let status = resp.status();
        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CharlaError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(CharlaError::Provider(format!(
                "transcription error {status}: {body}"
            )));
        }

        body["text"]
            .as_str()
            .map(ToString::to_string)
            .ok_or_else(|| CharlaError::Provider("transcription response missing text".into()))
    }

    async fn synthesize(&self, text: &str, language: &str) -> CharlaResult<Vec<u8>> {
        let url = format!("{}/api/v1/audio/speech", self.config.base_url);
        let body = serde_json::json!({
            "model": self.config.tts_model,
            "input": text,
            "voice": self.voice_for(language),
        });

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.config.bearer_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CharlaError::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_else(|_| "unknown".to_string());
            return Err(CharlaError::Provider(format!(
                "synthesis error {status}: {detail}"
            )));
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| CharlaError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
