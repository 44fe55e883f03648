use async_trait::async_trait;
use charla_core::{CharlaError, CharlaResult, ReplyGenerator};
use serde::{Deserialize, Serialize};

/// Settings for the Gemini generation backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Google AI API key.
    pub api_key: String,
    /// API host, overridable for tests.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Model used for replies.
    #[serde(default = "default_model")]
    pub model: String,
    /// Cheaper model used for language detection.
    #[serde(default = "default_detect_model")]
    pub detect_model: String,
    /// File search store grounding the replies, e.g.
    /// `fileSearchStores/my-docs`. Replies are unguided when unset.
    #[serde(default)]
    pub file_search_store: Option<String>,
    /// ISO 639-1 code assumed when detection fails.
    #[serde(default = "default_language")]
    pub default_language: String,
}

fn default_api_base() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_detect_model() -> String {
    "gemini-2.5-flash-lite".to_string()
}

fn default_language() -> String {
    "es".to_string()
}

/// The full language name the prompt pins the reply to.
fn language_name(code: &str) -> Option<&'static str> {
    match code {
        "es" => Some("ESPAÑOL"),
        "en" => Some("INGLÉS"),
        "fr" => Some("FRANCÉS"),
        "de" => Some("ALEMÁN"),
        "it" => Some("ITALIANO"),
        _ => None,
    }
}

/// Gemini generateContent backend.
pub struct GeminiClient {
    config: GenerationConfig,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Creates a client for the configured models.
    pub fn new(config: GenerationConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    async fn generate_content(
        &self,
        model: &str,
        body: &serde_json::Value,
    ) -> CharlaResult<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.api_base, model
        );

        let resp = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| CharlaError::Http(e.to_string()))?;

        let status = resp.status();
        let resp_body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| CharlaError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(CharlaError::Provider(format!(
                "Gemini API error {status}: {resp_body}"
            )));
        }

        extract_text(&resp_body)
    }
}

fn extract_text(body: &serde_json::Value) -> CharlaResult<String> {
    let parts = body["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            CharlaError::Provider("missing candidates in generateContent response".into())
        })?;
    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return Err(CharlaError::Provider(
            "generateContent response contained no text".into(),
        ));
    }
    Ok(text)
}

#[async_trait]
impl ReplyGenerator for GeminiClient {
    async fn generate(&self, query: &str, context: &str) -> CharlaResult<String> {
        let language = self.detect_language(query).await;
        let name = language_name(&language)
            .or_else(|| language_name(&self.config.default_language))
            .unwrap_or("ESPAÑOL");

        let prompt = format!(
            "Respondes exclusivamente en {name}.\n\n\
             HISTORIAL DE LA CONVERSACIÓN:\n{context}\n\n\
             NUEVA CONSULTA DEL USUARIO:\n{query}"
        );

        let mut body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });
        if let Some(store) = &self.config.file_search_store {
            body["tools"] = serde_json::json!([
                {"file_search": {"file_search_store_names": [store]}}
            ]);
        }

        self.generate_content(&self.config.model, &body).await
    }

    async fn detect_language(&self, text: &str) -> String {
        let sample: String = text.chars().take(50).collect();
        let prompt = format!(
            "Detecta el idioma y devuelve SOLO el código ISO 639-1 (es, en, fr...): {sample}"
        );
        let body = serde_json::json!({
            "contents": [{"parts": [{"text": prompt}]}],
        });

        match self.generate_content(&self.config.detect_model, &body).await {
            Ok(answer) => {
                let code = answer.trim().to_lowercase();
                if code.is_empty() {
                    self.config.default_language.clone()
                } else {
                    code
                }
            }
            Err(error) => {
                tracing::warn!(%error, "language detection failed, assuming default");
                self.config.default_language.clone()
            }
        }
    }
}
