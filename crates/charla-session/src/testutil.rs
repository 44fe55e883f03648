//! In-memory collaborator and store doubles shared by the unit tests.

use crate::config::SessionConfig;
use crate::history::HistoryWindow;
use crate::store::HistoryStore;
use crate::transcript::TranscriptLine;
use async_trait::async_trait;
use charla_core::{CharlaError, CharlaResult, DeliveryChannel, ReplyGenerator, SpeechService};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

/// Config with short timings so tests run in milliseconds.
pub(crate) fn fast_config() -> SessionConfig {
    SessionConfig {
        history_capacity: 6,
        idle_timeout_secs: 3600,
        reap_interval_secs: 1,
        recv_timeout_ms: 20,
        poll_backoff_secs: 0,
    }
}

/// Polls `cond` every 10ms, panicking if it stays false past the deadline.
pub(crate) async fn wait_until(deadline_ms: u64, mut cond: impl FnMut() -> bool) {
    let deadline = Instant::now() + Duration::from_millis(deadline_ms);
    while !cond() {
        assert!(Instant::now() < deadline, "condition not met within {deadline_ms}ms");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Generator double: replies `re: {query}`, records every call.
#[derive(Default)]
pub(crate) struct ScriptedGenerator {
    calls: Mutex<Vec<(String, String)>>,
    fail: AtomicBool,
    delay_ms: AtomicU64,
    language: Mutex<Option<String>>,
}

impl ScriptedGenerator {
    pub(crate) fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    /// Makes every subsequent `generate` call fail.
    pub(crate) fn fail_replies(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub(crate) fn set_delay_ms(&self, ms: u64) {
        self.delay_ms.store(ms, Ordering::SeqCst);
    }

    pub(crate) fn set_language(&self, language: &str) {
        *self.language.lock() = Some(language.to_string());
    }
}

#[async_trait]
impl ReplyGenerator for ScriptedGenerator {
    async fn generate(&self, query: &str, context: &str) -> CharlaResult<String> {
        self.calls
            .lock()
            .push((query.to_string(), context.to_string()));
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(CharlaError::Provider("backend unavailable".into()));
        }
        Ok(format!("re: {query}"))
    }

    async fn detect_language(&self, _text: &str) -> String {
        self.language.lock().clone().unwrap_or_else(|| "es".to_string())
    }
}

/// Speech double with switchable failure modes.
#[derive(Default)]
pub(crate) struct ScriptedSpeech {
    transcript: Mutex<String>,
    fail_transcribe: AtomicBool,
    fail_synthesize: AtomicBool,
}

impl ScriptedSpeech {
    pub(crate) fn set_transcript(&self, text: &str) {
        *self.transcript.lock() = text.to_string();
    }

    pub(crate) fn fail_transcription(&self) {
        self.fail_transcribe.store(true, Ordering::SeqCst);
    }

    pub(crate) fn fail_synthesis(&self) {
        self.fail_synthesize.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl SpeechService for ScriptedSpeech {
    async fn transcribe(&self, _audio: Vec<u8>) -> CharlaResult<String> {
        if self.fail_transcribe.load(Ordering::SeqCst) {
            return Err(CharlaError::Provider("transcription offline".into()));
        }
        Ok(self.transcript.lock().clone())
    }

    async fn synthesize(&self, text: &str, language: &str) -> CharlaResult<Vec<u8>> {
        if self.fail_synthesize.load(Ordering::SeqCst) {
            return Err(CharlaError::Provider("synthesis offline".into()));
        }
        Ok(format!("tts:{language}:{text}").into_bytes())
    }
}

/// Delivery double recording outbound traffic and serving canned files.
#[derive(Default)]
pub(crate) struct RecordingDelivery {
    texts: Mutex<Vec<(String, String)>>,
    audios: Mutex<Vec<(String, Vec<u8>)>>,
    files: Mutex<HashMap<String, Vec<u8>>>,
}

impl RecordingDelivery {
    pub(crate) fn texts(&self) -> Vec<(String, String)> {
        self.texts.lock().clone()
    }

    pub(crate) fn audios(&self) -> Vec<(String, Vec<u8>)> {
        self.audios.lock().clone()
    }

    pub(crate) fn add_file(&self, file_id: &str, bytes: Vec<u8>) {
        self.files.lock().insert(file_id.to_string(), bytes);
    }
}

#[async_trait]
impl DeliveryChannel for RecordingDelivery {
    async fn send_text(&self, chat_id: &str, text: &str) -> CharlaResult<()> {
        self.texts
            .lock()
            .push((chat_id.to_string(), text.to_string()));
        Ok(())
    }

    async fn send_audio(&self, chat_id: &str, audio: Vec<u8>) -> CharlaResult<()> {
        self.audios.lock().push((chat_id.to_string(), audio));
        Ok(())
    }

    async fn download_file(&self, file_id: &str) -> CharlaResult<Vec<u8>> {
        self.files
            .lock()
            .get(file_id)
            .cloned()
            .ok_or_else(|| CharlaError::Channel(format!("no such file: {file_id}")))
    }
}

/// History store double keeping files in a map and counting saves.
#[derive(Default)]
pub(crate) struct MemoryStore {
    files: Mutex<HashMap<String, String>>,
    saves: AtomicUsize,
}

impl MemoryStore {
    pub(crate) fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn contents(&self, chat_id: &str) -> Option<String> {
        self.files.lock().get(chat_id).cloned()
    }

    pub(crate) fn preload(&self, chat_id: &str, contents: &str) {
        self.files.lock().insert(chat_id.to_string(), contents.to_string());
    }
}

#[async_trait]
impl HistoryStore for MemoryStore {
    async fn load(&self, chat_id: &str, capacity: usize) -> CharlaResult<HistoryWindow> {
        let mut window = HistoryWindow::new(capacity);
        if let Some(data) = self.files.lock().get(chat_id) {
            for line in data.lines() {
                if let Some(parsed) = TranscriptLine::parse(line) {
                    window.push(parsed);
                }
            }
        }
        Ok(window)
    }

    async fn save(&self, chat_id: &str, window: &HistoryWindow) -> CharlaResult<()> {
        self.files.lock().insert(chat_id.to_string(), window.join());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
