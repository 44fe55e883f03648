use crate::config::SessionConfig;
use crate::history::HistoryWindow;
use crate::store::HistoryStore;
use crate::transcript::TranscriptLine;
use charla_core::{
    CharlaResult, ChatEvent, DeliveryChannel, EventPayload, ReplyGenerator, SpeechService,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Shared handles to the external services a worker calls while replying.
#[derive(Clone)]
pub struct Collaborators {
    /// Reply generation and language detection.
    pub generator: Arc<dyn ReplyGenerator>,
    /// Transcription and synthesis.
    pub speech: Arc<dyn SpeechService>,
    /// Outbound platform side, also used to fetch voice notes.
    pub delivery: Arc<dyn DeliveryChannel>,
}

/// Handle to one conversation's queue and drain task.
///
/// Events enqueued on this handle are processed strictly in arrival order
/// by a dedicated task. The pending count covers queued and in-flight
/// events, so a worker mid-reply never looks drained to the idle sweep.
pub struct SessionWorker {
    chat_id: String,
    queue: mpsc::UnboundedSender<ChatEvent>,
    pending: Arc<AtomicUsize>,
    last_activity: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
    history: Arc<Mutex<HistoryWindow>>,
    store: Arc<dyn HistoryStore>,
}

impl SessionWorker {
    /// Loads persisted history for `chat_id` and starts the drain task.
    ///
    /// Fails only if the history cannot be loaded; a worker must never
    /// start on a window it could not read back.
    pub async fn spawn(
        chat_id: impl Into<String>,
        collaborators: Collaborators,
        store: Arc<dyn HistoryStore>,
        config: &SessionConfig,
    ) -> CharlaResult<Arc<Self>> {
        let chat_id = chat_id.into();
        let window = store.load(&chat_id, config.history_capacity).await?;
        let history = Arc::new(Mutex::new(window));
        let (queue, rx) = mpsc::unbounded_channel();

        let worker = Arc::new(Self {
            chat_id: chat_id.clone(),
            queue,
            pending: Arc::new(AtomicUsize::new(0)),
            last_activity: Arc::new(Mutex::new(Instant::now())),
            running: Arc::new(AtomicBool::new(true)),
            history: Arc::clone(&history),
            store,
        });

        let drain = DrainLoop {
            chat_id,
            collaborators,
            history,
            pending: Arc::clone(&worker.pending),
            last_activity: Arc::clone(&worker.last_activity),
            running: Arc::clone(&worker.running),
            recv_timeout: config.recv_timeout(),
        };
        tokio::spawn(drain.run(rx));

        Ok(worker)
    }

    /// Conversation this worker serves.
    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    /// Queues an event for processing. Never blocks.
    pub fn enqueue(&self, event: ChatEvent) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        *self.last_activity.lock() = Instant::now();
        if self.queue.send(event).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::warn!(chat_id = %self.chat_id, "dropping event for stopped worker");
        }
    }

    /// Events queued or currently being processed.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Time since an event was last enqueued or finished processing.
    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().elapsed()
    }

    /// Whether the drain loop is still accepting work.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signals the drain task to exit and persists the current window.
    ///
    /// The task notices the cleared flag within one receive timeout and
    /// exits on its own. Safe to call more than once.
    pub async fn stop(&self) -> CharlaResult<()> {
        self.running.store(false, Ordering::SeqCst);
        let snapshot = self.history.lock().clone();
        self.store.save(&self.chat_id, &snapshot).await
    }

    /// Current window contents rendered as tagged lines, oldest first.
    pub fn history_lines(&self) -> Vec<String> {
        self.history.lock().lines().map(ToString::to_string).collect()
    }
}

/// Task-side state of one worker.
struct DrainLoop {
    chat_id: String,
    collaborators: Collaborators,
    history: Arc<Mutex<HistoryWindow>>,
    pending: Arc<AtomicUsize>,
    last_activity: Arc<Mutex<Instant>>,
    running: Arc<AtomicBool>,
    recv_timeout: Duration,
}

impl DrainLoop {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<ChatEvent>) {
        tracing::debug!(chat_id = %self.chat_id, "worker started");
        while self.running.load(Ordering::SeqCst) {
            let event = match tokio::time::timeout(self.recv_timeout, rx.recv()).await {
                Ok(Some(event)) => event,
                // All senders dropped; nothing more can arrive.
                Ok(None) => break,
                // Timeout: re-check the stop flag.
                Err(_) => continue,
            };

            if let Err(error) = self.process(event).await {
                tracing::error!(chat_id = %self.chat_id, %error, "failed to process event");
            }
            *self.last_activity.lock() = Instant::now();
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
        tracing::debug!(chat_id = %self.chat_id, "worker stopped");
    }

    /// Handles one event end to end.
    ///
    /// An error return covers this event only; the drain loop logs it and
    /// moves on to the next one.
    async fn process(&self, event: ChatEvent) -> CharlaResult<()> {
        let query = match event.payload {
            EventPayload::Text(text) => text,
            EventPayload::Audio { file_id } => {
                let audio = self.collaborators.delivery.download_file(&file_id).await?;
                match self.collaborators.speech.transcribe(audio).await {
                    Ok(text) => text,
                    Err(error) => {
                        tracing::warn!(
                            chat_id = %self.chat_id,
                            %error,
                            "transcription failed, continuing with an empty query"
                        );
                        String::new()
                    }
                }
            }
            EventPayload::Unsupported => {
                tracing::debug!(chat_id = %self.chat_id, "ignoring unsupported payload");
                return Ok(());
            }
        };

        let context = self.history.lock().join();

        let reply = match self.collaborators.generator.generate(&query, &context).await {
            Ok(reply) => reply,
            Err(error) => {
                tracing::error!(chat_id = %self.chat_id, %error, "reply generation failed");
                format!("Lo siento, hubo un error procesando tu solicitud: {error}")
            }
        };

        {
            let mut history = self.history.lock();
            history.push(TranscriptLine::user(&query));
            history.push(TranscriptLine::assistant(&reply));
        }

        self.collaborators
            .delivery
            .send_text(&self.chat_id, &reply)
            .await?;

        let language = self.collaborators.generator.detect_language(&reply).await;
        match self.collaborators.speech.synthesize(&reply, &language).await {
            Ok(audio) => {
                self.collaborators
                    .delivery
                    .send_audio(&self.chat_id, audio)
                    .await?;
            }
            Err(error) => {
                tracing::warn!(
                    chat_id = %self.chat_id,
                    %error,
                    "synthesis failed, reply sent as text only"
                );
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{
        fast_config, wait_until, MemoryStore, RecordingDelivery, ScriptedGenerator, ScriptedSpeech,
    };

    struct Fixture {
        generator: Arc<ScriptedGenerator>,
        speech: Arc<ScriptedSpeech>,
        delivery: Arc<RecordingDelivery>,
        store: Arc<MemoryStore>,
        config: SessionConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                generator: Arc::new(ScriptedGenerator::default()),
                speech: Arc::new(ScriptedSpeech::default()),
                delivery: Arc::new(RecordingDelivery::default()),
                store: Arc::new(MemoryStore::default()),
                config: fast_config(),
            }
        }

        fn collaborators(&self) -> Collaborators {
            Collaborators {
                generator: Arc::clone(&self.generator) as Arc<dyn ReplyGenerator>,
                speech: Arc::clone(&self.speech) as Arc<dyn SpeechService>,
                delivery: Arc::clone(&self.delivery) as Arc<dyn DeliveryChannel>,
            }
        }

        async fn spawn(&self, chat_id: &str) -> Arc<SessionWorker> {
            SessionWorker::spawn(
                chat_id,
                self.collaborators(),
                Arc::clone(&self.store) as Arc<dyn HistoryStore>,
                &self.config,
            )
            .await
            .unwrap()
        }
    }

    #[tokio::test]
    async fn processes_events_in_arrival_order() {
        let fx = Fixture::new();
        fx.generator.set_delay_ms(5);
        let worker = fx.spawn("c1").await;

        for i in 0..5 {
            worker.enqueue(ChatEvent::text("c1", i, format!("m{i}")));
        }
        wait_until(2_000, || worker.pending() == 0).await;

        let texts = fx.delivery.texts();
        let replies: Vec<&str> = texts.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(replies, vec!["re: m0", "re: m1", "re: m2", "re: m3", "re: m4"]);
    }

    #[tokio::test]
    async fn text_event_updates_history_and_sends_audio() {
        let fx = Fixture::new();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "hola"));
        wait_until(2_000, || worker.pending() == 0).await;

        assert_eq!(
            worker.history_lines(),
            vec!["Usuario: hola".to_string(), "Asistente: re: hola".to_string()]
        );
        assert_eq!(fx.delivery.texts().len(), 1);
        assert_eq!(fx.delivery.audios().len(), 1);
        // The generator saw an empty context on first contact.
        assert_eq!(fx.generator.calls()[0], ("hola".to_string(), String::new()));
    }

    #[tokio::test]
    async fn second_event_sees_prior_turns_as_context() {
        let fx = Fixture::new();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "hola"));
        worker.enqueue(ChatEvent::text("c1", 2, "¿cómo estás?"));
        wait_until(2_000, || worker.pending() == 0).await;

        let calls = fx.generator.calls();
        assert_eq!(calls[1].0, "¿cómo estás?");
        assert_eq!(calls[1].1, "Usuario: hola\nAsistente: re: hola");
    }

    #[tokio::test]
    async fn generation_failure_sends_apology_and_records_it() {
        let fx = Fixture::new();
        fx.generator.fail_replies();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "hola"));
        wait_until(2_000, || worker.pending() == 0).await;

        let texts = fx.delivery.texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0]
            .1
            .starts_with("Lo siento, hubo un error procesando tu solicitud:"));
        let lines = worker.history_lines();
        assert_eq!(lines[0], "Usuario: hola");
        assert!(lines[1].starts_with("Asistente: Lo siento"));
    }

    #[tokio::test]
    async fn audio_event_is_transcribed_before_generation() {
        let fx = Fixture::new();
        fx.delivery.add_file("f1", b"voice-bytes".to_vec());
        fx.speech.set_transcript("hola por voz");
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::audio("c1", 1, "f1"));
        wait_until(2_000, || worker.pending() == 0).await;

        assert_eq!(fx.generator.calls()[0].0, "hola por voz");
        assert_eq!(worker.history_lines()[0], "Usuario: hola por voz");
    }

    #[tokio::test]
    async fn transcription_failure_degrades_to_empty_query() {
        let fx = Fixture::new();
        fx.delivery.add_file("f1", b"voice-bytes".to_vec());
        fx.speech.fail_transcription();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::audio("c1", 1, "f1"));
        wait_until(2_000, || worker.pending() == 0).await;

        // A reply is still produced and delivered.
        assert_eq!(fx.generator.calls()[0].0, "");
        assert_eq!(fx.delivery.texts().len(), 1);
    }

    #[tokio::test]
    async fn download_failure_consumes_event_without_reply() {
        let fx = Fixture::new();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::audio("c1", 1, "missing"));
        wait_until(2_000, || worker.pending() == 0).await;

        assert!(fx.delivery.texts().is_empty());
        assert!(fx.generator.calls().is_empty());
        assert!(worker.is_running());
    }

    #[tokio::test]
    async fn unsupported_payload_produces_no_reply() {
        let fx = Fixture::new();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent {
            chat_id: "c1".into(),
            update_id: 1,
            payload: EventPayload::Unsupported,
        });
        wait_until(2_000, || worker.pending() == 0).await;

        assert!(fx.delivery.texts().is_empty());
        assert!(fx.delivery.audios().is_empty());
    }

    #[tokio::test]
    async fn synthesis_failure_still_delivers_text() {
        let fx = Fixture::new();
        fx.speech.fail_synthesis();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "hola"));
        wait_until(2_000, || worker.pending() == 0).await;

        assert_eq!(fx.delivery.texts().len(), 1);
        assert!(fx.delivery.audios().is_empty());
    }

    #[tokio::test]
    async fn synthesis_uses_detected_language() {
        let fx = Fixture::new();
        fx.generator.set_language("en");
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "hello"));
        wait_until(2_000, || worker.pending() == 0).await;

        let audios = fx.delivery.audios();
        assert_eq!(audios[0].1, b"tts:en:re: hello".to_vec());
    }

    #[tokio::test]
    async fn window_eviction_applies_across_turns() {
        let fx = Fixture::new();
        let worker = fx.spawn("c1").await;

        for i in 0..4 {
            worker.enqueue(ChatEvent::text("c1", i, format!("m{i}")));
        }
        wait_until(2_000, || worker.pending() == 0).await;

        // 4 turns produce 8 lines; only the last 6 remain.
        let lines = worker.history_lines();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], "Usuario: m1");
        assert_eq!(lines[5], "Asistente: re: m3");
    }

    #[tokio::test]
    async fn stop_persists_current_window() {
        let fx = Fixture::new();
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "hola"));
        wait_until(2_000, || worker.pending() == 0).await;
        worker.stop().await.unwrap();

        assert_eq!(fx.store.save_count(), 1);
        assert_eq!(
            fx.store.contents("c1").unwrap(),
            "Usuario: hola\nAsistente: re: hola"
        );
        wait_until(2_000, || !worker.is_running()).await;
    }

    #[tokio::test]
    async fn spawn_reloads_persisted_history() {
        let fx = Fixture::new();
        fx.store
            .preload("c1", "Usuario: hola\nAsistente: ¡Hola!");
        let worker = fx.spawn("c1").await;

        worker.enqueue(ChatEvent::text("c1", 1, "sigo aquí"));
        wait_until(2_000, || worker.pending() == 0).await;

        assert_eq!(
            fx.generator.calls()[0].1,
            "Usuario: hola\nAsistente: ¡Hola!"
        );
    }
}
