use crate::history::HistoryWindow;
use crate::transcript::TranscriptLine;
use async_trait::async_trait;
use charla_core::CharlaResult;
use std::path::PathBuf;

/// Persistence of per-conversation history windows.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Loads the window for `chat_id`, clamped to the last `capacity` lines.
    /// A conversation with no persisted history loads as an empty window.
    async fn load(&self, chat_id: &str, capacity: usize) -> CharlaResult<HistoryWindow>;

    /// Persists the window for `chat_id`, replacing any previous contents.
    async fn save(&self, chat_id: &str, window: &HistoryWindow) -> CharlaResult<()>;
}

/// File-based history store, one plain-text file per conversation.
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Creates the store, creating `dir` if it does not exist yet.
    pub async fn new(dir: PathBuf) -> CharlaResult<Self> {
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self { dir })
    }

    fn history_path(&self, chat_id: &str) -> PathBuf {
        self.dir.join(format!("{chat_id}.txt"))
    }
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn load(&self, chat_id: &str, capacity: usize) -> CharlaResult<HistoryWindow> {
        let mut window = HistoryWindow::new(capacity);
        let path = self.history_path(chat_id);
        if !path.exists() {
            return Ok(window);
        }
        let data = tokio::fs::read_to_string(&path).await?;
        for line in data.lines() {
            match TranscriptLine::parse(line) {
                // Pushing through the window clamps oversized files to the
                // most recent lines.
                Some(parsed) => window.push(parsed),
                None if line.trim().is_empty() => {}
                None => {
                    tracing::debug!(chat_id, line, "skipping unrecognized history line");
                }
            }
        }
        Ok(window)
    }

    async fn save(&self, chat_id: &str, window: &HistoryWindow) -> CharlaResult<()> {
        let path = self.history_path(chat_id);
        tokio::fs::write(path, window.join()).await?;
        Ok(())
    }
}
