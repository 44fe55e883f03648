use std::fmt;

const USER_TAG: &str = "Usuario: ";
const ASSISTANT_TAG: &str = "Asistente: ";

/// Who authored a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// The human end-user.
    User,
    /// The assistant reply.
    Assistant,
}

/// One line of conversation history, as persisted on disk.
///
/// The on-disk format is `Usuario: {text}` or `Asistente: {text}`, one line
/// per turn half. Existing history files predate this implementation, so
/// the tags must not change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptLine {
    /// Line author.
    pub speaker: Speaker,
    /// Line content, without the tag.
    pub text: String,
}

impl TranscriptLine {
    /// Creates a user line.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::User,
            text: text.into(),
        }
    }

    /// Creates an assistant line.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Assistant,
            text: text.into(),
        }
    }

    /// Parses a persisted line, returning `None` for anything that does not
    /// carry one of the two known tags.
    pub fn parse(line: &str) -> Option<Self> {
        if let Some(text) = line.strip_prefix(USER_TAG) {
            Some(Self::user(text))
        } else if let Some(text) = line.strip_prefix(ASSISTANT_TAG) {
            Some(Self::assistant(text))
        } else {
            None
        }
    }
}

impl fmt::Display for TranscriptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.speaker {
            Speaker::User => write!(f, "{USER_TAG}{}", self.text),
            Speaker::Assistant => write!(f, "{ASSISTANT_TAG}{}", self.text),
        }
    }
}
