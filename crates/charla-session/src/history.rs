use crate::transcript::TranscriptLine;
use std::collections::VecDeque;

/// Bounded sliding window over the most recent transcript lines.
///
/// Pushing at capacity evicts the oldest line, so the window always holds
/// the last `capacity` lines in arrival order.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    lines: VecDeque<TranscriptLine>,
    capacity: usize,
}

impl HistoryWindow {
    /// Creates an empty window holding at most `capacity` lines.
    pub fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Maximum number of lines retained.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a line, evicting the oldest one at capacity.
    pub fn push(&mut self, line: TranscriptLine) {
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    /// Lines currently in the window, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &TranscriptLine> {
        self.lines.iter()
    }

    /// Number of lines currently held.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the window holds no lines.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Renders the window as newline-joined tagged lines, oldest first.
    ///
    /// This is both the prompt context format and the on-disk file format.
    pub fn join(&self) -> String {
        self.lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}
