//! Append-only conversation transcript.

use serde::Serialize;

/// Who produced a transcript entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    Agent,
    Candidate,
}

/// One line of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TranscriptEntry {
    pub speaker: Speaker,
    pub message: String,
    /// Session-clock offset at which the entry was appended.
    pub offset_seconds: u64,
}

impl TranscriptEntry {
    /// Offset rendered as `MM:SS`.
    #[must_use]
    pub fn offset_label(&self) -> String {
        format_clock(self.offset_seconds)
    }
}

/// Conversation log in causal order. Entries are never reordered or edited.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry and return a copy of it.
    pub fn push(
        &mut self,
        speaker: Speaker,
        message: impl Into<String>,
        offset_seconds: u64,
    ) -> TranscriptEntry {
        let entry = TranscriptEntry {
            speaker,
            message: message.into(),
            offset_seconds,
        };
        self.entries.push(entry.clone());
        entry
    }

    #[must_use]
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Render seconds as zero-padded `MM:SS`. Minutes are not wrapped at 60.
#[must_use]
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}
