/// Command-mode transcript entries
///
/// A transcript is append-only: entries are never reordered or edited once
/// pushed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What an entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Command,
    Output,
}

/// One line of the command transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub kind: EntryKind,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptEntry {
    pub fn command(text: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Command,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn output(text: impl Into<String>) -> Self {
        Self {
            kind: EntryKind::Output,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn is_command(&self) -> bool {
        self.kind == EntryKind::Command
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let cmd = TranscriptEntry::command("ls");
        assert!(cmd.is_command());
        assert_eq!(cmd.text, "ls");

        let out = TranscriptEntry::output("file.txt");
        assert_eq!(out.kind, EntryKind::Output);
        assert!(out.timestamp >= cmd.timestamp);
    }
}
