/// Question/answer transcripts of chat and agent mode
///
/// Every question is followed by exactly one answer. An answer that is
/// still being produced sits in the transcript as `Pending` and is resolved
/// in place by id, so a late reply can never land on the wrong turn.

use crate::agent::ChatMessage;
use chrono::{DateTime, Utc};

pub type TurnId = u64;

/// Shown while an answer is pending
pub const PENDING_TEXT: &str = "Thinking...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnKind {
    Question,
    Answer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub id: TurnId,
    pub kind: TurnKind,
    pub text: String,
    pub status: TurnStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
    next_id: TurnId,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, kind: TurnKind, text: String, status: TurnStatus) -> TurnId {
        let id = self.next_id;
        self.next_id += 1;
        self.turns.push(Turn {
            id,
            kind,
            text,
            status,
            timestamp: Utc::now(),
        });
        id
    }

    pub fn ask(&mut self, question: impl Into<String>) -> TurnId {
        self.push(TurnKind::Question, question.into(), TurnStatus::Resolved)
    }

    /// Placeholder answer to resolve later
    pub fn begin_answer(&mut self) -> TurnId {
        self.push(TurnKind::Answer, PENDING_TEXT.to_string(), TurnStatus::Pending)
    }

    /// Answer that is final right away
    pub fn answer(&mut self, text: impl Into<String>) -> TurnId {
        self.push(TurnKind::Answer, text.into(), TurnStatus::Resolved)
    }

    /// Replace a pending answer. Returns false if `id` is unknown or was
    /// already resolved.
    pub fn resolve(&mut self, id: TurnId, text: impl Into<String>) -> bool {
        match self
            .turns
            .iter_mut()
            .find(|t| t.id == id && t.status == TurnStatus::Pending)
        {
            Some(turn) => {
                turn.text = text.into();
                turn.status = TurnStatus::Resolved;
                turn.timestamp = Utc::now();
                true
            }
            None => false,
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn has_pending(&self) -> bool {
        self.turns.iter().any(|t| t.status == TurnStatus::Pending)
    }

    /// Resolved turns as agent context, oldest first
    pub fn history(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter(|t| t.status == TurnStatus::Resolved)
            .map(|t| match t.kind {
                TurnKind::Question => ChatMessage::user(&t.text),
                TurnKind::Answer => ChatMessage::assistant(&t.text),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::Role;

    #[test]
    fn test_pending_answer_resolved_in_place() {
        let mut conversation = Conversation::new();
        conversation.ask("what is rust?");
        let pending = conversation.begin_answer();

        assert!(conversation.has_pending());
        assert_eq!(conversation.turns()[1].text, PENDING_TEXT);

        assert!(conversation.resolve(pending, "A language."));
        assert_eq!(conversation.turns().len(), 2);
        assert_eq!(conversation.turns()[1].text, "A language.");
        assert_eq!(conversation.turns()[1].status, TurnStatus::Resolved);
        assert!(!conversation.has_pending());

        // Second resolution is refused
        assert!(!conversation.resolve(pending, "again"));
        assert!(!conversation.resolve(99, "nobody"));
    }

    #[test]
    fn test_out_of_order_resolution() {
        let mut conversation = Conversation::new();
        conversation.ask("one");
        let first = conversation.begin_answer();
        conversation.ask("two");
        let second = conversation.begin_answer();

        conversation.resolve(second, "answer two");
        conversation.resolve(first, "answer one");

        let texts: Vec<_> = conversation.turns().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["one", "answer one", "two", "answer two"]);
    }

    #[test]
    fn test_history_skips_pending() {
        let mut conversation = Conversation::new();
        conversation.ask("hi");
        conversation.answer("hello");
        conversation.ask("more");
        conversation.begin_answer();

        let history = conversation.history();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[2].content, "more");
    }
}
