//! Conversation transcript used as the model's memory.

use crate::models::ChatMessage;

/// Append-only, chronologically ordered list of turns.
///
/// There is no way to edit or remove a turn once appended.
#[derive(Debug, Clone, Default)]
pub struct ConversationSession {
    turns: Vec<ChatMessage>,
}

impl ConversationSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// A session opened by an assistant greeting.
    pub fn with_greeting(greeting: impl Into<String>) -> Self {
        let mut session = Self::new();
        session.append(ChatMessage::assistant(greeting));
        session
    }

    pub fn append(&mut self, turn: ChatMessage) {
        self.turns.push(turn);
    }

    /// Append a question and its answer, in that order.
    pub fn record_exchange(&mut self, question: impl Into<String>, answer: impl Into<String>) {
        self.append(ChatMessage::user(question));
        self.append(ChatMessage::assistant(answer));
    }

    /// All turns, oldest first.
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
