//! Transcript entity - the ordered turns of one chat session

use serde::{Deserialize, Serialize};

use super::{ChatMessage, MessageRole};

/// Ordered user/assistant turns, oldest first.
///
/// Append-only while a session runs; only [`Transcript::clear`] removes turns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    /// Create an empty transcript
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a user turn
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    /// Open an empty assistant turn that fragments will be appended to
    pub fn open_assistant(&mut self) {
        self.messages.push(ChatMessage::assistant(String::new()));
    }

    /// Append a fragment to the trailing assistant turn.
    ///
    /// Opens a new assistant turn when the last turn is not an assistant turn.
    pub fn append_assistant(&mut self, fragment: &str) {
        match self.messages.last_mut() {
            Some(last) if last.role == MessageRole::Assistant => last.append(fragment),
            _ => self.messages.push(ChatMessage::assistant(fragment)),
        }
    }

    /// Remove every turn
    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// All turns, oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// The most recent turn
    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of turns
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether there are no turns
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
