//! Session domain model.

use super::id::SessionId;
use super::message::{Message, MessageRole};
use serde::{Deserialize, Serialize};

/// Maximum length (in characters) of a title derived from the first question.
pub const TITLE_MAX_CHARS: usize = 30;

/// Title used while a transcript holds no user message yet.
pub const DEFAULT_TITLE: &str = "Chat Baru";

/// Summary of a stored conversation, as shown in the history list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: SessionId,
    pub title: String,
    /// Last update (RFC 3339).
    pub updated_at: String,
}

/// The ordered message list of one open conversation.
///
/// Mutated only by appending. Ids are assigned here so that they stay unique
/// within the transcript.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a transcript holding only the synthetic greeting.
    pub fn with_greeting(greeting: &str) -> Self {
        let mut transcript = Self::new();
        transcript.push(MessageRole::Assistant, greeting);
        transcript
    }

    /// Rebuilds a transcript from already ordered messages, renumbering ids.
    pub fn from_messages(messages: impl IntoIterator<Item = (MessageRole, String)>) -> Self {
        let mut transcript = Self::new();
        for (role, text) in messages {
            transcript.push(role, text);
        }
        transcript
    }

    /// Appends a message and returns it.
    pub fn push(&mut self, role: MessageRole, text: impl Into<String>) -> &Message {
        let id = self.messages.last().map(|m| m.id + 1).unwrap_or(1);
        self.messages.push(Message {
            id,
            role,
            text: text.into(),
        });
        &self.messages[self.messages.len() - 1]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Whether the transcript holds anything beyond the synthetic greeting.
    ///
    /// Sessions are only created for transcripts that do.
    pub fn has_conversation(&self) -> bool {
        self.messages.len() > 1
    }

    /// Derives the session title: the first user message truncated to
    /// [`TITLE_MAX_CHARS`] characters, or `default_title` if there is none.
    pub fn derive_title(&self, default_title: &str) -> String {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.text.chars().take(TITLE_MAX_CHARS).collect::<String>())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| default_title.to_string())
    }
}
