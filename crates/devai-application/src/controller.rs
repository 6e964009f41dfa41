//! Conversation controller.
//!
//! Owns the transcript of the open conversation and drives one turn at a
//! time: `Idle -> Sending -> Idle | Error`. Persistence is handed to the
//! [`SessionSynchronizer`] and never blocks or fails a turn.

use crate::synchronizer::SessionSynchronizer;
use devai_core::answer::{AnswerService, validate_question};
use devai_core::auth::AuthIdentity;
use devai_core::config::DEFAULT_GREETING;
use devai_core::history::HistoryEntry;
use devai_core::session::{ChatSession, Message, MessageRole, SessionId, Transcript};
use devai_core::{ChatError, Result};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationState {
    /// Accepting input.
    Idle,
    /// A question is waiting for its answer.
    Sending,
    /// The last turn failed with a message for the user. New input is
    /// accepted.
    Error(String),
}

/// Where a loaded conversation or history list came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Remote,
    Cache,
}

pub struct ConversationController {
    answers: Arc<dyn AnswerService>,
    sync: SessionSynchronizer,
    identity: Option<AuthIdentity>,
    greeting: String,
    id: SessionId,
    transcript: Transcript,
    state: ConversationState,
}

impl ConversationController {
    /// Starts with a fresh conversation holding only the greeting.
    pub fn new(
        answers: Arc<dyn AnswerService>,
        sync: SessionSynchronizer,
        identity: Option<AuthIdentity>,
    ) -> Self {
        Self {
            answers,
            sync,
            identity,
            greeting: DEFAULT_GREETING.to_string(),
            id: SessionId::provisional(),
            transcript: Transcript::with_greeting(DEFAULT_GREETING),
            state: ConversationState::Idle,
        }
    }

    pub fn with_greeting(mut self, greeting: impl Into<String>) -> Self {
        self.greeting = greeting.into();
        if !self.transcript.has_conversation() {
            self.transcript = Transcript::with_greeting(&self.greeting);
        }
        self
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Id of the open conversation, canonical once the session exists.
    pub fn active_id(&self) -> SessionId {
        self.sync.resolve(&self.id)
    }

    pub fn identity(&self) -> Option<&AuthIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: Option<AuthIdentity>) {
        self.identity = identity;
    }

    pub fn synchronizer(&self) -> &SessionSynchronizer {
        &self.sync
    }

    /// Asks `question` and appends the answer.
    ///
    /// The user message is appended before the request is sent. On failure
    /// the state carries the error text and no answer is appended.
    pub async fn submit(&mut self, question: &str) -> Result<Message> {
        let question = match validate_question(question) {
            Ok(question) => question.to_string(),
            Err(e) => {
                self.state = ConversationState::Error(e.to_string());
                return Err(e);
            }
        };

        self.transcript.push(MessageRole::User, question.clone());
        self.state = ConversationState::Sending;
        self.schedule_sync();

        let chat_id = self.active_id();
        let result = self.answers.ask(&question, Some(chat_id.as_str())).await;
        match result {
            Ok(answer) => {
                let message = self.transcript.push(MessageRole::Assistant, answer).clone();
                self.state = ConversationState::Idle;
                self.schedule_sync();
                Ok(message)
            }
            Err(e) => {
                tracing::warn!(session_id = %chat_id, "[Conversation] Turn failed: {}", e);
                self.state = ConversationState::Error(e.to_string());
                Err(e)
            }
        }
    }

    /// Resets to a greeting-only transcript under a new provisional id. The
    /// outgoing conversation's pending write runs first.
    pub async fn new_conversation(&mut self) {
        self.sync.flush(&self.id).await;
        self.id = SessionId::provisional();
        self.transcript = Transcript::with_greeting(&self.greeting);
        self.state = ConversationState::Idle;
    }

    /// Opens a stored conversation, preferring the store and falling back to
    /// the local cache.
    pub async fn load_conversation(&mut self, id: &SessionId) -> Result<Source> {
        self.sync.flush(&self.id).await;

        let (transcript, source) = match self.sync.load_messages(id, self.identity.as_ref()).await {
            Ok(transcript) => (transcript, Source::Remote),
            Err(e) => {
                tracing::warn!(session_id = %id, "[Conversation] Remote load failed: {}", e);
                let entry = self
                    .sync
                    .cached(id)
                    .await?
                    .ok_or_else(|| ChatError::not_found("conversation", id.as_str()))?;
                (transcript_from_entry(&entry), Source::Cache)
            }
        };

        self.id = self.sync.resolve(id);
        self.transcript = if transcript.is_empty() {
            Transcript::with_greeting(&self.greeting)
        } else {
            transcript
        };
        self.state = ConversationState::Idle;
        Ok(source)
    }

    /// Deletes a conversation. Deleting the open one starts a new one.
    ///
    /// Store failures are logged and reported as `false`; the local copy is
    /// removed regardless.
    pub async fn delete_conversation(&mut self, id: &SessionId) -> bool {
        let is_active = self.sync.resolve(id) == self.active_id();
        let removed = match self.sync.delete_session(id, self.identity.as_ref()).await {
            Ok(removed) => removed,
            Err(e) => {
                tracing::warn!(session_id = %id, "[Conversation] Remote delete failed: {}", e);
                false
            }
        };
        if is_active {
            self.sync.cancel_pending(&self.id);
            self.new_conversation().await;
        }
        removed
    }

    /// Stored conversations, most recent first. Falls back to the local cache
    /// when the store is unreachable or nobody is signed in.
    pub async fn list_conversations(&self) -> Result<(Vec<ChatSession>, Source)> {
        match self.sync.load_sessions(self.identity.as_ref()).await {
            Ok(sessions) => Ok((sessions, Source::Remote)),
            Err(e) => {
                tracing::debug!("[Conversation] Listing from local cache: {}", e);
                let entries = self.sync.cached_sessions().await?;
                Ok((entries.iter().map(HistoryEntry::summary).collect(), Source::Cache))
            }
        }
    }

    /// Writes the open conversation now instead of waiting for the debounce.
    pub async fn flush(&self) -> bool {
        self.sync.flush(&self.id).await
    }

    fn schedule_sync(&self) {
        if self.transcript.has_conversation() {
            self.sync
                .schedule_sync(&self.id, self.transcript.clone(), self.identity.clone());
        }
    }
}

fn transcript_from_entry(entry: &HistoryEntry) -> Transcript {
    Transcript::from_messages(entry.messages.iter().map(|m| (m.role, m.text.clone())))
}
