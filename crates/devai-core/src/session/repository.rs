//! Typed access to the `chat_sessions` and `chat_messages` tables.

use super::id::SessionId;
use super::message::{MessageRole, StoredMessage};
use super::model::ChatSession;
use crate::error::{ChatError, Result};
use crate::store::{Direction, Filter, MESSAGES_TABLE, Query, Row, SESSIONS_TABLE, TableStore, row_str};
use serde_json::{Value, json};
use std::sync::Arc;

/// Maximum number of sessions returned by [`ChatRepository::list_sessions`].
pub const SESSION_LIST_LIMIT: usize = 20;

/// Repository for chat sessions and their messages.
///
/// The store client is injected so tests can substitute an in-memory fake.
#[derive(Clone)]
pub struct ChatRepository {
    store: Arc<dyn TableStore>,
}

impl ChatRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    /// Creates a session owned by `user_id` and returns it with its canonical id.
    pub async fn create_session(&self, user_id: &str, title: &str) -> Result<ChatSession> {
        let now = now_rfc3339();
        let row = into_row(json!({
            "user_id": user_id,
            "title": title,
            "created_at": now,
            "updated_at": now,
        }));
        let stored = self.store.insert(SESSIONS_TABLE, row).await?;
        session_from_row(&stored)
    }

    pub async fn find_session(&self, session_id: &str) -> Result<Option<ChatSession>> {
        let rows = self
            .store
            .select(Query::table(SESSIONS_TABLE).filter("id", session_id).limit(1))
            .await?;
        rows.first().map(session_from_row).transpose()
    }

    /// Renames a session and bumps its `updated_at`.
    pub async fn update_session_title(&self, session_id: &str, title: &str) -> Result<()> {
        let patch = into_row(json!({
            "title": title,
            "updated_at": now_rfc3339(),
        }));
        self.store
            .update(SESSIONS_TABLE, vec![Filter::eq("id", session_id)], patch)
            .await?;
        Ok(())
    }

    /// Bumps a session's `updated_at` so it sorts first in listings.
    pub async fn touch_session(&self, session_id: &str) -> Result<()> {
        let patch = into_row(json!({ "updated_at": now_rfc3339() }));
        self.store
            .update(SESSIONS_TABLE, vec![Filter::eq("id", session_id)], patch)
            .await?;
        Ok(())
    }

    /// Lists the user's sessions, most recently updated first.
    pub async fn list_sessions(&self, user_id: &str) -> Result<Vec<ChatSession>> {
        let rows = self
            .store
            .select(
                Query::table(SESSIONS_TABLE)
                    .filter("user_id", user_id)
                    .order_by("updated_at", Direction::Descending)
                    .limit(SESSION_LIST_LIMIT),
            )
            .await?;
        rows.iter().map(session_from_row).collect()
    }

    /// Looks up the message stored at `(session_id, order_index)`.
    pub async fn find_message(
        &self,
        session_id: &str,
        order_index: u32,
    ) -> Result<Option<StoredMessage>> {
        let rows = self
            .store
            .select(
                Query::table(MESSAGES_TABLE)
                    .filter("session_id", session_id)
                    .filter("order_index", order_index)
                    .limit(1),
            )
            .await?;
        rows.first().map(message_from_row).transpose()
    }

    pub async fn insert_message(&self, message: &StoredMessage) -> Result<StoredMessage> {
        let row = into_row(json!({
            "session_id": message.session_id,
            "role": message.role.as_str(),
            "content": message.content,
            "order_index": message.order_index,
            "created_at": message.created_at.clone().unwrap_or_else(now_rfc3339),
        }));
        let stored = self.store.insert(MESSAGES_TABLE, row).await?;
        message_from_row(&stored)
    }

    pub async fn update_message_content(&self, message_id: &str, content: &str) -> Result<()> {
        let patch = into_row(json!({ "content": content }));
        self.store
            .update(MESSAGES_TABLE, vec![Filter::eq("id", message_id)], patch)
            .await?;
        Ok(())
    }

    /// Lists a session's messages in transcript order.
    pub async fn list_messages(&self, session_id: &str) -> Result<Vec<StoredMessage>> {
        let rows = self
            .store
            .select(
                Query::table(MESSAGES_TABLE)
                    .filter("session_id", session_id)
                    .order_by("order_index", Direction::Ascending),
            )
            .await?;
        rows.iter().map(message_from_row).collect()
    }

    /// Deletes a session owned by `user_id` together with its messages.
    ///
    /// Returns `false` when no such session is owned by the user.
    pub async fn delete_session(&self, session_id: &str, user_id: &str) -> Result<bool> {
        let owned = self
            .store
            .select(
                Query::table(SESSIONS_TABLE)
                    .filter("id", session_id)
                    .filter("user_id", user_id)
                    .limit(1),
            )
            .await?;
        if owned.is_empty() {
            return Ok(false);
        }

        self.store
            .delete(MESSAGES_TABLE, vec![Filter::eq("session_id", session_id)])
            .await?;
        let removed = self
            .store
            .delete(
                SESSIONS_TABLE,
                vec![Filter::eq("id", session_id), Filter::eq("user_id", user_id)],
            )
            .await?;
        Ok(removed > 0)
    }
}

pub(crate) fn now_rfc3339() -> String {
    chrono::Utc::now().to_rfc3339()
}

pub(crate) fn into_row(value: Value) -> Row {
    match value {
        Value::Object(map) => map,
        _ => Row::new(),
    }
}

fn session_from_row(row: &Row) -> Result<ChatSession> {
    let id = row_str(row, "id").ok_or_else(|| malformed(SESSIONS_TABLE, "id"))?;
    let updated_at = row_str(row, "updated_at")
        .or_else(|| row_str(row, "created_at"))
        .unwrap_or_default();
    Ok(ChatSession {
        id: SessionId::Canonical(id),
        title: row_str(row, "title").unwrap_or_default(),
        updated_at,
    })
}

fn message_from_row(row: &Row) -> Result<StoredMessage> {
    let session_id =
        row_str(row, "session_id").ok_or_else(|| malformed(MESSAGES_TABLE, "session_id"))?;
    let order_index = row
        .get("order_index")
        .and_then(Value::as_u64)
        .and_then(|i| u32::try_from(i).ok())
        .ok_or_else(|| malformed(MESSAGES_TABLE, "order_index"))?;
    Ok(StoredMessage {
        id: row_str(row, "id"),
        session_id,
        role: MessageRole::from_stored(&row_str(row, "role").unwrap_or_default()),
        content: row_str(row, "content").unwrap_or_default(),
        order_index,
        created_at: row_str(row, "created_at"),
    })
}

fn malformed(table: &str, column: &str) -> ChatError {
    ChatError::persistence(format!("{table} row is missing '{column}'"))
}
