//! Typed access to the `users` table.

use super::model::User;
use crate::error::{ChatError, Result};
use crate::session::{into_row, now_rfc3339};
use crate::store::{Query, Row, TableStore, USERS_TABLE, row_str};
use serde_json::{Value, json};
use std::sync::Arc;

#[derive(Clone)]
pub struct UserRepository {
    store: Arc<dyn TableStore>,
}

impl UserRepository {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        self.find_one("email", email).await
    }

    pub async fn find_by_name(&self, name: &str) -> Result<Option<User>> {
        self.find_one("name", name).await
    }

    /// Resolves a login name: exact email match first, then user name.
    pub async fn find_by_login(&self, login: &str) -> Result<Option<User>> {
        match self.find_by_email(login).await? {
            Some(user) => Ok(Some(user)),
            None => self.find_by_name(login).await,
        }
    }

    /// Inserts a user. The id is generated by the store.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password_hash: Option<&str>,
    ) -> Result<User> {
        let now = now_rfc3339();
        let row = into_row(json!({
            "name": name,
            "email": email,
            "password": password_hash,
            "created_at": now,
            "updated_at": now,
        }));
        let stored = self.store.insert(USERS_TABLE, row).await?;
        user_from_row(&stored)
    }

    async fn find_one(&self, column: &str, value: &str) -> Result<Option<User>> {
        let rows = self
            .store
            .select(Query::table(USERS_TABLE).filter(column, value).limit(1))
            .await?;
        rows.first().map(user_from_row).transpose()
    }
}

fn user_from_row(row: &Row) -> Result<User> {
    let id = row_str(row, "id")
        .or_else(|| row.get("id").filter(|v| v.is_number()).map(Value::to_string))
        .ok_or_else(|| ChatError::persistence("users row is missing 'id'"))?;
    Ok(User {
        id,
        name: row_str(row, "name").unwrap_or_default(),
        email: row_str(row, "email").unwrap_or_default(),
        password_hash: row_str(row, "password").filter(|p| !p.is_empty()),
    })
}
