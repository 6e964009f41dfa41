//! User account model.

use serde::{Deserialize, Serialize};

/// A row of the `users` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    /// bcrypt hash; `None` for accounts managed by an external identity provider.
    #[serde(default, skip_serializing)]
    pub password_hash: Option<String>,
}

impl User {
    /// Returns a copy without the password hash, safe to hand to callers.
    pub fn without_secret(&self) -> Self {
        Self {
            password_hash: None,
            ..self.clone()
        }
    }
}
