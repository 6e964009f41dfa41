//! Authentication collaborator.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// An authenticated user, as yielded by an [`AuthProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub user_id: String,
    pub name: String,
    pub email: String,
}

impl AuthIdentity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            name: String::new(),
            email: String::new(),
        }
    }

    /// Session-store operations require a non-empty user id.
    pub fn is_usable(&self) -> bool {
        !self.user_id.trim().is_empty()
    }
}

/// Turns login credentials into an [`AuthIdentity`].
///
/// Implementations return [`ChatError::Auth`](crate::error::ChatError::Auth)
/// for unknown users and wrong passwords alike.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, login: &str, password: &str) -> Result<AuthIdentity>;
}
