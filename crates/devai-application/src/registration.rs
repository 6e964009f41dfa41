//! Account registration use case.

use devai_core::store::TableStore;
use devai_core::user::{User, UserRepository};
use devai_core::{ChatError, Result};
use std::sync::Arc;

pub const MIN_PASSWORD_CHARS: usize = 6;

/// bcrypt work factor for stored password hashes.
pub const PASSWORD_HASH_COST: u32 = 10;

pub struct RegistrationService {
    users: UserRepository,
    hash_cost: u32,
}

impl RegistrationService {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            users: UserRepository::new(store),
            hash_cost: PASSWORD_HASH_COST,
        }
    }

    /// Overrides the bcrypt cost (tests use the minimum).
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    /// Creates an account with a bcrypt-hashed password and returns it
    /// without the hash.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ChatError::validation("Username, email and password are required"));
        }
        if password.chars().count() < MIN_PASSWORD_CHARS {
            return Err(ChatError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_CHARS
            )));
        }
        if self.users.find_by_email(email).await?.is_some() {
            return Err(ChatError::validation("Email is already registered"));
        }

        let hash = hash_password(password, self.hash_cost).await?;
        let user = self.users.create(username, email, Some(&hash)).await?;
        tracing::info!(user_id = %user.id, "[Registration] Registered user {}", user.name);
        Ok(user.without_secret())
    }
}

async fn hash_password(password: &str, cost: u32) -> Result<String> {
    let password = password.to_string();
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ChatError::internal(format!("Password hashing task failed: {}", e)))?
        .map_err(|e| ChatError::internal(format!("Password hashing failed: {}", e)))
}
