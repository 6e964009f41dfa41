//! Credential-based [`AuthProvider`].

use async_trait::async_trait;
use devai_core::auth::{AuthIdentity, AuthProvider};
use devai_core::store::TableStore;
use devai_core::user::UserRepository;
use devai_core::{ChatError, Result};
use std::sync::Arc;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

/// Authenticates against the `users` table with bcrypt-hashed passwords.
///
/// The login may be either the email address or the user name.
pub struct CredentialAuthenticator {
    users: UserRepository,
}

impl CredentialAuthenticator {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self {
            users: UserRepository::new(store),
        }
    }
}

#[async_trait]
impl AuthProvider for CredentialAuthenticator {
    async fn authenticate(&self, login: &str, password: &str) -> Result<AuthIdentity> {
        let login = login.trim();
        if login.is_empty() || password.is_empty() {
            return Err(ChatError::auth("Username and password are required"));
        }

        let user = self
            .users
            .find_by_login(login)
            .await?
            .ok_or_else(|| ChatError::auth(INVALID_CREDENTIALS))?;
        let Some(hash) = user.password_hash.clone() else {
            return Err(ChatError::auth(
                "This account signs in through an external provider",
            ));
        };

        let password = password.to_string();
        let verified = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
            .await
            .map_err(|e| ChatError::internal(format!("Password check task failed: {}", e)))?
            .unwrap_or(false);
        if !verified {
            tracing::debug!(user_id = %user.id, "[Auth] Password mismatch");
            return Err(ChatError::auth(INVALID_CREDENTIALS));
        }

        Ok(AuthIdentity {
            user_id: user.id,
            name: user.name,
            email: user.email,
        })
    }
}
