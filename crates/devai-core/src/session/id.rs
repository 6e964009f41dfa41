//! Session identifiers.
//!
//! A conversation starts with a client-minted provisional id and switches to
//! the store-assigned canonical id once the session row exists. The phase is
//! carried in the type instead of being inferred from the string.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

static PROVISIONAL_SEQ: AtomicU32 = AtomicU32::new(0);

/// Identifier of a chat session in either of its two phases.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SessionId {
    /// Locally generated, time-based, valid until the store assigns an id.
    Provisional(String),
    /// Store-assigned, durable id.
    Canonical(String),
}

impl SessionId {
    /// Mints a fresh provisional id (`chat-<unix millis>-<seq>`).
    pub fn provisional() -> Self {
        let seq = PROVISIONAL_SEQ.fetch_add(1, Ordering::Relaxed);
        Self::Provisional(format!(
            "chat-{}-{}",
            chrono::Utc::now().timestamp_millis(),
            seq
        ))
    }

    pub fn canonical(id: impl Into<String>) -> Self {
        Self::Canonical(id.into())
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Provisional(id) | Self::Canonical(id) => id,
        }
    }

    pub fn is_provisional(&self) -> bool {
        matches!(self, Self::Provisional(_))
    }

    pub fn is_canonical(&self) -> bool {
        matches!(self, Self::Canonical(_))
    }

    /// Returns the canonical id string, if any.
    pub fn canonical_id(&self) -> Option<&str> {
        match self {
            Self::Canonical(id) => Some(id),
            Self::Provisional(_) => None,
        }
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
