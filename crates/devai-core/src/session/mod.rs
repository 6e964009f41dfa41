//! Session domain module.
//!
//! # Module Structure
//!
//! - `id`: Provisional / canonical session identifiers (`SessionId`)
//! - `message`: Message types (`MessageRole`, `Message`, `StoredMessage`)
//! - `model`: Transcript and session summary (`Transcript`, `ChatSession`)
//! - `repository`: Typed access to the session tables (`ChatRepository`)

mod id;
mod message;
mod model;
mod repository;

pub use id::SessionId;
pub use message::{Message, MessageRole, StoredMessage};
pub use model::{ChatSession, DEFAULT_TITLE, TITLE_MAX_CHARS, Transcript};
pub use repository::{ChatRepository, SESSION_LIST_LIMIT};

pub(crate) use repository::{into_row, now_rfc3339};
