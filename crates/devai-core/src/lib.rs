//! Domain layer of the Dev AI chat client.
//!
//! Holds the types shared by every other crate: sessions and transcripts,
//! the error taxonomy, the collaborator traits (store, answer service, auth,
//! fallback cache) and the message formatter.

pub mod answer;
pub mod auth;
pub mod config;
pub mod error;
pub mod format;
pub mod history;
pub mod session;
pub mod store;
pub mod user;

pub use error::{ChatError, Result};
