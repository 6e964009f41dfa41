//! Application layer for Dev AI.
//!
//! Use cases that coordinate the domain types with the injected
//! collaborators: transcript synchronization, the conversation state machine
//! and account management.

pub mod authenticator;
pub mod controller;
pub mod registration;
pub mod scheduler;
pub mod synchronizer;

pub use authenticator::CredentialAuthenticator;
pub use controller::{ConversationController, ConversationState, Source};
pub use registration::RegistrationService;
pub use scheduler::DebounceScheduler;
pub use synchronizer::{
    ReconcileReport, SessionSynchronizer, SyncOptions, SyncOutcome, UpsertOutcome,
};
