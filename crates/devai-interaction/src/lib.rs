//! Remote collaborators reached over HTTP.

pub mod webhook_client;

pub use webhook_client::WebhookAnswerService;
