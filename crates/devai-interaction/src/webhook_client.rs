//! Webhook-backed question answering.
//!
//! The automation workflow behind the webhook is opaque: it receives the
//! question and returns free text in one of several body shapes, which
//! [`coerce_answer`] normalizes.

use async_trait::async_trait;
use devai_core::answer::{AnswerService, coerce_answer, validate_question};
use devai_core::{ChatError, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

/// Longest body excerpt carried in an upstream error.
const ERROR_EXCERPT_CHARS: usize = 300;

/// Request body. Workflows read the question from different fields, so it is
/// sent under all of them.
#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    message: &'a str,
    text: &'a str,
    query: &'a str,
    #[serde(rename = "chatId", skip_serializing_if = "Option::is_none")]
    chat_id: Option<&'a str>,
}

impl<'a> AskRequest<'a> {
    fn new(question: &'a str, chat_id: Option<&'a str>) -> Self {
        Self {
            question,
            message: question,
            text: question,
            query: question,
            chat_id,
        }
    }
}

/// [`AnswerService`] that posts questions to an automation webhook.
///
/// No timeout is applied unless one is configured; the transport decides.
#[derive(Clone)]
pub struct WebhookAnswerService {
    client: Client,
    url: String,
    timeout: Option<Duration>,
}

impl WebhookAnswerService {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            url: url.into(),
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl AnswerService for WebhookAnswerService {
    async fn ask(&self, question: &str, chat_id: Option<&str>) -> Result<String> {
        let question = validate_question(question)?;

        let mut request = self
            .client
            .post(&self.url)
            .json(&AskRequest::new(question, chat_id));
        if let Some(timeout) = self.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(|e| {
            tracing::warn!("[Webhook] Request to {} failed: {}", self.url, e);
            ChatError::upstream(None, format!("Webhook request failed: {}", e))
        })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ChatError::upstream(Some(status.as_u16()), format!("Failed to read webhook response: {}", e))
        })?;

        if !status.is_success() {
            let excerpt: String = body.chars().take(ERROR_EXCERPT_CHARS).collect();
            tracing::warn!("[Webhook] {} returned {}: {}", self.url, status, excerpt);
            return Err(ChatError::upstream(
                Some(status.as_u16()),
                format!("Webhook returned {}: {}", status, excerpt),
            ));
        }

        let answer = coerce_answer(&body);
        tracing::debug!(
            chat_id = chat_id.unwrap_or_default(),
            answer_len = answer.len(),
            "[Webhook] Answer received"
        );
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_body_carries_every_field() {
        let body = serde_json::to_value(AskRequest::new("stok?", Some("abc"))).unwrap();
        assert_eq!(
            body,
            json!({
                "question": "stok?",
                "message": "stok?",
                "text": "stok?",
                "query": "stok?",
                "chatId": "abc",
            })
        );

        let body = serde_json::to_value(AskRequest::new("stok?", None)).unwrap();
        assert!(body.get("chatId").is_none());
    }
}
