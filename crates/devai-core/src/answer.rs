//! Question-answering collaborator.

use crate::error::{ChatError, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Field names tried, in order, when the answer body is a JSON object.
pub const ANSWER_FIELDS: [&str; 5] = ["output", "answer", "text", "message", "data"];

/// External service that answers a question with free text.
#[async_trait]
pub trait AnswerService: Send + Sync {
    /// Sends `question` and returns the answer text.
    ///
    /// `chat_id` is the current session id, forwarded so the backend can keep
    /// its own memory per conversation.
    async fn ask(&self, question: &str, chat_id: Option<&str>) -> Result<String>;
}

/// Trims the question and rejects it when nothing is left.
pub fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        return Err(ChatError::validation("Question must not be empty"));
    }
    Ok(trimmed)
}

/// Coerces a successful answer body into display text.
///
/// A JSON string is used as is; for an object the first string-valued field
/// of [`ANSWER_FIELDS`] wins; any other JSON is pretty-printed. A body that is
/// not JSON at all is returned verbatim.
pub fn coerce_answer(body: &str) -> String {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return body.to_string(),
    };

    match &parsed {
        Value::String(text) => text.clone(),
        Value::Object(map) => ANSWER_FIELDS
            .iter()
            .find_map(|field| {
                map.get(*field)
                    .and_then(Value::as_str)
                    .filter(|text| !text.is_empty())
            })
            .map(str::to_string)
            .unwrap_or_else(|| pretty(&parsed)),
        _ => pretty(&parsed),
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_question() {
        assert_eq!(validate_question("  where?  ").unwrap(), "where?");
        assert!(validate_question("   ").unwrap_err().is_validation());
    }

    #[test]
    fn test_field_priority() {
        let body = r#"{"text": "from text", "output": "from output"}"#;
        assert_eq!(coerce_answer(body), "from output");

        let body = r#"{"message": "from message", "data": "from data"}"#;
        assert_eq!(coerce_answer(body), "from message");
    }

    #[test]
    fn test_non_string_fields_are_skipped() {
        let body = r#"{"output": {"nested": true}, "answer": "plain"}"#;
        assert_eq!(coerce_answer(body), "plain");

        let body = r#"{"output": "", "text": "fallback"}"#;
        assert_eq!(coerce_answer(body), "fallback");
    }

    #[test]
    fn test_unknown_shape_is_pretty_printed() {
        let body = r#"{"result": 42}"#;
        assert_eq!(coerce_answer(body), "{\n  \"result\": 42\n}");

        assert_eq!(coerce_answer("[1]"), "[\n  1\n]");
    }

    #[test]
    fn test_string_and_raw_bodies() {
        assert_eq!(coerce_answer(r#""quoted answer""#), "quoted answer");
        assert_eq!(coerce_answer("plain text answer"), "plain text answer");
    }
}
