//! Request and response shapes

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single-prompt completion request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    /// Extra body fields (temperature, max_tokens, ...), merged last
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl CompletionRequest {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            options: Map::new(),
        }
    }

    pub fn with_option(mut self, key: impl Into<String>, value: Value) -> Self {
        self.options.insert(key.into(), value);
        self
    }

    /// Body for `/v1/chat/completions`
    pub(crate) fn chat_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert(
            "messages".to_string(),
            serde_json::json!([{ "role": "user", "content": self.prompt }]),
        );
        body.insert("stream".to_string(), Value::Bool(false));
        self.merge_options(body)
    }

    /// Body for `/v1/completions`
    pub(crate) fn plain_body(&self) -> Value {
        let mut body = Map::new();
        body.insert("model".to_string(), Value::String(self.model.clone()));
        body.insert("prompt".to_string(), Value::String(self.prompt.clone()));
        body.insert("stream".to_string(), Value::Bool(false));
        self.merge_options(body)
    }

    fn merge_options(&self, mut body: Map<String, Value>) -> Value {
        for (key, value) in &self.options {
            body.insert(key.clone(), value.clone());
        }
        Value::Object(body)
    }
}

/// Structured error envelope: `{ "error": { "message" } }`,
/// `{ "error": "..." }` or `{ "message" }`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorField>,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ErrorField {
    Text(String),
    Detail { message: Option<String> },
}

impl ErrorField {
    fn into_message(self) -> Option<String> {
        match self {
            Self::Text(text) => Some(text),
            Self::Detail { message } => message,
        }
    }
}

/// Message from an error body: the envelope's message when the body parses
/// as one, otherwise the raw text
pub(crate) fn error_message(body: &str) -> String {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope
            .error
            .and_then(ErrorField::into_message)
            .or(envelope.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| body.to_string()),
        Err(_) => body.to_string(),
    }
}

/// Generated text from a completion response, or "" if none is found
pub(crate) fn extract_text(data: &Value) -> String {
    let first_choice = data
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first());

    if let Some(choice) = first_choice {
        if let Some(content) = choice
            .pointer("/message/content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
        {
            return content.to_string();
        }
        if let Some(text) = choice
            .get("text")
            .and_then(|t| t.as_str())
            .filter(|t| !t.is_empty())
        {
            return text.to_string();
        }
    }

    data.get("text")
        .and_then(|t| t.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Model list from `data.data`, else `data.models`, else empty
pub(crate) fn extract_models(data: Value) -> Vec<Value> {
    let Value::Object(mut map) = data else {
        return Vec::new();
    };
    for key in ["data", "models"] {
        if let Some(Value::Array(models)) = map.remove(key) {
            return models;
        }
    }
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bodies_merge_options_last() {
        let request = CompletionRequest::new("m", "hi")
            .with_option("temperature", json!(0.2))
            .with_option("stream", json!(true));

        let chat = request.chat_body();
        assert_eq!(chat["messages"][0]["content"], "hi");
        assert_eq!(chat["messages"][0]["role"], "user");
        assert_eq!(chat["temperature"], 0.2);
        assert_eq!(chat["stream"], true);

        let plain = request.plain_body();
        assert_eq!(plain["prompt"], "hi");
        assert!(plain.get("messages").is_none());
    }

    #[test]
    fn test_error_message_two_step_parse() {
        assert_eq!(
            error_message(r#"{"error": {"message": "bad model"}}"#),
            "bad model"
        );
        assert_eq!(error_message(r#"{"message": "slow down"}"#), "slow down");
        assert_eq!(error_message(r#"{"error": "tool not found"}"#), "tool not found");
        assert_eq!(error_message("plain failure"), "plain failure");
        assert_eq!(error_message(r#"{"detail": 1}"#), r#"{"detail": 1}"#);
    }

    #[test]
    fn test_extract_text_order() {
        assert_eq!(
            extract_text(&json!({"choices": [{"message": {"content": "chat"}, "text": "plain"}]})),
            "chat"
        );
        assert_eq!(extract_text(&json!({"choices": [{"text": "plain"}]})), "plain");
        assert_eq!(extract_text(&json!({"text": "bare"})), "bare");
        assert_eq!(extract_text(&json!({"choices": []})), "");
        assert_eq!(extract_text(&json!("unexpected")), "");
    }

    #[test]
    fn test_extract_models_shapes() {
        assert_eq!(extract_models(json!({"data": [{"id": "a"}]})).len(), 1);
        assert_eq!(extract_models(json!({"models": ["a", "b"]})).len(), 2);
        assert!(extract_models(json!({"data": "nope"})).is_empty());
        assert!(extract_models(json!([1, 2])).is_empty());
    }
}
