//! Client for the tool-plugin server
//!
//! Plugin nodes run tools hosted by a separate server. Each call is a single
//! `POST` with a plain-text tool request block as the body:
//!
//! ```text
//! <<<[TOOL_REQUEST]>>>
//! maid:「始」Workflow「末」,
//! tool_name:「始」ImageGen「末」,
//! prompt:「始」a cat「末」
//! <<<[END_TOOL_REQUEST]>>>
//! ```
//!
//! Servers usually answer with `{ "result": { "content": "<json>" } }`,
//! where the embedded JSON may wrap the tool's own output in
//! `original_plugin_output`. [`unwrap_plugin_result`] peels those layers.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::client::check_status;
use crate::error::{CompletionError, Result};

/// Default timeout for a tool call; tools may render images or fetch pages
pub const DEFAULT_PLUGIN_TIMEOUT_MS: u64 = 120_000;

const REQUEST_START: &str = "<<<[TOOL_REQUEST]>>>";
const REQUEST_END: &str = "<<<[END_TOOL_REQUEST]>>>";

/// Where the plugin server lives and who is calling it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginConfig {
    /// Full URL tool requests are posted to; empty means not configured
    pub url: String,
    /// Bearer token; empty means no auth header
    pub api_key: String,
    /// Caller name sent as `maid` with every request
    pub user_name: String,
    pub timeout_ms: u64,
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            api_key: String::new(),
            user_name: "Workflow".to_string(),
            timeout_ms: DEFAULT_PLUGIN_TIMEOUT_MS,
        }
    }
}

impl PluginConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
    }
}

/// One tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRequest {
    tool_name: String,
    command: Option<String>,
    params: Vec<(String, String)>,
}

impl ToolRequest {
    pub fn new(tool_name: impl Into<String>) -> Self {
        Self {
            tool_name: tool_name.into(),
            command: None,
            params: Vec::new(),
        }
    }

    /// Select one of the tool's commands
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        let command = command.into();
        self.command = (!command.is_empty()).then_some(command);
        self
    }

    /// Add a parameter; empty values are not sent
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.params.push((key.into(), value));
        }
        self
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    /// Render the request block, one comma-separated field per line
    pub fn render(&self, user_name: &str) -> String {
        let mut fields = vec![field("maid", user_name), field("tool_name", &self.tool_name)];
        if let Some(command) = &self.command {
            fields.push(field("command", command));
        }
        fields.extend(self.params.iter().map(|(key, value)| field(key, value)));

        format!("{}\n{}\n{}", REQUEST_START, fields.join(",\n"), REQUEST_END)
    }
}

fn field(key: &str, value: &str) -> String {
    format!("{}:「始」{}「末」", key, value)
}

/// Peel the server envelope off a tool response
///
/// When `result.content` holds JSON text, the parsed content replaces the
/// envelope, and its `original_plugin_output` replaces it in turn. Anything
/// else is returned unchanged.
pub fn unwrap_plugin_result(data: Value) -> Value {
    let Some(content) = data.pointer("/result/content").and_then(Value::as_str) else {
        return data;
    };
    match serde_json::from_str::<Value>(content) {
        Ok(Value::Object(mut parsed)) => match parsed.remove("original_plugin_output") {
            Some(output) if !output.is_null() => output,
            _ => Value::Object(parsed),
        },
        Ok(parsed) => parsed,
        Err(e) => {
            log::debug!("Plugin result content is not JSON ({}), keeping envelope", e);
            data
        }
    }
}

/// Client for one plugin server
#[derive(Debug, Clone)]
pub struct PluginClient {
    http: reqwest::Client,
    url: String,
    api_key: Option<String>,
    user_name: String,
    timeout: Duration,
}

impl PluginClient {
    /// Create a client from settings; fails when no URL is set
    pub fn from_config(config: &PluginConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(CompletionError::PluginNotConfigured);
        }
        let api_key = config.api_key.trim();
        Ok(Self {
            http: reqwest::Client::new(),
            url: config.url.trim().to_string(),
            api_key: (!api_key.is_empty()).then(|| api_key.to_string()),
            user_name: config.user_name.clone(),
            timeout: Duration::from_millis(config.timeout_ms),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Run a tool and return its unwrapped output
    ///
    /// A success body that is not JSON is returned as a string.
    pub async fn call(&self, request: &ToolRequest) -> Result<Value> {
        log::debug!("Calling tool '{}' at {}", request.tool_name(), self.url);
        let mut builder = self
            .http
            .post(&self.url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
            .body(request.render(&self.user_name));
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = check_status(builder.send().await?).await?;
        let text = response.text().await?;
        match serde_json::from_str::<Value>(&text) {
            Ok(data) => Ok(unwrap_plugin_result(data)),
            Err(_) => Ok(Value::String(text)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_server(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/v1/human/tool", addr)
    }

    #[test]
    fn test_render_request_block() {
        let request = ToolRequest::new("ImageGen")
            .with_command("generate")
            .param("prompt", "a cat")
            .param("size", "");
        assert_eq!(
            request.render("Ryan"),
            "<<<[TOOL_REQUEST]>>>\n\
             maid:「始」Ryan「末」,\n\
             tool_name:「始」ImageGen「末」,\n\
             command:「始」generate「末」,\n\
             prompt:「始」a cat「末」\n\
             <<<[END_TOOL_REQUEST]>>>"
        );
        assert_eq!(request.params().len(), 1);
    }

    #[test]
    fn test_unwrap_layers() {
        let wrapped = json!({"result": {"content": r#"{"original_plugin_output": {"url": "https://x/a.png"}}"#}});
        assert_eq!(unwrap_plugin_result(wrapped), json!({"url": "https://x/a.png"}));

        let content_only = json!({"result": {"content": r#"{"status": "ok"}"#}});
        assert_eq!(unwrap_plugin_result(content_only), json!({"status": "ok"}));

        let prose = json!({"result": {"content": "done"}});
        assert_eq!(unwrap_plugin_result(prose.clone()), prose);

        let bare = json!({"success": true});
        assert_eq!(unwrap_plugin_result(bare.clone()), bare);
    }

    #[test]
    fn test_unconfigured_client() {
        let err = PluginClient::from_config(&PluginConfig::default()).unwrap_err();
        assert!(matches!(err, CompletionError::PluginNotConfigured));
    }

    #[tokio::test]
    async fn test_call_sends_block_with_auth() {
        let router = Router::new().route(
            "/v1/human/tool",
            post(|headers: HeaderMap, body: String| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("none")
                    .to_string();
                let content = json!({"original_plugin_output": {"auth": auth, "body": body}});
                Json(json!({"result": {"content": content.to_string()}}))
            }),
        );
        let url = spawn_server(router).await;
        let client = PluginClient::from_config(&PluginConfig::new(url).with_api_key("secret")).unwrap();

        let output = client
            .call(&ToolRequest::new("Echo").param("text", "hi"))
            .await
            .unwrap();
        assert_eq!(output["auth"], "Bearer secret");
        let body = output["body"].as_str().unwrap();
        assert!(body.starts_with("<<<[TOOL_REQUEST]>>>\nmaid:「始」Workflow「末」,\n"));
        assert!(body.contains("tool_name:「始」Echo「末」,\ntext:「始」hi「末」\n"));
        assert!(body.ends_with("<<<[END_TOOL_REQUEST]>>>"));
    }

    #[tokio::test]
    async fn test_plain_text_success_is_a_string() {
        let router = Router::new().route("/v1/human/tool", post(|| async { "tool finished" }));
        let client = PluginClient::from_config(&PluginConfig::new(spawn_server(router).await)).unwrap();

        let output = client.call(&ToolRequest::new("Echo")).await.unwrap();
        assert_eq!(output, json!("tool finished"));
    }

    #[tokio::test]
    async fn test_error_message_from_envelope_or_text() {
        let router = Router::new()
            .route(
                "/v1/human/tool",
                post(|| async { (StatusCode::BAD_REQUEST, Json(json!({"error": "unknown tool"}))) }),
            )
            .route(
                "/raw",
                post(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
            );
        let url = spawn_server(router).await;

        let client = PluginClient::from_config(&PluginConfig::new(url.clone())).unwrap();
        let err = client.call(&ToolRequest::new("Nope")).await.unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(err.message(), "unknown tool");

        let raw_url = url.replace("/v1/human/tool", "/raw");
        let client = PluginClient::from_config(&PluginConfig::new(raw_url)).unwrap();
        let err = client.call(&ToolRequest::new("Nope")).await.unwrap_err();
        assert_eq!(err.to_string(), "HTTP 502: upstream down");
    }
}
