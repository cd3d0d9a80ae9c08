//! Plugin Call executor
//!
//! Runs a node whose type is a tool on the plugin server. Plugin node types
//! are registered by the host at runtime, so this executor has no
//! descriptor of its own; the node type is sent as the tool name.
//!
//! Request parameters come from the node config first. String values may
//! reference upstream data with `{{path}}` placeholders (see
//! [`crate::template`]); a value that is a single placeholder takes the
//! referenced value as is. Input ports then fill any parameter the config
//! left unset or empty.
//!
//! # Config
//! - `command`: tool command to run, sent as its own field
//! - `outputParamName`: output key for the tool's result (default `output`)
//! - any other key: sent as a tool parameter

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use completion_client::{PluginClient, ToolRequest};
use node_engine::{extension_keys, ExecutorExtensions, GraphNode, NodeExecutor, PortValues};
use serde_json::{json, Value};

use crate::error::NodeError;
use crate::output_param_name;
use crate::template;

/// Config keys that steer the call instead of being sent as parameters
const RESERVED_KEYS: [&str; 2] = ["command", "outputParamName"];

/// Sends a node's parameters to the plugin server as a tool request
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginCallNode;

impl PluginCallNode {
    /// Default port ID for the tool's result
    pub const PORT_OUTPUT: &'static str = "output";

    /// Tool request for a node and its inputs
    pub fn build_request(node: &GraphNode, inputs: &PortValues) -> ToolRequest {
        let mut params: BTreeMap<String, String> = BTreeMap::new();

        for (key, value) in &node.config {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            params.insert(key.clone(), config_param(resolve_config_value(value, inputs)));
        }

        for (key, value) in inputs {
            if key.is_empty() || params.get(key).is_some_and(|v| !v.is_empty()) {
                continue;
            }
            if let Some(text) = input_param(key, value) {
                params.insert(key.clone(), text);
            }
        }

        let mut request = ToolRequest::new(node.node_type.clone());
        if let Some(command) = node.config_str("command").map(str::trim) {
            request = request.with_command(command);
        }
        params
            .into_iter()
            .fold(request, |request, (key, value)| request.param(key, value))
    }
}

/// A lone `{{path}}` yields the referenced value; other strings are rendered
fn resolve_config_value(value: &Value, inputs: &PortValues) -> Value {
    let Value::String(text) = value else {
        return value.clone();
    };
    let trimmed = text.trim();
    if let Some(path) = trimmed
        .strip_prefix("{{")
        .and_then(|rest| rest.strip_suffix("}}"))
        .filter(|path| !path.contains("{{") && !path.contains("}}"))
    {
        return template::resolve_path(inputs, path.trim())
            .cloned()
            .unwrap_or(Value::Null);
    }
    Value::String(template::render(text, inputs, &[]))
}

/// Text for a config parameter: `output` of an object, else JSON for
/// structured values
fn config_param(value: Value) -> String {
    match value {
        Value::Object(ref map) => match map.get("output") {
            Some(output) => template::value_to_text(output),
            None => value.to_string(),
        },
        other => template::value_to_text(&other),
    }
}

/// Text for an input parameter, `None` when there is nothing to send
fn input_param(key: &str, value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::Object(map) => {
            let picked = match key {
                "url" => ["imageUrl", "url", "downloadUrl"]
                    .iter()
                    .find_map(|field| map.get(*field).filter(|v| is_present(v))),
                "downloadDir" => map.get("downloadDir").filter(|v| is_present(v)),
                _ => map.get("output"),
            };
            Some(match picked {
                Some(picked) => template::value_to_text(picked),
                None => value.to_string(),
            })
        }
        other => Some(template::value_to_text(other)),
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => false,
        Value::String(s) => !s.is_empty(),
        _ => true,
    }
}

#[async_trait]
impl NodeExecutor for PluginCallNode {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let client = extensions
            .get::<Arc<PluginClient>>(extension_keys::PLUGIN_CLIENT)
            .ok_or(NodeError::PluginUnavailable)?;

        let request = Self::build_request(node, &inputs);
        log::debug!(
            "PluginCallNode {}: calling '{}' with {} parameters",
            node.id,
            request.tool_name(),
            request.params().len()
        );
        let mut result = client.call(&request).await.map_err(NodeError::from)?;

        let mut outputs = PortValues::new();
        if let Value::Object(fields) = &mut result {
            if let Some(error) = fields.get("error").filter(|e| is_present(e)) {
                log::warn!("Tool '{}' reported an error: {}", request.tool_name(), error);
            }
            // Top-level fields double as ports so descriptors can expose them
            for (key, value) in fields.iter() {
                outputs.insert(key.clone(), value.clone());
            }
            fields.insert(
                "_metadata".to_string(),
                json!({
                    "executedBy": node.id,
                    "timestamp": chrono::Utc::now().to_rfc3339(),
                }),
            );
        }
        outputs.insert(output_param_name(node, Self::PORT_OUTPUT), result);
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use completion_client::PluginConfig;
    use node_engine::NodeEngineError;

    fn node(node_type: &str, config: Value) -> GraphNode {
        GraphNode {
            id: "node_4".to_string(),
            node_type: node_type.to_string(),
            config: config.as_object().cloned().unwrap(),
            label: None,
        }
    }

    fn inputs(value: Value) -> PortValues {
        value.as_object().cloned().unwrap()
    }

    fn params(request: &ToolRequest) -> Vec<(&str, &str)> {
        request
            .params()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect()
    }

    /// Plugin server that wraps the received body, or fails with `status`
    async fn spawn_server(status: StatusCode) -> ExecutorExtensions {
        let router = Router::new().route(
            "/tool",
            post(move |body: String| async move {
                if status.is_success() {
                    let content = json!({"original_plugin_output": {"imageUrl": "https://x/cat.png", "request": body}});
                    (status, Json(json!({"result": {"content": content.to_string()}})))
                } else {
                    (status, Json(json!({"error": "quota exceeded"})))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let client = PluginClient::from_config(&PluginConfig::new(format!("http://{}/tool", addr))).unwrap();
        ExecutorExtensions::new().with(extension_keys::PLUGIN_CLIENT, Arc::new(client))
    }

    #[test]
    fn test_config_wins_over_inputs() {
        let request = PluginCallNode::build_request(
            &node("ImageGen", json!({"prompt": "a {{style}} cat", "size": "", "command": "generate"})),
            &inputs(json!({"prompt": "ignored", "size": "512x512", "style": "tiny"})),
        );
        assert_eq!(request.tool_name(), "ImageGen");
        assert_eq!(
            params(&request),
            vec![("prompt", "a tiny cat"), ("size", "512x512"), ("style", "tiny")]
        );
        assert!(request.render("u").contains("command:「始」generate「末」"));
    }

    #[test]
    fn test_lone_placeholder_takes_structured_value() {
        let request = PluginCallNode::build_request(
            &node("Tool", json!({"text": "{{input}}", "items": "{{input.list}}"})),
            &inputs(json!({"input": {"output": "from upstream"}, "list": [1, 2]})),
        );
        assert_eq!(
            params(&request),
            vec![("input", "from upstream"), ("items", "[1,2]"), ("list", "[1,2]"), ("text", "from upstream")]
        );
    }

    #[test]
    fn test_input_objects_pick_useful_fields() {
        let request = PluginCallNode::build_request(
            &node("Downloader", json!({})),
            &inputs(json!({
                "url": {"url": "https://x/a.png", "imageUrl": "https://x/b.png"},
                "downloadDir": {"downloadDir": "/tmp/out"},
                "meta": {"width": 2},
                "empty": "",
                "missing": null,
            })),
        );
        assert_eq!(
            params(&request),
            vec![
                ("downloadDir", "/tmp/out"),
                ("meta", r#"{"width":2}"#),
                ("url", "https://x/b.png"),
            ]
        );
    }

    #[tokio::test]
    async fn test_call_unwraps_result_into_ports() {
        let extensions = spawn_server(StatusCode::OK).await;
        let outputs = PluginCallNode
            .execute(
                &node("ImageGen", json!({"prompt": "{{text}}", "outputParamName": "image"})),
                inputs(json!({"text": "a cat"})),
                &extensions,
            )
            .await
            .unwrap();

        assert_eq!(outputs.get("imageUrl"), Some(&json!("https://x/cat.png")));
        let image = outputs.get("image").unwrap();
        assert_eq!(image["_metadata"]["executedBy"], "node_4");
        let request = image["request"].as_str().unwrap();
        assert!(request.contains("tool_name:「始」ImageGen「末」"));
        assert!(request.contains("prompt:「始」a cat「末」"));
    }

    #[tokio::test]
    async fn test_server_error_is_remote() {
        let extensions = spawn_server(StatusCode::TOO_MANY_REQUESTS).await;
        let err = PluginCallNode
            .execute(&node("ImageGen", json!({})), PortValues::new(), &extensions)
            .await
            .unwrap_err();
        match err {
            NodeEngineError::Remote { status, message } => {
                assert_eq!(status, Some(429));
                assert_eq!(message, "quota exceeded");
            }
            other => panic!("Expected Remote error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_plugin_client() {
        let err = PluginCallNode
            .execute(&node("ImageGen", json!({})), PortValues::new(), &ExecutorExtensions::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Plugin server is not available"));
    }
}
