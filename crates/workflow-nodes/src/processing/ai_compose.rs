//! AI Compose Node
//!
//! Builds a prompt from a template and the node's input, sends it to the
//! completion service, and emits the generated text.
//!
//! The prompt may reference upstream values with `{{path}}` placeholders
//! (see [`crate::template`]). `{{input}}` is special: it stands for the
//! node's input rendered as text, and when the prompt does not contain it
//! the input is appended after a blank line.
//!
//! # Config
//! - `prompt` (required), `model` (required)
//! - `input`: fallback input text when the `input` port is not connected;
//!   the literal `{{input}}` here means "the whole input map"
//! - `outputParamName`: output key (default `aiResult`)

use std::sync::Arc;

use async_trait::async_trait;
use completion_client::{ClientFactory, CompletionRequest};
use node_engine::{
    extension_keys, ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode,
    NodeCategory, NodeDescriptor, NodeExecutor, PortValues,
};
use serde_json::Value;

use crate::error::NodeError;
use crate::output_param_name;
use crate::template;

const INPUT_PLACEHOLDER: &str = "{{input}}";

/// Sends a composed prompt to the completion service
#[derive(Debug, Clone, Copy, Default)]
pub struct AiComposeNode;

impl AiComposeNode {
    pub const NODE_TYPE: &'static str = "aiCompose";
    /// Port ID for the data input
    pub const PORT_INPUT: &'static str = "input";
    /// Default port ID for the generated text
    pub const PORT_RESULT: &'static str = "aiResult";

    /// Model name and final prompt for a node and its input
    pub fn compose(node: &GraphNode, inputs: &PortValues) -> Result<(String, String), NodeError> {
        let prompt = node.config_str("prompt").unwrap_or_default().trim();
        if prompt.is_empty() {
            return Err(NodeError::MissingConfig("prompt"));
        }
        let model = node.config_str("model").unwrap_or_default().trim();
        if model.is_empty() {
            return Err(NodeError::MissingConfig("model"));
        }

        let prompt = template::render(prompt, inputs, &["input"]);
        let input_text = template::value_to_text(&Self::raw_input(node, inputs));

        let prompt = if prompt.contains(INPUT_PLACEHOLDER) {
            prompt.replace(INPUT_PLACEHOLDER, &input_text)
        } else {
            format!("{}\n\n{}", prompt, input_text)
        };
        Ok((model.to_string(), prompt))
    }

    /// The connected input, else the config fallback, else ""
    fn raw_input(node: &GraphNode, inputs: &PortValues) -> Value {
        if let Some(value) = inputs.get(Self::PORT_INPUT).filter(|v| !v.is_null()) {
            return value.clone();
        }
        match node.config_str("input").filter(|s| !s.is_empty()) {
            Some(text) if text.contains(INPUT_PLACEHOLDER) => Value::Object(inputs.clone()),
            Some(text) => Value::String(template::render(text, inputs, &[])),
            None => Value::String(String::new()),
        }
    }
}

impl DescribeNode for AiComposeNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "AI Compose", NodeCategory::Auxiliary)
            .with_description("Sends a prompt built from the input to an AI model")
            .with_inputs(&[Self::PORT_INPUT])
            .with_outputs(&[Self::PORT_RESULT])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "input",
                        ConfigField::string("")
                            .with_description("Used when the input port is not connected"),
                    )
                    .field(
                        "prompt",
                        ConfigField::string("")
                            .with_description("Use {{input}} to place the input; otherwise it is appended")
                            .required(),
                    )
                    .field(
                        "model",
                        ConfigField::string("")
                            .with_description("Model name as listed by /v1/models")
                            .required(),
                    )
                    .field(
                        "outputParamName",
                        ConfigField::string(Self::PORT_RESULT)
                            .with_description("Output key for the generated text"),
                    ),
            )
            .with_output_name_param("outputParamName")
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    AiComposeNode::descriptor,
    || Arc::new(AiComposeNode)
));

#[async_trait]
impl NodeExecutor for AiComposeNode {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let (model, prompt) = Self::compose(node, &inputs)?;

        let factory = extensions
            .get::<Arc<ClientFactory>>(extension_keys::COMPLETION_CLIENT)
            .ok_or(NodeError::ClientUnavailable)?;
        let client = factory.client().map_err(NodeError::from)?;

        log::debug!(
            "AiComposeNode {}: sending {} char prompt to model '{}'",
            node.id,
            prompt.len(),
            model
        );
        let text = client
            .complete(&CompletionRequest::new(model, prompt))
            .await
            .map_err(NodeError::from)?;

        let mut outputs = PortValues::new();
        outputs.insert(output_param_name(node, Self::PORT_RESULT), Value::String(text));
        Ok(outputs)
    }
}
