//! Content Input Node
//!
//! Source node that emits static text typed into its config. The output
//! key defaults to `output` and can be renamed with `outputParamName`, so a
//! downstream node can receive it under the input name it expects.

use std::sync::Arc;

use async_trait::async_trait;
use node_engine::{
    ConfigField, ConfigSchema, DescribeNode, ExecutorExtensions, GraphNode, NodeCategory,
    NodeDescriptor, NodeExecutor, PortValues,
};
use serde_json::Value;

use crate::output_param_name;

/// Emits `{ <outputParamName>: content }`
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentInputNode;

impl ContentInputNode {
    pub const NODE_TYPE: &'static str = "contentInput";
    /// Port ID for the content output
    pub const PORT_OUTPUT: &'static str = "output";
}

impl DescribeNode for ContentInputNode {
    fn descriptor() -> NodeDescriptor {
        NodeDescriptor::new(Self::NODE_TYPE, "Content Input", NodeCategory::Auxiliary)
            .with_description("Emits fixed text, a URL or JSON as the start of a workflow")
            .with_outputs(&[Self::PORT_OUTPUT])
            .with_schema(
                ConfigSchema::new()
                    .field(
                        "content",
                        ConfigField::string("").with_description("Text, URL or JSON to emit"),
                    )
                    .field(
                        "outputParamName",
                        ConfigField::string(Self::PORT_OUTPUT)
                            .with_description("Output key downstream nodes read"),
                    ),
            )
            .with_output_name_param("outputParamName")
    }
}

inventory::submit!(node_engine::BuiltinNode::new(
    ContentInputNode::descriptor,
    || Arc::new(ContentInputNode)
));

#[async_trait]
impl NodeExecutor for ContentInputNode {
    async fn execute(
        &self,
        node: &GraphNode,
        _inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> node_engine::Result<PortValues> {
        let content = node.config_str("content").unwrap_or_default();
        let key = output_param_name(node, Self::PORT_OUTPUT);
        log::debug!(
            "ContentInputNode {}: emitting {} chars as '{}'",
            node.id,
            content.len(),
            key
        );

        let mut outputs = PortValues::new();
        outputs.insert(key, Value::String(content.to_string()));
        Ok(outputs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(config: Value) -> GraphNode {
        GraphNode {
            id: "node_1".to_string(),
            node_type: ContentInputNode::NODE_TYPE.to_string(),
            config: config.as_object().cloned().unwrap(),
            label: None,
        }
    }

    #[test]
    fn test_descriptor() {
        let desc = ContentInputNode::descriptor();
        assert_eq!(desc.node_type, "contentInput");
        assert_eq!(desc.category, NodeCategory::Auxiliary);
        assert!(desc.inputs.is_empty());
        assert_eq!(desc.outputs, vec!["output"]);
        assert_eq!(desc.output_name_param.as_deref(), Some("outputParamName"));
    }

    #[tokio::test]
    async fn test_emits_content_under_default_key() {
        let outputs = ContentInputNode
            .execute(
                &node(json!({"content": "https://x/a.png"})),
                PortValues::new(),
                &ExecutorExtensions::new(),
            )
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!("https://x/a.png")));
    }

    #[tokio::test]
    async fn test_renamed_output_key() {
        let outputs = ContentInputNode
            .execute(
                &node(json!({"content": "hi", "outputParamName": "greeting"})),
                PortValues::new(),
                &ExecutorExtensions::new(),
            )
            .await
            .unwrap();
        assert_eq!(outputs.get("greeting"), Some(&json!("hi")));
        assert!(outputs.get("output").is_none());
    }

    #[tokio::test]
    async fn test_missing_content_is_empty_string() {
        let outputs = ContentInputNode
            .execute(&node(json!({})), PortValues::new(), &ExecutorExtensions::new())
            .await
            .unwrap();
        assert_eq!(outputs.get("output"), Some(&json!("")));
    }
}
