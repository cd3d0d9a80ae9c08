//! Workflow Nodes
//!
//! Built-in node types for the workflow engine. Each node describes itself
//! through `DescribeNode`, runs through `NodeExecutor`, and submits a
//! `BuiltinNode` to `inventory`, so `NodeRegistry::with_builtins()` picks
//! it up when this crate is linked.
//!
//! # Nodes
//!
//! - **Input**: `contentInput`
//! - **Processing**: `urlExtractor`, `aiCompose`, `regex`, `dataTransform`,
//!   `codeEdit`
//! - **Control**: `condition`, `delay`, `loop`
//!
//! All of them are in the `auxiliary` category. [`PluginCallNode`] is not a
//! built-in: hosts bind it to the tool types they register at runtime.

pub mod control;
pub mod error;
pub mod input;
pub mod processing;
pub mod setup;
pub mod template;

pub use control::*;
pub use error::NodeError;
pub use input::*;
pub use processing::*;
pub use setup::{setup_extensions, setup_plugin_client};

use node_engine::GraphNode;

/// Output key configured through `outputParamName`, or `default` when unset
pub(crate) fn output_param_name(node: &GraphNode, default: &str) -> String {
    node.config_str("outputParamName")
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .unwrap_or(default)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_engine::{
        ExecutionEngine, ExecutorExtensions, GraphStore, NodeCategory, NodeManager, NodeRegistry,
    };
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn test_inventory_collects_all_builtins() {
        let registry = NodeRegistry::with_builtins();
        assert_eq!(registry.len(), 9, "Expected 9 built-in nodes");

        for node_type in [
            "contentInput",
            "urlExtractor",
            "aiCompose",
            "regex",
            "dataTransform",
            "codeEdit",
            "condition",
            "delay",
            "loop",
        ] {
            assert!(registry.has_node_type(node_type), "missing {}", node_type);
            assert!(registry.has_executor(node_type), "no executor for {}", node_type);
        }
        assert_eq!(registry.list_by_category(NodeCategory::Auxiliary).len(), 9);
    }

    #[test]
    fn test_output_param_name_fallback() {
        let mut node = GraphNode {
            id: "node_1".to_string(),
            node_type: "contentInput".to_string(),
            config: Default::default(),
            label: None,
        };
        assert_eq!(output_param_name(&node, "output"), "output");

        node.config.insert("outputParamName".to_string(), json!("  "));
        assert_eq!(output_param_name(&node, "output"), "output");

        node.config.insert("outputParamName".to_string(), json!("urls"));
        assert_eq!(output_param_name(&node, "output"), "urls");
    }

    #[tokio::test]
    async fn test_content_to_extractor_pipeline() {
        let registry = Arc::new(NodeRegistry::with_builtins());
        let mut store = GraphStore::new(registry.clone());

        let source = store
            .add_node(
                "contentInput",
                json!({"content": "<p><img src=\"https://x/a.png\"> https://x/b.mp4</p>"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        let extract = store
            .add_node(
                "urlExtractor",
                json!({"urlTypes": ["image", "video"], "outputParamName": "urls"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        let filter = store
            .add_node(
                "condition",
                json!({"operator": "contains", "value": "b.mp4"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        assert!(store
            .add_connection(&source.id, "output", &extract.id, "input")
            .is_some());
        // Renamed output port is wireable
        assert!(store
            .add_connection(&extract.id, "urls", &filter.id, "input")
            .is_some());

        let engine = ExecutionEngine::new(NodeManager::new(
            registry,
            Arc::new(ExecutorExtensions::new()),
        ));
        let results = engine.execute_workflow(&store).await.unwrap();

        let extracted = results.get(&extract.id).unwrap();
        assert_eq!(
            extracted.get("urls"),
            Some(&json!(["https://x/a.png", "https://x/b.mp4"]))
        );
        assert_eq!(extracted.get("count"), Some(&json!(2)));

        let routed = results.get(&filter.id).unwrap();
        assert!(routed.get("true").is_some());
    }
}
