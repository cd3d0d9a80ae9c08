//! Fluent builder for workflow documents
//!
//! Builds a [`WorkflowDocument`] with explicit node ids, without consulting
//! a registry. Load the result into a `GraphStore` to validate it.

use serde_json::Value;

use crate::types::{Connection, GraphNode, NodeConfig, WorkflowDocument};

/// Fluent builder for constructing workflow documents
///
/// # Example
///
/// ```ignore
/// let doc = WorkflowBuilder::new("Extract")
///     .add_node("node_1", "contentInput")
///     .with_config(serde_json::json!({"content": "see https://x/a.png"}))
///     .add_node("node_2", "urlExtractor")
///     .connect("node_1", "output", "node_2", "input")
///     .build();
/// ```
pub struct WorkflowBuilder {
    name: String,
    nodes: Vec<GraphNode>,
    connections: Vec<Connection>,
    connection_counter: usize,
}

impl WorkflowBuilder {
    /// Create a new workflow builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
            connection_counter: 0,
        }
    }

    /// Add a node with an empty config
    pub fn add_node(mut self, id: impl Into<String>, node_type: impl Into<String>) -> Self {
        self.nodes.push(GraphNode {
            id: id.into(),
            node_type: node_type.into(),
            config: NodeConfig::new(),
            label: None,
        });
        self
    }

    /// Set config on the most recently added node
    ///
    /// Non-object values are ignored.
    pub fn with_config(mut self, config: Value) -> Self {
        if let (Some(node), Value::Object(map)) = (self.nodes.last_mut(), config) {
            node.config = map;
        }
        self
    }

    /// Set the label of the most recently added node
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        if let Some(node) = self.nodes.last_mut() {
            node.label = Some(label.into());
        }
        self
    }

    /// Connect two ports (auto-generates the connection id)
    pub fn connect(
        self,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        let id = format!("connection_{}", self.connection_counter + 1);
        self.connect_with_id(id, source, source_port, target, target_port)
    }

    /// Connect two ports with an explicit connection id
    pub fn connect_with_id(
        mut self,
        id: impl Into<String>,
        source: impl Into<String>,
        source_port: impl Into<String>,
        target: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        self.connection_counter += 1;
        self.connections.push(Connection {
            id: id.into(),
            source_node_id: source.into(),
            source_port: source_port.into(),
            target_node_id: target.into(),
            target_port: target_port.into(),
        });
        self
    }

    /// Build the document without validation
    pub fn build(self) -> WorkflowDocument {
        WorkflowDocument {
            name: self.name,
            nodes: self.nodes,
            connections: self.connections,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_build_document() {
        let doc = WorkflowBuilder::new("demo")
            .add_node("a", "contentInput")
            .with_config(json!({"content": "hi"}))
            .with_label("Source")
            .add_node("b", "regex")
            .connect("a", "output", "b", "input")
            .connect("a", "output", "b", "input")
            .build();

        assert_eq!(doc.name, "demo");
        assert_eq!(doc.nodes.len(), 2);
        assert_eq!(doc.nodes[0].config_str("content"), Some("hi"));
        assert_eq!(doc.nodes[0].label.as_deref(), Some("Source"));
        assert_eq!(doc.connections[0].id, "connection_1");
        assert_eq!(doc.connections[1].id, "connection_2");
    }

    #[test]
    fn test_with_config_before_any_node_is_ignored() {
        let doc = WorkflowBuilder::new("empty")
            .with_config(json!({"content": "hi"}))
            .add_node("a", "contentInput")
            .with_config(json!("not an object"))
            .build();
        assert!(doc.nodes[0].config.is_empty());
    }
}
