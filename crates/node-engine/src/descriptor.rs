//! Node type descriptors
//!
//! A [`NodeDescriptor`] is the static metadata registered for a node type:
//! display label, category, named input and output ports, and the typed
//! config schema. Built-in node implementations describe themselves through
//! [`DescribeNode`] and submit a [`BuiltinNode`] to `inventory`, so
//! `NodeRegistry::with_builtins()` picks up every node linked into the binary.
//!
//! # Example
//!
//! ```ignore
//! use node_engine::{DescribeNode, NodeDescriptor, NodeCategory, ConfigSchema, ConfigField};
//!
//! impl DescribeNode for UpperCaseNode {
//!     fn descriptor() -> NodeDescriptor {
//!         NodeDescriptor::new("upperCase", "Upper Case", NodeCategory::Processing)
//!             .with_inputs(&["input"])
//!             .with_outputs(&["output"])
//!             .with_schema(ConfigSchema::new().field("trim", ConfigField::boolean(true)))
//!     }
//! }
//!
//! inventory::submit!(node_engine::BuiltinNode::new(
//!     UpperCaseNode::descriptor,
//!     || std::sync::Arc::new(UpperCaseNode),
//! ));
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::NodeExecutor;
use crate::schema::ConfigSchema;
use crate::types::{GraphNode, NodeCategory};

/// Trait for node implementations that can describe their metadata
pub trait DescribeNode {
    /// Get the static descriptor for this node type
    fn descriptor() -> NodeDescriptor
    where
        Self: Sized;
}

/// Complete metadata for a node type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeDescriptor {
    /// Registry key (e.g., "urlExtractor")
    pub node_type: String,
    /// Human-readable label
    pub label: String,
    /// Category for grouping and search
    pub category: NodeCategory,
    #[serde(default)]
    pub description: String,
    /// Declared input port names
    #[serde(default)]
    pub inputs: Vec<String>,
    /// Declared output port names
    #[serde(default)]
    pub outputs: Vec<String>,
    /// Typed schema for the node's config
    #[serde(default)]
    pub config_schema: ConfigSchema,
    /// Config parameter whose value names an extra output port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_name_param: Option<String>,
}

impl NodeDescriptor {
    /// Create a descriptor with no ports and an empty schema
    pub fn new(
        node_type: impl Into<String>,
        label: impl Into<String>,
        category: NodeCategory,
    ) -> Self {
        Self {
            node_type: node_type.into(),
            label: label.into(),
            category,
            description: String::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            config_schema: ConfigSchema::new(),
            output_name_param: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_inputs(mut self, inputs: &[&str]) -> Self {
        self.inputs = inputs.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_outputs(mut self, outputs: &[&str]) -> Self {
        self.outputs = outputs.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_schema(mut self, schema: ConfigSchema) -> Self {
        self.config_schema = schema;
        self
    }

    /// Let the value of config parameter `param` act as an output port name
    pub fn with_output_name_param(mut self, param: impl Into<String>) -> Self {
        self.output_name_param = Some(param.into());
        self
    }

    /// Whether `port` is a declared input
    pub fn has_input(&self, port: &str) -> bool {
        self.inputs.iter().any(|p| p == port)
    }

    /// Whether `port` is a valid output on `node`.
    ///
    /// Besides the declared outputs, a node may expose the port named by its
    /// `output_name_param` config value.
    pub fn has_output(&self, node: &GraphNode, port: &str) -> bool {
        if self.outputs.iter().any(|p| p == port) {
            return true;
        }
        self.output_name_param
            .as_deref()
            .and_then(|param| node.config_str(param))
            .is_some_and(|name| !name.is_empty() && name == port)
    }

    /// Case-insensitive substring match over label, category and type
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.label.to_lowercase().contains(&query)
            || self.category.as_str().contains(&query)
            || self.node_type.to_lowercase().contains(&query)
    }
}

/// Link-time registration of a built-in node type
pub struct BuiltinNode {
    pub descriptor: fn() -> NodeDescriptor,
    pub executor: fn() -> Arc<dyn NodeExecutor>,
}

impl BuiltinNode {
    pub const fn new(
        descriptor: fn() -> NodeDescriptor,
        executor: fn() -> Arc<dyn NodeExecutor>,
    ) -> Self {
        Self {
            descriptor,
            executor,
        }
    }
}

inventory::collect!(BuiltinNode);
