//! Core types for workflow graphs
//!
//! These types define the structure of a workflow: nodes, the connections
//! routing named outputs to named inputs, and the serialized document.

use serde::{Deserialize, Serialize};

/// Unique identifier for a node
pub type NodeId = String;

/// Unique identifier for a connection
pub type ConnectionId = String;

/// Named port on a node type
pub type PortName = String;

/// Config values of a node, keyed by parameter name
pub type NodeConfig = serde_json::Map<String, serde_json::Value>;

/// Values flowing into or out of an executor, keyed by port name
pub type PortValues = serde_json::Map<String, serde_json::Value>;

/// Category of a node type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeCategory {
    /// Source nodes (static content, uploads)
    Input,
    /// Sink nodes (display, export)
    Output,
    /// Data transforms and AI-backed nodes
    Processing,
    /// Branching and pacing
    Control,
    /// General-purpose helper nodes
    Auxiliary,
    /// Nodes backed by a dynamically discovered plugin
    Plugin,
}

impl NodeCategory {
    /// Stable lowercase name, as serialized
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Processing => "processing",
            Self::Control => "control",
            Self::Auxiliary => "auxiliary",
            Self::Plugin => "plugin",
        }
    }
}

impl std::fmt::Display for NodeCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A node instance in a workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    /// Store-assigned identifier
    pub id: NodeId,
    /// Node type (registry key)
    #[serde(rename = "type")]
    pub node_type: String,
    /// Validated, default-filled configuration
    #[serde(default)]
    pub config: NodeConfig,
    /// Display label
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GraphNode {
    /// Read a string config value
    pub fn config_str(&self, key: &str) -> Option<&str> {
        self.config.get(key).and_then(|v| v.as_str())
    }

    /// Read a boolean config value
    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(|v| v.as_bool())
    }

    /// Read a numeric config value
    pub fn config_f64(&self, key: &str) -> Option<f64> {
        self.config.get(key).and_then(|v| v.as_f64())
    }
}

/// A directed connection from an output port to an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connection {
    /// Unique identifier for this connection
    pub id: ConnectionId,
    /// Source node ID
    pub source_node_id: NodeId,
    /// Output port on the source node
    pub source_port: PortName,
    /// Target node ID
    pub target_node_id: NodeId,
    /// Input port on the target node
    pub target_port: PortName,
}

impl Connection {
    /// Whether this connection touches the given node
    pub fn touches(&self, node_id: &str) -> bool {
        self.source_node_id == node_id || self.target_node_id == node_id
    }

    /// Whether two connections link the same ports
    pub fn same_endpoints(&self, other: &Connection) -> bool {
        self.source_node_id == other.source_node_id
            && self.source_port == other.source_port
            && self.target_node_id == other.target_node_id
            && self.target_port == other.target_port
    }
}

/// Serialized workflow: `{ name, nodes, connections }`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDocument {
    /// Workflow name
    #[serde(default)]
    pub name: String,
    /// Nodes in insertion order
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    /// Connections in insertion order
    #[serde(default)]
    pub connections: Vec<Connection>,
}

impl WorkflowDocument {
    /// Create an empty document
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
        }
    }

    /// Find a node by ID
    pub fn find_node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Parse a document from JSON text
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Render the document as pretty JSON text
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Counts reported by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowStats {
    pub node_count: usize,
    pub connection_count: usize,
    pub selected_count: usize,
    /// Undo snapshots held, including the current state
    pub history_states: usize,
    /// Most undo snapshots the store keeps
    pub history_capacity: usize,
    /// Compressed size of the undo history, in bytes
    pub history_bytes: usize,
}
