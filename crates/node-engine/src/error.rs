//! Error types for the node engine

use thiserror::Error;

/// Result type alias using NodeEngineError
pub type Result<T> = std::result::Result<T, NodeEngineError>;

/// Errors that can occur in the node engine
#[derive(Debug, Error)]
pub enum NodeEngineError {
    /// Node type is not present in the registry
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Node config failed its type's schema
    #[error("Invalid config for node type '{node_type}': {}", .errors.join("; "))]
    InvalidConfig {
        node_type: String,
        errors: Vec<String>,
    },

    /// Node does not exist in the workflow
    #[error("Node not found: {0}")]
    NodeNotFound(String),

    /// Pre-run graph validation failed
    #[error("Workflow validation failed: {0}")]
    Validation(String),

    /// The workflow graph contains a cycle
    #[error("Workflow contains a circular dependency")]
    CyclicGraph,

    /// A node's executor failed during a run
    #[error("Node '{node_id}' ({node_type}) failed: {source}")]
    NodeExecution {
        node_id: String,
        node_type: String,
        #[source]
        source: Box<NodeEngineError>,
    },

    /// A run is already in flight
    #[error("Workflow is already executing")]
    WorkflowBusy,

    /// No executor bound to the node type
    #[error("No executor found for node type: {0}")]
    MissingExecutor(String),

    /// Executor-raised failure
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),

    /// Normalized failure from a remote completion service
    #[error("Remote service error{}: {message}", status_suffix(.status))]
    Remote {
        status: Option<u16>,
        message: String,
    },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Compression error
    #[error("Compression error: {0}")]
    Compression(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {})", s)).unwrap_or_default()
}

impl NodeEngineError {
    /// Create an execution failed error with a message
    pub fn failed(msg: impl Into<String>) -> Self {
        Self::ExecutionFailed(msg.into())
    }

    /// Wrap an executor error with the failing node's identity
    pub fn node_execution(
        node_id: impl Into<String>,
        node_type: impl Into<String>,
        cause: NodeEngineError,
    ) -> Self {
        Self::NodeExecution {
            node_id: node_id.into(),
            node_type: node_type.into(),
            source: Box::new(cause),
        }
    }
}
