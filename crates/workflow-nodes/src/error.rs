//! Errors raised by built-in node executors
//!
//! Executors return `node_engine::Result`, so every [`NodeError`] converts
//! into a [`NodeEngineError`]. Completion and plugin server failures become
//! `NodeEngineError::Remote` with the HTTP status when there is one.

use completion_client::CompletionError;
use node_engine::NodeEngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    /// A config value the executor cannot run without is empty
    #[error("'{0}' is required")]
    MissingConfig(&'static str),

    #[error("Invalid regex pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Unknown {kind} '{value}'")]
    UnknownOption { kind: &'static str, value: String },

    /// A recognized option this build does not carry out
    #[error("{0}")]
    Unsupported(String),

    #[error("Cannot convert to number: {0}")]
    NotANumber(String),

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    /// No client factory was placed in the executor extensions
    #[error("Completion client is not available")]
    ClientUnavailable,

    /// No plugin client was placed in the executor extensions
    #[error("Plugin server is not available")]
    PluginUnavailable,

    #[error(transparent)]
    Completion(#[from] CompletionError),
}

impl From<NodeError> for NodeEngineError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::Completion(err) => NodeEngineError::Remote {
                status: err.status(),
                message: err.message(),
            },
            other => NodeEngineError::ExecutionFailed(other.to_string()),
        }
    }
}
