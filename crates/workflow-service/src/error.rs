//! Error types for the workflow service

use completion_client::CompletionError;
use node_engine::NodeEngineError;
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias using ServiceError
pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Engine(#[from] NodeEngineError),

    #[error(transparent)]
    Completion(#[from] CompletionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ServiceError {
    /// Whether the call was rejected because a run is in flight
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Engine(NodeEngineError::WorkflowBusy))
    }
}
