//! Events reporting workflow run progress
//!
//! The engine emits a [`WorkflowEvent`] at each run and node boundary. Any
//! consumer (a UI bridge, a log, a test) implements [`EventSink`].

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Receiver for workflow events
///
/// Abstracts over the transport so the engine can run in any host.
pub trait EventSink: Send + Sync {
    /// Deliver an event; fails when the consumer has gone away
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError>;
}

/// Error when delivering an event fails
#[derive(Debug, Clone)]
pub struct EventError {
    pub message: String,
}

impl std::fmt::Display for EventError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Event error: {}", self.message)
    }
}

impl std::error::Error for EventError {}

impl EventError {
    pub fn channel_closed() -> Self {
        Self {
            message: "Channel closed".to_string(),
        }
    }
}

/// Events emitted during a workflow run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum WorkflowEvent {
    /// Run accepted, validated and ordered
    #[serde(rename_all = "camelCase")]
    WorkflowStarted {
        workflow_name: String,
        execution_id: String,
        node_count: usize,
    },

    /// All nodes finished
    #[serde(rename_all = "camelCase")]
    WorkflowCompleted {
        workflow_name: String,
        execution_id: String,
        duration_ms: u64,
    },

    /// Run aborted
    #[serde(rename_all = "camelCase")]
    WorkflowFailed {
        workflow_name: String,
        execution_id: String,
        error: String,
    },

    /// An executor is about to be invoked
    #[serde(rename_all = "camelCase")]
    NodeStarted {
        node_id: String,
        node_type: String,
        execution_id: String,
    },

    /// An executor returned its output
    #[serde(rename_all = "camelCase")]
    NodeCompleted {
        node_id: String,
        execution_id: String,
        output: serde_json::Value,
    },

    /// An executor failed
    #[serde(rename_all = "camelCase")]
    NodeFailed {
        node_id: String,
        node_type: String,
        execution_id: String,
        error: String,
    },
}

impl WorkflowEvent {
    /// Execution id carried by every event
    pub fn execution_id(&self) -> &str {
        match self {
            Self::WorkflowStarted { execution_id, .. }
            | Self::WorkflowCompleted { execution_id, .. }
            | Self::WorkflowFailed { execution_id, .. }
            | Self::NodeStarted { execution_id, .. }
            | Self::NodeCompleted { execution_id, .. }
            | Self::NodeFailed { execution_id, .. } => execution_id,
        }
    }

    /// Node the event concerns, if any
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NodeStarted { node_id, .. }
            | Self::NodeCompleted { node_id, .. }
            | Self::NodeFailed { node_id, .. } => Some(node_id),
            _ => None,
        }
    }
}

/// A no-op event sink that discards all events
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn send(&self, _event: WorkflowEvent) -> Result<(), EventError> {
        Ok(())
    }
}

/// An event sink that collects events in memory
///
/// Useful for tests that assert on the emitted sequence.
#[derive(Default)]
pub struct VecEventSink {
    events: Mutex<Vec<WorkflowEvent>>,
}

impl VecEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all collected events
    pub fn events(&self) -> Vec<WorkflowEvent> {
        self.events.lock().clone()
    }

    /// Clear all collected events
    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

impl EventSink for VecEventSink {
    fn send(&self, event: WorkflowEvent) -> Result<(), EventError> {
        self.events.lock().push(event);
        Ok(())
    }
}
