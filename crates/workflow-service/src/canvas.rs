//! Canvas collaborator interface
//!
//! The coordinator keeps whatever draws the workflow in sync with the
//! store by calling a [`CanvasView`] after each mutation. Hosts without a
//! visual editor use [`NullCanvas`]; [`RecordingCanvas`] keeps the calls in
//! memory for tests and headless inspection.

use node_engine::{Connection, GraphNode, NodeId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Receives rendering updates from the coordinator
pub trait CanvasView: Send + Sync {
    /// Draw or redraw a node
    fn render_node(&self, node: &GraphNode);

    fn remove_node(&self, node_id: &str);

    /// Draw a connection between two rendered nodes
    fn render_connection(&self, connection: &Connection);

    fn remove_connection(&self, connection_id: &str);

    /// Drop everything drawn so far
    fn clear(&self);
}

/// Canvas that draws nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NullCanvas;

impl CanvasView for NullCanvas {
    fn render_node(&self, _node: &GraphNode) {}
    fn remove_node(&self, _node_id: &str) {}
    fn render_connection(&self, _connection: &Connection) {}
    fn remove_connection(&self, _connection_id: &str) {}
    fn clear(&self) {}
}

/// One call made on a canvas
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasOp {
    RenderNode(NodeId),
    RemoveNode(NodeId),
    RenderConnection(String),
    RemoveConnection(String),
    Clear,
}

/// Canvas that records every call
#[derive(Debug, Default)]
pub struct RecordingCanvas {
    ops: Mutex<Vec<CanvasOp>>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls recorded so far
    pub fn ops(&self) -> Vec<CanvasOp> {
        self.ops.lock().clone()
    }

    /// Return and forget the recorded calls
    pub fn take(&self) -> Vec<CanvasOp> {
        std::mem::take(&mut *self.ops.lock())
    }
}

impl CanvasView for RecordingCanvas {
    fn render_node(&self, node: &GraphNode) {
        self.ops.lock().push(CanvasOp::RenderNode(node.id.clone()));
    }

    fn remove_node(&self, node_id: &str) {
        self.ops.lock().push(CanvasOp::RemoveNode(node_id.to_string()));
    }

    fn render_connection(&self, connection: &Connection) {
        self.ops
            .lock()
            .push(CanvasOp::RenderConnection(connection.id.clone()));
    }

    fn remove_connection(&self, connection_id: &str) {
        self.ops
            .lock()
            .push(CanvasOp::RemoveConnection(connection_id.to_string()));
    }

    fn clear(&self) {
        self.ops.lock().push(CanvasOp::Clear);
    }
}

/// A finished pointer drag from an output port, possibly onto an input port
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointerDrag {
    pub source_node_id: NodeId,
    pub source_port: String,
    /// Node under the pointer when released, if any
    #[serde(default)]
    pub target_node_id: Option<NodeId>,
    /// Input port under the pointer when released, if any
    #[serde(default)]
    pub target_port: Option<String>,
}

impl PointerDrag {
    /// Drag released over an input port
    pub fn onto(
        source_node_id: impl Into<String>,
        source_port: impl Into<String>,
        target_node_id: impl Into<String>,
        target_port: impl Into<String>,
    ) -> Self {
        Self {
            source_node_id: source_node_id.into(),
            source_port: source_port.into(),
            target_node_id: Some(target_node_id.into()),
            target_port: Some(target_port.into()),
        }
    }

    /// Target node and port, when the drag ended on a port
    pub fn target(&self) -> Option<(&str, &str)> {
        Some((self.target_node_id.as_deref()?, self.target_port.as_deref()?))
    }
}
