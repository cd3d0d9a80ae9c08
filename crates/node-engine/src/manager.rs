//! Per-node execution entry point
//!
//! [`NodeManager`] dispatches a node to the executor registered for its type
//! and hands the executor the shared [`ExecutorExtensions`]. The engine calls
//! it once per node with the input aggregated from upstream results.

use std::sync::Arc;

use crate::error::{NodeEngineError, Result};
use crate::extensions::ExecutorExtensions;
use crate::registry::NodeRegistry;
use crate::types::{GraphNode, PortValues};

/// Dispatches nodes to their registered executors
#[derive(Clone)]
pub struct NodeManager {
    registry: Arc<NodeRegistry>,
    extensions: Arc<ExecutorExtensions>,
}

impl NodeManager {
    pub fn new(registry: Arc<NodeRegistry>, extensions: Arc<ExecutorExtensions>) -> Self {
        Self {
            registry,
            extensions,
        }
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    pub fn set_registry(&mut self, registry: Arc<NodeRegistry>) {
        self.registry = registry;
    }

    pub fn extensions(&self) -> &Arc<ExecutorExtensions> {
        &self.extensions
    }

    /// Run one node's executor with its aggregated input
    pub async fn execute_node(&self, node: &GraphNode, inputs: PortValues) -> Result<PortValues> {
        let executor = self
            .registry
            .get_executor(&node.node_type)
            .ok_or_else(|| NodeEngineError::MissingExecutor(node.node_type.clone()))?;

        log::debug!("Executing node {} ({})", node.id, node.node_type);
        executor.execute(node, inputs, &self.extensions).await
    }
}
