//! Sequential workflow execution
//!
//! [`ExecutionEngine`] runs a whole workflow: it validates the store, takes
//! the topological order, and invokes each node's executor one at a time,
//! feeding it the outputs of its upstream nodes. The first node failure
//! aborts the run and no partial results are returned.
//!
//! Only one run may be in flight per engine. The executing flag is held by
//! a guard for the duration of the run and released on every exit path,
//! including when the run future is dropped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::{NodeEngineError, Result};
use crate::events::{EventSink, NullEventSink, WorkflowEvent};
use crate::manager::NodeManager;
use crate::registry::NodeRegistry;
use crate::store::GraphStore;
use crate::types::{NodeId, PortValues};

/// Per-node outputs of one run, in execution order
///
/// Serializes as a JSON object keyed by node id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResults {
    entries: Vec<(NodeId, PortValues)>,
    index: HashMap<NodeId, usize>,
}

impl ExecutionResults {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, node_id: NodeId, output: PortValues) {
        match self.index.get(&node_id) {
            Some(&i) => self.entries[i].1 = output,
            None => {
                self.index.insert(node_id.clone(), self.entries.len());
                self.entries.push((node_id, output));
            }
        }
    }

    /// Output of one node
    pub fn get(&self, node_id: &str) -> Option<&PortValues> {
        self.index.get(node_id).map(|&i| &self.entries[i].1)
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.index.contains_key(node_id)
    }

    /// Node ids in execution order
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.entries.iter().map(|(id, _)| id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&NodeId, &PortValues)> {
        self.entries.iter().map(|(id, out)| (id, out))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Serialize for ExecutionResults {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (id, output) in &self.entries {
            map.serialize_entry(id, output)?;
        }
        map.end()
    }
}

/// Holds the executing flag for the duration of a run
struct ExecutingGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> ExecutingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for ExecutingGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Runs workflows one node at a time in dependency order
pub struct ExecutionEngine {
    manager: NodeManager,
    executing: Arc<AtomicBool>,
    event_sink: Arc<dyn EventSink>,
}

impl ExecutionEngine {
    /// Create an engine that discards events
    pub fn new(manager: NodeManager) -> Self {
        Self::with_event_sink(manager, Arc::new(NullEventSink))
    }

    pub fn with_event_sink(manager: NodeManager, event_sink: Arc<dyn EventSink>) -> Self {
        Self {
            manager,
            executing: Arc::new(AtomicBool::new(false)),
            event_sink,
        }
    }

    pub fn manager(&self) -> &NodeManager {
        &self.manager
    }

    /// Swap the registry used to look up executors
    pub fn set_registry(&mut self, registry: Arc<NodeRegistry>) {
        self.manager.set_registry(registry);
    }

    /// Whether a run is in flight
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    /// Shared handle to the executing flag
    ///
    /// Lets an owner check for a run in flight without borrowing the engine.
    pub fn executing_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.executing)
    }

    fn emit(&self, event: WorkflowEvent) {
        if let Err(e) = self.event_sink.send(event) {
            log::warn!("Failed to deliver workflow event: {}", e);
        }
    }

    /// Run every node of `store` and return their outputs
    ///
    /// Fails with `WorkflowBusy` if a run is already in flight, `CyclicGraph`
    /// if the graph cannot be ordered, `Validation` if the workflow is
    /// otherwise invalid, and `NodeExecution` naming the first node whose
    /// executor failed.
    pub async fn execute_workflow(&self, store: &GraphStore) -> Result<ExecutionResults> {
        let _guard = ExecutingGuard::acquire(&self.executing).ok_or(NodeEngineError::WorkflowBusy)?;

        // A cycle takes precedence over any other validation error
        let order = store.execution_order().ok_or(NodeEngineError::CyclicGraph)?;
        let report = store.validate();
        if !report.valid {
            return Err(NodeEngineError::Validation(report.message()));
        }

        let execution_id = uuid::Uuid::new_v4().to_string();
        let workflow_name = store.name().to_string();
        let started = Instant::now();

        log::info!(
            "Starting workflow '{}' ({} nodes, execution {})",
            workflow_name,
            order.len(),
            execution_id
        );
        self.emit(WorkflowEvent::WorkflowStarted {
            workflow_name: workflow_name.clone(),
            execution_id: execution_id.clone(),
            node_count: order.len(),
        });

        let mut results = ExecutionResults::new();

        for node_id in &order {
            let node = store
                .node(node_id)
                .ok_or_else(|| NodeEngineError::NodeNotFound(node_id.clone()))?;
            let inputs = gather_inputs(store, node_id, &results);

            self.emit(WorkflowEvent::NodeStarted {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
                execution_id: execution_id.clone(),
            });

            match self.manager.execute_node(node, inputs).await {
                Ok(output) => {
                    log::debug!("Node {} completed", node.id);
                    self.emit(WorkflowEvent::NodeCompleted {
                        node_id: node.id.clone(),
                        execution_id: execution_id.clone(),
                        output: serde_json::Value::Object(output.clone()),
                    });
                    results.insert(node.id.clone(), output);
                }
                Err(cause) => {
                    log::error!("Node {} ({}) failed: {}", node.id, node.node_type, cause);
                    let error = NodeEngineError::node_execution(&node.id, &node.node_type, cause);
                    self.emit(WorkflowEvent::NodeFailed {
                        node_id: node.id.clone(),
                        node_type: node.node_type.clone(),
                        execution_id: execution_id.clone(),
                        error: error.to_string(),
                    });
                    self.emit(WorkflowEvent::WorkflowFailed {
                        workflow_name,
                        execution_id,
                        error: error.to_string(),
                    });
                    return Err(error);
                }
            }
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Workflow '{}' completed in {}ms",
            workflow_name,
            duration_ms
        );
        self.emit(WorkflowEvent::WorkflowCompleted {
            workflow_name,
            execution_id,
            duration_ms,
        });

        Ok(results)
    }
}

/// Build a node's input from upstream results
///
/// Connections are applied in insertion order, so when several feed the
/// same port the last one wins.
fn gather_inputs(store: &GraphStore, node_id: &str, results: &ExecutionResults) -> PortValues {
    let mut inputs = PortValues::new();
    for conn in store.incoming_connections(node_id) {
        if let Some(value) = results
            .get(&conn.source_node_id)
            .and_then(|output| output.get(&conn.source_port))
        {
            inputs.insert(conn.target_port.clone(), value.clone());
        }
    }
    inputs
}
