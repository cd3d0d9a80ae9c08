//! Node Engine - workflow graph store and sequential execution
//!
//! This crate holds the core of a node-based workflow system:
//!
//! - `GraphStore`: nodes, connections, selection and undo history, with
//!   topological ordering and validation
//! - `NodeRegistry`: node type descriptors (ports, typed config schema) and
//!   the executor bound to each type
//! - `NodeManager`: dispatches one node to its executor
//! - `ExecutionEngine`: validates, orders and runs a workflow, one node at a
//!   time, emitting `WorkflowEvent`s to an `EventSink`
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use node_engine::{ExecutionEngine, ExecutorExtensions, GraphStore, NodeManager, NodeRegistry};
//!
//! let registry = Arc::new(NodeRegistry::with_builtins());
//! let mut store = GraphStore::new(registry.clone());
//! let source = store.add_node("contentInput", config)?;
//! let extract = store.add_node("urlExtractor", Default::default())?;
//! store.add_connection(&source.id, "output", &extract.id, "input");
//!
//! let engine = ExecutionEngine::new(NodeManager::new(registry, Arc::new(ExecutorExtensions::new())));
//! let results = engine.execute_workflow(&store).await?;
//! ```

pub mod builder;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod events;
pub mod extensions;
pub mod manager;
pub mod registry;
pub mod schema;
pub mod store;
pub mod types;
pub mod undo;
pub mod validation;

// Re-export key types
pub use builder::WorkflowBuilder;
pub use descriptor::{BuiltinNode, DescribeNode, NodeDescriptor};
pub use engine::{ExecutionEngine, ExecutionResults};
pub use error::{NodeEngineError, Result};
pub use events::{EventError, EventSink, NullEventSink, VecEventSink, WorkflowEvent};
pub use extensions::{extension_keys, ExecutorExtensions};
pub use manager::NodeManager;
pub use registry::{CallbackNodeExecutor, NodeExecutor, NodeRegistry, SyncCallbackNodeExecutor};
pub use schema::{ConfigField, ConfigSchema, FieldKind};
pub use store::GraphStore;
pub use types::{
    Connection, ConnectionId, GraphNode, NodeCategory, NodeConfig, NodeId, PortName, PortValues,
    WorkflowDocument, WorkflowStats,
};
pub use undo::UndoStack;
pub use validation::{ValidationError, ValidationReport};

// Used by `inventory::submit!` in crates that register built-in nodes
pub use inventory;
