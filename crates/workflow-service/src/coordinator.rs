//! Workflow coordinator
//!
//! The single entry point hosts talk to. Owns the registry, the graph store,
//! the execution engine and the completion client factory, keeps the canvas
//! in sync after each mutation, and refuses to mutate the graph while a run
//! is in flight.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use completion_client::{ClientConfig, ClientFactory};
use node_engine::{
    Connection, EventSink, ExecutionEngine, ExecutionResults, ExecutorExtensions, GraphNode,
    GraphStore, NodeCategory, NodeConfig, NodeDescriptor, NodeEngineError, NodeExecutor, NodeId,
    NodeManager, NodeRegistry, NullEventSink, ValidationReport, WorkflowDocument, WorkflowStats,
};
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::RwLockWriteGuard;

use crate::canvas::{CanvasView, NullCanvas, PointerDrag};
use crate::config::ServiceConfig;
use crate::error::Result;

/// Facade over one workflow and the services needed to run it
pub struct WorkflowCoordinator {
    registry: RwLock<Arc<NodeRegistry>>,
    /// Lock order: `store` before `engine`
    store: tokio::sync::RwLock<GraphStore>,
    engine: tokio::sync::RwLock<ExecutionEngine>,
    executing: Arc<AtomicBool>,
    runs: RunCounter,
    client_factory: Arc<ClientFactory>,
    canvas: Arc<dyn CanvasView>,
    default_name: String,
}

impl WorkflowCoordinator {
    /// Create a coordinator over `registry` that discards workflow events
    pub fn new(registry: Arc<NodeRegistry>, config: &ServiceConfig) -> Self {
        Self::with_event_sink(registry, config, Arc::new(NullEventSink))
    }

    /// Create a coordinator over `registry` reporting run progress to `event_sink`
    pub fn with_event_sink(
        registry: Arc<NodeRegistry>,
        config: &ServiceConfig,
        event_sink: Arc<dyn EventSink>,
    ) -> Self {
        let client_factory = Arc::new(ClientFactory::new(config.client.clone()));
        let mut extensions = ExecutorExtensions::new();
        workflow_nodes::setup_extensions(&mut extensions, client_factory.clone());
        workflow_nodes::setup_plugin_client(&mut extensions, &config.plugin);

        let manager = NodeManager::new(registry.clone(), Arc::new(extensions));
        let engine = ExecutionEngine::with_event_sink(manager, event_sink);
        let executing = engine.executing_flag();

        let mut store = GraphStore::with_history_limit(registry.clone(), config.history_limit);
        store.reset(config.default_workflow_name.clone());

        Self {
            registry: RwLock::new(registry),
            store: tokio::sync::RwLock::new(store),
            engine: tokio::sync::RwLock::new(engine),
            executing,
            runs: RunCounter::default(),
            client_factory,
            canvas: Arc::new(NullCanvas),
            default_name: config.default_workflow_name.clone(),
        }
    }

    /// Coordinator with every built-in node type registered
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(Arc::new(NodeRegistry::with_builtins()), config)
    }

    /// Attach the canvas that mirrors the graph
    pub fn with_canvas(mut self, canvas: Arc<dyn CanvasView>) -> Self {
        self.canvas = canvas;
        self
    }

    /// Whether a run is in flight
    pub fn is_executing(&self) -> bool {
        self.executing.load(Ordering::Acquire)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_executing() || self.runs.active() {
            return Err(NodeEngineError::WorkflowBusy.into());
        }
        Ok(())
    }

    /// Write access to the store for a graph mutation
    ///
    /// A run that starts while the mutation waits for the lock makes the
    /// mutation fail as busy instead of applying after the run.
    async fn store_for_mutation(&self) -> Result<RwLockWriteGuard<'_, GraphStore>> {
        let started = self.runs.started();
        self.ensure_idle()?;
        let store = self.store.write().await;
        if self.runs.started() != started {
            return Err(NodeEngineError::WorkflowBusy.into());
        }
        Ok(store)
    }

    fn rerender(&self, store: &GraphStore) {
        self.canvas.clear();
        for node in store.nodes() {
            self.canvas.render_node(node);
        }
        for connection in store.connections() {
            self.canvas.render_connection(connection);
        }
    }

    // ------------------------------------------------------------------
    // Workflow lifecycle
    // ------------------------------------------------------------------

    /// Start an empty workflow; `None` uses the configured default name
    pub async fn new_workflow(&self, name: Option<String>) -> Result<()> {
        let mut store = self.store_for_mutation().await?;
        store.reset(name.unwrap_or_else(|| self.default_name.clone()));
        self.canvas.clear();
        log::info!("Started new workflow '{}'", store.name());
        Ok(())
    }

    /// Replace the current workflow with `document`
    ///
    /// Returns the number of connections dropped for dangling endpoints.
    /// Undo history starts over from the loaded state.
    pub async fn load_workflow(&self, document: WorkflowDocument) -> Result<usize> {
        let mut store = self.store_for_mutation().await?;
        let dropped = store.deserialize(document);
        store.clear_history();
        self.rerender(&store);
        log::info!(
            "Loaded workflow '{}' ({} nodes, {} connections dropped)",
            store.name(),
            store.node_count(),
            dropped
        );
        Ok(dropped)
    }

    /// Snapshot the current workflow
    pub async fn save_workflow(&self) -> WorkflowDocument {
        self.store.read().await.serialize()
    }

    pub async fn load_from_json(&self, json: &str) -> Result<usize> {
        let document = WorkflowDocument::from_json(json)?;
        self.load_workflow(document).await
    }

    pub async fn to_json(&self) -> Result<String> {
        Ok(self.save_workflow().await.to_json()?)
    }

    /// Load a workflow document from a JSON file
    pub async fn load_workflow_file(&self, path: &Path) -> Result<usize> {
        let contents = tokio::fs::read_to_string(path).await?;
        self.load_from_json(&contents).await
    }

    /// Write the current workflow to a JSON file
    pub async fn save_workflow_file(&self, path: &Path) -> Result<()> {
        let contents = self.to_json().await?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, contents).await?;
        log::info!("Workflow saved to {:?}", path);
        Ok(())
    }

    /// Run the workflow and return each node's outputs in execution order
    pub async fn execute_workflow(&self) -> Result<ExecutionResults> {
        let _run = self.runs.begin();
        let store = self.store.read().await;
        let engine = self.engine.read().await;
        Ok(engine.execute_workflow(&store).await?)
    }

    // ------------------------------------------------------------------
    // Graph mutation
    // ------------------------------------------------------------------

    pub async fn add_node(&self, node_type: &str, config: NodeConfig) -> Result<GraphNode> {
        let node = self.store_for_mutation().await?.add_node(node_type, config)?;
        self.canvas.render_node(&node);
        Ok(node)
    }

    /// Remove a node and every connection touching it; false if not found
    pub async fn remove_node(&self, node_id: &str) -> Result<bool> {
        let removed = self.store_for_mutation().await?.remove_node_cascade(node_id);
        match removed {
            Some(connection_ids) => {
                for connection_id in &connection_ids {
                    self.canvas.remove_connection(connection_id);
                }
                self.canvas.remove_node(node_id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Merge `patch` into a node's config; false if the node is missing
    pub async fn update_node_config(&self, node_id: &str, patch: NodeConfig) -> Result<bool> {
        let mut store = self.store_for_mutation().await?;
        if !store.update_node_config(node_id, &patch)? {
            return Ok(false);
        }
        if let Some(node) = store.node(node_id) {
            self.canvas.render_node(node);
        }
        Ok(true)
    }

    pub async fn set_node_label(&self, node_id: &str, label: &str) -> Result<bool> {
        let mut store = self.store_for_mutation().await?;
        if !store.set_node_label(node_id, label) {
            return Ok(false);
        }
        if let Some(node) = store.node(node_id) {
            self.canvas.render_node(node);
        }
        Ok(true)
    }

    /// Connect two ports; `Ok(None)` when the connection is invalid
    pub async fn add_connection(
        &self,
        source_node_id: &str,
        source_port: &str,
        target_node_id: &str,
        target_port: &str,
    ) -> Result<Option<Connection>> {
        let connection = self.store_for_mutation().await?.add_connection(
            source_node_id,
            source_port,
            target_node_id,
            target_port,
        );
        if let Some(connection) = &connection {
            self.canvas.render_connection(connection);
        }
        Ok(connection)
    }

    pub async fn remove_connection(&self, connection_id: &str) -> Result<bool> {
        let removed = self.store_for_mutation().await?.remove_connection(connection_id);
        if removed {
            self.canvas.remove_connection(connection_id);
        }
        Ok(removed)
    }

    /// Turn a finished canvas drag into a connection
    ///
    /// Drags released away from a port, invalid pairings and drags during a
    /// run are ignored.
    pub async fn handle_connection_drag(&self, drag: PointerDrag) -> Option<Connection> {
        let (target_node_id, target_port) = drag.target()?;
        match self
            .add_connection(&drag.source_node_id, &drag.source_port, target_node_id, target_port)
            .await
        {
            Ok(connection) => connection,
            Err(e) => {
                log::debug!("Ignoring connection drag: {}", e);
                None
            }
        }
    }

    /// Step back one mutation; false when there is nothing to undo
    pub async fn undo(&self) -> Result<bool> {
        let mut store = self.store_for_mutation().await?;
        let changed = store.undo()?;
        if changed {
            self.rerender(&store);
        }
        Ok(changed)
    }

    /// Re-apply an undone mutation; false when there is nothing to redo
    pub async fn redo(&self) -> Result<bool> {
        let mut store = self.store_for_mutation().await?;
        let changed = store.redo()?;
        if changed {
            self.rerender(&store);
        }
        Ok(changed)
    }

    pub async fn can_undo(&self) -> bool {
        self.store.read().await.can_undo()
    }

    pub async fn can_redo(&self) -> bool {
        self.store.read().await.can_redo()
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn execution_order(&self) -> Option<Vec<NodeId>> {
        self.store.read().await.execution_order()
    }

    pub async fn validate_workflow(&self) -> ValidationReport {
        self.store.read().await.validate()
    }

    pub async fn stats(&self) -> WorkflowStats {
        self.store.read().await.stats()
    }

    pub async fn node(&self, node_id: &str) -> Option<GraphNode> {
        self.store.read().await.node(node_id).cloned()
    }

    pub async fn workflow_name(&self) -> String {
        self.store.read().await.name().to_string()
    }

    // ------------------------------------------------------------------
    // Node types
    // ------------------------------------------------------------------

    fn registry(&self) -> Arc<NodeRegistry> {
        self.registry.read().clone()
    }

    /// Every registered type, sorted by node type
    pub fn list_node_types(&self) -> Vec<NodeDescriptor> {
        self.registry().list_types().into_iter().cloned().collect()
    }

    pub fn node_types_by_category(&self) -> HashMap<NodeCategory, Vec<NodeDescriptor>> {
        self.registry()
            .grouped_by_category()
            .into_iter()
            .map(|(category, descriptors)| {
                (category, descriptors.into_iter().cloned().collect())
            })
            .collect()
    }

    pub fn search_node_types(&self, query: &str) -> Vec<NodeDescriptor> {
        self.registry().search(query).into_iter().cloned().collect()
    }

    pub fn node_descriptor(&self, node_type: &str) -> Option<NodeDescriptor> {
        self.registry().get_descriptor(node_type).cloned()
    }

    /// Default config for a new node of `node_type`
    pub fn config_template(&self, node_type: &str) -> Result<NodeConfig> {
        Ok(self.registry().config_template(node_type)?)
    }

    /// Every schema violation in `config`
    pub fn validate_node_config(&self, node_type: &str, config: &NodeConfig) -> Result<Vec<String>> {
        Ok(self.registry().validate_config(node_type, config)?)
    }

    /// Register or overwrite a node type, e.g. one discovered from a plugin
    pub async fn register_node_type(&self, descriptor: NodeDescriptor) -> Result<()> {
        log::info!("Registering node type '{}'", descriptor.node_type);
        self.update_registry(move |registry| registry.register_node_type(descriptor))
            .await
    }

    /// Bind or rebind the executor for a node type
    pub async fn register_node_executor(
        &self,
        node_type: &str,
        executor: Arc<dyn NodeExecutor>,
    ) -> Result<()> {
        let node_type = node_type.to_string();
        self.update_registry(move |registry| registry.register_executor(node_type, executor))
            .await
    }

    /// Register a tool on the plugin server as a node type
    ///
    /// The node type is sent as the tool name when the node runs.
    pub async fn register_plugin_node(&self, descriptor: NodeDescriptor) -> Result<()> {
        self.update_registry(move |registry| {
            registry.register(descriptor, Arc::new(workflow_nodes::PluginCallNode))
        })
        .await
    }

    /// Copy the registry, apply `change`, and hand the new one to store and engine
    async fn update_registry(&self, change: impl FnOnce(&mut NodeRegistry)) -> Result<()> {
        let mut store = self.store_for_mutation().await?;
        let mut engine = self.engine.write().await;

        let registry = {
            let mut current = self.registry.write();
            let mut next = NodeRegistry::clone(&current);
            change(&mut next);
            let next = Arc::new(next);
            *current = next.clone();
            next
        };
        store.set_registry(registry.clone());
        engine.set_registry(registry);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Completion service
    // ------------------------------------------------------------------

    pub fn client_factory(&self) -> &Arc<ClientFactory> {
        &self.client_factory
    }

    /// Point AI-backed nodes at a different completion service
    pub fn update_client_config(&self, config: ClientConfig) {
        self.client_factory.update_config(config);
    }

    /// Models offered by the configured completion service
    pub async fn list_models(&self) -> Result<Vec<Value>> {
        let client = self.client_factory.client()?;
        Ok(client.list_models().await?)
    }
}

/// Tracks runs from before they wait on the store until they return
#[derive(Default)]
struct RunCounter {
    started: AtomicU64,
    active: AtomicUsize,
}

impl RunCounter {
    fn begin(&self) -> RunTicket<'_> {
        self.active.fetch_add(1, Ordering::AcqRel);
        self.started.fetch_add(1, Ordering::AcqRel);
        RunTicket { counter: self }
    }

    fn started(&self) -> u64 {
        self.started.load(Ordering::Acquire)
    }

    fn active(&self) -> bool {
        self.active.load(Ordering::Acquire) > 0
    }
}

struct RunTicket<'a> {
    counter: &'a RunCounter,
}

impl Drop for RunTicket<'_> {
    fn drop(&mut self) {
        self.counter.active.fetch_sub(1, Ordering::AcqRel);
    }
}
