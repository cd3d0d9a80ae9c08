//! Node type registry
//!
//! Maps node type names to their [`NodeDescriptor`] and to the executor that
//! runs them. The registry is an explicit value owned by the coordinator and
//! shared (`Arc`) with the store and the engine; nothing here is global.
//! Re-registering a type or an executor overwrites the previous one.
//!
//! # Usage
//!
//! ```ignore
//! use node_engine::{NodeRegistry, NodeDescriptor, NodeCategory};
//!
//! let mut registry = NodeRegistry::with_builtins();
//! registry.register_node_type(NodeDescriptor::new("FluxGen", "Flux", NodeCategory::Plugin));
//! registry.register_fn("FluxGen", |node, inputs| async move {
//!     call_plugin(&node, inputs).await
//! });
//! let registry = Arc::new(registry);
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;

use crate::descriptor::{BuiltinNode, NodeDescriptor};
use crate::error::{NodeEngineError, Result};
use crate::extensions::ExecutorExtensions;
use crate::types::{GraphNode, NodeCategory, NodeConfig, PortValues};

/// Per-node-type executor
///
/// Receives the node (for its config) and the input aggregated from upstream
/// results, and returns output values keyed by output port. Implementations
/// must tolerate missing input keys.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        extensions: &ExecutorExtensions,
    ) -> Result<PortValues>;
}

type BoxedCallback = Box<
    dyn Fn(GraphNode, PortValues) -> Pin<Box<dyn Future<Output = Result<PortValues>> + Send>>
        + Send
        + Sync,
>;

/// Async closure wrapped as a NodeExecutor
///
/// Used for plugin-backed types whose behavior is supplied at runtime.
pub struct CallbackNodeExecutor {
    callback: BoxedCallback,
}

impl CallbackNodeExecutor {
    pub fn new<F, Fut>(callback: F) -> Self
    where
        F: Fn(GraphNode, PortValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PortValues>> + Send + 'static,
    {
        Self {
            callback: Box::new(move |node, inputs| Box::pin(callback(node, inputs))),
        }
    }
}

#[async_trait]
impl NodeExecutor for CallbackNodeExecutor {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> Result<PortValues> {
        (self.callback)(node.clone(), inputs).await
    }
}

/// Synchronous closure wrapped as a NodeExecutor
pub struct SyncCallbackNodeExecutor {
    callback: Box<dyn Fn(&GraphNode, PortValues) -> Result<PortValues> + Send + Sync>,
}

impl SyncCallbackNodeExecutor {
    pub fn new(
        callback: impl Fn(&GraphNode, PortValues) -> Result<PortValues> + Send + Sync + 'static,
    ) -> Self {
        Self {
            callback: Box::new(callback),
        }
    }
}

#[async_trait]
impl NodeExecutor for SyncCallbackNodeExecutor {
    async fn execute(
        &self,
        node: &GraphNode,
        inputs: PortValues,
        _extensions: &ExecutorExtensions,
    ) -> Result<PortValues> {
        (self.callback)(node, inputs)
    }
}

/// Registry of node types with their descriptors and executors
///
/// Descriptors and executors are registered independently so a plugin
/// loader can publish a type for the palette before binding its behavior.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    descriptors: HashMap<String, NodeDescriptor>,
    executors: HashMap<String, Arc<dyn NodeExecutor>>,
}

impl NodeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in node linked into the binary
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for builtin in inventory::iter::<BuiltinNode> {
            registry.register((builtin.descriptor)(), (builtin.executor)());
        }
        log::debug!("Registered {} built-in node types", registry.len());
        registry
    }

    /// Register a descriptor together with its executor
    pub fn register(&mut self, descriptor: NodeDescriptor, executor: Arc<dyn NodeExecutor>) {
        self.executors
            .insert(descriptor.node_type.clone(), executor);
        self.register_node_type(descriptor);
    }

    /// Register or overwrite a node type's descriptor
    ///
    /// An executor already bound to the type is kept.
    pub fn register_node_type(&mut self, descriptor: NodeDescriptor) {
        if self.descriptors.contains_key(&descriptor.node_type) {
            log::debug!("Overwriting descriptor for node type '{}'", descriptor.node_type);
        }
        self.descriptors
            .insert(descriptor.node_type.clone(), descriptor);
    }

    /// Bind or rebind the executor for a node type
    pub fn register_executor(&mut self, node_type: impl Into<String>, executor: Arc<dyn NodeExecutor>) {
        self.executors.insert(node_type.into(), executor);
    }

    /// Bind an async closure as the executor for a node type
    pub fn register_fn<F, Fut>(&mut self, node_type: impl Into<String>, callback: F)
    where
        F: Fn(GraphNode, PortValues) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<PortValues>> + Send + 'static,
    {
        self.register_executor(node_type, Arc::new(CallbackNodeExecutor::new(callback)));
    }

    /// Bind a synchronous closure as the executor for a node type
    pub fn register_sync_fn(
        &mut self,
        node_type: impl Into<String>,
        callback: impl Fn(&GraphNode, PortValues) -> Result<PortValues> + Send + Sync + 'static,
    ) {
        self.register_executor(node_type, Arc::new(SyncCallbackNodeExecutor::new(callback)));
    }

    /// Get the descriptor for a node type
    pub fn get_descriptor(&self, node_type: &str) -> Option<&NodeDescriptor> {
        self.descriptors.get(node_type)
    }

    /// Get the executor for a node type
    pub fn get_executor(&self, node_type: &str) -> Option<Arc<dyn NodeExecutor>> {
        self.executors.get(node_type).cloned()
    }

    /// Check if a node type has a descriptor
    pub fn has_node_type(&self, node_type: &str) -> bool {
        self.descriptors.contains_key(node_type)
    }

    /// Check if a node type has an executor
    pub fn has_executor(&self, node_type: &str) -> bool {
        self.executors.contains_key(node_type)
    }

    /// Registered type names, sorted
    pub fn node_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.descriptors.keys().map(|s| s.as_str()).collect();
        types.sort_unstable();
        types
    }

    /// All descriptors, sorted by type name
    pub fn list_types(&self) -> Vec<&NodeDescriptor> {
        let mut all: Vec<&NodeDescriptor> = self.descriptors.values().collect();
        all.sort_by(|a, b| a.node_type.cmp(&b.node_type));
        all
    }

    /// Descriptors in one category, sorted by type name
    pub fn list_by_category(&self, category: NodeCategory) -> Vec<&NodeDescriptor> {
        self.list_types()
            .into_iter()
            .filter(|d| d.category == category)
            .collect()
    }

    /// Descriptors grouped by category
    pub fn grouped_by_category(&self) -> HashMap<NodeCategory, Vec<&NodeDescriptor>> {
        let mut grouped: HashMap<NodeCategory, Vec<&NodeDescriptor>> = HashMap::new();
        for descriptor in self.list_types() {
            grouped.entry(descriptor.category).or_default().push(descriptor);
        }
        grouped
    }

    /// Case-insensitive substring search over label and category
    pub fn search(&self, query: &str) -> Vec<&NodeDescriptor> {
        let query = query.trim();
        self.list_types()
            .into_iter()
            .filter(|d| query.is_empty() || d.matches(query))
            .collect()
    }

    fn descriptor_or_err(&self, node_type: &str) -> Result<&NodeDescriptor> {
        self.get_descriptor(node_type)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(node_type.to_string()))
    }

    /// Default config for a node type
    pub fn config_template(&self, node_type: &str) -> Result<NodeConfig> {
        Ok(self.descriptor_or_err(node_type)?.config_schema.defaults())
    }

    /// Every schema violation in `config`; unknown keys pass
    pub fn validate_config(&self, node_type: &str, config: &NodeConfig) -> Result<Vec<String>> {
        Ok(self.descriptor_or_err(node_type)?.config_schema.validate(config))
    }

    /// Default-filled, coerced config, or `InvalidConfig`
    pub fn normalize_config(&self, node_type: &str, config: &NodeConfig) -> Result<NodeConfig> {
        self.descriptor_or_err(node_type)?
            .config_schema
            .normalize(config)
            .map_err(|errors| NodeEngineError::InvalidConfig {
                node_type: node_type.to_string(),
                errors,
            })
    }

    /// Merge another registry into this one
    ///
    /// Entries from `other` override entries in `self` that share a type.
    pub fn merge(&mut self, other: NodeRegistry) {
        self.descriptors.extend(other.descriptors);
        self.executors.extend(other.executors);
    }

    /// Number of registered types
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}
