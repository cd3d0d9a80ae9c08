//! Authoritative workflow graph store
//!
//! [`GraphStore`] owns the nodes and connections of one workflow, plus its
//! selection and undo history. It validates every mutation against the
//! [`NodeRegistry`] and keeps an index from node id to the connections that
//! touch it, so removing a node cascades without scanning every connection.
//!
//! The store knows nothing about execution; it only answers queries such as
//! [`execution_order`](GraphStore::execution_order) that the engine needs.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::{NodeEngineError, Result};
use crate::registry::NodeRegistry;
use crate::types::{
    Connection, ConnectionId, GraphNode, NodeConfig, NodeId, WorkflowDocument, WorkflowStats,
};
use crate::undo::{UndoStack, DEFAULT_HISTORY_LIMIT};
use crate::validation::{validate_graph, ValidationReport};

const NODE_ID_PREFIX: &str = "node_";
const CONNECTION_ID_PREFIX: &str = "connection_";

/// Node and connection sets of one workflow
pub struct GraphStore {
    registry: Arc<NodeRegistry>,
    name: String,
    nodes: HashMap<NodeId, GraphNode>,
    /// Node ids in insertion order
    node_order: Vec<NodeId>,
    connections: HashMap<ConnectionId, Connection>,
    /// Connection ids in insertion order
    connection_order: Vec<ConnectionId>,
    /// Connections touching each node, in insertion order
    node_connections: HashMap<NodeId, Vec<ConnectionId>>,
    selection: Vec<NodeId>,
    history: UndoStack,
    next_node_id: u64,
    next_connection_id: u64,
}

impl GraphStore {
    /// Create an empty, unnamed store
    pub fn new(registry: Arc<NodeRegistry>) -> Self {
        Self::with_history_limit(registry, DEFAULT_HISTORY_LIMIT)
    }

    /// Create an empty store keeping at most `limit` undo snapshots
    pub fn with_history_limit(registry: Arc<NodeRegistry>, limit: usize) -> Self {
        let mut store = Self {
            registry,
            name: String::new(),
            nodes: HashMap::new(),
            node_order: Vec::new(),
            connections: HashMap::new(),
            connection_order: Vec::new(),
            node_connections: HashMap::new(),
            selection: Vec::new(),
            history: UndoStack::new(limit),
            next_node_id: 1,
            next_connection_id: 1,
        };
        store.record();
        store
    }

    pub fn registry(&self) -> &Arc<NodeRegistry> {
        &self.registry
    }

    /// Swap in a registry, e.g. after new plugin types were registered
    pub fn set_registry(&mut self, registry: Arc<NodeRegistry>) {
        self.registry = registry;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Clear everything and start a fresh workflow
    ///
    /// Selection and undo history are discarded too.
    pub fn reset(&mut self, name: impl Into<String>) {
        self.clear_graph();
        self.name = name.into();
        self.next_node_id = 1;
        self.next_connection_id = 1;
        self.clear_history();
    }

    /// Drop undo history, keeping the current state as its only snapshot
    pub fn clear_history(&mut self) {
        self.history.clear();
        self.record();
    }

    fn clear_graph(&mut self) {
        self.nodes.clear();
        self.node_order.clear();
        self.connections.clear();
        self.connection_order.clear();
        self.node_connections.clear();
        self.selection.clear();
    }

    // ------------------------------------------------------------------
    // Nodes
    // ------------------------------------------------------------------

    /// Add a node of a registered type
    ///
    /// `config` is merged over the schema defaults and normalized.
    pub fn add_node(&mut self, node_type: &str, config: NodeConfig) -> Result<GraphNode> {
        let descriptor = self
            .registry
            .get_descriptor(node_type)
            .ok_or_else(|| NodeEngineError::UnknownNodeType(node_type.to_string()))?;
        let label = descriptor.label.clone();
        let config = self.registry.normalize_config(node_type, &config)?;

        let id = format!("{}{}", NODE_ID_PREFIX, self.next_node_id);
        self.next_node_id += 1;

        let node = GraphNode {
            id: id.clone(),
            node_type: node_type.to_string(),
            config,
            label: Some(label),
        };
        self.insert_node(node.clone());
        log::debug!("Added node {} ({})", id, node_type);

        self.record();
        Ok(node)
    }

    fn insert_node(&mut self, node: GraphNode) {
        self.node_order.push(node.id.clone());
        self.nodes.insert(node.id.clone(), node);
    }

    /// Remove a node and every connection touching it
    pub fn remove_node(&mut self, id: &str) -> bool {
        self.remove_node_cascade(id).is_some()
    }

    /// Remove a node, returning the ids of the cascaded connections
    ///
    /// `None` when the node does not exist.
    pub fn remove_node_cascade(&mut self, id: &str) -> Option<Vec<ConnectionId>> {
        self.nodes.remove(id)?;
        self.node_order.retain(|n| n != id);
        self.selection.retain(|n| n != id);

        let touching = self.node_connections.remove(id).unwrap_or_default();
        for conn_id in &touching {
            self.detach_connection(conn_id);
        }

        log::debug!("Removed node {} and {} connection(s)", id, touching.len());
        self.record();
        Some(touching)
    }

    /// Merge `patch` over a node's config and store the normalized result
    ///
    /// Returns `Ok(false)` when the node does not exist.
    pub fn update_node_config(&mut self, id: &str, patch: &NodeConfig) -> Result<bool> {
        let Some(node) = self.nodes.get(id) else {
            return Ok(false);
        };

        let mut merged = node.config.clone();
        for (key, value) in patch {
            merged.insert(key.clone(), value.clone());
        }
        let normalized = self.registry.normalize_config(&node.node_type, &merged)?;

        if let Some(node) = self.nodes.get_mut(id) {
            node.config = normalized;
        }
        self.record();
        Ok(true)
    }

    /// Set a node's display label; an empty label clears it
    pub fn set_node_label(&mut self, id: &str, label: impl Into<String>) -> bool {
        let Some(node) = self.nodes.get_mut(id) else {
            return false;
        };
        let label = label.into();
        node.label = if label.is_empty() { None } else { Some(label) };
        self.record();
        true
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.get(id)
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.node_order.iter().filter_map(|id| self.nodes.get(id))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    // ------------------------------------------------------------------
    // Connections
    // ------------------------------------------------------------------

    /// Connect an output port to an input port
    ///
    /// Returns `None` when either node is missing, a port is not declared by
    /// its node type, or an identical connection already exists. Rejections
    /// are expected during interactive wiring and are only logged.
    pub fn add_connection(
        &mut self,
        source_node_id: &str,
        source_port: &str,
        target_node_id: &str,
        target_port: &str,
    ) -> Option<Connection> {
        if let Err(reason) =
            self.check_connection(source_node_id, source_port, target_node_id, target_port)
        {
            log::debug!(
                "Rejected connection {}.{} -> {}.{}: {}",
                source_node_id,
                source_port,
                target_node_id,
                target_port,
                reason
            );
            return None;
        }

        let connection = Connection {
            id: format!("{}{}", CONNECTION_ID_PREFIX, self.next_connection_id),
            source_node_id: source_node_id.to_string(),
            source_port: source_port.to_string(),
            target_node_id: target_node_id.to_string(),
            target_port: target_port.to_string(),
        };
        self.next_connection_id += 1;
        self.insert_connection(connection.clone());
        log::debug!("Added connection {}", connection.id);

        self.record();
        Some(connection)
    }

    fn check_connection(
        &self,
        source_node_id: &str,
        source_port: &str,
        target_node_id: &str,
        target_port: &str,
    ) -> std::result::Result<(), String> {
        let source = self
            .nodes
            .get(source_node_id)
            .ok_or_else(|| format!("source node '{}' does not exist", source_node_id))?;
        let target = self
            .nodes
            .get(target_node_id)
            .ok_or_else(|| format!("target node '{}' does not exist", target_node_id))?;

        let source_desc = self
            .registry
            .get_descriptor(&source.node_type)
            .ok_or_else(|| format!("unknown node type '{}'", source.node_type))?;
        if !source_desc.has_output(source, source_port) {
            return Err(format!("'{}' is not an output port", source_port));
        }

        let target_desc = self
            .registry
            .get_descriptor(&target.node_type)
            .ok_or_else(|| format!("unknown node type '{}'", target.node_type))?;
        if !target_desc.has_input(target_port) {
            return Err(format!("'{}' is not an input port", target_port));
        }

        let duplicate = self.outgoing(source_node_id).any(|c| {
            c.source_port == source_port
                && c.target_node_id == target_node_id
                && c.target_port == target_port
        });
        if duplicate {
            return Err("connection already exists".to_string());
        }

        Ok(())
    }

    fn insert_connection(&mut self, connection: Connection) {
        let id = connection.id.clone();
        self.node_connections
            .entry(connection.source_node_id.clone())
            .or_default()
            .push(id.clone());
        if connection.target_node_id != connection.source_node_id {
            self.node_connections
                .entry(connection.target_node_id.clone())
                .or_default()
                .push(id.clone());
        }
        self.connection_order.push(id.clone());
        self.connections.insert(id, connection);
    }

    /// Remove a connection and unlink it from both endpoint indexes
    fn detach_connection(&mut self, id: &str) -> Option<Connection> {
        let connection = self.connections.remove(id)?;
        self.connection_order.retain(|c| c != id);
        for node_id in [&connection.source_node_id, &connection.target_node_id] {
            if let Some(ids) = self.node_connections.get_mut(node_id) {
                ids.retain(|c| c != id);
            }
        }
        Some(connection)
    }

    /// Remove a connection by id
    pub fn remove_connection(&mut self, id: &str) -> bool {
        if self.detach_connection(id).is_none() {
            return false;
        }
        log::debug!("Removed connection {}", id);
        self.record();
        true
    }

    pub fn connection(&self, id: &str) -> Option<&Connection> {
        self.connections.get(id)
    }

    /// Connections in insertion order
    pub fn connections(&self) -> impl Iterator<Item = &Connection> {
        self.connection_order
            .iter()
            .filter_map(|id| self.connections.get(id))
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn touching(&self, node_id: &str) -> impl Iterator<Item = &Connection> {
        self.node_connections
            .get(node_id)
            .into_iter()
            .flatten()
            .filter_map(|id| self.connections.get(id))
    }

    fn outgoing<'a>(&'a self, node_id: &'a str) -> impl Iterator<Item = &'a Connection> + 'a {
        self.touching(node_id)
            .filter(move |c| c.source_node_id == node_id)
    }

    /// Connections targeting `node_id`, in insertion order
    pub fn incoming_connections(&self, node_id: &str) -> Vec<&Connection> {
        self.touching(node_id)
            .filter(|c| c.target_node_id == node_id)
            .collect()
    }

    /// Connections leaving `node_id`, in insertion order
    pub fn outgoing_connections(&self, node_id: &str) -> Vec<&Connection> {
        self.touching(node_id)
            .filter(|c| c.source_node_id == node_id)
            .collect()
    }

    // ------------------------------------------------------------------
    // Ordering and validation
    // ------------------------------------------------------------------

    /// Topological order of node ids, or `None` if the graph has a cycle
    ///
    /// Kahn's algorithm; among nodes ready at the same time, the one added
    /// first comes first. A self-loop counts as a cycle.
    pub fn execution_order(&self) -> Option<Vec<NodeId>> {
        let count = self.node_order.len();
        let index: HashMap<&str, usize> = self
            .node_order
            .iter()
            .enumerate()
            .map(|(i, id)| (id.as_str(), i))
            .collect();

        let mut in_degree = vec![0usize; count];
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); count];
        for conn in self.connections() {
            if let (Some(&source), Some(&target)) = (
                index.get(conn.source_node_id.as_str()),
                index.get(conn.target_node_id.as_str()),
            ) {
                successors[source].push(target);
                in_degree[target] += 1;
            }
        }

        let mut ready: BTreeSet<usize> = (0..count).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(count);

        while let Some(current) = ready.pop_first() {
            order.push(current);
            for &next in &successors[current] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.insert(next);
                }
            }
        }

        if order.len() < count {
            return None;
        }
        Some(
            order
                .into_iter()
                .map(|i| self.node_order[i].clone())
                .collect(),
        )
    }

    /// Validate the whole workflow
    pub fn validate(&self) -> ValidationReport {
        ValidationReport::from_errors(&validate_graph(self))
    }

    // ------------------------------------------------------------------
    // Selection
    // ------------------------------------------------------------------

    /// Select a node; without `additive` the previous selection is replaced
    pub fn select_node(&mut self, id: &str, additive: bool) -> bool {
        if !self.nodes.contains_key(id) {
            return false;
        }
        if !additive {
            self.selection.clear();
        }
        if !self.selection.iter().any(|n| n == id) {
            self.selection.push(id.to_string());
        }
        true
    }

    pub fn deselect_node(&mut self, id: &str) -> bool {
        let before = self.selection.len();
        self.selection.retain(|n| n != id);
        self.selection.len() != before
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Selected node ids, in selection order
    pub fn selected_nodes(&self) -> &[NodeId] {
        &self.selection
    }

    pub fn stats(&self) -> WorkflowStats {
        WorkflowStats {
            node_count: self.nodes.len(),
            connection_count: self.connections.len(),
            selected_count: self.selection.len(),
            history_states: self.history.snapshot_count(),
            history_capacity: self.history.capacity(),
            history_bytes: self.history.compressed_size(),
        }
    }

    // ------------------------------------------------------------------
    // Serialization
    // ------------------------------------------------------------------

    /// Snapshot the workflow as a plain document
    pub fn serialize(&self) -> WorkflowDocument {
        WorkflowDocument {
            name: self.name.clone(),
            nodes: self.nodes().cloned().collect(),
            connections: self.connections().cloned().collect(),
        }
    }

    /// Replace the workflow with `document`
    ///
    /// Node and connection ids are kept as given. Connections whose endpoints
    /// are missing, whose id repeats, or which duplicate another connection's
    /// endpoints are dropped with a warning. Returns the number dropped.
    pub fn deserialize(&mut self, document: WorkflowDocument) -> usize {
        let dropped = self.load_document(document);
        self.record();
        dropped
    }

    fn load_document(&mut self, document: WorkflowDocument) -> usize {
        self.clear_graph();
        self.name = document.name;

        for node in document.nodes {
            if self.nodes.contains_key(&node.id) {
                log::warn!("Skipping duplicate node id '{}'", node.id);
                continue;
            }
            self.insert_node(node);
        }

        let mut dropped = 0;
        for conn in document.connections {
            let reason = if !self.nodes.contains_key(&conn.source_node_id) {
                Some(format!("source node '{}' is missing", conn.source_node_id))
            } else if !self.nodes.contains_key(&conn.target_node_id) {
                Some(format!("target node '{}' is missing", conn.target_node_id))
            } else if self.connections.contains_key(&conn.id) {
                Some("duplicate connection id".to_string())
            } else if self.touching(&conn.source_node_id).any(|c| c.same_endpoints(&conn)) {
                Some("duplicate endpoints".to_string())
            } else {
                None
            };

            match reason {
                Some(reason) => {
                    log::warn!("Dropping connection '{}': {}", conn.id, reason);
                    dropped += 1;
                }
                None => self.insert_connection(conn),
            }
        }

        self.next_node_id = self
            .next_node_id
            .max(next_id_after(self.nodes.keys(), NODE_ID_PREFIX));
        self.next_connection_id = self
            .next_connection_id
            .max(next_id_after(self.connections.keys(), CONNECTION_ID_PREFIX));

        dropped
    }

    // ------------------------------------------------------------------
    // Undo / redo
    // ------------------------------------------------------------------

    fn record(&mut self) {
        let document = self.serialize();
        if let Err(e) = self.history.push(&document) {
            log::warn!("Failed to record undo snapshot: {}", e);
        }
    }

    fn restore(&mut self, document: WorkflowDocument) {
        let selection = std::mem::take(&mut self.selection);
        self.load_document(document);
        self.selection = selection
            .into_iter()
            .filter(|id| self.nodes.contains_key(id))
            .collect();
    }

    /// Restore the previous state; `Ok(false)` when there is none
    pub fn undo(&mut self) -> Result<bool> {
        match self.history.undo() {
            Some(document) => {
                self.restore(document?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Re-apply an undone state; `Ok(false)` when there is none
    pub fn redo(&mut self) -> Result<bool> {
        match self.history.redo() {
            Some(document) => {
                self.restore(document?);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }
}

/// One past the largest numeric suffix among ids with `prefix`
fn next_id_after<'a>(ids: impl Iterator<Item = &'a String>, prefix: &str) -> u64 {
    ids.filter_map(|id| id.strip_prefix(prefix))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .map_or(1, |max| max + 1)
}
