//! Pre-run workflow validation
//!
//! Collects every problem in a workflow (not just the first) so the caller
//! can show the full list before anything executes.

use serde::{Deserialize, Serialize};

use crate::store::GraphStore;

/// Which side of a connection a port belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortDirection {
    Input,
    Output,
}

impl std::fmt::Display for PortDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => f.write_str("input"),
            Self::Output => f.write_str("output"),
        }
    }
}

/// A single validation problem with location context
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The workflow has no nodes
    EmptyWorkflow,
    /// A node's type is not registered
    UnknownNodeType { node_id: String, node_type: String },
    /// A config value fails its schema
    InvalidConfig { node_id: String, message: String },
    /// A required config field is empty
    MissingRequiredField { node_id: String, field: String },
    /// A connection references a node that does not exist
    UnknownNode { connection_id: String, node_id: String },
    /// A connection references a port the node type does not declare
    UndeclaredPort {
        connection_id: String,
        node_id: String,
        port: String,
        direction: PortDirection,
    },
    /// The connections form a cycle
    CycleDetected,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyWorkflow => write!(f, "workflow has no nodes"),
            Self::UnknownNodeType { node_id, node_type } => {
                write!(f, "node '{}': unknown node type '{}'", node_id, node_type)
            }
            Self::InvalidConfig { node_id, message } => {
                write!(f, "node '{}': {}", node_id, message)
            }
            Self::MissingRequiredField { node_id, field } => {
                write!(f, "node '{}': '{}' is required", node_id, field)
            }
            Self::UnknownNode {
                connection_id,
                node_id,
            } => write!(
                f,
                "connection '{}': node '{}' does not exist",
                connection_id, node_id
            ),
            Self::UndeclaredPort {
                connection_id,
                node_id,
                port,
                direction,
            } => write!(
                f,
                "connection '{}': '{}' is not an {} of node '{}'",
                connection_id, port, direction, node_id
            ),
            Self::CycleDetected => write!(f, "circular dependency detected"),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Outcome of validating a workflow
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: &[ValidationError]) -> Self {
        Self {
            valid: errors.is_empty(),
            errors: errors.iter().map(|e| e.to_string()).collect(),
        }
    }

    /// Errors joined into one message
    pub fn message(&self) -> String {
        self.errors.join("; ")
    }
}

/// Validate every node and connection in the store
pub fn validate_graph(store: &GraphStore) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if store.node_count() == 0 {
        errors.push(ValidationError::EmptyWorkflow);
    }

    validate_nodes(store, &mut errors);
    validate_connections(store, &mut errors);

    if store.execution_order().is_none() {
        errors.push(ValidationError::CycleDetected);
    }

    errors
}

/// Check node types, config values and required fields
fn validate_nodes(store: &GraphStore, errors: &mut Vec<ValidationError>) {
    let registry = store.registry();

    for node in store.nodes() {
        let Some(descriptor) = registry.get_descriptor(&node.node_type) else {
            errors.push(ValidationError::UnknownNodeType {
                node_id: node.id.clone(),
                node_type: node.node_type.clone(),
            });
            continue;
        };

        let schema = &descriptor.config_schema;
        for message in schema.validate(&node.config) {
            errors.push(ValidationError::InvalidConfig {
                node_id: node.id.clone(),
                message,
            });
        }
        for field in schema.missing_required(&node.config) {
            errors.push(ValidationError::MissingRequiredField {
                node_id: node.id.clone(),
                field,
            });
        }
    }
}

/// Check that every connection endpoint exists and declares its port
fn validate_connections(store: &GraphStore, errors: &mut Vec<ValidationError>) {
    let registry = store.registry();

    for conn in store.connections() {
        match store.node(&conn.source_node_id) {
            None => errors.push(ValidationError::UnknownNode {
                connection_id: conn.id.clone(),
                node_id: conn.source_node_id.clone(),
            }),
            Some(source) => {
                let declared = registry
                    .get_descriptor(&source.node_type)
                    .map(|d| d.has_output(source, &conn.source_port));
                // Unknown types are reported once, by validate_nodes
                if declared == Some(false) {
                    errors.push(ValidationError::UndeclaredPort {
                        connection_id: conn.id.clone(),
                        node_id: source.id.clone(),
                        port: conn.source_port.clone(),
                        direction: PortDirection::Output,
                    });
                }
            }
        }

        match store.node(&conn.target_node_id) {
            None => errors.push(ValidationError::UnknownNode {
                connection_id: conn.id.clone(),
                node_id: conn.target_node_id.clone(),
            }),
            Some(target) => {
                let declared = registry
                    .get_descriptor(&target.node_type)
                    .map(|d| d.has_input(&conn.target_port));
                if declared == Some(false) {
                    errors.push(ValidationError::UndeclaredPort {
                        connection_id: conn.id.clone(),
                        node_id: target.id.clone(),
                        port: conn.target_port.clone(),
                        direction: PortDirection::Input,
                    });
                }
            }
        }
    }
}
