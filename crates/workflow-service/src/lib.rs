//! Workflow Service
//!
//! Host-agnostic facade over the node engine. [`WorkflowCoordinator`] wires
//! the registry, graph store, execution engine and completion client
//! together and is the only type a host application needs to talk to.
//!
//! # Example
//!
//! ```ignore
//! use workflow_service::{ServiceConfig, WorkflowCoordinator};
//!
//! let config = ServiceConfig::load(data_dir).await?;
//! let coordinator = WorkflowCoordinator::from_config(&config);
//! coordinator.load_workflow_file(path).await?;
//! let results = coordinator.execute_workflow().await?;
//! ```

pub mod canvas;
pub mod config;
pub mod coordinator;
pub mod error;

pub use canvas::{CanvasOp, CanvasView, NullCanvas, PointerDrag, RecordingCanvas};
pub use config::{ConfigError, ServiceConfig, DEFAULT_WORKFLOW_NAME};
pub use coordinator::WorkflowCoordinator;
pub use error::{Result, ServiceError};
