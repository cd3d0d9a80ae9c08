//! Runtime services handed to node executors.
//!
//! Executors are plain functions of `(node, input)`, but some of them need a
//! long-lived service to do their work, e.g. the AI compose node needs an HTTP
//! completion client. Hosts place those services in an [`ExecutorExtensions`]
//! map once, and the engine passes the same map to every executor call.
//!
//! ```ignore
//! let extensions = ExecutorExtensions::new()
//!     .with(extension_keys::COMPLETION_CLIENT, Arc::new(factory));
//!
//! // In a NodeExecutor:
//! let factory = extensions
//!     .get::<Arc<ClientFactory>>(extension_keys::COMPLETION_CLIENT)
//!     .ok_or_else(|| NodeEngineError::failed("completion client not configured"))?;
//! ```

use std::any::Any;
use std::collections::HashMap;

/// Typed map of `Send + Sync` services, looked up by key and type
#[derive(Default)]
pub struct ExecutorExtensions {
    services: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl ExecutorExtensions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a service under `key`, replacing any previous one
    pub fn set<T: Send + Sync + 'static>(&mut self, key: &str, service: T) {
        self.services.insert(key.to_string(), Box::new(service));
    }

    /// Builder form of [`set`](Self::set)
    pub fn with<T: Send + Sync + 'static>(mut self, key: &str, service: T) -> Self {
        self.set(key, service);
        self
    }

    /// Fetch a service; `None` when absent or stored under another type
    pub fn get<T: Send + Sync + 'static>(&self, key: &str) -> Option<&T> {
        self.services.get(key).and_then(|s| s.downcast_ref())
    }

    pub fn has(&self, key: &str) -> bool {
        self.services.contains_key(key)
    }

    /// Drop a service, reporting whether one was present
    pub fn remove(&mut self, key: &str) -> bool {
        self.services.remove(key).is_some()
    }
}

impl std::fmt::Debug for ExecutorExtensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.services.keys().collect();
        keys.sort();
        f.debug_struct("ExecutorExtensions").field("keys", &keys).finish()
    }
}

/// Well-known extension keys.
pub mod extension_keys {
    /// `Arc<completion_client::ClientFactory>` used by AI-backed nodes
    pub const COMPLETION_CLIENT: &str = "completion_client";
    /// `Arc<completion_client::PluginClient>` used by plugin-backed nodes
    pub const PLUGIN_CLIENT: &str = "plugin_client";
}
