//! Connection settings for the completion service

use serde::{Deserialize, Serialize};

/// Default timeout for completion requests
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Default timeout for model listing
pub const DEFAULT_MODELS_TIMEOUT_MS: u64 = 10_000;

/// Where the completion service lives and how long to wait for it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Host name or address, e.g. "127.0.0.1"
    pub host: String,
    /// Port, kept as text the way settings forms store it
    pub port: String,
    /// Bearer token; empty means no auth header
    pub api_key: String,
    pub request_timeout_ms: u64,
    pub models_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: String::new(),
            api_key: String::new(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            models_timeout_ms: DEFAULT_MODELS_TIMEOUT_MS,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: port.into(),
            ..Self::default()
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// `http://{host}:{port}`, or `None` unless both are set
    pub fn base_url(&self) -> Option<String> {
        let host = self.host.trim().trim_end_matches('/');
        let port = self.port.trim();
        if host.is_empty() || port.is_empty() {
            return None;
        }
        Some(format!("http://{}:{}", host, port))
    }

    /// API key if one is set
    pub fn api_key(&self) -> Option<&str> {
        let key = self.api_key.trim();
        (!key.is_empty()).then_some(key)
    }
}
