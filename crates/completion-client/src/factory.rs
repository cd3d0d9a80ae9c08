//! Cached client construction
//!
//! Settings can change while the application runs. [`ClientFactory`] keeps
//! the last built [`CompletionClient`] and only builds a new one when the
//! base URL or API key differs from the cached client's.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::client::CompletionClient;
use crate::config::ClientConfig;
use crate::error::{CompletionError, Result};

/// Builds and caches the completion client for the current settings
#[derive(Debug, Default)]
pub struct ClientFactory {
    config: RwLock<ClientConfig>,
    cached: RwLock<Option<Arc<CompletionClient>>>,
}

impl ClientFactory {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config: RwLock::new(config),
            cached: RwLock::new(None),
        }
    }

    /// Current settings
    pub fn config(&self) -> ClientConfig {
        self.config.read().clone()
    }

    /// Replace the settings; the next `client()` call picks them up
    pub fn update_config(&self, config: ClientConfig) {
        *self.config.write() = config;
    }

    /// Whether a base URL can be built from the settings
    pub fn is_configured(&self) -> bool {
        self.config.read().base_url().is_some()
    }

    /// Client for the current settings
    ///
    /// Fails with `NotConfigured` when host or port is missing.
    pub fn client(&self) -> Result<Arc<CompletionClient>> {
        let config = self.config();
        let base_url = config.base_url().ok_or(CompletionError::NotConfigured)?;
        let api_key = config.api_key();

        if let Some(client) = self.cached.read().as_ref() {
            if client.base_url() == base_url && client.api_key() == api_key {
                return Ok(Arc::clone(client));
            }
        }

        log::debug!("Building completion client for {}", base_url);
        let client = Arc::new(CompletionClient::from_config(&config)?);
        *self.cached.write() = Some(Arc::clone(&client));
        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_factory() {
        let factory = ClientFactory::default();
        assert!(!factory.is_configured());
        assert!(matches!(factory.client(), Err(CompletionError::NotConfigured)));
    }

    #[test]
    fn test_client_is_cached_until_settings_change() {
        let factory = ClientFactory::new(ClientConfig::new("127.0.0.1", "6005"));
        let first = factory.client().unwrap();
        let second = factory.client().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // Timeouts alone do not invalidate the cache
        let mut config = factory.config();
        config.request_timeout_ms = 5;
        factory.update_config(config.clone());
        assert!(Arc::ptr_eq(&first, &factory.client().unwrap()));

        factory.update_config(config.with_api_key("new-key"));
        let rebuilt = factory.client().unwrap();
        assert!(!Arc::ptr_eq(&first, &rebuilt));
        assert_eq!(rebuilt.api_key(), Some("new-key"));

        factory.update_config(ClientConfig::new("localhost", "7000"));
        assert_eq!(factory.client().unwrap().base_url(), "http://localhost:7000");
    }
}
