//! Extensions setup for host applications.
//!
//! Hosts call [`setup_extensions`] at startup to place the runtime services
//! built-in nodes depend on into the shared `ExecutorExtensions`: the
//! completion client factory used by `aiCompose`. Hosts that register plugin
//! node types also call [`setup_plugin_client`].

use std::sync::Arc;

use completion_client::{ClientFactory, PluginClient, PluginConfig};
use node_engine::{extension_keys, ExecutorExtensions};

/// Register the services built-in nodes look up at execution time.
///
/// # Example
///
/// ```ignore
/// let factory = Arc::new(ClientFactory::new(config.client.clone()));
/// let mut extensions = node_engine::ExecutorExtensions::new();
/// workflow_nodes::setup_extensions(&mut extensions, factory);
/// ```
pub fn setup_extensions(extensions: &mut ExecutorExtensions, factory: Arc<ClientFactory>) {
    if !factory.is_configured() {
        log::info!("Completion service not configured; aiCompose nodes will fail until it is");
    }
    extensions.set(extension_keys::COMPLETION_CLIENT, factory);
}

/// Register the plugin client used by [`crate::PluginCallNode`].
///
/// Without a configured URL nothing is registered and plugin nodes fail
/// when they run.
pub fn setup_plugin_client(extensions: &mut ExecutorExtensions, config: &PluginConfig) {
    match PluginClient::from_config(config) {
        Ok(client) => {
            log::info!("Plugin nodes will call {}", client.url());
            extensions.set(extension_keys::PLUGIN_CLIENT, Arc::new(client));
        }
        Err(e) => log::info!("{}; plugin nodes will fail until it is", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use completion_client::ClientConfig;

    #[test]
    fn test_factory_is_reachable_by_key() {
        let factory = Arc::new(ClientFactory::new(ClientConfig::new("127.0.0.1", "6005")));
        let mut extensions = ExecutorExtensions::new();
        setup_extensions(&mut extensions, factory.clone());

        let stored = extensions
            .get::<Arc<ClientFactory>>(extension_keys::COMPLETION_CLIENT)
            .unwrap();
        assert!(Arc::ptr_eq(stored, &factory));
    }

    #[test]
    fn test_plugin_client_only_when_configured() {
        let mut extensions = ExecutorExtensions::new();
        setup_plugin_client(&mut extensions, &PluginConfig::default());
        assert!(extensions
            .get::<Arc<PluginClient>>(extension_keys::PLUGIN_CLIENT)
            .is_none());

        setup_plugin_client(&mut extensions, &PluginConfig::new("http://127.0.0.1:6005/v1/human/tool"));
        let client = extensions
            .get::<Arc<PluginClient>>(extension_keys::PLUGIN_CLIENT)
            .unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:6005/v1/human/tool");
    }
}
