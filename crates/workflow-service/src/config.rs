//! Service configuration storage
//!
//! Handles persistent storage of the completion service and plugin server
//! connections and the editor defaults, as `config.json` in a data directory.

use std::path::Path;

use completion_client::{ClientConfig, PluginConfig};
use serde::{Deserialize, Serialize};
use tokio::fs;

use node_engine::undo::DEFAULT_HISTORY_LIMIT;

const CONFIG_FILE: &str = "config.json";

/// Name given to new workflows
pub const DEFAULT_WORKFLOW_NAME: &str = "Untitled Workflow";

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_workflow_name() -> String {
    DEFAULT_WORKFLOW_NAME.to_string()
}

/// Full service configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Completion service connection
    #[serde(default)]
    pub client: ClientConfig,
    /// Plugin server for host-registered tool nodes
    #[serde(default)]
    pub plugin: PluginConfig,
    /// Undo snapshots kept per workflow
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
    #[serde(default = "default_workflow_name")]
    pub default_workflow_name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            plugin: PluginConfig::default(),
            history_limit: default_history_limit(),
            default_workflow_name: default_workflow_name(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from disk; a missing file yields the defaults
    pub async fn load(data_dir: &Path) -> Result<Self, ConfigError> {
        let config_path = data_dir.join(CONFIG_FILE);

        if !config_path.exists() {
            log::info!("No configuration at {:?}, using defaults", config_path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(&config_path).await?;
        let config = serde_json::from_str(&contents).map_err(ConfigError::Parse)?;
        log::info!("Configuration loaded from {:?}", config_path);
        Ok(config)
    }

    /// Save configuration to disk
    pub async fn save(&self, data_dir: &Path) -> Result<(), ConfigError> {
        // Ensure directory exists
        fs::create_dir_all(data_dir).await?;

        let config_path = data_dir.join(CONFIG_FILE);
        let contents = serde_json::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        fs::write(&config_path, contents).await?;

        log::info!("Configuration saved to {:?}", config_path);
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    Parse(serde_json::Error),
    #[error("Failed to serialize config: {0}")]
    Serialize(serde_json::Error),
}
