//! Completion Client - minimal HTTP client for AI completion services
//!
//! Talks to any OpenAI-compatible server (llama.cpp, Ollama, vLLM, hosted
//! gateways) configured by host and port:
//!
//! - `list_models()`: `GET /v1/models` with a short timeout
//! - `complete()`: `POST /v1/chat/completions`, falling back once to
//!   `POST /v1/completions` when the server lacks the chat endpoint
//!
//! [`PluginClient`] posts tool request blocks to a plugin server and
//! unwraps the tool's output from the response envelope.
//!
//! # Example
//!
//! ```ignore
//! use completion_client::{ClientConfig, ClientFactory, CompletionRequest};
//!
//! let factory = ClientFactory::new(ClientConfig::new("127.0.0.1", "6005"));
//! let text = factory
//!     .client()?
//!     .complete(&CompletionRequest::new("qwen2.5", "Summarize: ..."))
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod factory;
pub mod plugin;
pub mod types;

pub use client::CompletionClient;
pub use config::ClientConfig;
pub use error::{CompletionError, Result};
pub use factory::ClientFactory;
pub use plugin::{unwrap_plugin_result, PluginClient, PluginConfig, ToolRequest};
pub use types::CompletionRequest;
