//! # warden-runtime
//!
//! Process-facing adapters for the Warden.
//!
//! - **Transport**: line-delimited JSON-RPC over a child's stdio, async or
//!   thread-backed
//! - **Supervisor**: one provider's lifecycle (spawn, handshake, discovery,
//!   liveness, termination)
//! - **Registry**: every configured provider behind `ToolBackend`
//! - **Ollama** (default feature): local model inference
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use warden_core::{Investigator, ToolExecutor};
//! use warden_runtime::{OllamaProvider, Registry, WardenConfig};
//!
//! let registry = Arc::new(Registry::from_config(WardenConfig::load("mcp_server_config.json")?));
//! registry.start_all().await;
//! let investigator = Investigator::builder()
//!     .llm(Arc::new(OllamaProvider::from_env()?))
//!     .executor(Arc::new(ToolExecutor::new(registry.clone())))
//!     .build()?;
//! let report = investigator.investigate("Is 203.0.113.7 malicious?").await;
//! registry.stop_all().await;
//! ```

pub mod config;
pub mod process;
pub mod registry;
pub mod supervisor;
pub mod transport;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "ollama")]
pub use ollama::{OllamaConfig, OllamaProvider};

pub use config::{ProviderConfig, Timeouts, TransportKind, WardenConfig};
pub use registry::{ProviderStatus, Registry};
pub use supervisor::{ProviderState, ProviderSupervisor};
pub use transport::{StdioTransport, ThreadedTransport, Transport};
