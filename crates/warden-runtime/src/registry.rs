//! Registry
//!
//! Aggregates every configured provider behind one [`ToolBackend`]. Each
//! supervisor sits behind its own async mutex, which serializes use of that
//! provider's pipes. Duplicate tool names resolve to the first provider in
//! configuration order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use tracing::{info, warn};
use warden_core::error::{Result, WardenError};
use warden_core::rpc::{RpcResponse, ServerInfo};
use warden_core::tool::{ToolBackend, ToolDescriptor};

use crate::config::{ProviderConfig, Timeouts, WardenConfig};
use crate::supervisor::{ProviderState, ProviderSupervisor};

/// Point-in-time view of one provider
#[derive(Clone, Debug, Serialize)]
pub struct ProviderStatus {
    pub connected: bool,
    #[serde(flatten)]
    pub state: ProviderState,
    pub tools_count: usize,
    pub description: Option<String>,
    pub process_running: bool,
    pub server_info: Option<ServerInfo>,
}

pub struct Registry {
    providers: Vec<Mutex<ProviderSupervisor>>,
}

impl Registry {
    pub fn new(configs: Vec<ProviderConfig>, timeouts: Timeouts) -> Self {
        let providers = configs
            .into_iter()
            .map(|config| Mutex::new(ProviderSupervisor::new(config, timeouts)))
            .collect();
        Self { providers }
    }

    pub fn from_config(config: WardenConfig) -> Self {
        Self::new(config.providers, config.timeouts)
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Start every provider in order, continuing past failures.
    ///
    /// Returns `true` when at least one provider is connected.
    pub async fn start_all(&self) -> bool {
        let mut connected = 0usize;
        for provider in &self.providers {
            let mut supervisor = provider.lock().await;
            match supervisor.start().await {
                Ok(()) => connected += 1,
                Err(e) => {
                    warn!(provider = %supervisor.name(), err = %e, "provider failed to start");
                }
            }
        }
        info!(connected, configured = self.providers.len(), "provider startup finished");
        connected > 0
    }

    /// Union of tools advertised by connected providers, in provider order
    pub async fn get_all_tools(&self) -> Vec<ToolDescriptor> {
        let mut tools = Vec::new();
        for provider in &self.providers {
            let supervisor = provider.lock().await;
            if supervisor.is_connected() {
                tools.extend_from_slice(supervisor.tools());
            }
        }
        tools
    }

    /// Route a call to the first connected provider advertising `name`.
    pub async fn call(&self, name: &str, arguments: &Map<String, Value>) -> Result<RpcResponse> {
        for provider in &self.providers {
            let mut supervisor = provider.lock().await;
            if supervisor.is_connected() && supervisor.tools().iter().any(|t| t.name == name) {
                info!(provider = %supervisor.name(), tool = %name, "dispatching tool call");
                return supervisor.call_tool(name, arguments).await;
            }
        }

        let available_tools = self
            .get_all_tools()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect();
        Err(WardenError::ToolNotFound {
            name: name.to_string(),
            available_tools,
        })
    }

    /// Stop every provider regardless of its health
    pub async fn stop_all(&self) {
        for provider in &self.providers {
            provider.lock().await.stop().await;
        }
        info!("all providers stopped");
    }

    /// Status of every provider keyed by name
    pub async fn status(&self) -> BTreeMap<String, ProviderStatus> {
        let mut report = BTreeMap::new();
        for provider in &self.providers {
            let mut supervisor = provider.lock().await;
            let status = ProviderStatus {
                connected: supervisor.is_connected(),
                state: supervisor.state().clone(),
                tools_count: supervisor.tools().len(),
                description: supervisor.config().description.clone(),
                process_running: supervisor.process_running(),
                server_info: supervisor.server_info().cloned(),
            };
            report.insert(supervisor.name().to_string(), status);
        }
        report
    }

    /// Liveness of every provider keyed by name
    pub async fn health_check_all(&self) -> BTreeMap<String, bool> {
        let mut health = BTreeMap::new();
        for provider in &self.providers {
            let mut supervisor = provider.lock().await;
            let alive = supervisor.health_check();
            health.insert(supervisor.name().to_string(), alive);
        }
        health
    }
}

#[async_trait]
impl ToolBackend for Registry {
    async fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.get_all_tools().await
    }

    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<RpcResponse> {
        self.call(name, arguments).await
    }
}
