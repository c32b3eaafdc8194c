//! Provider Supervisor
//!
//! Owns one provider's lifecycle as an explicit state machine:
//!
//! ```text
//! Stopped ──start──▶ Starting ──handshake ok──▶ Connected ──stop──▶ Stopped
//!                        │                          │
//!                        └──early exit / bad reply──┴──process died──▶ Failed
//! ```
//!
//! Failures are fail-fast: nothing here retries or reconnects on its own.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use warden_core::error::{Result, TransportError, WardenError};
use warden_core::rpc::{InitializeResult, RpcRequest, RpcResponse, ServerInfo, ToolsListResult};
use warden_core::tool::ToolDescriptor;

use crate::config::{ProviderConfig, Timeouts};
use crate::process::{self, SpawnedProcess};

/// Lifecycle state of one provider
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProviderState {
    #[default]
    Stopped,
    Starting,
    Connected,
    Failed {
        reason: String,
    },
}

impl ProviderState {
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ProviderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Connected => write!(f, "connected"),
            Self::Failed { reason } => write!(f, "failed: {reason}"),
        }
    }
}

/// Supervises a single provider process and its transport
pub struct ProviderSupervisor {
    config: ProviderConfig,
    timeouts: Timeouts,
    state: ProviderState,
    tools: Vec<ToolDescriptor>,
    server_info: Option<ServerInfo>,
    process: Option<SpawnedProcess>,
    last_id: u64,
}

impl ProviderSupervisor {
    pub fn new(config: ProviderConfig, timeouts: Timeouts) -> Self {
        Self {
            config,
            timeouts,
            state: ProviderState::Stopped,
            tools: Vec::new(),
            server_info: None,
            process: None,
            last_id: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub const fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub const fn state(&self) -> &ProviderState {
        &self.state
    }

    pub const fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    /// Tools discovered at startup; empty unless connected
    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub const fn server_info(&self) -> Option<&ServerInfo> {
        self.server_info.as_ref()
    }

    pub fn process_running(&mut self) -> bool {
        self.process
            .as_mut()
            .is_some_and(|p| p.child.is_running())
    }

    fn next_id(&mut self) -> u64 {
        self.last_id += 1;
        self.last_id
    }

    async fn request(
        &mut self,
        request: RpcRequest,
        timeout: Duration,
    ) -> std::result::Result<RpcResponse, TransportError> {
        let process = self.process.as_mut().ok_or(TransportError::NotStarted)?;
        debug!(provider = %self.config.name, id = request.id, method = %request.method, "sending request");
        process.transport.send(&request, timeout).await
    }

    /// Spawn, wait out the startup grace, handshake, then discover tools.
    ///
    /// A no-op when already connected. On failure the process is torn down
    /// and the provider is left `Failed`.
    pub async fn start(&mut self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        if self.process.is_some() {
            self.shutdown_process().await;
        }

        info!(provider = %self.config.name, "starting provider");
        self.state = ProviderState::Starting;
        self.tools.clear();
        self.server_info = None;

        let spawned = match process::spawn(&self.config) {
            Ok(spawned) => spawned,
            Err(e) => {
                self.state = ProviderState::Failed {
                    reason: format!("spawn failed: {e}"),
                };
                return Err(e);
            }
        };
        self.process = Some(spawned);

        tokio::time::sleep(self.config.startup_grace).await;

        if let Some(reason) = self.early_exit() {
            warn!(provider = %self.config.name, %reason, "provider exited during startup");
            self.shutdown_process().await;
            self.state = ProviderState::Failed {
                reason: reason.clone(),
            };
            return Err(WardenError::Other(format!(
                "provider '{}' {reason}",
                self.config.name
            )));
        }

        match self.handshake().await {
            Ok(init) => {
                info!(
                    provider = %self.config.name,
                    server = %init.server_info.name,
                    version = %init.server_info.version,
                    protocol = %init.protocol_version,
                    "provider connected"
                );
                self.server_info = Some(init.server_info);
                self.state = ProviderState::Connected;
            }
            Err(e) => {
                let stderr = self.stderr_tail();
                warn!(provider = %self.config.name, err = %e, %stderr, "handshake failed");
                self.shutdown_process().await;
                self.state = ProviderState::Failed {
                    reason: if stderr.is_empty() {
                        format!("handshake failed: {e}")
                    } else {
                        format!("handshake failed: {e}: {stderr}")
                    },
                };
                return Err(e);
            }
        }

        match self.list_tools().await {
            Ok(tools) => {
                info!(provider = %self.config.name, tools = tools.len(), "discovered tools");
                self.tools = tools;
            }
            Err(e) => {
                warn!(provider = %self.config.name, err = %e, "tool discovery failed; provider has no tools");
            }
        }
        Ok(())
    }

    fn early_exit(&mut self) -> Option<String> {
        let process = self.process.as_mut()?;
        let status = match process.child.try_wait() {
            Ok(Some(status)) => status,
            Ok(None) => return None,
            Err(e) => return Some(format!("could not be polled: {e}")),
        };
        let stderr = process.stderr.contents();
        Some(if stderr.is_empty() {
            format!("exited during startup ({status})")
        } else {
            format!("exited during startup ({status}): {stderr}")
        })
    }

    fn stderr_tail(&self) -> String {
        self.process
            .as_ref()
            .map(|p| p.stderr.contents())
            .unwrap_or_default()
    }

    async fn handshake(&mut self) -> Result<InitializeResult> {
        let id = self.next_id();
        let value = self
            .request(RpcRequest::initialize(id), self.timeouts.handshake)
            .await?
            .into_result()?;
        serde_json::from_value(value).map_err(|e| {
            TransportError::Malformed(format!("invalid initialize result: {e}")).into()
        })
    }

    async fn list_tools(&mut self) -> Result<Vec<ToolDescriptor>> {
        let id = self.next_id();
        let value = self
            .request(RpcRequest::list_tools(id), self.timeouts.handshake)
            .await?
            .into_result()?;
        let listed: ToolsListResult = serde_json::from_value(value).map_err(|e| {
            WardenError::from(TransportError::Malformed(format!("invalid tools/list result: {e}")))
        })?;

        let provider = self.config.name.clone();
        Ok(listed
            .tools
            .into_iter()
            .map(|tool| tool.with_provider(provider.clone()))
            .collect())
    }

    /// Invoke one tool. The raw response, including any JSON-RPC error, is
    /// returned for the caller to interpret.
    pub async fn call_tool(
        &mut self,
        name: &str,
        arguments: &Map<String, Value>,
    ) -> Result<RpcResponse> {
        if !self.is_connected() {
            return Err(TransportError::NotStarted.into());
        }
        let id = self.next_id();
        let response = self
            .request(RpcRequest::call_tool(id, name, arguments), self.timeouts.call)
            .await?;
        Ok(response)
    }

    /// Liveness only. A dead process moves a connected provider to `Failed`.
    pub fn health_check(&mut self) -> bool {
        let running = self.process_running();
        if !running && self.is_connected() {
            let stderr = self.stderr_tail();
            warn!(provider = %self.config.name, %stderr, "provider process is no longer running");
            self.state = ProviderState::Failed {
                reason: "process exited".into(),
            };
            self.tools.clear();
        }
        running
    }

    async fn shutdown_process(&mut self) {
        if let Some(mut process) = self.process.take() {
            drop(process.transport);
            if let Err(e) = process::terminate(&mut process.child, self.timeouts.stop_grace).await {
                warn!(provider = %self.config.name, err = %e, "failed to terminate provider");
            }
        }
    }

    /// Terminate the process (signal, grace period, then kill) and clear
    /// connection state.
    pub async fn stop(&mut self) {
        if self.process.is_some() {
            info!(provider = %self.config.name, "stopping provider");
        }
        self.shutdown_process().await;
        self.tools.clear();
        self.server_info = None;
        self.state = ProviderState::Stopped;
    }
}
