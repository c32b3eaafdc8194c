//! Provider configuration.
//!
//! ```json
//! {
//!   "clientSettings": { "timeout": 5000 },
//!   "mcpServers": {
//!     "abuseipdb": {
//!       "command": "python3",
//!       "args": ["abuseIP_mcp_server.py"],
//!       "env": { "LOG_LEVEL": "info" },
//!       "startup_timeout": 2.5,
//!       "description": "IP reputation lookups"
//!     }
//!   }
//! }
//! ```
//!
//! Providers keep file order, which is also the registry's first-match order
//! for duplicate tool names.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use warden_core::error::{Result, WardenError};

pub const DEFAULT_CONFIG_PATH: &str = "mcp_server_config.json";

/// Grace period after spawn when neither the provider nor `clientSettings` sets one
pub const DEFAULT_STARTUP_GRACE: Duration = Duration::from_secs(3);

/// How the supervisor talks to a provider's pipes
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// `tokio::process` pipes
    #[default]
    Async,
    /// `std::process` pipes with a reader thread
    Threaded,
}

/// Launch spec for one provider
#[derive(Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    /// Overrides layered on top of the inherited environment
    pub env: BTreeMap<String, String>,
    pub startup_grace: Duration,
    pub description: Option<String>,
    pub transport: TransportKind,
}

impl ProviderConfig {
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            startup_grace: DEFAULT_STARTUP_GRACE,
            description: None,
            transport: TransportKind::default(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub const fn with_startup_grace(mut self, grace: Duration) -> Self {
        self.startup_grace = grace;
        self
    }

    pub const fn with_transport(mut self, transport: TransportKind) -> Self {
        self.transport = transport;
        self
    }
}

/// Request deadlines used by the supervisor
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    /// `initialize` and `tools/list`
    pub handshake: Duration,
    /// `tools/call`
    pub call: Duration,
    /// Between the termination signal and the forced kill
    pub stop_grace: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            handshake: Duration::from_secs(10),
            call: Duration::from_secs(30),
            stop_grace: Duration::from_secs(5),
        }
    }
}

#[derive(Deserialize)]
struct RawConfig {
    #[serde(rename = "clientSettings", default)]
    client_settings: ClientSettings,
    #[serde(rename = "mcpServers", default)]
    mcp_servers: Map<String, Value>,
}

#[derive(Default, Deserialize)]
struct ClientSettings {
    /// Milliseconds
    #[serde(default)]
    timeout: Option<u64>,
}

#[derive(Deserialize)]
struct RawProvider {
    command: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default)]
    env: BTreeMap<String, String>,
    /// Seconds
    #[serde(default)]
    startup_timeout: Option<f64>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    transport: TransportKind,
}

/// Parsed provider configuration file
#[derive(Clone, Debug, PartialEq)]
pub struct WardenConfig {
    pub providers: Vec<ProviderConfig>,
    pub timeouts: Timeouts,
}

impl WardenConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            WardenError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config = Self::parse(&text)
            .map_err(|e| WardenError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(
            path = %path.display(),
            providers = config.providers.len(),
            "loaded provider configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text. Any problem is fatal.
    pub fn parse(text: &str) -> std::result::Result<Self, String> {
        let raw: RawConfig =
            serde_json::from_str(text).map_err(|e| format!("invalid configuration JSON: {e}"))?;

        let default_grace = raw
            .client_settings
            .timeout
            .map_or(DEFAULT_STARTUP_GRACE, Duration::from_millis);

        if raw.mcp_servers.is_empty() {
            return Err("no providers configured under 'mcpServers'".into());
        }

        let mut providers = Vec::with_capacity(raw.mcp_servers.len());
        for (name, value) in raw.mcp_servers {
            let spec: RawProvider = serde_json::from_value(value)
                .map_err(|e| format!("provider '{name}': {e}"))?;
            if spec.command.trim().is_empty() {
                return Err(format!("provider '{name}': empty command"));
            }
            let startup_grace = match spec.startup_timeout {
                Some(secs) => Duration::try_from_secs_f64(secs)
                    .map_err(|_| format!("provider '{name}': invalid startup_timeout {secs}"))?,
                None => default_grace,
            };

            providers.push(ProviderConfig {
                name,
                command: spec.command,
                args: spec.args,
                env: spec.env,
                startup_grace,
                description: spec.description,
                transport: spec.transport,
            });
        }

        Ok(Self {
            providers,
            timeouts: Timeouts::default(),
        })
    }
}
