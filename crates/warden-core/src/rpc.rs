//! JSON-RPC Messages
//!
//! Line-delimited JSON-RPC 2.0 envelopes spoken between the warden and its
//! tool providers, plus the payloads of the three mandatory methods.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{TransportError, WardenError};
use crate::tool::ToolDescriptor;

pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol revision announced in the `initialize` handshake
pub const PROTOCOL_VERSION: &str = "2024-11-05";

/// Mandatory provider methods
pub mod methods {
    pub const INITIALIZE: &str = "initialize";
    pub const TOOLS_LIST: &str = "tools/list";
    pub const TOOLS_CALL: &str = "tools/call";
}

/// Reserved JSON-RPC error codes
pub mod codes {
    pub const PARSE_ERROR: i64 = -32700;
    pub const METHOD_NOT_FOUND: i64 = -32601;
    pub const INVALID_PARAMS: i64 = -32602;
    pub const INTERNAL_ERROR: i64 = -32603;
}

/// Request envelope
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            method: method.into(),
            params,
        }
    }

    pub fn initialize(id: u64) -> Self {
        Self::new(
            id,
            methods::INITIALIZE,
            Some(json!({ "protocolVersion": PROTOCOL_VERSION })),
        )
    }

    pub fn list_tools(id: u64) -> Self {
        Self::new(id, methods::TOOLS_LIST, None)
    }

    pub fn call_tool(id: u64, name: &str, arguments: &Map<String, Value>) -> Self {
        Self::new(
            id,
            methods::TOOLS_CALL,
            Some(json!({ "name": name, "arguments": arguments })),
        )
    }
}

/// Error object of a failed response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Response envelope: exactly one of `result` / `error` is expected
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    #[serde(default = "default_version")]
    pub jsonrpc: String,
    #[serde(default)]
    pub id: Option<Value>,
    /// `Some(Value::Null)` when the provider sent `"result": null`
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcError>,
}

fn default_version() -> String {
    JSONRPC_VERSION.into()
}

/// A field that appears at all is `Some`, even when its value is `null`
fn present<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

impl RpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<Value>, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(RpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Decode one line read from a provider.
    ///
    /// Anything that is not a JSON object carrying `result` or `error` is a
    /// transport-level failure; an `error` object is passed through untouched.
    pub fn parse_line(line: &str) -> Result<Self, TransportError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(TransportError::Malformed("empty line".into()));
        }

        let response: Self = serde_json::from_str(trimmed)
            .map_err(|e| TransportError::Malformed(format!("{e}: {}", preview(trimmed))))?;

        if response.result.is_none() && response.error.is_none() {
            return Err(TransportError::Malformed(format!(
                "neither result nor error: {}",
                preview(trimmed)
            )));
        }

        Ok(response)
    }

    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Interpret the envelope: `error` becomes a `Protocol` error
    pub fn into_result(self) -> Result<Value, WardenError> {
        if let Some(err) = self.error {
            return Err(WardenError::Protocol {
                code: err.code,
                message: err.message,
            });
        }
        self.result
            .ok_or_else(|| TransportError::Malformed("response without result".into()).into())
    }
}

fn preview(line: &str) -> String {
    const MAX: usize = 120;
    if line.chars().count() > MAX {
        let head: String = line.chars().take(MAX).collect();
        format!("{head}...")
    } else {
        line.to_string()
    }
}

/// `serverInfo` block of the handshake result
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Result of `initialize`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    pub protocol_version: String,
    #[serde(default)]
    pub capabilities: Value,
    pub server_info: ServerInfo,
}

/// Result of `tools/list`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ToolsListResult {
    #[serde(default)]
    pub tools: Vec<ToolDescriptor>,
}

/// One content block of a `tools/call` result
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".into(),
            text: Some(text.into()),
        }
    }
}

/// Result of `tools/call`
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentItem>,
}

impl CallToolResult {
    /// First text block, which carries the provider's JSON-encoded payload
    pub fn first_text(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|item| item.kind == "text")
            .and_then(|item| item.text.as_deref())
    }
}
