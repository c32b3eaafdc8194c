//! Tool System
//!
//! Descriptors advertised by providers, shallow argument validation, the
//! uniform result envelope, and the `ToolBackend` seam the executor calls
//! through.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, WardenError};
use crate::rpc::RpcResponse;

/// Tool call chosen by the model
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }
}

/// Primitive types checked before dispatch. Other declared types pass through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveType {
    String,
    Integer,
    Boolean,
    Array,
}

impl PrimitiveType {
    pub fn from_schema(name: &str) -> Option<Self> {
        match name {
            "string" => Some(Self::String),
            "integer" => Some(Self::Integer),
            "boolean" => Some(Self::Boolean),
            "array" => Some(Self::Array),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Array => "array",
        }
    }

    pub fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
        }
    }
}

/// Input schema as advertised in `tools/list` (JSON Schema subset)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputSchema {
    #[serde(rename = "type", default = "default_schema_type")]
    pub schema_type: String,

    /// Property name → property schema, kept verbatim
    #[serde(default)]
    pub properties: Map<String, Value>,

    #[serde(default)]
    pub required: Vec<String>,
}

fn default_schema_type() -> String {
    "object".into()
}

impl InputSchema {
    /// Declared primitive type of a property, if it is one we check
    pub fn declared_type(&self, field: &str) -> Option<PrimitiveType> {
        self.properties
            .get(field)
            .and_then(|p| p.get("type"))
            .and_then(Value::as_str)
            .and_then(PrimitiveType::from_schema)
    }

    /// Shallow validation: required fields present, then primitive types.
    /// Nested schemas are not inspected.
    pub fn validate(&self, arguments: &Map<String, Value>) -> Result<()> {
        if let Some(missing) = self.required.iter().find(|f| !arguments.contains_key(*f)) {
            return Err(WardenError::Validation(format!(
                "Missing required field: {missing}"
            )));
        }

        for (name, value) in arguments {
            if let Some(expected) = self.declared_type(name) {
                if !expected.matches(value) {
                    let article = if expected == PrimitiveType::Integer || expected == PrimitiveType::Array {
                        "an"
                    } else {
                        "a"
                    };
                    return Err(WardenError::Validation(format!(
                        "Field '{name}' must be {article} {}",
                        expected.as_str()
                    )));
                }
            }
        }

        Ok(())
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Tool advertised by a connected provider
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "inputSchema", default)]
    pub input_schema: InputSchema,

    /// Name of the owning provider, set by the supervisor after discovery
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: InputSchema::default(),
            provider: None,
        }
    }

    pub fn with_schema(mut self, schema: InputSchema) -> Self {
        self.input_schema = schema;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.as_deref().unwrap_or("unknown")
    }
}

/// Why a tool call failed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Tool name not advertised by any connected provider
    NotFound,
    /// Arguments rejected before dispatch
    Validation,
    /// Provider channel failed or timed out
    Transport,
    /// Provider answered with a JSON-RPC error
    Protocol,
    /// Any other failure while dispatching
    Internal,
}

/// Outcome of one tool invocation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ToolOutcome {
    Success {
        data: Value,
    },
    Error {
        kind: FailureKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        code: Option<i64>,
        message: String,
        /// Known tool names, so the model can correct itself
        #[serde(default, skip_serializing_if = "Option::is_none")]
        available_tools: Option<Vec<String>>,
        /// Schema the arguments were checked against
        #[serde(default, skip_serializing_if = "Option::is_none")]
        expected_schema: Option<Value>,
    },
}

/// Uniform envelope returned by the executor
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub tool: String,

    #[serde(flatten)]
    pub outcome: ToolOutcome,

    /// One-line human-readable summary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Provider payload as received, kept for debugging
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<Value>,
}

impl ToolCallResult {
    pub fn success(tool: impl Into<String>, data: Value) -> Self {
        Self {
            tool: tool.into(),
            outcome: ToolOutcome::Success { data },
            summary: None,
            raw: None,
        }
    }

    pub fn failure(tool: impl Into<String>, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            outcome: ToolOutcome::Error {
                kind,
                code: None,
                message: message.into(),
                available_tools: None,
                expected_schema: None,
            },
            summary: None,
            raw: None,
        }
    }

    /// Map a dispatch error onto the envelope
    pub fn from_error(tool: impl Into<String>, error: &WardenError) -> Self {
        let tool = tool.into();
        let (kind, code, available_tools) = match error {
            WardenError::ToolNotFound {
                available_tools, ..
            } => (FailureKind::NotFound, None, Some(available_tools.clone())),
            WardenError::Validation(_) => (FailureKind::Validation, None, None),
            WardenError::Transport(_) => (FailureKind::Transport, None, None),
            WardenError::Protocol { code, .. } => (FailureKind::Protocol, Some(*code), None),
            _ => (FailureKind::Internal, None, None),
        };
        let message = match error {
            WardenError::Protocol { message, .. } => message.clone(),
            WardenError::Validation(msg) => format!("Invalid arguments: {msg}"),
            other => other.to_string(),
        };

        Self {
            tool,
            outcome: ToolOutcome::Error {
                kind,
                code,
                message,
                available_tools,
                expected_schema: None,
            },
            summary: None,
            raw: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_raw(mut self, raw: Value) -> Self {
        self.raw = Some(raw);
        self
    }

    pub fn with_expected_schema(mut self, schema: Value) -> Self {
        if let ToolOutcome::Error {
            expected_schema, ..
        } = &mut self.outcome
        {
            *expected_schema = Some(schema);
        }
        self
    }

    pub const fn is_success(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Success { .. })
    }

    pub const fn data(&self) -> Option<&Value> {
        match &self.outcome {
            ToolOutcome::Success { data } => Some(data),
            ToolOutcome::Error { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            ToolOutcome::Error { message, .. } => Some(message),
            ToolOutcome::Success { .. } => None,
        }
    }

    /// Compact JSON rendering without the raw payload, cut to `max_chars`
    pub fn preview(&self, max_chars: usize) -> String {
        let mut compact = self.clone();
        compact.raw = None;
        let text = serde_json::to_string(&compact).unwrap_or_default();
        if text.chars().count() > max_chars {
            let head: String = text.chars().take(max_chars).collect();
            format!("{head}...")
        } else {
            text
        }
    }
}

/// Where validated tool calls are dispatched (Strategy pattern).
///
/// The process-backed registry implements this; tests substitute fakes.
#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// Tools currently advertised by connected providers, in resolution order
    async fn list_tools(&self) -> Vec<ToolDescriptor>;

    /// Dispatch a call. A JSON-RPC error response is returned as `Ok` for
    /// the caller to interpret; a missing tool is `WardenError::ToolNotFound`.
    async fn call_tool(&self, name: &str, arguments: &Map<String, Value>) -> Result<RpcResponse>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn ip_schema() -> InputSchema {
        serde_json::from_value(json!({
            "type": "object",
            "properties": {
                "ip": {"type": "string"},
                "max_age_days": {"type": "integer", "default": 90},
                "verbose": {"type": "boolean"},
                "tags": {"type": "array"},
                "filter": {"type": "object"}
            },
            "required": ["ip"]
        }))
        .unwrap()
    }

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_missing_required_field() {
        let err = ip_schema().validate(&args(json!({"verbose": true}))).unwrap_err();
        assert_eq!(err.to_string(), "Validation error: Missing required field: ip");
    }

    #[test]
    fn test_type_mismatches() {
        let schema = ip_schema();
        assert!(schema.validate(&args(json!({"ip": 8}))).is_err());
        assert!(schema.validate(&args(json!({"ip": "1.1.1.1", "max_age_days": "30"}))).is_err());
        assert!(schema.validate(&args(json!({"ip": "1.1.1.1", "max_age_days": 1.5}))).is_err());
        assert!(schema.validate(&args(json!({"ip": "1.1.1.1", "verbose": "yes"}))).is_err());
        assert!(schema.validate(&args(json!({"ip": "1.1.1.1", "tags": "a,b"}))).is_err());
    }

    #[test]
    fn test_valid_and_unchecked_fields() {
        let schema = ip_schema();
        let ok = args(json!({
            "ip": "1.1.1.1",
            "max_age_days": 30,
            "verbose": false,
            "tags": ["x"],
            "filter": "objects are not checked",
            "extra": 1
        }));
        assert!(schema.validate(&ok).is_ok());
    }

    #[test]
    fn test_descriptor_parses_list_entry() {
        let descriptor: ToolDescriptor = serde_json::from_value(json!({
            "name": "check_ip_reputation",
            "description": "Check IP address reputation",
            "inputSchema": {"type": "object", "properties": {"ip": {"type": "string"}}, "required": ["ip"]}
        }))
        .unwrap();

        assert_eq!(descriptor.input_schema.required, vec!["ip".to_string()]);
        assert_eq!(descriptor.provider_name(), "unknown");
        assert_eq!(descriptor.with_provider("abuseipdb").provider_name(), "abuseipdb");
    }

    #[test]
    fn test_result_envelope_serialization() {
        let ok = ToolCallResult::success("search_ioc", json!({"total_hits": 2}))
            .with_summary("Found 2 results");
        let value = serde_json::to_value(&ok).unwrap();
        assert_eq!(value["status"], "success");
        assert_eq!(value["data"]["total_hits"], 2);

        let missing = ToolCallResult::from_error(
            "nope",
            &WardenError::ToolNotFound {
                name: "nope".into(),
                available_tools: vec!["a".into(), "b".into()],
            },
        );
        let value = serde_json::to_value(&missing).unwrap();
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "not_found");
        assert_eq!(value["available_tools"], json!(["a", "b"]));
        assert!(!missing.is_success());
    }

    #[test]
    fn test_protocol_error_keeps_code_and_message() {
        let result = ToolCallResult::from_error(
            "check_ip_reputation",
            &WardenError::Protocol {
                code: -32602,
                message: "Invalid IP".into(),
            },
        );
        match result.outcome {
            ToolOutcome::Error { kind, code, message, .. } => {
                assert_eq!(kind, FailureKind::Protocol);
                assert_eq!(code, Some(-32602));
                assert_eq!(message, "Invalid IP");
            }
            ToolOutcome::Success { .. } => panic!("expected error"),
        }
    }

    #[test]
    fn test_preview_truncates() {
        let result = ToolCallResult::success("t", json!({"text": "x".repeat(200)}));
        let preview = result.preview(50);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), 53);
    }
}
