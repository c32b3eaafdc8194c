//! Tool Executor
//!
//! Gatekeeper between the decision loop and the providers. Every call goes
//! through three hard gates before anything leaves the process:
//!
//! 1. the tool must be advertised by a connected provider,
//! 2. the arguments must satisfy the tool's declared schema,
//! 3. only then is the call dispatched through the [`ToolBackend`].
//!
//! Provider payloads are normalized into a [`ToolCallResult`] and running
//! counters are kept for introspection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WardenError;
use crate::rpc::CallToolResult;
use crate::tool::{ToolBackend, ToolCall, ToolCallResult, ToolDescriptor};

/// Snapshot of the running counters
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionStats {
    /// Every `execute`, including calls rejected at a gate
    pub total_calls: u64,
    pub successful_calls: u64,
    pub failed_calls: u64,
    /// Calls that passed every gate and reached a provider
    pub dispatched_calls: u64,
    /// Dispatches per tool name
    pub tool_usage: BTreeMap<String, u64>,
    /// Percentage of successful calls, two decimals
    pub success_rate: f64,
}

/// One row of [`ToolExecutor::popular_tools`]
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub tool: String,
    pub usage_count: u64,
}

#[derive(Debug, Default)]
struct Counters {
    total: u64,
    successful: u64,
    failed: u64,
    dispatched: u64,
    usage: BTreeMap<String, u64>,
}

/// Validates, dispatches and normalizes tool calls
pub struct ToolExecutor {
    backend: Arc<dyn ToolBackend>,
    counters: Mutex<Counters>,
}

impl ToolExecutor {
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self {
            backend,
            counters: Mutex::new(Counters::default()),
        }
    }

    pub fn backend(&self) -> &Arc<dyn ToolBackend> {
        &self.backend
    }

    /// Tools advertised by connected providers
    pub async fn available_tools(&self) -> Vec<ToolDescriptor> {
        self.backend.list_tools().await
    }

    pub async fn list_available_tools(&self) -> Vec<String> {
        self.available_tools()
            .await
            .into_iter()
            .map(|t| t.name)
            .collect()
    }

    /// Descriptor of a single tool, for help output
    pub async fn tool_help(&self, name: &str) -> Option<ToolDescriptor> {
        self.available_tools()
            .await
            .into_iter()
            .find(|t| t.name == name)
    }

    /// Tools grouped by owning provider, providers in first-seen order
    pub async fn tools_by_provider(&self) -> Vec<(String, Vec<ToolDescriptor>)> {
        let mut groups: Vec<(String, Vec<ToolDescriptor>)> = Vec::new();
        for tool in self.available_tools().await {
            let provider = tool.provider_name().to_string();
            match groups.iter_mut().find(|(name, _)| *name == provider) {
                Some((_, tools)) => tools.push(tool),
                None => groups.push((provider, vec![tool])),
            }
        }
        groups
    }

    pub async fn execute_call(&self, call: &ToolCall) -> ToolCallResult {
        self.execute(&call.name, &call.arguments).await
    }

    /// Run one tool call through the gates. Never fails: every outcome is
    /// reported in the returned envelope.
    pub async fn execute(&self, name: &str, arguments: &Map<String, Value>) -> ToolCallResult {
        tracing::info!(tool = %name, "executing tool");
        let result = self.run_gates(name, arguments).await;

        let mut counters = self.counters();
        counters.total += 1;
        if result.is_success() {
            counters.successful += 1;
        } else {
            counters.failed += 1;
            tracing::warn!(
                tool = %name,
                error = result.error_message().unwrap_or_default(),
                "tool call failed"
            );
        }

        result
    }

    async fn run_gates(&self, name: &str, arguments: &Map<String, Value>) -> ToolCallResult {
        let tools = self.available_tools().await;

        let Some(descriptor) = tools.iter().find(|t| t.name == name) else {
            let available_tools = tools.iter().map(|t| t.name.clone()).collect();
            return ToolCallResult::from_error(
                name,
                &WardenError::ToolNotFound {
                    name: name.to_string(),
                    available_tools,
                },
            );
        };

        if let Err(err) = descriptor.input_schema.validate(arguments) {
            return ToolCallResult::from_error(name, &err)
                .with_expected_schema(descriptor.input_schema.to_value());
        }

        {
            let mut counters = self.counters();
            counters.dispatched += 1;
            *counters.usage.entry(name.to_string()).or_default() += 1;
        }

        let response = match self.backend.call_tool(name, arguments).await {
            Ok(response) => response,
            Err(err) => return ToolCallResult::from_error(name, &err),
        };

        match response.into_result() {
            Ok(payload) => normalize(name, payload),
            Err(err) => ToolCallResult::from_error(name, &err),
        }
    }

    pub fn stats(&self) -> ExecutionStats {
        let counters = self.counters();
        ExecutionStats {
            total_calls: counters.total,
            successful_calls: counters.successful,
            failed_calls: counters.failed,
            dispatched_calls: counters.dispatched,
            tool_usage: counters.usage.clone(),
            success_rate: success_rate(counters.successful, counters.total),
        }
    }

    /// Most dispatched tools, ties broken by name
    pub fn popular_tools(&self, limit: usize) -> Vec<ToolUsage> {
        let counters = self.counters();
        let mut usage: Vec<ToolUsage> = counters
            .usage
            .iter()
            .map(|(tool, &usage_count)| ToolUsage {
                tool: tool.clone(),
                usage_count,
            })
            .collect();
        usage.sort_by(|a, b| b.usage_count.cmp(&a.usage_count).then_with(|| a.tool.cmp(&b.tool)));
        usage.truncate(limit);
        usage
    }

    pub fn reset_stats(&self) {
        *self.counters() = Counters::default();
        tracing::info!("tool statistics reset");
    }

    fn counters(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.counters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[allow(clippy::cast_precision_loss)]
fn success_rate(successful: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (successful as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Turn a `tools/call` result into the success envelope.
///
/// The first text block is decoded as JSON when it looks like JSON; otherwise
/// the text is kept verbatim. A result without content blocks is kept whole.
pub fn normalize(tool: &str, payload: Value) -> ToolCallResult {
    let text = serde_json::from_value::<CallToolResult>(payload.clone())
        .ok()
        .filter(|r| !r.content.is_empty())
        .map(|r| r.first_text().unwrap_or_default().to_string());

    let Some(text) = text else {
        return ToolCallResult::success(tool, payload.clone()).with_raw(payload);
    };

    let trimmed = text.trim_start();
    let parsed = if trimmed.starts_with('{') || trimmed.starts_with('[') {
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::debug!(tool = %tool, error = %err, "tool text is not valid JSON");
                None
            }
        }
    } else {
        None
    };

    match parsed {
        Some(data) => {
            let summary = summarize(tool, &data);
            let result = ToolCallResult::success(tool, data).with_raw(payload);
            match summary {
                Some(summary) => result.with_summary(summary),
                None => result,
            }
        }
        None => ToolCallResult::success(tool, Value::String(text)).with_raw(payload),
    }
}

#[derive(Clone, Copy, Debug)]
enum NamePattern {
    Exact(&'static str),
    Prefix(&'static str),
}

impl NamePattern {
    fn matches(self, name: &str) -> bool {
        match self {
            Self::Exact(exact) => name == exact,
            Self::Prefix(prefix) => name.starts_with(prefix),
        }
    }
}

struct SummaryRule {
    pattern: NamePattern,
    render: fn(&Map<String, Value>) -> String,
}

/// First matching rule wins
const SUMMARY_RULES: &[SummaryRule] = &[
    SummaryRule {
        pattern: NamePattern::Exact("list_indices"),
        render: summarize_indices,
    },
    SummaryRule {
        pattern: NamePattern::Prefix("search_ip_"),
        render: summarize_ip_search,
    },
    SummaryRule {
        pattern: NamePattern::Prefix("search_username_"),
        render: summarize_username_search,
    },
    SummaryRule {
        pattern: NamePattern::Exact("cluster_health"),
        render: summarize_cluster_health,
    },
    SummaryRule {
        pattern: NamePattern::Exact("check_ip_reputation"),
        render: summarize_reputation,
    },
];

const HIT_COUNT_PREFIXES: &[&str] = &["search_", "list_"];

/// One-line summary of a decoded payload, if a rule applies
pub fn summarize(tool: &str, data: &Value) -> Option<String> {
    let Value::Object(fields) = data else {
        return HIT_COUNT_PREFIXES
            .iter()
            .any(|p| tool.starts_with(p))
            .then(|| data.as_array().map(|a| format!("Found {} results", a.len())))
            .flatten();
    };

    if let Some(rule) = SUMMARY_RULES.iter().find(|r| r.pattern.matches(tool)) {
        return Some((rule.render)(fields));
    }
    if let Some(error) = fields.get("error") {
        return Some(format!("Error: {}", display(Some(error), "unknown")));
    }
    if HIT_COUNT_PREFIXES.iter().any(|p| tool.starts_with(p)) {
        return Some(format!("Found {} results", hit_count(fields)));
    }
    Some("Tool executed successfully".into())
}

fn display(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn hit_count(fields: &Map<String, Value>) -> String {
    ["total_hits", "total", "count"]
        .iter()
        .find_map(|k| fields.get(*k))
        .map(|v| display(Some(v), "0"))
        .or_else(|| {
            ["results", "hits"]
                .iter()
                .find_map(|k| fields.get(*k).and_then(Value::as_array))
                .map(|a| a.len().to_string())
        })
        .unwrap_or_else(|| "0".into())
}

fn summarize_indices(fields: &Map<String, Value>) -> String {
    format!(
        "Found {} Elasticsearch indices",
        display(fields.get("total_indices"), "0")
    )
}

fn summarize_ip_search(fields: &Map<String, Value>) -> String {
    format!(
        "Found {} results for IP {}",
        display(fields.get("total_hits"), "0"),
        display(fields.get("ip_searched"), "unknown")
    )
}

fn summarize_username_search(fields: &Map<String, Value>) -> String {
    format!(
        "Found {} results for username {}",
        display(fields.get("total_hits"), "0"),
        display(fields.get("username_searched"), "unknown")
    )
}

fn summarize_cluster_health(fields: &Map<String, Value>) -> String {
    format!(
        "Cluster status: {} ({} nodes)",
        display(fields.get("status"), "unknown"),
        display(fields.get("number_of_nodes"), "0")
    )
}

fn summarize_reputation(fields: &Map<String, Value>) -> String {
    format!(
        "IP {}: {}% confidence, threat level: {}",
        display(fields.get("ip"), "unknown"),
        display(fields.get("abuseConfidenceScore"), "0"),
        display(fields.get("threat_level"), "unknown")
    )
}
