//! Decision and analysis objects produced by the model.

use serde_json::{Map, Value};

use crate::error::{Result, WardenError};
use crate::session::{Confidence, Finding, Severity};
use crate::tool::ToolCall;

pub const ACTION_USE_TOOL: &str = "use_tool";
pub const ACTION_COMPLETE: &str = "complete";

/// Next step requested by a decision
#[derive(Clone, Debug, PartialEq)]
pub enum DecisionAction {
    UseTool(ToolCall),
    Complete,
    /// Any other `action` value. Older prompts put the tool name here directly,
    /// so the loop resolves it against the catalog.
    Other {
        action: String,
        arguments: Map<String, Value>,
    },
}

/// `{action, reasoning, tool_name?, arguments?}`
#[derive(Clone, Debug, PartialEq)]
pub struct Decision {
    pub action: DecisionAction,
    pub reasoning: Option<String>,
}

impl Decision {
    pub fn from_object(object: &Map<String, Value>) -> Result<Self> {
        let action = object
            .get("action")
            .and_then(Value::as_str)
            .map(str::trim)
            .ok_or_else(|| WardenError::Parse("decision has no 'action' string".into()))?;

        let reasoning = string_field(object, "reasoning");
        let arguments = arguments_field(object);

        let action = match action {
            ACTION_COMPLETE => DecisionAction::Complete,
            ACTION_USE_TOOL => {
                let name = string_field(object, "tool_name").ok_or_else(|| {
                    WardenError::Parse("use_tool decision without 'tool_name'".into())
                })?;
                DecisionAction::UseTool(ToolCall::new(name, arguments))
            }
            other => DecisionAction::Other {
                action: other.to_string(),
                arguments,
            },
        };

        Ok(Self { action, reasoning })
    }
}

/// Routing requested by an analysis
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NextAction {
    Complete,
    /// Keep investigating; the hint is passed to the next decision prompt
    Continue { hint: String },
}

/// `{analysis, findings[], next_action, next_parameters?, confidence, reasoning}`
#[derive(Clone, Debug, PartialEq)]
pub struct Analysis {
    pub analysis: String,
    pub findings: Vec<Finding>,
    pub next_action: NextAction,
    pub next_parameters: Option<Map<String, Value>>,
    pub confidence: Confidence,
    pub reasoning: Option<String>,
}

impl Analysis {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        let analysis =
            string_field(object, "analysis").unwrap_or_else(|| "No analysis provided".into());

        let findings = object
            .get("findings")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(parse_finding).collect())
            .unwrap_or_default();

        let next_action = match string_field(object, "next_action") {
            None => NextAction::Complete,
            Some(next) if next.eq_ignore_ascii_case(ACTION_COMPLETE) => NextAction::Complete,
            Some(hint) => NextAction::Continue { hint },
        };

        let confidence = object
            .get("confidence")
            .and_then(Value::as_str)
            .map_or(Confidence::Medium, Confidence::parse);

        Self {
            analysis,
            findings,
            next_action,
            next_parameters: object.get("next_parameters").and_then(Value::as_object).cloned(),
            confidence,
            reasoning: string_field(object, "reasoning"),
        }
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// `arguments`, or the older `parameters`; anything but an object is empty
fn arguments_field(object: &Map<String, Value>) -> Map<String, Value> {
    object
        .get("arguments")
        .or_else(|| object.get("parameters"))
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

/// A finding is either a bare string or `{finding|text|description, severity?}`
fn parse_finding(item: &Value) -> Option<Finding> {
    match item {
        Value::String(text) if !text.trim().is_empty() => {
            Some(Finding::new(text.trim(), Severity::Medium))
        }
        Value::Object(fields) => {
            let text = ["finding", "text", "description"]
                .iter()
                .find_map(|k| string_field(fields, k))
                .unwrap_or_else(|| item.to_string());
            let severity = fields
                .get("severity")
                .and_then(Value::as_str)
                .map_or(Severity::Medium, Severity::parse);
            Some(Finding::new(text, severity))
        }
        Value::Null => None,
        other => Some(Finding::new(other.to_string(), Severity::Medium)),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_use_tool_decision() {
        let decision = Decision::from_object(&object(json!({
            "action": "use_tool",
            "reasoning": "Need reputation data",
            "tool_name": "check_ip_reputation",
            "arguments": {"ip": "8.8.8.8"}
        })))
        .unwrap();

        match decision.action {
            DecisionAction::UseTool(call) => {
                assert_eq!(call.name, "check_ip_reputation");
                assert_eq!(call.arguments["ip"], "8.8.8.8");
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(decision.reasoning.as_deref(), Some("Need reputation data"));
    }

    #[test]
    fn test_legacy_action_names_tool() {
        let decision = Decision::from_object(&object(json!({
            "action": "query_abuseip",
            "parameters": {"ip": "1.1.1.1"}
        })))
        .unwrap();

        assert_eq!(
            decision.action,
            DecisionAction::Other {
                action: "query_abuseip".into(),
                arguments: object(json!({"ip": "1.1.1.1"})),
            }
        );
    }

    #[test]
    fn test_invalid_decisions() {
        assert!(Decision::from_object(&object(json!({"analysis": "x"}))).is_err());
        assert!(Decision::from_object(&object(json!({"action": "use_tool"}))).is_err());
        assert!(Decision::from_object(&object(json!({"action": 3}))).is_err());
    }

    #[test]
    fn test_analysis_defaults() {
        let analysis = Analysis::from_object(&object(json!({"analysis": "Looks benign"})));
        assert_eq!(analysis.next_action, NextAction::Complete);
        assert_eq!(analysis.confidence, Confidence::Medium);
        assert!(analysis.findings.is_empty());
    }

    #[test]
    fn test_analysis_findings_and_routing() {
        let analysis = Analysis::from_object(&object(json!({
            "analysis": "IP is listed on two feeds",
            "findings": [
                "Reported 40 times",
                {"finding": "C2 beacon pattern", "severity": "High"},
                {"text": "Hosted in bulletproof ASN"},
                null
            ],
            "next_action": "search_ioc",
            "next_parameters": {"ioc": "1.2.3.4"},
            "confidence": "high",
            "reasoning": "Cross-check ThreatFox"
        })));

        assert_eq!(analysis.findings.len(), 3);
        assert_eq!(analysis.findings[0].severity, Severity::Medium);
        assert_eq!(analysis.findings[1].severity, Severity::High);
        assert_eq!(analysis.findings[2].text, "Hosted in bulletproof ASN");
        assert_eq!(
            analysis.next_action,
            NextAction::Continue {
                hint: "search_ioc".into()
            }
        );
        assert_eq!(analysis.confidence, Confidence::High);
        assert!(analysis.next_parameters.is_some());
    }
}
