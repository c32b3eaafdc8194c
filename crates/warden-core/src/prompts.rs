//! Prompt construction for the decision, analysis and narrative requests.

use std::fmt::Write as _;

use chrono::{DateTime, Utc};

use crate::session::AnalysisSession;
use crate::tool::{ToolCallResult, ToolDescriptor};

/// Tool results quoted back to the model are cut to this many characters
pub const RESULT_PREVIEW_CHARS: usize = 500;

const PERSONA: &str = "You are The Warden, an expert SOC (Security Operations Center) analyst \
with years of cybersecurity experience. You have access to various threat intelligence tools and APIs.

Your role is to:
1. Analyze security threats and indicators of compromise (IoCs)
2. Make decisions about which tools to use for investigation
3. Provide clear, actionable security assessments
4. Think step-by-step through complex security scenarios";

const DECISION_SCHEMA: &str = r#"AVAILABLE DECISION MODES:
- "use_tool": Execute a specific tool with arguments
- "complete": Finish analysis and provide final report

When deciding what to do next, respond with a JSON object containing:
{
    "action": "use_tool" | "complete",
    "reasoning": "Brief explanation of why you're taking this action",
    "tool_name": "name_of_tool_to_use" (only if action is "use_tool"),
    "arguments": {"arg1": "value1"} (only if action is "use_tool")
}

You may think before answering, but the reply must contain exactly one valid JSON object, placed last."#;

const ANALYSIS_SCHEMA: &str = r#"RESPONSE FORMAT FOR ANALYSIS:
{
  "analysis": "Brief analysis of the tool output",
  "findings": [{"finding": "Security finding or IOC", "severity": "Critical|High|Medium|Low"}],
  "next_action": "complete" or the name of the next tool to use,
  "next_parameters": {"param": "value"} or null,
  "confidence": "High|Medium|Low",
  "reasoning": "Why this next action or completion decision was made"
}"#;

fn zulu(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// System message for the Deciding step
pub fn decision_system(now: DateTime<Utc>) -> String {
    format!(
        "{PERSONA}\n\nCURRENT ZULU TIME: {}\n\n{DECISION_SCHEMA}\n\n\
         Always think like a SOC analyst: be thorough and provide actionable intelligence.",
        zulu(now)
    )
}

/// System message for the Analyzing step
pub fn analysis_system(now: DateTime<Utc>) -> String {
    format!(
        "{PERSONA}\n\nCURRENT ZULU TIME: {}\n\n{ANALYSIS_SCHEMA}\n\n\
         Mark the investigation \"complete\" once sufficient information has been gathered.",
        zulu(now)
    )
}

/// `- name: description (via provider)` per tool
pub fn tool_catalog(tools: &[ToolDescriptor]) -> String {
    if tools.is_empty() {
        return "- (no tools are currently available)".into();
    }
    tools
        .iter()
        .map(|tool| {
            let description = if tool.description.is_empty() {
                "No description"
            } else {
                tool.description.as_str()
            };
            match &tool.provider {
                Some(provider) => format!("- {}: {description} (via {provider})", tool.name),
                None => format!("- {}: {description}", tool.name),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// User message for the Deciding step
pub fn decision_prompt(
    session: &AnalysisSession,
    tools: &[ToolDescriptor],
    hint: Option<&str>,
) -> String {
    let mut prompt = format!(
        "ANALYSIS SESSION CONTEXT:\n\nUSER QUERY: {}\nCURRENT ITERATION: {}/{}\n\nAVAILABLE TOOLS:\n{}",
        session.query(),
        session.iteration(),
        session.max_iterations(),
        tool_catalog(tools)
    );

    let results: Vec<_> = session
        .history()
        .iter()
        .filter_map(|record| record.result.as_ref().map(|r| (record, r)))
        .collect();
    if !results.is_empty() {
        prompt.push_str("\n\nPREVIOUS TOOL RESULTS:");
        for (record, result) in results {
            let arguments = match &record.action {
                crate::session::RecordedAction::ToolCall { arguments, .. } => {
                    serde_json::to_string(arguments).unwrap_or_default()
                }
                _ => "{}".into(),
            };
            let _ = write!(
                prompt,
                "\n\nTool: {}\nArguments: {arguments}\nResult: {}",
                result.tool,
                result.preview(RESULT_PREVIEW_CHARS)
            );
            if let Some(analysis) = &record.analysis {
                let _ = write!(prompt, "\nAnalysis: {analysis}");
            }
        }
    }

    if let Some(hint) = hint {
        let _ = write!(prompt, "\n\nCURRENT TASK: {hint}");
    }

    prompt.push_str(
        "\n\nAs The Warden, what should I do next? Consider:\n\
         1. Have I gathered enough information to make an assessment?\n\
         2. Are there other tools I should use for a complete analysis?\n\
         3. What would a thorough SOC analyst do in this situation?\n\n\
         Respond with a JSON decision object.",
    );
    prompt
}

/// User message for the Analyzing step
pub fn analysis_prompt(session: &AnalysisSession, latest: &ToolCallResult) -> String {
    let mut prompt = format!(
        "ANALYSIS REQUEST:\n\nUSER QUERY: {}\nITERATION: {}/{}",
        session.query(),
        session.iteration(),
        session.max_iterations()
    );

    if !session.findings().is_empty() {
        prompt.push_str("\n\nCURRENT FINDINGS:");
        for finding in session.findings() {
            let _ = write!(prompt, "\n- [{}] {}", finding.severity, finding.text);
        }
    }

    let _ = write!(
        prompt,
        "\n\nLATEST TOOL OUTPUT TO ANALYZE:\n{}\n\n\
         Please analyze this output and determine:\n\
         1. What security-relevant information was discovered\n\
         2. What additional investigation steps are needed\n\
         3. Whether the investigation can be marked as complete\n\n\
         Respond with a JSON object containing your analysis and next steps.",
        serde_json::to_string(latest).unwrap_or_default()
    );
    prompt
}

/// User message asking for the prose report after the loop ended
pub fn narrative_prompt(session: &AnalysisSession) -> String {
    let mut prompt = format!(
        "FINAL ANALYSIS REQUEST:\n\nUSER QUERY: {}\n\nINVESTIGATION RESULTS:",
        session.query()
    );

    let mut executed = 0;
    for record in session.history() {
        let Some(result) = &record.result else {
            continue;
        };
        executed += 1;
        let _ = write!(
            prompt,
            "\n\n{executed}. Tool: {}\n   Result: {}",
            result.tool,
            result.preview(RESULT_PREVIEW_CHARS * 4)
        );
    }
    if executed == 0 {
        prompt.push_str("\n\nNo tools were executed during this analysis.");
    }

    prompt.push_str(
        "\n\nAs The Warden, provide a comprehensive SOC analyst report including:\n\
         1. Executive Summary\n\
         2. Key Findings\n\
         3. Threat Assessment (High/Medium/Low)\n\
         4. Recommended Actions\n\
         5. Technical Details\n\
         6. Intel Sources\n\n\
         Format your response as a professional security report.",
    );
    prompt
}
