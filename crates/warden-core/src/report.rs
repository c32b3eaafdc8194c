//! Plain-text report rendered once a session reaches a terminal state.

use std::fmt::Write as _;

use crate::session::{AnalysisSession, RecordedAction};

const RULE: &str = "==================================================";
const OUTPUT_PREVIEW_CHARS: usize = 300;

pub fn render(session: &AnalysisSession, narrative: Option<&str>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "AUTONOMOUS SOC ANALYSIS REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Initial Request: {}", session.query());
    let _ = writeln!(out, "Investigation Started: {}", session.created_at.to_rfc3339());

    for record in session.history() {
        let _ = writeln!(out, "\n--- ITERATION {} ---", record.iteration);
        let _ = writeln!(out, "Action: {}", record.action);
        if let RecordedAction::ToolCall { arguments, .. } = &record.action {
            let parameters = serde_json::to_string_pretty(arguments).unwrap_or_default();
            let _ = writeln!(out, "Parameters: {parameters}");
        }
        if let Some(reasoning) = &record.reasoning {
            let _ = writeln!(out, "Reasoning: {reasoning}");
        }
        if let Some(result) = &record.result {
            let output = result
                .summary
                .clone()
                .unwrap_or_else(|| result.preview(OUTPUT_PREVIEW_CHARS));
            let _ = writeln!(out, "Tool Output: {output}");
        }
        if let Some(analysis) = &record.analysis {
            let _ = writeln!(out, "Analysis: {analysis}");
        }
    }

    let _ = writeln!(out, "\n{RULE}");
    let _ = writeln!(out, "INVESTIGATION SUMMARY");
    let _ = writeln!(out, "Total Iterations: {}", session.iteration());
    let _ = writeln!(out, "Confidence Level: {}", session.confidence());
    let _ = writeln!(out, "Investigation Status: {}\n", session.status());

    if session.findings().is_empty() {
        let _ = writeln!(out, "No specific security findings identified.");
    } else {
        let _ = writeln!(out, "SECURITY FINDINGS:");
        for (i, finding) in session.findings().iter().enumerate() {
            let _ = writeln!(out, "{}. [{}] {}", i + 1, finding.severity, finding.text);
        }
    }

    if let Some(narrative) = narrative.filter(|n| !n.trim().is_empty()) {
        let _ = writeln!(out, "\n{RULE}\nNARRATIVE REPORT\n\n{}", narrative.trim());
    }

    let _ = writeln!(
        out,
        "\nInvestigation completed at: {}",
        session.updated_at.to_rfc3339()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Confidence, Finding, SessionStatus, Severity};
    use crate::tool::ToolCallResult;

    #[test]
    fn test_report_sections() {
        let mut session = AnalysisSession::new("Check 45.9.148.3", 3);
        session.begin_iteration().unwrap();
        session
            .record(
                RecordedAction::ToolCall {
                    tool: "check_ip_reputation".into(),
                    arguments: serde_json::Map::new(),
                },
                Some("Need reputation".into()),
                Some(
                    ToolCallResult::success("check_ip_reputation", serde_json::json!({}))
                        .with_summary("IP 45.9.148.3: 100% confidence, threat level: HIGH"),
                ),
            )
            .unwrap();
        session
            .add_finding(Finding::new("Known scanner", Severity::High))
            .unwrap();
        session.set_confidence(Confidence::High).unwrap();
        session.finish(SessionStatus::Completed).unwrap();

        let report = render(&session, None);
        assert!(report.starts_with("AUTONOMOUS SOC ANALYSIS REPORT"));
        assert!(report.contains("--- ITERATION 1 ---"));
        assert!(report.contains("Tool Output: IP 45.9.148.3: 100% confidence"));
        assert!(report.contains("Total Iterations: 1"));
        assert!(report.contains("Confidence Level: High"));
        assert!(report.contains("Investigation Status: Completed"));
        assert!(report.contains("1. [High] Known scanner"));
        assert!(!report.contains("NARRATIVE REPORT"));
    }

    #[test]
    fn test_empty_findings_and_narrative() {
        let mut session = AnalysisSession::new("q", 1);
        session.finish(SessionStatus::IterationLimit).unwrap();
        let report = render(&session, Some("Executive Summary: nothing found."));
        assert!(report.contains("No specific security findings identified."));
        assert!(report.contains("Investigation Status: Max iterations reached"));
        assert!(report.contains("NARRATIVE REPORT\n\nExecutive Summary: nothing found."));
    }
}
