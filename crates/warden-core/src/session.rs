//! Session Management
//!
//! One bounded investigation: the query, an append-only decision history,
//! accumulated findings, and the terminal status.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Result, WardenError};
use crate::tool::ToolCallResult;

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a finding
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Case-insensitive; anything unrecognized is `Medium`
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// Confidence the model reports in its assessment
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    #[default]
    Low,
    Medium,
    High,
}

impl Confidence {
    /// Case-insensitive; anything unrecognized is `Medium`
    pub fn parse(text: &str) -> Self {
        match text.trim().to_ascii_lowercase().as_str() {
            "high" => Self::High,
            "low" => Self::Low,
            _ => Self::Medium,
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        };
        f.write_str(label)
    }
}

/// A security finding reported during analysis
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub text: String,
    pub severity: Severity,
    pub recorded_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(text: impl Into<String>, severity: Severity) -> Self {
        Self {
            text: text.into(),
            severity,
            recorded_at: Utc::now(),
        }
    }
}

/// What a cycle did
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RecordedAction {
    ToolCall {
        tool: String,
        arguments: serde_json::Map<String, serde_json::Value>,
    },
    Complete,
    /// The model asked for something the loop does not understand
    Unrecognized { action: String },
}

impl std::fmt::Display for RecordedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ToolCall { tool, .. } => write!(f, "use_tool {tool}"),
            Self::Complete => f.write_str("complete"),
            Self::Unrecognized { action } => write!(f, "unrecognized '{action}'"),
        }
    }
}

/// One append-only history entry
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub iteration: u32,
    pub action: RecordedAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ToolCallResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Where the session ended up
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    /// Explicit completion from the model
    Completed,
    /// The iteration cap was reached without a completion signal
    IterationLimit,
    /// The loop could not continue; the report is degraded
    Aborted { reason: String },
}

impl SessionStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => f.write_str("Active"),
            Self::Completed => f.write_str("Completed"),
            Self::IterationLimit => f.write_str("Max iterations reached"),
            Self::Aborted { reason } => write!(f, "Aborted ({reason})"),
        }
    }
}

/// A single investigation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AnalysisSession {
    pub id: SessionId,
    query: String,
    iteration: u32,
    max_iterations: u32,
    history: Vec<DecisionRecord>,
    findings: Vec<Finding>,
    confidence: Confidence,
    status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisSession {
    pub fn new(query: impl Into<String>, max_iterations: u32) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            query: query.into(),
            iteration: 0,
            max_iterations,
            history: Vec::new(),
            findings: Vec::new(),
            confidence: Confidence::default(),
            status: SessionStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub const fn iteration(&self) -> u32 {
        self.iteration
    }

    pub const fn max_iterations(&self) -> u32 {
        self.max_iterations
    }

    pub fn history(&self) -> &[DecisionRecord] {
        &self.history
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub const fn confidence(&self) -> Confidence {
        self.confidence
    }

    pub const fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub const fn is_completed(&self) -> bool {
        self.status.is_terminal()
    }

    pub const fn has_iterations_left(&self) -> bool {
        self.iteration < self.max_iterations
    }

    /// Most recent tool result, if any cycle produced one
    pub fn last_result(&self) -> Option<&ToolCallResult> {
        self.history.iter().rev().find_map(|r| r.result.as_ref())
    }

    fn ensure_active(&self) -> Result<()> {
        if self.status.is_terminal() {
            return Err(WardenError::Other(format!(
                "session {} is already {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Enter the next cycle. Fails once the cap is reached or the session ended.
    pub fn begin_iteration(&mut self) -> Result<u32> {
        self.ensure_active()?;
        if !self.has_iterations_left() {
            return Err(WardenError::Other(format!(
                "iteration limit of {} reached",
                self.max_iterations
            )));
        }
        self.iteration += 1;
        self.touch();
        Ok(self.iteration)
    }

    pub fn record(
        &mut self,
        action: RecordedAction,
        reasoning: Option<String>,
        result: Option<ToolCallResult>,
    ) -> Result<()> {
        self.ensure_active()?;
        self.history.push(DecisionRecord {
            iteration: self.iteration,
            action,
            reasoning,
            result,
            analysis: None,
            timestamp: Utc::now(),
        });
        self.touch();
        Ok(())
    }

    /// Attach analysis text to the latest record
    pub fn annotate_last(&mut self, analysis: impl Into<String>) -> Result<()> {
        self.ensure_active()?;
        if let Some(last) = self.history.last_mut() {
            last.analysis = Some(analysis.into());
        }
        self.touch();
        Ok(())
    }

    pub fn add_finding(&mut self, finding: Finding) -> Result<()> {
        self.ensure_active()?;
        self.findings.push(finding);
        self.touch();
        Ok(())
    }

    pub fn set_confidence(&mut self, confidence: Confidence) -> Result<()> {
        self.ensure_active()?;
        self.confidence = confidence;
        self.touch();
        Ok(())
    }

    /// Move to a terminal status. Only the first transition takes effect.
    pub fn finish(&mut self, status: SessionStatus) -> Result<()> {
        self.ensure_active()?;
        if !status.is_terminal() {
            return Err(WardenError::Other("cannot finish into Active".into()));
        }
        self.status = status;
        self.touch();
        Ok(())
    }

    /// Elapsed time between creation and last activity
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }
}
