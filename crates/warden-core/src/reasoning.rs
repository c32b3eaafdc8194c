//! Decision Loop
//!
//! Drives one bounded investigation:
//!
//! ```text
//! Init → Deciding ⇄ { ToolCall, Analyzing } → { Completed, Aborted }
//! ```
//!
//! Each Deciding entry consumes one iteration. In single-phase mode a tool
//! result goes straight back to Deciding; in two-phase mode the model first
//! analyzes the result and routes to Deciding or Completed. The terminal
//! state renders a report from whatever the session gathered.

use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::decision::{Analysis, Decision, DecisionAction, NextAction};
use crate::error::{Result, WardenError};
use crate::executor::ToolExecutor;
use crate::extract::DecisionExtractor;
use crate::message::Message;
use crate::prompts;
use crate::provider::{GenerationOptions, LlmProvider};
use crate::report;
use crate::session::{AnalysisSession, RecordedAction, SessionStatus};
use crate::tool::ToolCall;

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

const ACTION_KEY: &str = "action";
const ANALYSIS_KEY: &str = "analysis";

const UNPARSABLE_ANALYSIS: &str = "Could not parse analysis response";

/// Whether tool output is analyzed by the model before the next decision
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoopMode {
    #[default]
    SinglePhase,
    TwoPhase,
}

impl FromStr for LoopMode {
    type Err = WardenError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "single" | "single-phase" => Ok(Self::SinglePhase),
            "two-phase" | "two_phase" | "twophase" => Ok(Self::TwoPhase),
            other => Err(WardenError::Config(format!(
                "unknown loop mode '{other}' (expected 'single' or 'two-phase')"
            ))),
        }
    }
}

/// Investigator configuration
#[derive(Clone, Debug)]
pub struct LoopConfig {
    /// Upper bound on Deciding entries per session
    pub max_iterations: u32,

    pub mode: LoopMode,

    /// Options for decision requests
    pub generation: GenerationOptions,

    /// Temperature for analysis requests
    pub analysis_temperature: f32,

    /// Legacy safety net: analysis text containing this ends the session
    pub completion_marker: Option<String>,

    /// Ask the model for a prose report after the loop ends
    pub narrative_report: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            mode: LoopMode::default(),
            generation: GenerationOptions::default(),
            analysis_temperature: 0.2,
            completion_marker: None,
            narrative_report: false,
        }
    }
}

#[derive(Debug)]
enum LoopState {
    Init,
    Deciding { hint: Option<String> },
    ToolCall { call: ToolCall, reasoning: Option<String> },
    Analyzing,
    Done(SessionStatus),
}

/// Terminal output of an investigation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InvestigationReport {
    pub session: AnalysisSession,
    pub report: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

/// The autonomous investigator
pub struct Investigator {
    llm: Arc<dyn LlmProvider>,
    executor: Arc<ToolExecutor>,
    decisions: DecisionExtractor,
    analyses: DecisionExtractor,
    config: LoopConfig,
}

impl Investigator {
    pub fn new(llm: Arc<dyn LlmProvider>, executor: Arc<ToolExecutor>, config: LoopConfig) -> Self {
        Self {
            llm,
            executor,
            decisions: DecisionExtractor::new([ACTION_KEY]),
            analyses: DecisionExtractor::new([ANALYSIS_KEY]),
            config,
        }
    }

    pub fn builder() -> InvestigatorBuilder {
        InvestigatorBuilder::new()
    }

    pub fn executor(&self) -> &Arc<ToolExecutor> {
        &self.executor
    }

    pub fn llm(&self) -> &Arc<dyn LlmProvider> {
        &self.llm
    }

    pub const fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Run one investigation to a terminal state. Failures end the session
    /// early with a degraded report instead of an error.
    pub async fn investigate(&self, query: &str) -> InvestigationReport {
        let mut session = AnalysisSession::new(query, self.config.max_iterations);
        tracing::info!(session = %session.id, mode = ?self.config.mode, "starting investigation");

        let mut state = LoopState::Init;
        let status = loop {
            state = match state {
                LoopState::Init => LoopState::Deciding { hint: None },
                LoopState::Deciding { hint } => {
                    settle(self.decide(&mut session, hint.as_deref()).await)
                }
                LoopState::ToolCall { call, reasoning } => {
                    settle(self.act(&mut session, call, reasoning).await)
                }
                LoopState::Analyzing => settle(self.analyze(&mut session).await),
                LoopState::Done(status) => break status,
            };
        };

        if let SessionStatus::Aborted { reason } = &status {
            tracing::warn!(session = %session.id, reason = %reason, "investigation aborted");
        }
        if let Err(err) = session.finish(status) {
            tracing::error!(error = %err, "session already finished");
        }
        tracing::info!(
            session = %session.id,
            iterations = session.iteration(),
            status = %session.status(),
            "investigation finished"
        );

        let narrative = if self.config.narrative_report {
            self.narrate(&session).await
        } else {
            None
        };

        InvestigationReport {
            report: report::render(&session, narrative.as_deref()),
            narrative,
            session,
        }
    }

    async fn decide(&self, session: &mut AnalysisSession, hint: Option<&str>) -> Result<LoopState> {
        if !session.has_iterations_left() {
            return Ok(LoopState::Done(SessionStatus::IterationLimit));
        }
        let iteration = session.begin_iteration()?;
        tracing::debug!(iteration, "deciding");

        let tools = self.executor.available_tools().await;
        let messages = [
            Message::system(prompts::decision_system(Utc::now())),
            Message::user(prompts::decision_prompt(session, &tools, hint)),
        ];

        let reply = match self.llm.complete(&messages, &self.config.generation).await {
            Ok(completion) => completion.content,
            Err(err) => {
                return Ok(aborted(format!("model request failed: {err}")));
            }
        };

        let Some(object) = self.decisions.extract(&reply) else {
            tracing::warn!(iteration, "no decision object in model reply");
            return Ok(aborted("could not parse a decision from the model reply".into()));
        };
        let decision = match Decision::from_object(&object) {
            Ok(decision) => decision,
            Err(err) => return Ok(aborted(err.to_string())),
        };

        match decision.action {
            DecisionAction::Complete => {
                session.record(RecordedAction::Complete, decision.reasoning, None)?;
                Ok(LoopState::Done(SessionStatus::Completed))
            }
            DecisionAction::UseTool(call) => Ok(LoopState::ToolCall {
                call,
                reasoning: decision.reasoning,
            }),
            DecisionAction::Other { action, arguments } => {
                if tools.iter().any(|t| t.name == action) {
                    return Ok(LoopState::ToolCall {
                        call: ToolCall::new(action, arguments),
                        reasoning: decision.reasoning,
                    });
                }
                tracing::warn!(iteration, action = %action, "unrecognized decision action");
                session.record(
                    RecordedAction::Unrecognized { action },
                    decision.reasoning,
                    None,
                )?;
                Ok(LoopState::Deciding { hint: None })
            }
        }
    }

    async fn act(
        &self,
        session: &mut AnalysisSession,
        call: ToolCall,
        reasoning: Option<String>,
    ) -> Result<LoopState> {
        let result = self.executor.execute_call(&call).await;
        session.record(
            RecordedAction::ToolCall {
                tool: call.name,
                arguments: call.arguments,
            },
            reasoning,
            Some(result),
        )?;

        Ok(match self.config.mode {
            LoopMode::SinglePhase => LoopState::Deciding { hint: None },
            LoopMode::TwoPhase => LoopState::Analyzing,
        })
    }

    async fn analyze(&self, session: &mut AnalysisSession) -> Result<LoopState> {
        let Some(latest) = session.last_result().cloned() else {
            return Ok(LoopState::Deciding { hint: None });
        };

        let messages = [
            Message::system(prompts::analysis_system(Utc::now())),
            Message::user(prompts::analysis_prompt(session, &latest)),
        ];
        let options = self
            .config
            .generation
            .clone()
            .with_temperature(self.config.analysis_temperature);

        let analysis = match self.llm.complete(&messages, &options).await {
            Ok(completion) => self
                .analyses
                .extract(&completion.content)
                .map(|object| Analysis::from_object(&object)),
            Err(err) => {
                tracing::warn!(error = %err, "analysis request failed");
                None
            }
        };

        let Some(analysis) = analysis else {
            session.annotate_last(UNPARSABLE_ANALYSIS)?;
            return Ok(LoopState::Done(SessionStatus::Completed));
        };

        session.annotate_last(analysis.analysis.as_str())?;
        for finding in analysis.findings {
            session.add_finding(finding)?;
        }
        session.set_confidence(analysis.confidence)?;

        if let Some(marker) = &self.config.completion_marker {
            if analysis
                .analysis
                .to_lowercase()
                .contains(&marker.to_lowercase())
            {
                tracing::debug!(marker = %marker, "completion marker found in analysis");
                return Ok(LoopState::Done(SessionStatus::Completed));
            }
        }

        Ok(match analysis.next_action {
            NextAction::Complete => LoopState::Done(SessionStatus::Completed),
            NextAction::Continue { hint } => {
                let mut task = format!("Continue investigation with {hint}");
                if let Some(reasoning) = &analysis.reasoning {
                    task.push_str(": ");
                    task.push_str(reasoning);
                }
                if let Some(parameters) = &analysis.next_parameters {
                    task.push_str(&format!(
                        " (suggested arguments: {})",
                        serde_json::Value::Object(parameters.clone())
                    ));
                }
                LoopState::Deciding { hint: Some(task) }
            }
        })
    }

    async fn narrate(&self, session: &AnalysisSession) -> Option<String> {
        let messages = [
            Message::system(prompts::decision_system(Utc::now())),
            Message::user(prompts::narrative_prompt(session)),
        ];
        match self.llm.complete(&messages, &self.config.generation).await {
            Ok(completion) => Some(completion.content),
            Err(err) => {
                tracing::warn!(error = %err, "narrative report request failed");
                None
            }
        }
    }
}

const fn aborted(reason: String) -> LoopState {
    LoopState::Done(SessionStatus::Aborted { reason })
}

/// A session error inside a transition ends the investigation
fn settle(result: Result<LoopState>) -> LoopState {
    result.unwrap_or_else(|err| aborted(err.to_string()))
}

/// Builder for [`Investigator`]
pub struct InvestigatorBuilder {
    llm: Option<Arc<dyn LlmProvider>>,
    executor: Option<Arc<ToolExecutor>>,
    config: LoopConfig,
}

impl Default for InvestigatorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl InvestigatorBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            executor: None,
            config: LoopConfig::default(),
        }
    }

    pub fn llm(mut self, llm: Arc<dyn LlmProvider>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn executor(mut self, executor: Arc<ToolExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.generation.model = model.into();
        self
    }

    pub const fn max_iterations(mut self, max: u32) -> Self {
        self.config.max_iterations = max;
        self
    }

    pub const fn mode(mut self, mode: LoopMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn completion_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.completion_marker = Some(marker.into());
        self
    }

    pub const fn narrative_report(mut self, enabled: bool) -> Self {
        self.config.narrative_report = enabled;
        self
    }

    pub fn build(self) -> Result<Investigator> {
        let llm = self
            .llm
            .ok_or_else(|| WardenError::Config("language model provider is required".into()))?;
        let executor = self
            .executor
            .ok_or_else(|| WardenError::Config("tool executor is required".into()))?;
        if self.config.max_iterations == 0 {
            return Err(WardenError::Config("max_iterations must be at least 1".into()));
        }
        if self
            .config
            .completion_marker
            .as_deref()
            .is_some_and(|m| m.trim().is_empty())
        {
            return Err(WardenError::Config("completion marker must not be empty".into()));
        }

        Ok(Investigator::new(llm, executor, self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{Confidence, Severity};
    use crate::testing::{FakeBackend, ScriptedLlm, text_result};

    const USE_REPUTATION: &str = r#"Checking the address first.
```json
{"action": "use_tool", "reasoning": "reputation", "tool_name": "check_ip_reputation", "arguments": {"ip": "45.9.148.3"}}
```"#;

    fn reputation_backend() -> Arc<FakeBackend> {
        Arc::new(FakeBackend::new(|_, _| {
            text_result(r#"{"ip": "45.9.148.3", "abuseConfidenceScore": 100, "threat_level": "HIGH"}"#)
        }))
    }

    fn investigator(llm: ScriptedLlm, backend: Arc<FakeBackend>, mode: LoopMode, max: u32) -> Investigator {
        Investigator::builder()
            .llm(Arc::new(llm))
            .executor(Arc::new(ToolExecutor::new(backend)))
            .mode(mode)
            .max_iterations(max)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_never_completing_model_stops_at_cap() {
        let backend = reputation_backend();
        let inv = investigator(
            ScriptedLlm::repeating(USE_REPUTATION),
            backend.clone(),
            LoopMode::SinglePhase,
            3,
        );

        let out = inv.investigate("Is 45.9.148.3 malicious?").await;

        assert_eq!(out.session.status(), &SessionStatus::IterationLimit);
        assert_eq!(out.session.iteration(), 3);
        assert_eq!(out.session.history().len(), 3);
        assert_eq!(backend.calls(), 3);
        assert!(out.report.contains("Total Iterations: 3"));
        assert!(out.report.contains("Max iterations reached"));
    }

    #[tokio::test]
    async fn test_single_phase_completes_on_decision() {
        let llm = ScriptedLlm::new([
            USE_REPUTATION,
            r#"{"action": "complete", "reasoning": "enough data"}"#,
        ]);
        let inv = investigator(llm, reputation_backend(), LoopMode::SinglePhase, 5);

        let out = inv.investigate("Check 45.9.148.3").await;

        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert_eq!(out.session.iteration(), 2);
        let first = &out.session.history()[0];
        assert!(first.result.as_ref().unwrap().is_success());
        assert_eq!(out.session.history()[1].action, RecordedAction::Complete);
    }

    #[tokio::test]
    async fn test_quoted_analysis_object_does_not_shadow_decision() {
        let llm = ScriptedLlm::new([
            "Last round's analysis was {\"analysis\": \"scanner seen\", \"next_action\": \"search_ioc\"}. So:\n{\"action\": \"use_tool\", \"tool_name\": \"search_ioc\", \"arguments\": {}}",
            r#"{"action": "complete", "reasoning": "done"}"#,
        ]);
        let backend = reputation_backend();
        let inv = investigator(llm, backend.clone(), LoopMode::SinglePhase, 5);

        let out = inv.investigate("Check 45.9.148.3").await;

        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert_eq!(backend.calls(), 1);
        assert_eq!(out.session.history().len(), 2);
        assert!(out.session.history()[0].result.is_some());
    }

    #[tokio::test]
    async fn test_second_decision_prompt_sees_tool_result() {
        let llm = Arc::new(ScriptedLlm::new([
            USE_REPUTATION,
            r#"{"action": "complete"}"#,
        ]));
        let inv = Investigator::builder()
            .llm(llm.clone())
            .executor(Arc::new(ToolExecutor::new(reputation_backend())))
            .build()
            .unwrap();

        inv.investigate("Check 45.9.148.3").await;

        let second = llm.prompt(1);
        assert!(second[1].content.contains("PREVIOUS TOOL RESULTS"));
        assert!(second[1].content.contains("abuseConfidenceScore"));
        assert!(second[1].content.contains("CURRENT ITERATION: 2/5"));
    }

    #[tokio::test]
    async fn test_unparsable_decision_aborts_with_history() {
        let llm = ScriptedLlm::new([USE_REPUTATION, "I am not sure what to do."]);
        let inv = investigator(llm, reputation_backend(), LoopMode::SinglePhase, 5);

        let out = inv.investigate("q").await;

        assert!(matches!(out.session.status(), SessionStatus::Aborted { .. }));
        assert_eq!(out.session.history().len(), 1);
        assert!(out.report.contains("--- ITERATION 1 ---"));
        assert!(out.report.contains("Aborted"));
    }

    #[tokio::test]
    async fn test_model_failure_aborts() {
        let llm = ScriptedLlm::new(Vec::<String>::new()).then_fail("connection refused");
        let inv = investigator(llm, reputation_backend(), LoopMode::SinglePhase, 5);

        let out = inv.investigate("q").await;
        match out.session.status() {
            SessionStatus::Aborted { reason } => assert!(reason.contains("connection refused")),
            other => panic!("unexpected status {other:?}"),
        }
        assert_eq!(out.session.iteration(), 1);
    }

    #[tokio::test]
    async fn test_tool_failure_is_recorded_and_loop_continues() {
        let llm = ScriptedLlm::new([
            r#"{"action": "use_tool", "tool_name": "check_ip_reputation", "arguments": {}}"#,
            r#"{"action": "use_tool", "tool_name": "whois", "arguments": {}}"#,
            r#"{"action": "complete"}"#,
        ]);
        let backend = reputation_backend();
        let inv = investigator(llm, backend.clone(), LoopMode::SinglePhase, 5);

        let out = inv.investigate("q").await;

        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert_eq!(backend.calls(), 0);
        let history = out.session.history();
        assert!(!history[0].result.as_ref().unwrap().is_success());
        assert!(!history[1].result.as_ref().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_unknown_action_is_a_noop_cycle() {
        let llm = ScriptedLlm::new([
            r#"{"action": "dance"}"#,
            r#"{"action": "search_ioc", "parameters": {"ioc": "evil.example"}}"#,
            r#"{"action": "complete"}"#,
        ]);
        let backend = reputation_backend();
        let inv = investigator(llm, backend.clone(), LoopMode::SinglePhase, 5);

        let out = inv.investigate("q").await;

        let history = out.session.history();
        assert_eq!(
            history[0].action,
            RecordedAction::Unrecognized {
                action: "dance".into()
            }
        );
        assert!(matches!(
            &history[1].action,
            RecordedAction::ToolCall { tool, .. } if tool == "search_ioc"
        ));
        assert_eq!(backend.calls(), 1);
        assert_eq!(out.session.iteration(), 3);
    }

    #[tokio::test]
    async fn test_two_phase_collects_findings_and_routes() {
        let llm = ScriptedLlm::new([
            USE_REPUTATION,
            r#"{"analysis": "Address is a known scanner", "findings": [{"finding": "100% abuse score", "severity": "High"}, "Listed since 2023"], "next_action": "search_ioc", "confidence": "Medium", "reasoning": "cross-check"}"#,
            r#"{"action": "use_tool", "tool_name": "search_ioc", "arguments": {}}"#,
            r#"{"analysis": "Confirmed by ThreatFox", "findings": [], "next_action": "complete", "confidence": "High"}"#,
        ]);
        let inv = investigator(llm, reputation_backend(), LoopMode::TwoPhase, 5);

        let out = inv.investigate("Investigate 45.9.148.3").await;

        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert_eq!(out.session.iteration(), 2);
        let findings = out.session.findings();
        assert_eq!(findings.len(), 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert_eq!(findings[1].severity, Severity::Medium);
        assert_eq!(out.session.confidence(), Confidence::High);
        assert_eq!(
            out.session.history()[0].analysis.as_deref(),
            Some("Address is a known scanner")
        );
        assert!(out.report.contains("1. [High] 100% abuse score"));
    }

    #[tokio::test]
    async fn test_two_phase_hint_reaches_next_decision() {
        let llm = Arc::new(ScriptedLlm::new([
            USE_REPUTATION,
            r#"{"analysis": "suspicious", "next_action": "search_ioc", "reasoning": "cross-check feeds"}"#,
            r#"{"action": "complete"}"#,
        ]));
        let inv = Investigator::builder()
            .llm(llm.clone())
            .executor(Arc::new(ToolExecutor::new(reputation_backend())))
            .mode(LoopMode::TwoPhase)
            .build()
            .unwrap();

        inv.investigate("q").await;

        assert_eq!(llm.requests(), 3);
        assert!(
            llm.prompt(2)[1]
                .content
                .contains("CURRENT TASK: Continue investigation with search_ioc: cross-check feeds")
        );
    }

    #[tokio::test]
    async fn test_unparsable_analysis_completes() {
        let llm = ScriptedLlm::new([USE_REPUTATION, "the output looks fine"]);
        let inv = investigator(llm, reputation_backend(), LoopMode::TwoPhase, 5);

        let out = inv.investigate("q").await;

        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert_eq!(
            out.session.history()[0].analysis.as_deref(),
            Some("Could not parse analysis response")
        );
    }

    #[tokio::test]
    async fn test_completion_word_ignored_without_marker() {
        let analysis = r#"{"analysis": "scan is complete but more to check", "next_action": "search_ioc"}"#;
        let llm = ScriptedLlm::new([USE_REPUTATION, analysis, r#"{"action": "complete"}"#]);
        let inv = investigator(llm, reputation_backend(), LoopMode::TwoPhase, 5);

        let out = inv.investigate("q").await;
        assert_eq!(out.session.iteration(), 2);
    }

    #[tokio::test]
    async fn test_opt_in_completion_marker() {
        let analysis = r#"{"analysis": "Investigation COMPLETE", "next_action": "search_ioc"}"#;
        let llm = ScriptedLlm::new([USE_REPUTATION, analysis]);
        let inv = Investigator::builder()
            .llm(Arc::new(llm))
            .executor(Arc::new(ToolExecutor::new(reputation_backend())))
            .mode(LoopMode::TwoPhase)
            .completion_marker("complete")
            .build()
            .unwrap();

        let out = inv.investigate("q").await;
        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert_eq!(out.session.iteration(), 1);
    }

    #[tokio::test]
    async fn test_narrative_failure_keeps_terminal_state() {
        let llm = ScriptedLlm::new([r#"{"action": "complete"}"#]).then_fail("timeout");
        let inv = Investigator::builder()
            .llm(Arc::new(llm))
            .executor(Arc::new(ToolExecutor::new(reputation_backend())))
            .narrative_report(true)
            .build()
            .unwrap();

        let out = inv.investigate("q").await;
        assert_eq!(out.session.status(), &SessionStatus::Completed);
        assert!(out.narrative.is_none());
    }

    #[tokio::test]
    async fn test_narrative_is_appended() {
        let llm = ScriptedLlm::new([r#"{"action": "complete"}"#, "Executive Summary: benign."]);
        let inv = Investigator::builder()
            .llm(Arc::new(llm))
            .executor(Arc::new(ToolExecutor::new(reputation_backend())))
            .narrative_report(true)
            .build()
            .unwrap();

        let out = inv.investigate("q").await;
        assert_eq!(out.narrative.as_deref(), Some("Executive Summary: benign."));
        assert!(out.report.contains("NARRATIVE REPORT"));
    }

    #[test]
    fn test_builder_validation() {
        assert!(Investigator::builder().build().is_err());
        let err = Investigator::builder()
            .llm(Arc::new(ScriptedLlm::new(Vec::<String>::new())))
            .executor(Arc::new(ToolExecutor::new(reputation_backend())))
            .max_iterations(0)
            .build();
        assert!(matches!(err, Err(WardenError::Config(_))));
    }

    #[test]
    fn test_loop_mode_parsing() {
        assert_eq!("single".parse::<LoopMode>().unwrap(), LoopMode::SinglePhase);
        assert_eq!("Two-Phase".parse::<LoopMode>().unwrap(), LoopMode::TwoPhase);
        assert!("both".parse::<LoopMode>().is_err());
    }
}
