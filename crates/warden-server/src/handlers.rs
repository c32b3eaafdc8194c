//! HTTP Handlers

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use warden_core::executor::{ExecutionStats, ToolUsage};
use warden_core::session::Finding;
use warden_core::tool::ToolDescriptor;
use warden_core::InvestigationReport;
use warden_runtime::ProviderStatus;

use crate::state::AppState;

const POPULAR_TOOLS: usize = 5;

// ============================================================================
// Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub model_connected: bool,
    /// Provider name → process alive
    pub providers: BTreeMap<String, bool>,
}

#[derive(Serialize)]
pub struct ProviderTools {
    pub provider: String,
    pub tools: Vec<ToolDescriptor>,
}

#[derive(Serialize)]
pub struct ToolsResponse {
    pub count: usize,
    pub providers: Vec<ProviderTools>,
    pub status: BTreeMap<String, ProviderStatus>,
}

#[derive(Serialize)]
pub struct StatsResponse {
    #[serde(flatten)]
    pub stats: ExecutionStats,
    pub popular_tools: Vec<ToolUsage>,
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub query: String,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    pub session_id: String,
    pub status: String,
    pub iterations: u32,
    pub confidence: String,
    pub findings: Vec<Finding>,
    pub report: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
}

impl From<InvestigationReport> for AnalyzeResponse {
    fn from(outcome: InvestigationReport) -> Self {
        let session = &outcome.session;
        Self {
            session_id: session.id.to_string(),
            status: session.status().to_string(),
            iterations: session.iteration(),
            confidence: session.confidence().to_string(),
            findings: session.findings().to_vec(),
            report: outcome.report,
            narrative: outcome.narrative,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let model_connected = state
        .investigator
        .llm()
        .health_check()
        .await
        .unwrap_or(false);
    let providers = state.registry.health_check_all().await;
    let healthy = model_connected && providers.values().any(|alive| *alive);

    Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        model_connected,
        providers,
    })
}

/// Tool catalog grouped by provider, with provider status
pub async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let providers: Vec<ProviderTools> = state
        .executor
        .tools_by_provider()
        .await
        .into_iter()
        .map(|(provider, tools)| ProviderTools { provider, tools })
        .collect();
    let count = providers.iter().map(|p| p.tools.len()).sum();

    Json(ToolsResponse {
        count,
        providers,
        status: state.registry.status().await,
    })
}

/// Executor counters
pub async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.executor.stats(),
        popular_tools: state.executor.popular_tools(POPULAR_TOOLS),
    })
}

/// Run one investigation to completion
pub async fn analyze(
    State(state): State<AppState>,
    Json(payload): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, (StatusCode, Json<ErrorResponse>)> {
    let query = payload.query.trim();
    if query.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "query must not be empty".into(),
                code: "EMPTY_QUERY".into(),
            }),
        ));
    }

    let _turn = state.investigations.lock().await;
    tracing::info!(query = %query, "investigation requested");
    let outcome = state.investigator.investigate(query).await;

    Ok(Json(AnalyzeResponse::from(outcome)))
}
