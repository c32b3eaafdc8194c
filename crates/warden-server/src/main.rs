//! Warden command line and HTTP server
//!
//! Starts the configured tool providers, then either runs a single
//! investigation, lists the discovered tools, or serves the HTTP API.
//! Providers are always stopped before exit.

mod handlers;
mod state;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use axum::{
    Router,
    routing::{get, post},
};
use clap::{Parser, Subcommand};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warden_core::{
    Investigator, LlmProvider, LoopMode, ToolExecutor, provider::DEFAULT_MODEL,
    reasoning::DEFAULT_MAX_ITERATIONS,
};
use warden_runtime::{OllamaProvider, Registry, WardenConfig, config::DEFAULT_CONFIG_PATH};

use crate::handlers::{analyze, health_check, list_tools, stats};
use crate::state::AppState;

#[derive(Parser, Debug)]
#[command(name = "warden", version, about = "Autonomous SOC analyst over JSON-RPC tool providers")]
struct Cli {
    /// Provider configuration file
    #[arg(long, env = "WARDEN_CONFIG", default_value = DEFAULT_CONFIG_PATH, global = true)]
    config: PathBuf,

    /// Ollama model used for decisions and analysis
    #[arg(long, env = "WARDEN_MODEL", default_value = DEFAULT_MODEL, global = true)]
    model: String,

    /// Upper bound on decision cycles per investigation
    #[arg(long, env = "WARDEN_MAX_ITERATIONS", default_value_t = DEFAULT_MAX_ITERATIONS, global = true)]
    max_iterations: u32,

    /// `single` or `two-phase`
    #[arg(long, env = "WARDEN_MODE", default_value = "single", global = true)]
    mode: LoopMode,

    /// Ask the model for a prose report at the end of each investigation
    #[arg(long, global = true)]
    narrative: bool,

    /// End the session when analysis text contains this marker
    #[arg(long, global = true)]
    completion_marker: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one investigation and print the report
    Analyze {
        /// Investigation request
        #[arg(required = true, trailing_var_arg = true)]
        query: Vec<String>,

        /// Print the full session as JSON instead of the text report
        #[arg(long)]
        json: bool,
    },

    /// List tools advertised by connected providers
    Tools,

    /// Serve the HTTP API
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0:3000")]
        bind: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment before parsing so `.env` values feed clap's env fallbacks
    dotenvy::dotenv().ok();

    // Logs go to stderr; stdout carries reports
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = WardenConfig::load(&cli.config)
        .with_context(|| format!("loading provider configuration from {}", cli.config.display()))?;
    let registry = Arc::new(Registry::from_config(config));

    if !registry.start_all().await {
        registry.stop_all().await;
        bail!("no tool providers could be started");
    }

    let outcome = run(&cli, registry.clone()).await;
    registry.stop_all().await;
    outcome
}

async fn run(cli: &Cli, registry: Arc<Registry>) -> anyhow::Result<()> {
    let executor = Arc::new(ToolExecutor::new(registry.clone()));

    if matches!(cli.command, Command::Tools) {
        print_tools(&executor).await;
        return Ok(());
    }

    let investigator = Arc::new(build_investigator(cli, executor).await?);

    match &cli.command {
        Command::Analyze { query, json } => {
            let outcome = investigator.investigate(&query.join(" ")).await;
            if *json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                println!("{}", outcome.report);
            }
            Ok(())
        }
        Command::Serve { bind } => serve(AppState::new(registry, investigator), bind).await,
        Command::Tools => Ok(()),
    }
}

async fn build_investigator(cli: &Cli, executor: Arc<ToolExecutor>) -> anyhow::Result<Investigator> {
    let llm = Arc::new(OllamaProvider::from_env()?);

    match llm.health_check().await {
        Ok(true) => tracing::info!(model = %cli.model, "connected to Ollama"),
        Ok(false) | Err(_) => {
            tracing::warn!("Ollama not available; decisions will fail until `ollama serve` is running");
        }
    }

    let mut builder = Investigator::builder()
        .llm(llm)
        .executor(executor)
        .model(&cli.model)
        .max_iterations(cli.max_iterations)
        .mode(cli.mode)
        .narrative_report(cli.narrative);
    if let Some(marker) = &cli.completion_marker {
        builder = builder.completion_marker(marker);
    }
    Ok(builder.build()?)
}

async fn print_tools(executor: &ToolExecutor) {
    let groups = executor.tools_by_provider().await;
    let total: usize = groups.iter().map(|(_, tools)| tools.len()).sum();
    println!("{total} tools available");
    for (provider, tools) in groups {
        println!("\n{provider}:");
        for tool in tools {
            println!("  - {}: {}", tool.name, tool.description);
        }
    }
}

async fn serve(state: AppState, bind: &str) -> anyhow::Result<()> {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/api/tools", get(list_tools))
        .route("/api/stats", get(stats))
        .route("/api/analyze", post(analyze))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("binding {bind}"))?;

    tracing::info!(addr = %bind, "warden server listening");
    tracing::info!("  GET  /health       - model and provider health");
    tracing::info!("  GET  /api/tools    - tool catalog");
    tracing::info!("  GET  /api/stats    - execution statistics");
    tracing::info!("  POST /api/analyze  - run an investigation");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown requested");
        })
        .await?;

    Ok(())
}
