//! Application State

use std::sync::Arc;

use tokio::sync::Mutex;
use warden_core::{Investigator, ToolExecutor};
use warden_runtime::Registry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// Supervised tool providers
    pub registry: Arc<Registry>,

    /// Executor shared with the investigator, so stats cover every call
    pub executor: Arc<ToolExecutor>,

    pub investigator: Arc<Investigator>,

    /// Held for the duration of an investigation; the pipeline is single-file
    pub investigations: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(registry: Arc<Registry>, investigator: Arc<Investigator>) -> Self {
        Self {
            registry,
            executor: investigator.executor().clone(),
            investigator,
            investigations: Arc::new(Mutex::new(())),
        }
    }
}
