//! # warden-core
//!
//! Investigation loop, tool execution and decision extraction for the Warden,
//! an autonomous SOC analyst driving out-of-process tool providers.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Investigator                           │
//! │  ┌──────────────┐  ┌──────────────┐  ┌─────────────────────┐  │
//! │  │ Decision     │  │ ToolExecutor │  │   LlmProvider       │  │
//! │  │ Loop         │──│  (gates)     │  │   (Strategy)        │  │
//! │  └──────┬───────┘  └──────┬───────┘  └─────────────────────┘  │
//! │         │ DecisionExtractor│ ToolBackend (Strategy)           │
//! └─────────┴──────────────────┴──────────────────────────────────┘
//! ```
//!
//! No process or network code lives here: the `ToolBackend` and `LlmProvider`
//! seams are implemented by `warden-runtime`.

pub mod decision;
pub mod error;
pub mod executor;
pub mod extract;
pub mod message;
pub mod prompts;
pub mod provider;
pub mod reasoning;
pub mod report;
pub mod rpc;
pub mod session;
pub mod tool;

#[cfg(test)]
pub(crate) mod testing;

pub use decision::{Analysis, Decision, DecisionAction, NextAction};
pub use error::{Result, TransportError, WardenError};
pub use executor::{ExecutionStats, ToolExecutor, ToolUsage};
pub use extract::DecisionExtractor;
pub use message::{Message, Role};
pub use provider::{Completion, GenerationOptions, LlmProvider};
pub use reasoning::{InvestigationReport, Investigator, InvestigatorBuilder, LoopConfig, LoopMode};
pub use session::{AnalysisSession, Confidence, Finding, SessionStatus, Severity};
pub use tool::{ToolBackend, ToolCall, ToolCallResult, ToolDescriptor, ToolOutcome};
