//! Automation engine interface
//!
//! The engine drives a browser session and produces a result. The coordinator only
//! sees it through two seams:
//!
//! - `AutomationEngine::run`, handed a `StepObserver` the engine must call at every
//!   step boundary (that is where pause and cancellation are honored)
//! - `EngineHistory`, a set of optional accessors only the normalizer reads

mod history;
mod remote;
mod scripted;

pub use history::JsonHistory;
pub use remote::RemoteEngine;
pub use scripted::{ScriptedEngine, ScriptedStep};

use crate::settings::TaskSettings;
use agentpod_foundation::{BrowserConfig, Error as FoundationError};
use agentpod_provider::Provider;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Request
// ============================================================================

/// Everything the engine needs for one run
#[derive(Clone)]
pub struct EngineRequest {
    /// Task or execution id, for correlation on the engine side
    pub run_id: String,

    /// Final task text (placeholders already substituted)
    pub task: String,

    pub settings: TaskSettings,

    /// Resolved LLM provider; the engine drives the model
    pub llm: Arc<dyn Provider>,

    pub browser: BrowserConfig,

    /// Per-step budget; the engine enforces it
    pub step_timeout: Duration,
}

impl std::fmt::Debug for EngineRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // settings carry secrets
        f.debug_struct("EngineRequest")
            .field("run_id", &self.run_id)
            .field("task", &self.task)
            .field("llm", &self.llm.model())
            .field("max_agent_steps", &self.settings.max_agent_steps)
            .finish()
    }
}

// ============================================================================
// Step boundaries
// ============================================================================

/// Progress reported by the engine when a step completes
#[derive(Debug, Clone, Default)]
pub struct StepEvent {
    /// 0-based step index
    pub index: usize,
    pub action: Option<String>,
    pub url: Option<String>,
    pub evaluation_previous_goal: Option<String>,
    pub next_goal: Option<String>,
    pub screenshot: Option<String>,
    pub live_url: Option<String>,
}

/// Called by the engine between steps.
///
/// Returning `Err(EngineError::Cancelled)` means the engine must stop at once. The
/// call may block while the task is paused.
#[async_trait]
pub trait StepObserver: Send + Sync {
    async fn on_step(&self, event: StepEvent) -> Result<(), EngineError>;
}

/// Observer that only tracks a cancellation token (no pause support)
pub struct CancelOnlyObserver {
    token: tokio_util::sync::CancellationToken,
}

impl CancelOnlyObserver {
    pub fn new(token: tokio_util::sync::CancellationToken) -> Self {
        Self { token }
    }
}

#[async_trait]
impl StepObserver for CancelOnlyObserver {
    async fn on_step(&self, _event: StepEvent) -> Result<(), EngineError> {
        if self.token.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }
}

// ============================================================================
// Result capability set
// ============================================================================

/// Engine result. Every accessor is optional; `None` means "not reported".
pub trait EngineHistory: Send + Sync {
    fn final_result(&self) -> Option<String> {
        None
    }

    fn urls(&self) -> Option<Vec<String>> {
        None
    }

    fn screenshots(&self) -> Option<Vec<String>> {
        None
    }

    /// Raw per-step actions, as loosely structured JSON
    fn model_actions(&self) -> Option<Vec<Value>> {
        None
    }

    fn action_names(&self) -> Option<Vec<String>> {
        None
    }

    fn errors(&self) -> Option<Vec<String>> {
        None
    }

    fn is_done(&self) -> Option<bool> {
        None
    }

    fn cookies(&self) -> Option<Vec<Value>> {
        None
    }

    fn output_files(&self) -> Option<Vec<String>> {
        None
    }

    fn recordings(&self) -> Option<Vec<String>> {
        None
    }
}

// ============================================================================
// Engine
// ============================================================================

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    #[error("Cancelled")]
    Cancelled,

    #[error("{0}")]
    Fault(String),
}

impl From<EngineError> for FoundationError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Cancelled => FoundationError::Cancelled,
            EngineError::Fault(msg) => FoundationError::EngineFault(msg),
        }
    }
}

/// Automation engine trait - implement to add new automation backends
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Engine name (for logs)
    fn name(&self) -> &'static str;

    /// Drive the task to completion, calling `observer` at every step boundary
    async fn run(
        &self,
        request: EngineRequest,
        observer: &dyn StepObserver,
    ) -> Result<Box<dyn EngineHistory>, EngineError>;
}
