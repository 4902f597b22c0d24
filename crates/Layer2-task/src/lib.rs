//! # agentpod-task
//!
//! Task lifecycle coordinator for AgentPod.
//! Owns the task records, drives the automation engine and exposes the
//! pause / resume / stop state machine.
//!
//! ## Features
//!
//! - In-memory task store behind one coarse lock
//! - Lifecycle controller (pause gate, cancellation)
//! - Execution runner with step-boundary control and guaranteed deregistration
//! - Result normalizer over the engine's optional accessors
//! - Scripted and remote automation engines
//! - **Audited agent executions with versioned configurations**

pub mod audit;
pub mod engine;
pub mod gate;
pub mod lifecycle;
pub mod normalizer;
pub mod runner;
pub mod service;
pub mod settings;
pub mod state;
pub mod store;
pub mod task;

#[cfg(test)]
mod testing;

// Task system
pub use lifecycle::LifecycleController;
pub use runner::ExecutionRunner;
pub use service::{TaskService, TaskServiceConfig, OUTPUT_DOWNLOAD_PREFIX, SHARE_PREFIX};
pub use state::{ExecutionStatus, TaskStatus};
pub use store::{TaskControl, TaskStore};
pub use task::{BrowserData, StepDescriptor, TaskId, TaskPage, TaskRecord, TaskSummary};

// Settings
pub use settings::{MemorySettings, PlannerSettings, ProxyCountryCode, RunTaskRequest, TaskSettings};

// Engines
pub use engine::{
    AutomationEngine, CancelOnlyObserver, EngineError, EngineHistory, EngineRequest, JsonHistory,
    RemoteEngine, ScriptedEngine, ScriptedStep, StepEvent, StepObserver,
};
pub use gate::PauseGate;
pub use normalizer::{normalize, ActionLogEntry, NormalizedResult};

// Audit
pub use audit::{
    Agent, AgentConfigVersion, AgentId, AgentRegistry, AuditSink, ExecutionCoordinator,
    ExecutionId, ExecutionRecord, MemorySink, NewAgentConfig, NewExecution,
};
