//! Execution audit
//!
//! Configured agents with versioned configurations, and audited executions that
//! record every status change to a persistent sink.

mod coordinator;
mod record;
mod registry;
mod sink;

pub use coordinator::{substitute, ExecutionCoordinator};
pub use record::{ExecutionId, ExecutionRecord, NewExecution};
pub use registry::{Agent, AgentConfigVersion, AgentId, AgentRegistry, NewAgentConfig};
pub use sink::{AuditSink, MemorySink};
