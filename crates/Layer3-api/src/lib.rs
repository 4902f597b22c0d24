//! # agentpod-api
//!
//! HTTP surface for AgentPod, built on axum.
//!
//! - `/api/v1` task lifecycle: run, stop, pause, resume, reads and listing
//! - `/api/v1/agents` and `/api/v1/executions` for audited agent runs
//! - `/health`

pub mod error;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::{app, router};
pub use state::ApiState;
