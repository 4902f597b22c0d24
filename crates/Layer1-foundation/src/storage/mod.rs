//! Storage module for AgentPod
//!
//! - `db`: SQLite - execution audit rows

mod db;

pub use db::{AuditStorage, ExecutionRow};
