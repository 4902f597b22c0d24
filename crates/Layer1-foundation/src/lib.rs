//! # agentpod-foundation
//!
//! Foundation layer for AgentPod:
//! - Error: error taxonomy shared by every layer
//! - Config: server settings (PodConfig)
//! - Storage: SQLite audit rows for agent executions

pub mod config;
pub mod error;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Resource, Result};

// ============================================================================
// Config
// ============================================================================
pub use config::{
    BrowserConfig, EngineConfig, PodConfig, ServerConfig, StorageConfig, TaskLimits,
    POD_CONFIG_FILE,
};

// ============================================================================
// Storage
// ============================================================================
pub use storage::{AuditStorage, ExecutionRow};
