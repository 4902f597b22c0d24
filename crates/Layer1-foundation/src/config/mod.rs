//! Config - AgentPod server settings
//!
//! - `pod.rs` - PodConfig (server, storage, task limits, browser, engine)

mod pod;

pub use pod::{
    BrowserConfig, EngineConfig, PodConfig, ServerConfig, StorageConfig, TaskLimits,
    POD_CONFIG_FILE,
};
