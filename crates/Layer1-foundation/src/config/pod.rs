//! Pod Config - server-wide settings
//!
//! Load order: built-in defaults, then the global file
//! (`~/.config/agentpod/agentpod.toml`), then `./agentpod.toml`, then environment
//! variables. Later sources win field by field.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Config file name
pub const POD_CONFIG_FILE: &str = "agentpod.toml";

// ============================================================================
// Pod Config
// ============================================================================

/// AgentPod settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PodConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub tasks: TaskLimits,
    pub browser: BrowserConfig,
    pub engine: EngineConfig,
}

impl PodConfig {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Load
    // ========================================================================

    /// Global file, then project file, then environment
    pub fn load() -> Result<Self> {
        let mut config = Self::new();

        if let Some(global) = Self::global_path() {
            if global.exists() {
                config = Self::load_from(&global)?;
            }
        }

        let project = PathBuf::from(POD_CONFIG_FILE);
        if project.exists() {
            config = config.merged_with_file(&project)?;
        }

        config.apply_env();
        Ok(config)
    }

    /// Load a single file (missing fields take defaults)
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        debug!("Loaded config from {}", path.display());
        Self::from_toml_str(&content)
    }

    /// Parse TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// `~/.config/agentpod/agentpod.toml`
    pub fn global_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("agentpod").join(POD_CONFIG_FILE))
    }

    /// Overlay a second file on top of this config.
    ///
    /// Only keys present in the file override; this is done by merging the TOML
    /// tables before deserializing.
    fn merged_with_file(self, path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let overlay: toml::Table = toml::from_str(&content)?;

        let mut base = match toml::Value::try_from(&self) {
            Ok(toml::Value::Table(table)) => table,
            Ok(_) => return Err(Error::Internal("Config is not a table".to_string())),
            Err(e) => return Err(Error::Config(format!("Failed to serialize config: {}", e))),
        };
        merge_tables(&mut base, overlay);

        toml::Value::Table(base)
            .try_into()
            .map_err(|e: toml::de::Error| Error::Config(e.to_string()))
    }

    // ========================================================================
    // Environment
    // ========================================================================

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup (testable without touching the env)
    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(n) = lookup("MAX_CONCURRENT_TASKS").and_then(|v| v.parse().ok()) {
            self.tasks.max_concurrent = n;
        }
        if let Some(secs) = lookup("TASK_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.tasks.timeout_secs = secs;
        }
        if let Some(headless) = lookup("BROWSER_HEADLESS") {
            self.browser.headless = headless.eq_ignore_ascii_case("true");
        }
        if let Some(ms) = lookup("BROWSER_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.browser.timeout_ms = ms;
        }
        if let Some(url) = lookup("AGENTPOD_ENGINE_URL").filter(|v| !v.is_empty()) {
            self.engine.endpoint = Some(url);
        }
    }

    // ========================================================================
    // Derived
    // ========================================================================

    /// `host:port` for the listener
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Create every storage directory
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [
            self.storage.uploads_dir(),
            self.storage.screenshots_dir(),
            self.storage.recordings_dir(),
            self.storage.outputs_dir(),
        ] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::Storage(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}

fn merge_tables(base: &mut toml::Table, overlay: toml::Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Artifact directories and the audit database
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub audit_db: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
            audit_db: PathBuf::from("storage").join("agentpod.db"),
        }
    }
}

impl StorageConfig {
    pub fn uploads_dir(&self) -> PathBuf {
        self.root.join("uploads")
    }

    pub fn screenshots_dir(&self) -> PathBuf {
        self.root.join("screenshots")
    }

    pub fn recordings_dir(&self) -> PathBuf {
        self.root.join("recordings")
    }

    pub fn outputs_dir(&self) -> PathBuf {
        self.root.join("outputs")
    }
}

/// Limits on interactive tasks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskLimits {
    /// Maximum number of in-flight interactive units
    pub max_concurrent: usize,

    /// Step timeout budget handed to the engine (seconds)
    pub timeout_secs: u64,
}

impl Default for TaskLimits {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            timeout_secs: 3600,
        }
    }
}

/// Browser defaults forwarded to the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub timeout_ms: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            timeout_ms: 30_000,
        }
    }
}

/// Automation engine selection
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Remote automation worker; the scripted engine is used when unset
    pub endpoint: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = PodConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.tasks.max_concurrent, 5);
        assert_eq!(config.tasks.timeout_secs, 3600);
        assert!(config.browser.headless);
        assert!(config.engine.endpoint.is_none());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PodConfig::from_toml_str(
            r#"
            [server]
            port = 9100

            [engine]
            endpoint = "http://worker:7000"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.engine.endpoint.as_deref(), Some("http://worker:7000"));
        assert_eq!(config.tasks.max_concurrent, 5);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "8080"),
            ("MAX_CONCURRENT_TASKS", "2"),
            ("BROWSER_HEADLESS", "False"),
            ("TASK_TIMEOUT", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = PodConfig::default();
        config.apply_env_with(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.tasks.max_concurrent, 2);
        assert!(!config.browser.headless);
        // unparsable values are ignored
        assert_eq!(config.tasks.timeout_secs, 3600);
    }

    #[test]
    fn test_file_overlay_merges_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(POD_CONFIG_FILE);
        std::fs::write(&path, "[tasks]\ntimeout_secs = 60\n").unwrap();

        let mut base = PodConfig::default();
        base.tasks.max_concurrent = 9;

        let merged = base.merged_with_file(&path).unwrap();
        assert_eq!(merged.tasks.timeout_secs, 60);
        assert_eq!(merged.tasks.max_concurrent, 9);
    }

    #[test]
    fn test_ensure_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PodConfig::default();
        config.storage.root = dir.path().join("storage");

        config.ensure_dirs().unwrap();
        assert!(config.storage.outputs_dir().is_dir());
        assert!(config.storage.screenshots_dir().is_dir());
    }
}
