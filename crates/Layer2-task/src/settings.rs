//! Task settings
//!
//! Every recognized field is enumerated with its default. Settings are validated
//! before a record is created, so a bad request never leaves a task behind.

use agentpod_foundation::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

// ============================================================================
// Enumerations
// ============================================================================

/// Country for the residential proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyCountryCode {
    #[default]
    Us,
    Uk,
    Fr,
    It,
    Jp,
    Au,
    De,
    Fi,
    Ca,
    In,
}

/// Agent memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    pub enabled: bool,
    /// Steps between memory summaries
    pub interval: u32,
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: 10,
        }
    }
}

/// Planner model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerSettings {
    /// No planner when unset
    pub model: Option<String>,
    /// Steps between planner calls
    pub interval: u32,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            model: None,
            interval: 1,
        }
    }
}

// ============================================================================
// TaskSettings
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSettings {
    /// Values the agent may type but that are never logged
    pub secrets: BTreeMap<String, String>,

    /// `None` means unrestricted
    pub allowed_domains: Option<Vec<String>>,

    /// Keep cookies from the browser session
    pub save_browser_data: bool,

    /// JSON schema for structured output
    pub structured_output_json: Option<String>,

    /// `None` selects the default model
    pub llm_model: Option<String>,

    /// Credentials, temperature, max tokens, base URL
    pub llm_config: Map<String, Value>,

    pub use_adblock: bool,
    pub use_proxy: bool,
    pub proxy_country_code: ProxyCountryCode,
    pub highlight_elements: bool,

    /// Previously uploaded files made available to the agent
    pub included_file_names: Vec<String>,

    pub browser_viewport_width: u32,
    pub browser_viewport_height: u32,

    /// Step ceiling enforced by the engine
    pub max_agent_steps: u32,

    pub enable_public_share: bool,
    pub use_vision: bool,
    pub memory: MemorySettings,
    pub planner: PlannerSettings,
}

impl Default for TaskSettings {
    fn default() -> Self {
        Self {
            secrets: BTreeMap::new(),
            allowed_domains: None,
            save_browser_data: false,
            structured_output_json: None,
            llm_model: None,
            llm_config: Map::new(),
            use_adblock: true,
            use_proxy: true,
            proxy_country_code: ProxyCountryCode::default(),
            highlight_elements: true,
            included_file_names: Vec::new(),
            browser_viewport_width: 1280,
            browser_viewport_height: 960,
            max_agent_steps: 75,
            enable_public_share: false,
            use_vision: true,
            memory: MemorySettings::default(),
            planner: PlannerSettings::default(),
        }
    }
}

impl TaskSettings {
    /// Reject settings the engine could not honor
    pub fn validate(&self) -> Result<()> {
        if self.browser_viewport_width == 0 || self.browser_viewport_height == 0 {
            return Err(Error::Config(format!(
                "viewport must be non-zero, got {}x{}",
                self.browser_viewport_width, self.browser_viewport_height
            )));
        }
        if self.max_agent_steps == 0 {
            return Err(Error::Config("max_agent_steps must be at least 1".to_string()));
        }
        if self.memory.interval == 0 || self.planner.interval == 0 {
            return Err(Error::Config("memory and planner intervals must be at least 1".to_string()));
        }
        if let Some(schema) = &self.structured_output_json {
            serde_json::from_str::<Value>(schema)
                .map_err(|e| Error::Config(format!("structured_output_json is not valid JSON: {}", e)))?;
        }
        Ok(())
    }

    /// Build from loosely typed maps (agent configuration versions); later maps win
    pub fn from_maps<'a>(maps: impl IntoIterator<Item = &'a Map<String, Value>>) -> Result<Self> {
        let mut merged = Map::new();
        for map in maps {
            merged.extend(map.iter().map(|(k, v)| (k.clone(), v.clone())));
        }
        serde_json::from_value(Value::Object(merged))
            .map_err(|e| Error::Config(format!("invalid agent settings: {}", e)))
    }
}

/// Request to create an interactive task
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTaskRequest {
    /// What the agent should do
    pub task: String,

    #[serde(flatten)]
    pub settings: TaskSettings,
}

impl RunTaskRequest {
    pub fn new(task: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            settings: TaskSettings::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let settings = TaskSettings::default();
        assert_eq!(settings.browser_viewport_width, 1280);
        assert_eq!(settings.browser_viewport_height, 960);
        assert_eq!(settings.max_agent_steps, 75);
        assert_eq!(settings.proxy_country_code, ProxyCountryCode::Us);
        assert!(settings.use_vision && settings.use_adblock && settings.use_proxy);
        assert!(!settings.enable_public_share);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_request_fields_are_flat() {
        let request: RunTaskRequest = serde_json::from_value(json!({
            "task": "find cheap flights",
            "max_agent_steps": 10,
            "proxy_country_code": "in",
            "llm_model": "claude-sonnet-4-20250514"
        }))
        .unwrap();

        assert_eq!(request.task, "find cheap flights");
        assert_eq!(request.settings.max_agent_steps, 10);
        assert_eq!(request.settings.proxy_country_code, ProxyCountryCode::In);
        assert_eq!(request.settings.browser_viewport_width, 1280);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut settings = TaskSettings {
            browser_viewport_width: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        settings.browser_viewport_width = 800;
        settings.max_agent_steps = 0;
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        settings.max_agent_steps = 5;
        settings.structured_output_json = Some("{not json".to_string());
        assert!(matches!(settings.validate(), Err(Error::Config(_))));

        settings.structured_output_json = Some(r#"{"type":"object"}"#.to_string());
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_from_maps_later_wins() {
        let browser = json!({ "browser_viewport_width": 1024, "use_proxy": false });
        let agent = json!({ "browser_viewport_width": 800, "max_agent_steps": 20 });

        let settings = TaskSettings::from_maps([
            browser.as_object().unwrap(),
            agent.as_object().unwrap(),
        ])
        .unwrap();

        assert_eq!(settings.browser_viewport_width, 800);
        assert_eq!(settings.max_agent_steps, 20);
        assert!(!settings.use_proxy);
    }
}
