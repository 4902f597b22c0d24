//! LLM configuration mapping
//!
//! Task settings and agent configuration versions carry the LLM configuration as a
//! free-form JSON object. `LlmConfig` picks out the keys handed on to the engine.

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Default sampling temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Model used when none is selected
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Recognized LLM configuration keys
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: None,
            base_url: None,
        }
    }
}

impl LlmConfig {
    /// Parse from a JSON object; unknown keys are ignored
    pub fn from_map(map: &Map<String, Value>) -> Result<Self, ProviderError> {
        serde_json::from_value(Value::Object(map.clone()))
            .map_err(|e| ProviderError::NotConfigured(format!("invalid llm_config: {}", e)))
    }

    /// API key from the config, falling back to the given environment variable
    pub fn api_key_or_env(&self, env_var: &str) -> Option<String> {
        self.api_key
            .clone()
            .filter(|k| !k.is_empty())
            .or_else(|| std::env::var(env_var).ok().filter(|k| !k.is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_map_defaults() {
        let map = json!({ "api_key": "sk-test", "unrelated": 1 });
        let config = LlmConfig::from_map(map.as_object().unwrap()).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.temperature, DEFAULT_TEMPERATURE);
        assert!(config.max_tokens.is_none());
    }

    #[test]
    fn test_from_map_rejects_wrong_types() {
        let map = json!({ "temperature": "hot" });
        let err = LlmConfig::from_map(map.as_object().unwrap()).unwrap_err();
        assert!(matches!(err, ProviderError::NotConfigured(ref m) if m.contains("llm_config")));
    }
}
