//! Provider trait and common types

use crate::config::LlmConfig;
use serde::{Deserialize, Serialize};

/// Provider family a model id resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    /// OpenAI-compatible endpoint at a caller-provided base URL
    Compatible,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Compatible => "compatible",
        }
    }

    /// Public API root; compatible endpoints have none
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some("https://api.openai.com/v1"),
            ProviderKind::Anthropic => Some("https://api.anthropic.com/v1"),
            ProviderKind::Gemini => Some("https://generativelanguage.googleapis.com/v1beta"),
            ProviderKind::Compatible => None,
        }
    }

    /// Environment variable consulted when `llm_config` has no key
    pub fn api_key_env(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi | ProviderKind::Compatible => "OPENAI_API_KEY",
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::Gemini => "GEMINI_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM Provider trait
///
/// A model resolved against its configuration. The automation engine receives it
/// with every run and drives the model itself; resolution happens up front so
/// configuration errors surface before any work starts.
pub trait Provider: Send + Sync {
    /// Provider family
    fn kind(&self) -> ProviderKind;

    /// Model id requests are sent with
    fn model(&self) -> &str;

    /// Sampling and endpoint settings
    fn config(&self) -> &LlmConfig;

    /// API root the engine should call
    fn base_url(&self) -> &str;

    /// API key from the config or the family's environment variable
    fn api_key(&self) -> Option<&str>;

    /// Check if the provider is usable (e.g., API key is set)
    fn is_available(&self) -> bool;
}

/// The provider every supported family resolves to
#[derive(Debug, Clone)]
pub struct ResolvedProvider {
    kind: ProviderKind,
    model: String,
    config: LlmConfig,
    base_url: String,
    api_key: Option<String>,
}

impl ResolvedProvider {
    pub(crate) fn new(kind: ProviderKind, model: String, config: LlmConfig, base_url: String) -> Self {
        let api_key = config.api_key_or_env(kind.api_key_env());
        Self {
            kind,
            model,
            config,
            base_url,
            api_key,
        }
    }
}

impl Provider for ResolvedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    fn is_available(&self) -> bool {
        // Compatible endpoints (local servers) often run without a key
        self.kind == ProviderKind::Compatible || self.api_key.is_some()
    }
}
