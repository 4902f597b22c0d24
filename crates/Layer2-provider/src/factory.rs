//! Provider factory
//!
//! Maps a model id plus its configuration mapping to a resolved provider. Unknown
//! model families are rejected here, before any task is created.

use crate::config::{LlmConfig, DEFAULT_MODEL};
use crate::error::ProviderError;
use crate::r#trait::{Provider, ProviderKind, ResolvedProvider};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Model id prefixes and the family they belong to
const PREFIXES: &[(&str, ProviderKind)] = &[
    ("gpt-", ProviderKind::OpenAi),
    ("o1", ProviderKind::OpenAi),
    ("o3", ProviderKind::OpenAi),
    ("o4", ProviderKind::OpenAi),
    ("claude-", ProviderKind::Anthropic),
    ("gemini-", ProviderKind::Gemini),
    ("llama-", ProviderKind::Compatible),
];

/// Family for a model id, if any
pub fn provider_kind_for(model: &str) -> Option<ProviderKind> {
    PREFIXES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, kind)| *kind)
}

/// Resolves model ids to providers
#[derive(Debug, Clone, Default)]
pub struct ProviderFactory;

impl ProviderFactory {
    pub fn new() -> Self {
        Self
    }

    /// Resolve a provider; `None` selects the default model
    pub fn resolve(
        &self,
        model: Option<&str>,
        config: &Map<String, Value>,
    ) -> Result<Arc<dyn Provider>, ProviderError> {
        let model = model.filter(|m| !m.is_empty()).unwrap_or(DEFAULT_MODEL);
        let kind = provider_kind_for(model)
            .ok_or_else(|| ProviderError::UnsupportedModel(model.to_string()))?;
        let config = LlmConfig::from_map(config)?;

        let base_url = config
            .base_url
            .clone()
            .or_else(|| kind.default_base_url().map(str::to_string))
            .ok_or_else(|| {
                ProviderError::NotConfigured(format!("model {} needs llm_config.base_url", model))
            })?;

        debug!("Resolved model {} to {} provider at {}", model, kind, base_url);
        Ok(Arc::new(ResolvedProvider::new(
            kind,
            model.to_string(),
            config,
            base_url.trim_end_matches('/').to_string(),
        )))
    }
}
