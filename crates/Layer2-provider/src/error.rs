//! Provider-specific error types
//!
//! ProviderError carries the detail of a rejected model or provider configuration.
//! It converts into `agentpod_foundation::Error` at the layer boundary.

use agentpod_foundation::Error as FoundationError;
use thiserror::Error;

/// Errors raised while resolving a provider
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// Model identifier does not map to any known provider family
    #[error("Unsupported LLM model: {0}")]
    UnsupportedModel(String),

    /// Provider is known but its configuration is unusable
    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        FoundationError::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_convert_to_config() {
        let err: FoundationError = ProviderError::UnsupportedModel("mistral-7b".into()).into();
        assert!(matches!(err, FoundationError::Config(ref msg) if msg.contains("mistral-7b")));

        let err: FoundationError = ProviderError::NotConfigured("no base_url".into()).into();
        assert!(matches!(err, FoundationError::Config(ref msg) if msg.contains("base_url")));
    }
}
