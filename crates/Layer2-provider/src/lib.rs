//! # agentpod-provider
//!
//! LLM provider layer for AgentPod.
//!
//! ## Features
//! - Model id to provider family resolution (`ProviderFactory`)
//! - `llm_config` parsing with per-family API key fallback
//! - Default API roots for OpenAI, Anthropic and Gemini, plus OpenAI-compatible endpoints

pub mod config;
pub mod error;
pub mod factory;
pub mod r#trait;

pub use config::{LlmConfig, DEFAULT_MODEL, DEFAULT_TEMPERATURE};
pub use error::ProviderError;
pub use factory::{provider_kind_for, ProviderFactory};
pub use r#trait::{Provider, ProviderKind, ResolvedProvider};
