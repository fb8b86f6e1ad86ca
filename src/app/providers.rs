//! Completion provider resolution

use super::config::LlmConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use switchboard_llm::{OpenAiCompatConfig, OpenAiCompatProvider, SharedLlmProvider};
use tracing::{info, warn};

/// Build the completion provider from `[llm]`.
///
/// A missing API key is allowed (local endpoints) but logged.
pub fn resolve_llm_provider(llm: &LlmConfig) -> Result<SharedLlmProvider> {
    let api_key = std::env::var(&llm.api_key_env).unwrap_or_default();
    if api_key.is_empty() {
        warn!(env = %llm.api_key_env, "No API key set, sending unauthenticated requests");
    }

    let config = OpenAiCompatConfig::new(api_key)
        .with_base_url(llm.base_url.clone())
        .with_model(llm.model.clone())
        .with_timeout(Duration::from_secs(llm.timeout_secs));
    let provider = OpenAiCompatProvider::new(config).context("Failed to create LLM provider")?;

    info!(base_url = %llm.base_url, model = %llm.model, "Completion provider ready");
    Ok(Arc::new(provider))
}
