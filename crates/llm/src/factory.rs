//! LLM provider factory.
//!
//! This module builds the drafting client from application configuration.

use crate::client::LlmClient;
use crate::providers::OllamaClient;
use grounded_core::config::DraftingConfig;
use grounded_core::{AppError, AppResult};
use std::sync::Arc;

/// Create an LLM client for the configured drafting provider.
///
/// The client's HTTP timeout is the drafting timeout, so a hung model
/// server cannot hold a request open past that budget.
///
/// # Errors
/// Returns `AppError::Config` if the provider is unknown, or `AppError::Llm`
/// if the HTTP client cannot be built.
pub fn create_client(config: &DraftingConfig) -> AppResult<Arc<dyn LlmClient>> {
    match config.provider.to_lowercase().as_str() {
        "ollama" => {
            let client = OllamaClient::with_timeout(&config.endpoint, config.timeout())?;
            tracing::debug!(endpoint = %config.endpoint, model = %config.model, "Created Ollama client");
            Ok(Arc::new(client))
        }
        other => Err(AppError::Config(format!(
            "Unknown drafting provider: {}",
            other
        ))),
    }
}
