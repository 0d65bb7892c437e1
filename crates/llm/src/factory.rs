//! LLM provider factory.
//!
//! Builds the completion client and, when an embedding deployment is
//! configured, the embedding provider from resolved settings.

use crate::client::LlmClient;
use crate::embeddings::EmbeddingProvider;
use crate::providers::{AzureOpenAiClient, AzureOpenAiEmbeddings};
use grounded_core::{AppError, AppResult, CompletionSettings};
use std::sync::Arc;

/// Create the completion client for the configured Azure OpenAI resource.
///
/// # Errors
/// Returns `AppError::Config` if the endpoint is not an http(s) URL.
pub fn create_client(settings: &CompletionSettings) -> AppResult<Arc<dyn LlmClient>> {
    check_endpoint(&settings.endpoint)?;
    Ok(Arc::new(AzureOpenAiClient::from_settings(settings)))
}

/// Create the embedding provider, if an embedding deployment is configured.
pub fn create_embedding_provider(
    settings: &CompletionSettings,
    dimensions: usize,
) -> AppResult<Option<Arc<dyn EmbeddingProvider>>> {
    let Some(deployment) = settings.embedding_model.as_deref() else {
        return Ok(None);
    };

    check_endpoint(&settings.endpoint)?;
    let client = AzureOpenAiClient::from_settings(settings);
    Ok(Some(Arc::new(AzureOpenAiEmbeddings::new(
        client, deployment, dimensions,
    ))))
}

fn check_endpoint(endpoint: &str) -> AppResult<()> {
    if endpoint.starts_with("https://") || endpoint.starts_with("http://") {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Azure OpenAI endpoint must be an http(s) URL, got '{}'",
            endpoint
        )))
    }
}
