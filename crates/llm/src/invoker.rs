//! Completion invoker.
//!
//! Sends an assembled grounded prompt to the generation collaborator with
//! fixed sampling parameters and reduces the response to answer text.

use crate::client::{LlmClient, LlmRequest};
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Answer returned when the model produced no usable text.
pub const NO_CONTENT_FALLBACK: &str = "No content available.";

/// Sampling parameters passed through to the model unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 800,
        }
    }
}

/// Issues a single completion per prompt. No retries.
#[derive(Clone)]
pub struct CompletionInvoker {
    client: Arc<dyn LlmClient>,
}

impl CompletionInvoker {
    pub fn new(client: Arc<dyn LlmClient>) -> Self {
        Self { client }
    }

    /// Complete `prompt` with `model`, returning the answer text.
    ///
    /// # Errors
    /// Any collaborator failure surfaces as `AppError::CompletionUnavailable`.
    pub async fn complete(
        &self,
        prompt: &str,
        model: &str,
        sampling: &SamplingConfig,
    ) -> AppResult<String> {
        let request = LlmRequest::new(prompt, model)
            .with_temperature(sampling.temperature)
            .with_max_tokens(sampling.max_tokens);

        let response = self.client.complete(&request).await.map_err(|e| match e {
            AppError::CompletionUnavailable(_) => e,
            other => AppError::CompletionUnavailable(other.to_string()),
        })?;

        match response.content {
            Some(text) if !text.trim().is_empty() => Ok(text),
            _ => {
                tracing::warn!(
                    provider = self.client.provider_name(),
                    finish_reason = ?response.finish_reason,
                    "Completion returned no content"
                );
                Ok(NO_CONTENT_FALLBACK.to_string())
            }
        }
    }
}
