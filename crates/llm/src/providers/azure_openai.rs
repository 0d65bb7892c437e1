//! Azure OpenAI provider implementation.
//!
//! Chat completions and embeddings are served from per-deployment routes:
//! `{endpoint}/openai/deployments/{deployment}/chat/completions` and
//! `{endpoint}/openai/deployments/{deployment}/embeddings`, authenticated
//! with the `api-key` header.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use crate::embeddings::EmbeddingProvider;
use grounded_core::{AppError, AppResult, CompletionSettings};
use serde::{Deserialize, Serialize};

/// Chat completions request body.
#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

/// Chat completions response body.
#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Azure OpenAI client.
#[derive(Debug, Clone)]
pub struct AzureOpenAiClient {
    /// Resource endpoint, without trailing slash
    endpoint: String,

    api_key: String,

    /// REST API version query parameter
    api_version: String,

    /// HTTP client
    client: reqwest::Client,
}

impl AzureOpenAiClient {
    /// Create a new client for an Azure OpenAI resource.
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from validated completion settings.
    pub fn from_settings(settings: &CompletionSettings) -> Self {
        Self::new(&settings.endpoint, &settings.api_key, &settings.api_version)
    }

    fn deployment_url(&self, deployment: &str, operation: &str) -> String {
        format!(
            "{}/openai/deployments/{}/{}?api-version={}",
            self.endpoint, deployment, operation, self.api_version
        )
    }

    /// Convert LlmRequest to the chat completions format.
    fn to_chat_request(&self, request: &LlmRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: Some(system.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: Some(request.prompt.clone()),
        });

        ChatRequest {
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            top_p: request.top_p,
        }
    }

    /// Convert the first choice of a chat response to LlmResponse.
    fn convert_response(&self, request: &LlmRequest, response: ChatResponse) -> LlmResponse {
        let usage = response
            .usage
            .map(|u| LlmUsage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        let first = response.choices.into_iter().next();
        let finish_reason = first.as_ref().and_then(|c| c.finish_reason.clone());
        let content = first.and_then(|c| c.message).and_then(|m| m.content);

        LlmResponse {
            content,
            model: if response.model.is_empty() {
                request.model.clone()
            } else {
                response.model
            },
            usage,
            finish_reason,
        }
    }

    async fn post_json<B: Serialize + ?Sized>(
        &self,
        url: &str,
        body: &B,
    ) -> AppResult<reqwest::Response> {
        let response = self
            .client
            .post(url)
            .header("api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                AppError::CompletionUnavailable(format!("Failed to reach Azure OpenAI: {}", e))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::CompletionUnavailable(format!(
                "Azure OpenAI API error ({}): {}",
                status, error_text
            )));
        }

        Ok(response)
    }

    /// Embed texts with the given embedding deployment.
    pub async fn embed_with(&self, deployment: &str, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        let url = self.deployment_url(deployment, "embeddings");
        let response = self
            .post_json(&url, &EmbeddingRequest { input: texts })
            .await?;

        let mut parsed: EmbeddingResponse = response.json().await.map_err(|e| {
            AppError::CompletionUnavailable(format!("Failed to parse embedding response: {}", e))
        })?;

        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait::async_trait]
impl LlmClient for AzureOpenAiClient {
    fn provider_name(&self) -> &str {
        "azure-openai"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        tracing::info!(model = %request.model, "Sending completion request to Azure OpenAI");
        tracing::debug!("Request: {:?}", request);

        let url = self.deployment_url(&request.model, "chat/completions");
        let response = self.post_json(&url, &self.to_chat_request(request)).await?;

        let chat_response: ChatResponse = response.json().await.map_err(|e| {
            AppError::CompletionUnavailable(format!("Failed to parse Azure OpenAI response: {}", e))
        })?;

        let converted = self.convert_response(request, chat_response);
        tracing::info!(
            prompt_tokens = converted.usage.prompt_tokens,
            completion_tokens = converted.usage.completion_tokens,
            "Received completion from Azure OpenAI"
        );

        Ok(converted)
    }
}

/// Embedding provider bound to one Azure OpenAI embedding deployment.
#[derive(Debug, Clone)]
pub struct AzureOpenAiEmbeddings {
    client: AzureOpenAiClient,
    deployment: String,
    dimensions: usize,
}

impl AzureOpenAiEmbeddings {
    pub fn new(client: AzureOpenAiClient, deployment: impl Into<String>, dimensions: usize) -> Self {
        Self {
            client,
            deployment: deployment.into(),
            dimensions,
        }
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for AzureOpenAiEmbeddings {
    fn provider_name(&self) -> &str {
        "azure-openai"
    }

    fn model_name(&self) -> &str {
        &self.deployment
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> AppResult<Vec<Vec<f32>>> {
        tracing::debug!(count = texts.len(), deployment = %self.deployment, "Embedding texts");
        let embeddings = self.client.embed_with(&self.deployment, texts).await?;

        if embeddings.len() != texts.len() {
            return Err(AppError::CompletionUnavailable(format!(
                "Expected {} embeddings, received {}",
                texts.len(),
                embeddings.len()
            )));
        }

        Ok(embeddings)
    }
}
