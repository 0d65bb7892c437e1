//! LLM integration crate for the grounded pipeline.
//!
//! Provides the completion and embedding abstractions the pipeline talks
//! to, the Azure OpenAI implementations of both, and the
//! [`CompletionInvoker`] that turns an assembled prompt into an answer.
//!
//! # Example
//! ```no_run
//! use grounded_llm::{CompletionInvoker, SamplingConfig, providers::AzureOpenAiClient};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = AzureOpenAiClient::new("https://example.openai.azure.com", "key", "2024-06-01");
//! let invoker = CompletionInvoker::new(Arc::new(client));
//! let answer = invoker
//!     .complete("Query: ...\nSources: ...", "gpt-4o", &SamplingConfig::default())
//!     .await?;
//! println!("{}", answer);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod embeddings;
pub mod factory;
pub mod invoker;
pub mod providers;

// Re-export main types
pub use client::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
pub use embeddings::EmbeddingProvider;
pub use factory::{create_client, create_embedding_provider};
pub use invoker::{CompletionInvoker, SamplingConfig, NO_CONTENT_FALLBACK};
pub use providers::{AzureOpenAiClient, AzureOpenAiEmbeddings, HashingEmbedder};
