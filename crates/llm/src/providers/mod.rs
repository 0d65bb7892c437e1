//! LLM and embedding provider implementations.

pub mod azure_openai;
pub mod hashing;

pub use azure_openai::{AzureOpenAiClient, AzureOpenAiEmbeddings};
pub use hashing::HashingEmbedder;
