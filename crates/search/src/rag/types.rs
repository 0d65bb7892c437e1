//! Grounded answer types.

use serde::{Deserialize, Serialize};

/// A retrieved document that was offered to the model as evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagSourceRef {
    /// Document key, when the key field was part of the hit
    pub key: Option<String>,

    /// Service relevance score
    pub score: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranker_score: Option<f64>,
}

/// Answer to a grounded query.
///
/// `answer` is whatever the model produced from the assembled prompt, or the
/// no-content fallback. It is not checked against the sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RagResponse {
    pub answer: String,

    /// Hits rendered into the prompt, in ranked order
    pub sources: Vec<RagSourceRef>,

    /// Total match count reported by the service, if requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,

    /// Documents rendered into the grounding context
    pub context_documents: usize,
}

impl RagResponse {
    pub fn has_sources(&self) -> bool {
        self.context_documents > 0
    }
}
