//! Search collaborator interface.

use crate::query::QuerySpec;
use crate::schema::IndexSchema;
use crate::types::{Document, IndexStatistics, IndexingResult, SearchResultSet};
use grounded_core::AppResult;

/// Operations the pipeline needs from a search service.
///
/// Implementations apply their own transport retry policy; failures that
/// survive it surface as `AppError::SearchUnavailable`.
#[async_trait::async_trait]
pub trait SearchService: Send + Sync {
    /// Get the provider name (e.g., "azure-search", "memory").
    fn provider_name(&self) -> &str;

    /// Run a validated query against `index`.
    async fn search(&self, index: &str, spec: &QuerySpec) -> AppResult<SearchResultSet>;

    /// Create `index` from `schema`.
    async fn create_index(&self, index: &str, schema: &IndexSchema) -> AppResult<()>;

    /// Delete `index`. Returns `false` when it did not exist.
    async fn delete_index(&self, index: &str) -> AppResult<bool>;

    /// Current statistics of `index`.
    async fn index_statistics(&self, index: &str) -> AppResult<IndexStatistics>;

    /// Merge-or-upload `documents` in one bulk call, reporting each document.
    async fn merge_or_upload(
        &self,
        index: &str,
        documents: &[Document],
    ) -> AppResult<Vec<IndexingResult>>;
}
