//! Search execution.

use crate::query::QuerySpec;
use crate::service::SearchService;
use crate::types::SearchResultSet;
use grounded_core::AppResult;
use std::sync::Arc;

/// Issues query specifications against one index.
///
/// Results come back in the service's ranking order; nothing is re-ranked or
/// retried here.
#[derive(Clone)]
pub struct SearchExecutor {
    service: Arc<dyn SearchService>,
    index_name: String,
}

impl SearchExecutor {
    pub fn new(service: Arc<dyn SearchService>, index_name: impl Into<String>) -> Self {
        Self {
            service,
            index_name: index_name.into(),
        }
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    pub async fn execute(&self, spec: &QuerySpec) -> AppResult<SearchResultSet> {
        tracing::info!(
            index = %self.index_name,
            provider = self.service.provider_name(),
            strategy = %spec.mode.strategy(),
            "Executing search"
        );

        let results = self.service.search(&self.index_name, spec).await?;

        tracing::info!(
            hits = results.hits.len(),
            total = ?results.total_count,
            "Search returned results"
        );
        Ok(results)
    }
}
