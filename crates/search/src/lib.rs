//! Grounded Search Library
//!
//! This crate provides:
//! - The index schema model and its validator
//! - Query construction for keyword, vector, hybrid and semantic retrieval
//! - Search execution against a [`SearchService`]
//! - Grounding context formatting
//! - Index provisioning with convergence polling
//! - The [`RagPipeline`] tying retrieval, prompt assembly and completion together

pub mod executor;
pub mod format;
pub mod providers;
pub mod query;
pub mod rag;
pub mod reconcile;
pub mod schema;
pub mod service;
pub mod types;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use executor::SearchExecutor;
pub use format::{format_results, GroundingContext, RECORD_DELIMITER};
pub use providers::{AzureSearchClient, InMemorySearchService};
pub use query::{
    QueryBuilder, QueryMode, QueryOptions, QuerySpec, SearchStrategy, VectorFilterMode,
    VectorInput, MATCH_ALL,
};
pub use rag::{PipelineConfig, RagPipeline, RagResponse, RagSourceRef};
pub use reconcile::{
    reconcile, GiveUpReason, ReconcilePolicy, ReconciliationState, ReconciliationStatus,
};
pub use schema::{hotel_index_schema, FieldType, IndexSchema, SearchField, HOTEL_INDEX_NAME};
pub use service::SearchService;
pub use types::{
    Document, FacetValue, IndexStatistics, IndexingResult, SearchHit, SearchResultSet,
};
