//! Retrieval-augmented answering over a search index.

pub mod pipeline;
pub mod types;

pub use pipeline::{PipelineConfig, RagPipeline};
pub use types::{RagResponse, RagSourceRef};
