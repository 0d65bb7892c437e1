//! Ask command handler.
//!
//! Runs the grounded query path against the configured search index and
//! chat deployment.

use super::schema::load_schema;
use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_llm::{create_client, create_embedding_provider};
use grounded_search::{AzureSearchClient, PipelineConfig, RagPipeline, SearchStrategy};
use std::path::PathBuf;
use std::sync::Arc;

/// Answer a question grounded in retrieved documents
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub query: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Retrieval strategy: keyword, vector, hybrid or semantic
    #[arg(short, long)]
    pub strategy: Option<SearchStrategy>,

    /// Number of documents to retrieve
    #[arg(long)]
    pub top: Option<usize>,

    /// OData filter, e.g. "Rating ge 4"
    #[arg(long)]
    pub filter: Option<String>,

    /// Comma-separated fields to retrieve and show the model
    #[arg(long, value_delimiter = ',')]
    pub select: Vec<String>,

    /// Comma-separated facetable fields to count
    #[arg(long, value_delimiter = ',')]
    pub facets: Vec<String>,

    /// Cap on documents rendered into the prompt
    #[arg(long)]
    pub max_documents: Option<usize>,

    /// Schema file describing the index (defaults to the hotels sample)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    /// Execute the ask command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let query = self
            .get_query()?
            .ok_or_else(|| AppError::Config("No question provided".to_string()))?;

        let schema = load_schema(self.schema.as_deref())?;
        let vector_dimensions = schema
            .field(&config.retrieval.vector_field)
            .and_then(|f| f.vector_search_dimensions);

        let mut pipeline_config = PipelineConfig::from_app_config(config, schema)?;
        if let Some(top) = self.top {
            pipeline_config.top = top;
        }
        if !self.select.is_empty() {
            pipeline_config.projection = self.select.clone();
        }
        if let Some(filter) = &self.filter {
            pipeline_config.filter = Some(filter.clone());
        }
        if self.max_documents.is_some() {
            pipeline_config.max_documents = self.max_documents;
        }

        let search_settings = config.search_settings()?;
        let completion_settings = config.completion_settings()?;

        let search = Arc::new(AzureSearchClient::from_settings(&search_settings));
        let llm = create_client(&completion_settings)?;
        let mut pipeline = RagPipeline::new(pipeline_config, search, llm)?;

        match vector_dimensions {
            Some(dimensions) => {
                if let Some(provider) = create_embedding_provider(&completion_settings, dimensions)? {
                    tracing::debug!(model = provider.model_name(), "Query embeddings enabled");
                    pipeline = pipeline.with_embeddings(provider);
                }
            }
            None => tracing::debug!(
                "Vector field '{}' not in schema; vector strategies unavailable",
                config.retrieval.vector_field
            ),
        }

        let strategy = self.strategy.unwrap_or(pipeline.config().default_strategy);
        let mut options = pipeline.default_options();
        options.facets = self.facets.clone();

        let response = pipeline.answer_query_with(&query, strategy, options).await?;

        if self.json {
            let output = serde_json::json!({
                "answer": response.answer,
                "strategy": strategy,
                "index": search_settings.index_name,
                "model": completion_settings.model,
                "totalCount": response.total_count,
                "contextDocuments": response.context_documents,
                "sources": response.sources,
            });
            let json = serde_json::to_string_pretty(&output)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
        } else {
            println!("{}", response.answer);

            if tracing::enabled!(tracing::Level::DEBUG) {
                for (rank, source) in response.sources.iter().enumerate() {
                    tracing::debug!(
                        rank = rank + 1,
                        key = source.key.as_deref().unwrap_or("-"),
                        score = source.score,
                        reranker = ?source.reranker_score,
                        "Source"
                    );
                }
            }
        }

        Ok(())
    }

    /// Get the question from the positional argument or a file.
    fn get_query(&self) -> AppResult<Option<String>> {
        if let Some(query) = &self.query {
            return Ok(Some(query.clone()));
        }
        match &self.file {
            Some(path) => {
                let text = std::fs::read_to_string(path)?;
                Ok(Some(text.trim().to_string()).filter(|q| !q.is_empty()))
            }
            None => Ok(None),
        }
    }
}
