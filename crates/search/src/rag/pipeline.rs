//! Grounded answering and index provisioning.
//!
//! The query path is strictly sequential:
//! build query → execute search → format sources → assemble prompt → complete.

use crate::executor::SearchExecutor;
use crate::format::format_results;
use crate::query::{QueryBuilder, QueryOptions, SearchStrategy, VectorInput};
use crate::rag::types::{RagResponse, RagSourceRef};
use crate::reconcile::{reconcile, ReconcilePolicy, ReconciliationState};
use crate::schema::IndexSchema;
use crate::service::SearchService;
use crate::types::Document;
use grounded_core::{AppConfig, AppError, AppResult};
use grounded_llm::{CompletionInvoker, EmbeddingProvider, LlmClient, SamplingConfig};
use grounded_prompt::{load_template, GroundedTemplate, DEFAULT_GROUNDED_TEMPLATE};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything the pipeline needs, resolved up front.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub index_name: String,

    /// Chat deployment used for completions
    pub model: String,

    pub schema: IndexSchema,

    /// Grounded prompt template source
    pub template: String,

    /// Fields requested from the service and rendered into the context
    pub projection: Vec<String>,

    pub default_strategy: SearchStrategy,
    pub top: usize,
    pub max_documents: Option<usize>,
    pub sampling: SamplingConfig,

    /// Vector field targeted when the query text is embedded
    pub vector_field: String,
    pub k: usize,
    pub exhaustive: bool,

    pub semantic_configuration: Option<String>,

    /// OData filter applied to every query
    pub filter: Option<String>,

    pub reconcile: ReconcilePolicy,
}

impl PipelineConfig {
    /// Configuration with the hotels sample defaults.
    pub fn new(index_name: impl Into<String>, model: impl Into<String>, schema: IndexSchema) -> Self {
        let defaults = QueryOptions::default();
        Self {
            index_name: index_name.into(),
            model: model.into(),
            schema,
            template: DEFAULT_GROUNDED_TEMPLATE.to_string(),
            projection: defaults.select,
            default_strategy: SearchStrategy::default(),
            top: defaults.top,
            max_documents: None,
            sampling: SamplingConfig::default(),
            vector_field: "DescriptionVector".to_string(),
            k: 5,
            exhaustive: false,
            semantic_configuration: None,
            filter: None,
            reconcile: ReconcilePolicy::default(),
        }
    }

    /// Resolve a pipeline configuration from loaded application settings.
    ///
    /// # Errors
    /// `AppError::Config` if any service setting is missing or the default
    /// strategy is unknown; template errors from a configured prompt file.
    pub fn from_app_config(config: &AppConfig, schema: IndexSchema) -> AppResult<Self> {
        config.validate()?;
        let search = config.search_settings()?;
        let completion = config.completion_settings()?;
        let retrieval = &config.retrieval;

        let default_strategy = retrieval
            .strategy
            .parse::<SearchStrategy>()
            .map_err(|e| AppError::Config(format!("retrieval.strategy: {}", e)))?;

        let template = match &retrieval.prompt_file {
            Some(path) => {
                tracing::debug!("Using prompt template from {:?}", path);
                load_template(path)?.source().to_string()
            }
            None => DEFAULT_GROUNDED_TEMPLATE.to_string(),
        };

        Ok(Self {
            index_name: search.index_name,
            model: completion.model,
            schema,
            template,
            projection: retrieval.select.clone(),
            default_strategy,
            top: retrieval.top,
            max_documents: retrieval.max_documents,
            sampling: SamplingConfig {
                temperature: completion.temperature,
                max_tokens: completion.max_tokens,
            },
            vector_field: retrieval.vector_field.clone(),
            k: retrieval.k,
            exhaustive: retrieval.exhaustive,
            semantic_configuration: retrieval.semantic_configuration.clone(),
            filter: None,
            reconcile: ReconcilePolicy::from(&config.provisioning),
        })
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Retrieval-augmented answering over one index.
///
/// Holds only shared collaborators and immutable configuration, so one
/// pipeline can serve concurrent queries.
pub struct RagPipeline {
    config: PipelineConfig,
    template: GroundedTemplate,
    search: Arc<dyn SearchService>,
    executor: SearchExecutor,
    invoker: CompletionInvoker,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    key_field: Option<String>,
}

impl RagPipeline {
    /// Validate `config` and wire the collaborators.
    ///
    /// # Errors
    /// - `AppError::Config` for a blank index name or model, an empty
    ///   projection, or a zero result limit
    /// - `AppError::InvalidSchema` if the schema is invalid
    /// - `AppError::InvalidQuerySpec` if a projected field is not in the schema
    /// - `AppError::Template` if the template does not compile
    pub fn new(
        config: PipelineConfig,
        search: Arc<dyn SearchService>,
        llm: Arc<dyn LlmClient>,
    ) -> AppResult<Self> {
        if config.index_name.trim().is_empty() {
            return Err(AppError::Config("Index name cannot be empty".to_string()));
        }
        if config.model.trim().is_empty() {
            return Err(AppError::Config("Model deployment cannot be empty".to_string()));
        }
        if config.projection.is_empty() {
            return Err(AppError::Config(
                "Projection must name at least one field".to_string(),
            ));
        }
        if config.top == 0 || config.k == 0 {
            return Err(AppError::Config("top and k must be at least 1".to_string()));
        }
        if config.reconcile.max_attempts == 0 {
            return Err(AppError::Config(
                "Reconciliation max_attempts must be at least 1".to_string(),
            ));
        }

        config.schema.validate()?;
        if let Some(missing) = config
            .projection
            .iter()
            .find(|path| config.schema.field(path).is_none())
        {
            return Err(AppError::InvalidQuerySpec(format!(
                "Projected field '{}' does not exist in index '{}'",
                missing, config.schema.name
            )));
        }

        let template = GroundedTemplate::new(config.template.clone())?;

        let key_field = config
            .schema
            .key_field()
            .filter(|f| !f.hidden)
            .map(|f| f.name.clone());

        tracing::debug!(
            index = %config.index_name,
            model = %config.model,
            provider = search.provider_name(),
            llm = llm.provider_name(),
            "Pipeline ready"
        );

        Ok(Self {
            executor: SearchExecutor::new(search.clone(), config.index_name.clone()),
            invoker: CompletionInvoker::new(llm),
            search,
            template,
            key_field,
            embeddings: None,
            config,
        })
    }

    /// Enable vector strategies by embedding the query text.
    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Query options derived from the pipeline configuration.
    pub fn default_options(&self) -> QueryOptions {
        QueryOptions {
            top: self.config.top,
            filter: self.config.filter.clone(),
            semantic_configuration: self.config.semantic_configuration.clone(),
            ..QueryOptions::default()
        }
        .with_select(self.config.projection.clone())
    }

    /// Answer `query_text` with the given strategy, or the configured default.
    pub async fn answer_query(
        &self,
        query_text: &str,
        strategy: Option<SearchStrategy>,
    ) -> AppResult<RagResponse> {
        let strategy = strategy.unwrap_or(self.config.default_strategy);
        self.answer_query_with(query_text, strategy, self.default_options())
            .await
    }

    /// Answer `query_text` with explicit query options.
    ///
    /// `options.select` doubles as the context projection. The key field is
    /// requested as well so sources can be reported, but it is only rendered
    /// when projected.
    pub async fn answer_query_with(
        &self,
        query_text: &str,
        strategy: SearchStrategy,
        mut options: QueryOptions,
    ) -> AppResult<RagResponse> {
        tracing::info!(strategy = %strategy, "Answering query: {}", query_text);

        if strategy.requires_vector() && options.vector.is_none() {
            options.vector = self.embed_query(query_text).await?;
        }

        let projection = options.select.clone();
        if let Some(key) = &self.key_field {
            if !options.select.contains(key) {
                options.select.push(key.clone());
            }
        }

        let spec = QueryBuilder::new(&self.config.schema).build(query_text, strategy, options)?;
        let results = self.executor.execute(&spec).await?;

        let context = format_results(&results, &projection, self.config.max_documents);
        if context.is_empty() {
            tracing::info!("No sources retrieved; the model will see an empty context");
        }

        let prompt = self.template.assemble(query_text, context.as_str())?;
        tracing::debug!(
            sources = context.document_count(),
            prompt_len = prompt.len(),
            "Assembled grounded prompt"
        );

        let answer = self
            .invoker
            .complete(&prompt, &self.config.model, &self.config.sampling)
            .await?;

        let sources = context
            .rendered_hits()
            .iter()
            .filter_map(|&index| results.hits.get(index))
            .map(|hit| RagSourceRef {
                key: self
                    .key_field
                    .as_deref()
                    .and_then(|field| hit.document.key(field)),
                score: hit.score,
                reranker_score: hit.reranker_score,
            })
            .collect();

        Ok(RagResponse {
            answer,
            sources,
            total_count: results.total_count,
            context_documents: context.document_count(),
        })
    }

    /// Recreate the index from the configured schema and load `documents`.
    pub async fn provision_index(
        &self,
        documents: &[Document],
        expected_count: u64,
        cancel: &CancellationToken,
    ) -> AppResult<ReconciliationState> {
        reconcile(
            self.search.as_ref(),
            &self.config.schema,
            &self.config.index_name,
            documents,
            expected_count,
            &self.config.reconcile,
            cancel,
        )
        .await
    }

    async fn embed_query(&self, query_text: &str) -> AppResult<Option<VectorInput>> {
        let Some(provider) = &self.embeddings else {
            return Ok(None);
        };

        tracing::debug!(
            provider = provider.provider_name(),
            model = provider.model_name(),
            "Embedding query text"
        );
        let vector = provider.embed(query_text).await?;

        Ok(Some(VectorInput {
            field: self.config.vector_field.clone(),
            k: self.config.k,
            exhaustive: self.config.exhaustive,
            vector,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::InMemorySearchService;
    use crate::schema::hotel_index_schema;
    use grounded_llm::{LlmRequest, LlmResponse, LlmUsage};

    struct EchoClient;

    #[async_trait::async_trait]
    impl LlmClient for EchoClient {
        fn provider_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
            Ok(LlmResponse {
                content: Some(request.prompt.clone()),
                model: request.model.clone(),
                usage: LlmUsage::default(),
                finish_reason: None,
            })
        }
    }

    fn build(config: PipelineConfig) -> AppResult<RagPipeline> {
        RagPipeline::new(
            config,
            Arc::new(InMemorySearchService::new()),
            Arc::new(EchoClient),
        )
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new("hotels", "gpt-4o", hotel_index_schema())
    }

    #[test]
    fn test_rejects_blank_names() {
        let mut c = config();
        c.index_name = " ".to_string();
        assert!(matches!(build(c), Err(AppError::Config(_))));

        let mut c = config();
        c.model = String::new();
        assert!(matches!(build(c), Err(AppError::Config(_))));
    }

    #[test]
    fn test_rejects_unknown_projection() {
        let mut c = config();
        c.projection = vec!["HotelName".to_string(), "Stars".to_string()];
        assert!(matches!(build(c), Err(AppError::InvalidQuerySpec(_))));
    }

    #[test]
    fn test_rejects_bad_template() {
        let mut c = config();
        c.template = "Only {{query}}".to_string();
        assert!(matches!(build(c), Err(AppError::Template(_))));
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let mut c = config();
        c.reconcile.max_attempts = 0;
        assert!(matches!(build(c), Err(AppError::Config(_))));
    }

    #[test]
    fn test_default_options_follow_config() {
        let mut c = config().with_filter("Rating ge 4");
        c.top = 3;
        c.projection = vec!["HotelName".to_string()];
        let pipeline = build(c).unwrap();

        let options = pipeline.default_options();
        assert_eq!(options.top, 3);
        assert_eq!(options.select, vec!["HotelName"]);
        assert_eq!(options.filter.as_deref(), Some("Rating ge 4"));
    }

    #[tokio::test]
    async fn test_vector_strategy_without_embeddings_is_rejected() {
        let pipeline = build(config()).unwrap();
        let result = pipeline
            .answer_query("quiet", Some(SearchStrategy::Vector))
            .await;
        assert!(matches!(result, Err(AppError::InvalidQuerySpec(_))));
    }
}
