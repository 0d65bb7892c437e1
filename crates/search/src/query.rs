//! Query construction.
//!
//! [`QueryBuilder`] turns query text, a strategy and caller options into a
//! [`QuerySpec`], rejecting anything the schema cannot serve before a request
//! is ever sent.

use crate::schema::IndexSchema;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Search text that matches every document.
pub const MATCH_ALL: &str = "*";

/// Retrieval strategy requested by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchStrategy {
    #[default]
    Keyword,
    Vector,
    Hybrid,
    #[serde(rename = "semantic")]
    SemanticReranked,
}

impl SearchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchStrategy::Keyword => "keyword",
            SearchStrategy::Vector => "vector",
            SearchStrategy::Hybrid => "hybrid",
            SearchStrategy::SemanticReranked => "semantic",
        }
    }

    /// Strategies that cannot run without a query vector.
    pub fn requires_vector(&self) -> bool {
        matches!(self, SearchStrategy::Vector | SearchStrategy::Hybrid)
    }
}

impl fmt::Display for SearchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "keyword" => Ok(SearchStrategy::Keyword),
            "vector" => Ok(SearchStrategy::Vector),
            "hybrid" => Ok(SearchStrategy::Hybrid),
            "semantic" | "semantic-reranked" => Ok(SearchStrategy::SemanticReranked),
            other => Err(AppError::InvalidQuerySpec(format!(
                "Unknown search strategy '{}'. Expected keyword, vector, hybrid or semantic",
                other
            ))),
        }
    }
}

/// Whether filters apply before or after the vector search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VectorFilterMode {
    PreFilter,
    PostFilter,
}

/// A single k-nearest-neighbor sub-query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    pub field: String,
    pub k: usize,
    pub exhaustive: bool,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSearch {
    pub queries: Vec<VectorQuery>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter_mode: Option<VectorFilterMode>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SemanticOptions {
    pub configuration: String,
    pub query: String,
}

/// The validated retrieval mode of a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum QueryMode {
    Keyword,
    Vector(VectorSearch),
    Hybrid(VectorSearch),
    SemanticReranked {
        vector: Option<VectorSearch>,
        semantic: SemanticOptions,
    },
}

impl QueryMode {
    pub fn strategy(&self) -> SearchStrategy {
        match self {
            QueryMode::Keyword => SearchStrategy::Keyword,
            QueryMode::Vector(_) => SearchStrategy::Vector,
            QueryMode::Hybrid(_) => SearchStrategy::Hybrid,
            QueryMode::SemanticReranked { .. } => SearchStrategy::SemanticReranked,
        }
    }

    pub fn vector_search(&self) -> Option<&VectorSearch> {
        match self {
            QueryMode::Keyword => None,
            QueryMode::Vector(v) | QueryMode::Hybrid(v) => Some(v),
            QueryMode::SemanticReranked { vector, .. } => vector.as_ref(),
        }
    }
}

/// A fully validated search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuerySpec {
    pub search_text: String,
    pub top: usize,
    pub select: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub facets: Vec<String>,
    pub include_total_count: bool,
    pub mode: QueryMode,
}

/// Query vector supplied by the caller.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorInput {
    pub field: String,
    pub k: usize,
    pub exhaustive: bool,
    pub vector: Vec<f32>,
}

/// Caller-tunable query options.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    pub top: usize,
    pub select: Vec<String>,
    pub filter: Option<String>,
    pub facets: Vec<String>,
    pub include_total_count: bool,
    pub vector: Option<VectorInput>,
    pub vector_filter_mode: Option<VectorFilterMode>,
    /// Defaults to the schema's first semantic configuration
    pub semantic_configuration: Option<String>,
    /// Defaults to the query text
    pub semantic_query: Option<String>,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            top: 5,
            select: vec![
                "HotelName".to_string(),
                "Description".to_string(),
                "Tags".to_string(),
            ],
            filter: None,
            facets: Vec::new(),
            include_total_count: true,
            vector: None,
            vector_filter_mode: None,
            semantic_configuration: None,
            semantic_query: None,
        }
    }
}

impl QueryOptions {
    pub fn with_select<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.select = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_top(mut self, top: usize) -> Self {
        self.top = top;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_facets<I, S>(mut self, facets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.facets = facets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_vector(mut self, vector: VectorInput) -> Self {
        self.vector = Some(vector);
        self
    }

    pub fn with_vector_filter_mode(mut self, mode: VectorFilterMode) -> Self {
        self.vector_filter_mode = Some(mode);
        self
    }
}

/// Builds query specifications against one schema. Pure.
#[derive(Debug, Clone, Copy)]
pub struct QueryBuilder<'a> {
    schema: &'a IndexSchema,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a IndexSchema) -> Self {
        Self { schema }
    }

    /// Validate `options` against the schema and build a [`QuerySpec`].
    ///
    /// # Errors
    /// `AppError::InvalidQuerySpec` for any option the schema cannot serve.
    pub fn build(
        &self,
        query_text: &str,
        strategy: SearchStrategy,
        options: QueryOptions,
    ) -> AppResult<QuerySpec> {
        if options.top == 0 {
            return Err(invalid("top must be at least 1"));
        }
        if options.select.is_empty() {
            return Err(invalid("select must name at least one field"));
        }
        for path in &options.select {
            if self.schema.field(path).is_none() {
                return Err(invalid(format!(
                    "Selected field '{}' does not exist in index '{}'",
                    path, self.schema.name
                )));
            }
        }
        for facet in &options.facets {
            match self.schema.field(facet) {
                Some(field) if field.facetable => {}
                Some(_) => return Err(invalid(format!("Field '{}' is not facetable", facet))),
                None => {
                    return Err(invalid(format!(
                        "Facet field '{}' does not exist in index '{}'",
                        facet, self.schema.name
                    )))
                }
            }
        }
        if let Some(filter) = &options.filter {
            if filter.trim().is_empty() {
                return Err(invalid("filter cannot be blank"));
            }
        }

        let vector_search = match (&options.vector, strategy) {
            (Some(_), SearchStrategy::Keyword) => {
                tracing::debug!("Keyword strategy ignores the supplied query vector");
                None
            }
            (Some(input), _) => Some(self.vector_search(input, options.vector_filter_mode)?),
            (None, _) => None,
        };

        let mode = match strategy {
            SearchStrategy::Keyword => QueryMode::Keyword,
            SearchStrategy::Vector => QueryMode::Vector(require_vector(vector_search, strategy)?),
            SearchStrategy::Hybrid => QueryMode::Hybrid(require_vector(vector_search, strategy)?),
            SearchStrategy::SemanticReranked => {
                let configuration = self
                    .schema
                    .semantic_configuration(options.semantic_configuration.as_deref())
                    .ok_or_else(|| match &options.semantic_configuration {
                        Some(name) => invalid(format!(
                            "Semantic configuration '{}' does not exist in index '{}'",
                            name, self.schema.name
                        )),
                        None => invalid(format!(
                            "Index '{}' has no semantic configuration",
                            self.schema.name
                        )),
                    })?;

                let query = options
                    .semantic_query
                    .clone()
                    .filter(|q| !q.trim().is_empty())
                    .unwrap_or_else(|| query_text.to_string());

                QueryMode::SemanticReranked {
                    vector: vector_search,
                    semantic: SemanticOptions {
                        configuration: configuration.name.clone(),
                        query,
                    },
                }
            }
        };

        let search_text = if matches!(mode, QueryMode::Vector(_)) || query_text.trim().is_empty() {
            MATCH_ALL.to_string()
        } else {
            query_text.to_string()
        };

        let spec = QuerySpec {
            search_text,
            top: options.top,
            select: options.select,
            filter: options.filter,
            facets: options.facets,
            include_total_count: options.include_total_count,
            mode,
        };

        tracing::debug!(
            strategy = %spec.mode.strategy(),
            top = spec.top,
            "Built query specification"
        );

        Ok(spec)
    }

    fn vector_search(
        &self,
        input: &VectorInput,
        filter_mode: Option<VectorFilterMode>,
    ) -> AppResult<VectorSearch> {
        let field = self.schema.field(&input.field).ok_or_else(|| {
            invalid(format!(
                "Vector field '{}' does not exist in index '{}'",
                input.field, self.schema.name
            ))
        })?;

        if !field.field_type.is_vector() || !field.searchable {
            return Err(invalid(format!(
                "Field '{}' is not a searchable vector field",
                input.field
            )));
        }
        if input.k == 0 {
            return Err(invalid("k must be at least 1"));
        }

        let dimensions = field.vector_search_dimensions.unwrap_or(0);
        if input.vector.len() != dimensions {
            return Err(invalid(format!(
                "Vector for '{}' has {} dimensions, expected {}",
                input.field,
                input.vector.len(),
                dimensions
            )));
        }

        Ok(VectorSearch {
            queries: vec![VectorQuery {
                field: input.field.clone(),
                k: input.k,
                exhaustive: input.exhaustive,
                vector: input.vector.clone(),
            }],
            filter_mode,
        })
    }
}

fn require_vector(
    vector_search: Option<VectorSearch>,
    strategy: SearchStrategy,
) -> AppResult<VectorSearch> {
    vector_search.ok_or_else(|| {
        invalid(format!(
            "The {} strategy requires a query vector",
            strategy
        ))
    })
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidQuerySpec(message.into())
}
