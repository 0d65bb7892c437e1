//! Azure AI Search provider implementation.
//!
//! Talks to the search REST API with the `api-key` header:
//! - `POST {endpoint}/indexes/{index}/docs/search` for queries
//! - `POST {endpoint}/indexes` and `DELETE {endpoint}/indexes/{index}` for index lifecycle
//! - `GET {endpoint}/indexes/{index}/stats` for statistics
//! - `POST {endpoint}/indexes/{index}/docs/index` for bulk merge-or-upload

use crate::query::{QueryMode, QuerySpec};
use crate::schema::{IndexSchema, SearchField, VectorAlgorithm};
use crate::service::SearchService;
use crate::types::{
    Document, FacetValue, IndexStatistics, IndexingResult, SearchHit, SearchResultSet,
};
use grounded_core::{AppError, AppResult, SearchSettings};
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Retries after the first attempt for throttled or failed requests.
const MAX_RETRIES: u32 = 2;
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "@odata.count", default)]
    count: Option<u64>,
    #[serde(rename = "@search.facets", default)]
    facets: BTreeMap<String, Vec<RawFacet>>,
    #[serde(default)]
    value: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct RawFacet {
    #[serde(default)]
    value: Value,
    #[serde(default)]
    count: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatsResponse {
    #[serde(default)]
    document_count: u64,
    #[serde(default)]
    storage_size: u64,
}

#[derive(Debug, Deserialize)]
struct IndexBatchResponse {
    #[serde(default)]
    value: Vec<RawIndexingResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIndexingResult {
    key: String,
    status: bool,
    #[serde(default)]
    error_message: Option<String>,
    status_code: u16,
}

/// Azure AI Search client.
#[derive(Debug, Clone)]
pub struct AzureSearchClient {
    /// Service endpoint, without trailing slash
    endpoint: String,

    api_key: String,

    api_version: String,

    client: reqwest::Client,
}

impl AzureSearchClient {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Self {
        let endpoint: String = endpoint.into();
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            api_version: api_version.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Create a client from validated search settings.
    pub fn from_settings(settings: &SearchSettings) -> Self {
        Self::new(&settings.endpoint, &settings.api_key, &settings.api_version)
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}?api-version={}",
            self.endpoint, path, self.api_version
        )
    }

    /// Send a request, retrying throttling, server errors and transport
    /// failures with exponential backoff. Non-success responses that remain
    /// after the retries are returned to the caller unchanged.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AppResult<reqwest::Response> {
        let url = self.url(path);
        let mut backoff = INITIAL_BACKOFF;
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("api-key", &self.api_key);
            if let Some(body) = body {
                request = request.json(body);
            }

            let retryable = match request.send().await {
                Ok(response) if is_transient(response.status()) => {
                    format!("status {}", response.status())
                }
                Ok(response) => return Ok(response),
                Err(e) => e.to_string(),
            };

            if attempt >= MAX_RETRIES {
                return Err(AppError::SearchUnavailable(format!(
                    "Azure AI Search request to '{}' failed after {} attempts: {}",
                    path,
                    attempt + 1,
                    retryable
                )));
            }

            tracing::warn!(
                path = %path,
                attempt = attempt + 1,
                backoff_ms = backoff.as_millis() as u64,
                "Transient search failure: {}",
                retryable
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
            attempt += 1;
        }
    }

    async fn send_ok(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> AppResult<reqwest::Response> {
        let response = self.send(method, path, body).await?;
        if response.status().is_success() {
            return Ok(response);
        }
        Err(api_error(response).await)
    }
}

fn is_transient(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

async fn api_error(response: reqwest::Response) -> AppError {
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());
    AppError::SearchUnavailable(format!(
        "Azure AI Search API error ({}): {}",
        status, error_text
    ))
}

/// Request body for `docs/search`.
pub(crate) fn search_body(spec: &QuerySpec) -> Value {
    let mut body = json!({
        "search": spec.search_text,
        "top": spec.top,
        "select": spec.select.join(","),
        "count": spec.include_total_count,
    });

    if let Some(filter) = &spec.filter {
        body["filter"] = json!(filter);
    }
    if !spec.facets.is_empty() {
        body["facets"] = json!(spec.facets);
    }

    if let Some(vector) = spec.mode.vector_search() {
        let queries: Vec<Value> = vector
            .queries
            .iter()
            .map(|q| {
                json!({
                    "kind": "vector",
                    "vector": q.vector,
                    "fields": q.field,
                    "k": q.k,
                    "exhaustive": q.exhaustive,
                })
            })
            .collect();
        body["vectorQueries"] = Value::Array(queries);
        if let Some(mode) = vector.filter_mode {
            body["vectorFilterMode"] = json!(mode);
        }
    }

    if let QueryMode::SemanticReranked { semantic, .. } = &spec.mode {
        body["queryType"] = json!("semantic");
        body["semanticConfiguration"] = json!(semantic.configuration);
        body["semanticQuery"] = json!(semantic.query);
    }

    body
}

/// REST index definition for `schema` under `name`.
pub(crate) fn rest_index_definition(name: &str, schema: &IndexSchema) -> Value {
    let fields: Vec<Value> = schema.fields.iter().map(rest_field).collect();

    let algorithms: Vec<Value> = schema
        .vector_search
        .algorithms
        .iter()
        .map(|algorithm| match algorithm {
            VectorAlgorithm::Hnsw { name, parameters } => json!({
                "name": name,
                "kind": "hnsw",
                "hnswParameters": parameters,
            }),
            VectorAlgorithm::ExhaustiveKnn { name, parameters } => json!({
                "name": name,
                "kind": "exhaustiveKnn",
                "exhaustiveKnnParameters": parameters,
            }),
        })
        .collect();

    let profiles: Vec<Value> = schema
        .vector_search
        .profiles
        .iter()
        .map(|p| json!({"name": p.name, "algorithm": p.algorithm_configuration_name}))
        .collect();

    let mut definition = json!({
        "name": name,
        "fields": fields,
    });

    if !algorithms.is_empty() || !profiles.is_empty() {
        definition["vectorSearch"] = json!({
            "algorithms": algorithms,
            "profiles": profiles,
        });
    }

    if !schema.semantic.configurations.is_empty() {
        let field_names = |refs: &[crate::schema::FieldRef]| -> Vec<Value> {
            refs.iter().map(|f| json!({"fieldName": f.name})).collect()
        };
        let configurations: Vec<Value> = schema
            .semantic
            .configurations
            .iter()
            .map(|c| {
                let mut prioritized = json!({
                    "prioritizedContentFields": field_names(&c.prioritized_fields.content_fields),
                    "prioritizedKeywordsFields": field_names(&c.prioritized_fields.keywords_fields),
                });
                if let Some(title) = &c.prioritized_fields.title_field {
                    prioritized["titleField"] = json!({"fieldName": title.name});
                }
                json!({"name": c.name, "prioritizedFields": prioritized})
            })
            .collect();
        definition["semantic"] = json!({"configurations": configurations});
    }

    definition
}

fn rest_field(field: &SearchField) -> Value {
    if field.field_type.is_complex() {
        let fields: Vec<Value> = field.fields.iter().map(rest_field).collect();
        return json!({
            "name": field.name,
            "type": field.field_type,
            "fields": fields,
        });
    }

    let mut value = json!({
        "name": field.name,
        "type": field.field_type,
        "key": field.key,
        "searchable": field.searchable,
        "filterable": field.filterable,
        "sortable": field.sortable,
        "facetable": field.facetable,
        "retrievable": !field.hidden,
    });
    if let Some(analyzer) = &field.analyzer_name {
        value["analyzer"] = json!(analyzer);
    }
    if let Some(dimensions) = field.vector_search_dimensions {
        value["dimensions"] = json!(dimensions);
    }
    if let Some(profile) = &field.vector_search_profile_name {
        value["vectorSearchProfile"] = json!(profile);
    }
    value
}

/// Split a raw result document into its fields and scores.
fn into_hit(mut raw: Map<String, Value>) -> SearchHit {
    let score = raw
        .get("@search.score")
        .and_then(Value::as_f64)
        .unwrap_or(0.0);
    let reranker_score = raw.get("@search.rerankerScore").and_then(Value::as_f64);
    raw.retain(|name, _| !name.starts_with("@search."));

    SearchHit {
        document: Document(raw),
        score,
        reranker_score,
    }
}

#[async_trait::async_trait]
impl SearchService for AzureSearchClient {
    fn provider_name(&self) -> &str {
        "azure-search"
    }

    async fn search(&self, index: &str, spec: &QuerySpec) -> AppResult<SearchResultSet> {
        let body = search_body(spec);
        let path = format!("indexes/{}/docs/search", index);
        let response = self.send_ok(Method::POST, &path, Some(&body)).await?;

        let parsed: SearchResponse = response.json().await.map_err(|e| {
            AppError::SearchUnavailable(format!("Failed to parse search response: {}", e))
        })?;

        let facets = parsed
            .facets
            .into_iter()
            .map(|(field, buckets)| {
                let values = buckets
                    .into_iter()
                    .map(|b| FacetValue {
                        value: b.value,
                        count: b.count,
                    })
                    .collect();
                (field, values)
            })
            .collect();

        Ok(SearchResultSet {
            hits: parsed.value.into_iter().map(into_hit).collect(),
            total_count: parsed.count,
            facets,
        })
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> AppResult<()> {
        let definition = rest_index_definition(index, schema);
        self.send_ok(Method::POST, "indexes", Some(&definition))
            .await?;
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> AppResult<bool> {
        let path = format!("indexes/{}", index);
        let response = self.send(Method::DELETE, &path, None).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(api_error(response).await),
        }
    }

    async fn index_statistics(&self, index: &str) -> AppResult<IndexStatistics> {
        let path = format!("indexes/{}/stats", index);
        let response = self.send_ok(Method::GET, &path, None).await?;
        let stats: StatsResponse = response.json().await.map_err(|e| {
            AppError::SearchUnavailable(format!("Failed to parse index statistics: {}", e))
        })?;

        Ok(IndexStatistics {
            document_count: stats.document_count,
            storage_size: stats.storage_size,
        })
    }

    async fn merge_or_upload(
        &self,
        index: &str,
        documents: &[Document],
    ) -> AppResult<Vec<IndexingResult>> {
        let actions: Vec<Value> = documents
            .iter()
            .map(|document| {
                let mut action = document.fields().clone();
                action.insert("@search.action".to_string(), json!("mergeOrUpload"));
                Value::Object(action)
            })
            .collect();
        let body = json!({ "value": actions });

        let path = format!("indexes/{}/docs/index", index);
        // 207 means some documents were rejected; it is still a success status.
        let response = self.send_ok(Method::POST, &path, Some(&body)).await?;
        let parsed: IndexBatchResponse = response.json().await.map_err(|e| {
            AppError::SearchUnavailable(format!("Failed to parse indexing response: {}", e))
        })?;

        Ok(parsed
            .value
            .into_iter()
            .map(|r| IndexingResult {
                key: r.key,
                succeeded: r.status,
                status_code: r.status_code,
                error_message: r.error_message,
            })
            .collect())
    }
}
