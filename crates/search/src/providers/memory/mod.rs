//! In-memory search service.
//!
//! A deterministic stand-in for the hosted search service, used by tests and
//! offline runs. Ranking is intentionally simple: term overlap for keyword
//! search, cosine similarity for vector search, reciprocal rank fusion for
//! hybrid, and a weighted overlap over prioritized fields for semantic
//! reranking.

mod filter;
mod scoring;

pub use filter::Filter;

use crate::query::{QueryMode, QuerySpec, VectorFilterMode, VectorSearch, MATCH_ALL};
use crate::schema::IndexSchema;
use crate::service::SearchService;
use crate::types::{
    Document, FacetValue, IndexStatistics, IndexingResult, SearchHit, SearchResultSet,
};
use grounded_core::{AppError, AppResult};
use scoring::{
    cosine_similarity, document_vector, reciprocal_rank_fusion, searchable_text, semantic_score,
    sort_ranked, term_overlap, tokenize,
};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use tokio::sync::RwLock;

/// Hits considered by the semantic reranker.
const SEMANTIC_RERANK_WINDOW: usize = 50;

#[derive(Debug, Clone)]
struct MemoryIndex {
    schema: IndexSchema,
    key_field: String,
    documents: Vec<Document>,
}

/// Search service holding indexes in process memory.
#[derive(Debug, Default)]
pub struct InMemorySearchService {
    indexes: RwLock<HashMap<String, MemoryIndex>>,
}

impl InMemorySearchService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the existing indexes, sorted.
    pub async fn index_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.indexes.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    fn rank(index: &MemoryIndex, candidates: &[usize], spec: &QuerySpec) -> Vec<(usize, f64)> {
        let keyword = || Self::keyword_ranking(index, candidates, &spec.search_text);

        match &spec.mode {
            QueryMode::Keyword => keyword(),
            QueryMode::Vector(vector) => Self::vector_ranking(index, candidates, vector),
            QueryMode::Hybrid(vector) => {
                let mut lists = vec![keyword()];
                lists.extend(Self::vector_lists(index, candidates, vector));
                reciprocal_rank_fusion(&lists)
            }
            QueryMode::SemanticReranked { vector, .. } => match vector {
                Some(vector) => {
                    let mut lists = vec![keyword()];
                    lists.extend(Self::vector_lists(index, candidates, vector));
                    reciprocal_rank_fusion(&lists)
                }
                None => keyword(),
            },
        }
    }

    fn keyword_ranking(index: &MemoryIndex, candidates: &[usize], text: &str) -> Vec<(usize, f64)> {
        if text.trim() == MATCH_ALL {
            return candidates.iter().map(|i| (*i, 1.0)).collect();
        }

        let query_terms: HashSet<String> = tokenize(text).into_iter().collect();
        let mut ranked: Vec<(usize, f64)> = candidates
            .iter()
            .filter_map(|i| {
                let text = searchable_text(&index.schema, &index.documents[*i]);
                let score = term_overlap(&query_terms, &text);
                (score > 0.0).then_some((*i, score))
            })
            .collect();
        sort_ranked(&mut ranked);
        ranked
    }

    /// One top-`k` list per vector sub-query.
    ///
    /// `candidates` holds the filter survivors in ascending order. Under
    /// post-filtering the nearest `k` are taken from every document and the
    /// filter is applied afterwards, so a list may come back shorter than `k`.
    fn vector_lists(
        index: &MemoryIndex,
        candidates: &[usize],
        vector: &VectorSearch,
    ) -> Vec<Vec<(usize, f64)>> {
        let post_filter = vector.filter_mode == Some(VectorFilterMode::PostFilter);
        let all: Vec<usize>;
        let pool = if post_filter {
            all = (0..index.documents.len()).collect();
            &all
        } else {
            candidates
        };

        vector
            .queries
            .iter()
            .map(|query| {
                let mut ranked: Vec<(usize, f64)> = pool
                    .iter()
                    .filter_map(|i| {
                        let stored = document_vector(&index.documents[*i], &query.field)?;
                        Some((*i, cosine_similarity(&query.vector, &stored)))
                    })
                    .collect();
                sort_ranked(&mut ranked);
                ranked.truncate(query.k);
                if post_filter {
                    ranked.retain(|(i, _)| candidates.binary_search(i).is_ok());
                }
                ranked
            })
            .collect()
    }

    fn vector_ranking(
        index: &MemoryIndex,
        candidates: &[usize],
        vector: &VectorSearch,
    ) -> Vec<(usize, f64)> {
        let mut lists = Self::vector_lists(index, candidates, vector);
        if lists.len() == 1 {
            lists.remove(0)
        } else {
            reciprocal_rank_fusion(&lists)
        }
    }

    fn facets(
        index: &MemoryIndex,
        matched: &[(usize, f64)],
        facet_fields: &[String],
    ) -> BTreeMap<String, Vec<FacetValue>> {
        let mut facets = BTreeMap::new();
        for field in facet_fields {
            let mut counts: BTreeMap<String, (Value, u64)> = BTreeMap::new();
            for (i, _) in matched {
                let values: Vec<&Value> = match index.documents[*i].get(field) {
                    Some(Value::Array(items)) => items.iter().collect(),
                    Some(Value::Null) | None => Vec::new(),
                    Some(other) => vec![other],
                };
                for value in values {
                    let entry = counts
                        .entry(value.to_string())
                        .or_insert_with(|| (value.clone(), 0));
                    entry.1 += 1;
                }
            }

            let mut buckets: Vec<FacetValue> = counts
                .into_values()
                .map(|(value, count)| FacetValue { value, count })
                .collect();
            // BTreeMap order already breaks ties by value.
            buckets.sort_by(|a, b| b.count.cmp(&a.count));
            facets.insert(field.clone(), buckets);
        }
        facets
    }
}

#[async_trait::async_trait]
impl SearchService for InMemorySearchService {
    fn provider_name(&self) -> &str {
        "memory"
    }

    async fn search(&self, index: &str, spec: &QuerySpec) -> AppResult<SearchResultSet> {
        let indexes = self.indexes.read().await;
        let idx = indexes
            .get(index)
            .ok_or_else(|| AppError::SearchUnavailable(format!("Index '{}' not found", index)))?;

        let filter = spec.filter.as_deref().map(Filter::parse).transpose()?;
        let candidates: Vec<usize> = (0..idx.documents.len())
            .filter(|i| {
                filter
                    .as_ref()
                    .map_or(true, |f| f.matches(&idx.documents[*i]))
            })
            .collect();

        let mut ranked = Self::rank(idx, &candidates, spec);
        let total_count = spec.include_total_count.then_some(ranked.len() as u64);
        let facets = Self::facets(idx, &ranked, &spec.facets);

        let mut reranker_scores: HashMap<usize, f64> = HashMap::new();
        if let QueryMode::SemanticReranked { semantic, .. } = &spec.mode {
            let configuration = idx
                .schema
                .semantic_configuration(Some(&semantic.configuration))
                .ok_or_else(|| {
                    AppError::SearchUnavailable(format!(
                        "Semantic configuration '{}' not found",
                        semantic.configuration
                    ))
                })?;
            let query_terms: HashSet<String> = tokenize(&semantic.query).into_iter().collect();

            ranked.truncate(SEMANTIC_RERANK_WINDOW);
            for (i, _) in &ranked {
                let score = semantic_score(configuration, &query_terms, &idx.documents[*i]);
                reranker_scores.insert(*i, score);
            }
            // Stable sort keeps the base ranking among equal reranker scores.
            ranked.sort_by(|a, b| {
                reranker_scores[&b.0]
                    .partial_cmp(&reranker_scores[&a.0])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }

        let hits = ranked
            .into_iter()
            .take(spec.top)
            .map(|(i, score)| SearchHit {
                document: idx.documents[i].project(&spec.select),
                score,
                reranker_score: reranker_scores.get(&i).copied(),
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            index = %index,
            candidates = candidates.len(),
            hits = hits.len(),
            "In-memory search complete"
        );

        Ok(SearchResultSet {
            hits,
            total_count,
            facets,
        })
    }

    async fn create_index(&self, index: &str, schema: &IndexSchema) -> AppResult<()> {
        schema.validate()?;
        let key_field = schema
            .key_field()
            .map(|f| f.name.clone())
            .ok_or_else(|| AppError::InvalidSchema("Index has no key field".to_string()))?;

        let mut indexes = self.indexes.write().await;
        if indexes.contains_key(index) {
            return Err(AppError::SearchUnavailable(format!(
                "Index '{}' already exists",
                index
            )));
        }
        indexes.insert(
            index.to_string(),
            MemoryIndex {
                schema: schema.clone(),
                key_field,
                documents: Vec::new(),
            },
        );
        Ok(())
    }

    async fn delete_index(&self, index: &str) -> AppResult<bool> {
        Ok(self.indexes.write().await.remove(index).is_some())
    }

    async fn index_statistics(&self, index: &str) -> AppResult<IndexStatistics> {
        let indexes = self.indexes.read().await;
        let idx = indexes
            .get(index)
            .ok_or_else(|| AppError::SearchUnavailable(format!("Index '{}' not found", index)))?;

        let storage_size = idx
            .documents
            .iter()
            .map(|d| serde_json::to_vec(d).map(|b| b.len() as u64).unwrap_or(0))
            .sum();

        Ok(IndexStatistics {
            document_count: idx.documents.len() as u64,
            storage_size,
        })
    }

    async fn merge_or_upload(
        &self,
        index: &str,
        documents: &[Document],
    ) -> AppResult<Vec<IndexingResult>> {
        let mut indexes = self.indexes.write().await;
        let idx = indexes
            .get_mut(index)
            .ok_or_else(|| AppError::SearchUnavailable(format!("Index '{}' not found", index)))?;

        let mut results = Vec::with_capacity(documents.len());
        for document in documents {
            let Some(key) = document.key(&idx.key_field) else {
                results.push(IndexingResult::failed(
                    "",
                    400,
                    format!("Document is missing key field '{}'", idx.key_field),
                ));
                continue;
            };

            let key_field = idx.key_field.clone();
            match idx
                .documents
                .iter_mut()
                .find(|d| d.key(&key_field).as_deref() == Some(key.as_str()))
            {
                Some(existing) => {
                    existing.merge(document.clone());
                    results.push(IndexingResult::ok(key, 200));
                }
                None => {
                    idx.documents.push(document.clone());
                    results.push(IndexingResult::ok(key, 201));
                }
            }
        }

        Ok(results)
    }
}
