//! Scenario tests spanning several modules.
//!
//! Shared fixtures live here: a small hotels corpus, a search service with
//! scripted statistics, and a model stand-in that only answers from the
//! sources section of the prompt.

mod reconcile_scenarios;

use crate::query::QuerySpec;
use crate::schema::IndexSchema;
use crate::service::SearchService;
use crate::types::{Document, IndexStatistics, IndexingResult, SearchResultSet};
use grounded_core::{AppError, AppResult};
use grounded_llm::{LlmClient, LlmRequest, LlmResponse, LlmUsage};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub(crate) const BREAKFAST_QUERY: &str =
    "Can you recommend a few hotels with complimentary breakfast?";

pub(crate) const FAST_POLL: Duration = Duration::from_millis(1);

pub(crate) fn hotel(id: &str, name: &str, description: &str, tags: &[&str], rating: f64) -> Document {
    Document::from_value(json!({
        "HotelId": id,
        "HotelName": name,
        "Description": description,
        "Category": "Boutique",
        "Tags": tags,
        "Rating": rating,
        "Address": {"City": "Seattle", "StateProvince": "WA"}
    }))
    .unwrap_or_default()
}

/// Two hotels, neither of which mentions breakfast.
pub(crate) fn no_breakfast_hotels() -> Vec<Document> {
    vec![
        hotel(
            "1",
            "Stay-Kay City Hotel",
            "This classic hotel is fully-refurbished and ideally located on the main commercial artery of the city.",
            &["view", "air conditioning", "concierge"],
            3.6,
        ),
        hotel(
            "2",
            "Old Century Hotel",
            "The hotel is situated in a nineteenth century plaza, which has been expanded and renovated.",
            &["pool", "free wifi", "concierge"],
            3.6,
        ),
    ]
}

/// Model stand-in that only reads the sources section of the prompt.
#[derive(Default)]
pub(crate) struct SourceBoundLlm {
    pub prompts: Mutex<Vec<String>>,
    pub empty: bool,
}

impl SourceBoundLlm {
    pub fn silent() -> Self {
        Self {
            empty: true,
            ..Self::default()
        }
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().unwrap().last().cloned()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl LlmClient for SourceBoundLlm {
    fn provider_name(&self) -> &str {
        "source-bound"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        self.prompts.lock().unwrap().push(request.prompt.clone());

        let sources = request
            .prompt
            .rsplit_once("Sources:\n")
            .map(|(_, s)| s.to_lowercase())
            .unwrap_or_default();

        let content = if self.empty {
            None
        } else if sources.contains("breakfast") {
            Some("- A hotel in the sources offers complimentary breakfast.".to_string())
        } else {
            Some("I don't know. None of the sources mention breakfast.".to_string())
        };

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::default(),
            finish_reason: Some("stop".to_string()),
        })
    }
}

/// Search service whose statistics reads follow a script.
///
/// Each statistics read pops the next scripted outcome; once the script is
/// exhausted the last observed count repeats. Every call is recorded by name.
pub(crate) struct ScriptedService {
    stats: Mutex<VecDeque<Result<u64, String>>>,
    repeat: Mutex<u64>,
    rejected_keys: Vec<String>,
    fail_delete: bool,
    cancel_after_reads: Option<(usize, CancellationToken)>,
    reads: Mutex<usize>,
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedService {
    pub fn new(script: Vec<Result<u64, String>>) -> Self {
        Self {
            stats: Mutex::new(script.into()),
            repeat: Mutex::new(0),
            rejected_keys: Vec::new(),
            fail_delete: false,
            cancel_after_reads: None,
            reads: Mutex::new(0),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn counts(counts: &[u64]) -> Self {
        Self::new(counts.iter().map(|c| Ok(*c)).collect())
    }

    pub fn rejecting(mut self, keys: &[&str]) -> Self {
        self.rejected_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn failing_delete(mut self) -> Self {
        self.fail_delete = true;
        self
    }

    /// Cancel `token` once `reads` statistics reads have completed.
    pub fn cancelling_after(mut self, reads: usize, token: CancellationToken) -> Self {
        self.cancel_after_reads = Some((reads, token));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait::async_trait]
impl SearchService for ScriptedService {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn search(&self, _index: &str, _spec: &QuerySpec) -> AppResult<SearchResultSet> {
        self.record("search");
        Ok(SearchResultSet::default())
    }

    async fn create_index(&self, _index: &str, _schema: &IndexSchema) -> AppResult<()> {
        self.record("create");
        Ok(())
    }

    async fn delete_index(&self, _index: &str) -> AppResult<bool> {
        self.record("delete");
        if self.fail_delete {
            return Err(AppError::SearchUnavailable("403 Forbidden".to_string()));
        }
        Ok(true)
    }

    async fn index_statistics(&self, _index: &str) -> AppResult<IndexStatistics> {
        self.record("stats");

        let next = self.stats.lock().unwrap().pop_front();
        let outcome = match next {
            Some(Ok(count)) => {
                *self.repeat.lock().unwrap() = count;
                Ok(IndexStatistics {
                    document_count: count,
                    storage_size: count * 1024,
                })
            }
            Some(Err(message)) => Err(AppError::SearchUnavailable(message)),
            None => Ok(IndexStatistics {
                document_count: *self.repeat.lock().unwrap(),
                storage_size: 0,
            }),
        };

        let mut reads = self.reads.lock().unwrap();
        *reads += 1;
        if let Some((after, token)) = &self.cancel_after_reads {
            if *reads >= *after {
                token.cancel();
            }
        }

        outcome
    }

    async fn merge_or_upload(
        &self,
        _index: &str,
        documents: &[Document],
    ) -> AppResult<Vec<IndexingResult>> {
        self.record("upload");
        Ok(documents
            .iter()
            .map(|d| {
                let key = d.key("HotelId").unwrap_or_default();
                if self.rejected_keys.contains(&key) {
                    IndexingResult::failed(key, 400, "Invalid field value")
                } else {
                    IndexingResult::ok(key, 201)
                }
            })
            .collect())
    }
}
