//! Documents, search results and indexing outcomes.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// A document: named fields mapped to JSON values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document(pub Map<String, Value>);

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a document from a JSON object. Non-objects yield `None`.
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    /// Resolve a `/`-separated path such as `Address/City`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        let mut segments = path.split('/');
        let mut current = self.0.get(segments.next()?)?;
        for segment in segments {
            current = current.as_object()?.get(segment)?;
        }
        Some(current)
    }

    /// The key value rendered as a string, if present and scalar.
    pub fn key(&self, key_field: &str) -> Option<String> {
        match self.0.get(key_field)? {
            Value::String(s) if !s.is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Overlay `other`'s fields onto this document (merge semantics).
    pub fn merge(&mut self, other: Document) {
        for (name, value) in other.0 {
            self.0.insert(name, value);
        }
    }

    /// Keep only the given field paths; nested paths keep their parents.
    pub fn project(&self, paths: &[String]) -> Document {
        if paths.is_empty() {
            return self.clone();
        }

        let mut projected = Map::new();
        for path in paths {
            if let Some(value) = self.get(path) {
                insert_path(&mut projected, path, value.clone());
            }
        }
        Document(projected)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('/') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(inner) = entry {
                insert_path(inner, rest, value);
            }
        }
    }
}

/// One ranked hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub document: Document,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reranker_score: Option<f64>,
}

/// A facet bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FacetValue {
    pub value: Value,
    pub count: u64,
}

/// Ranked hits plus optional total count and facet buckets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResultSet {
    pub hits: Vec<SearchHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_count: Option<u64>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub facets: BTreeMap<String, Vec<FacetValue>>,
}

impl SearchResultSet {
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStatistics {
    pub document_count: u64,
    #[serde(default)]
    pub storage_size: u64,
}

/// Per-document outcome of a bulk merge-or-upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingResult {
    pub key: String,
    pub succeeded: bool,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl IndexingResult {
    pub fn ok(key: impl Into<String>, status_code: u16) -> Self {
        Self {
            key: key.into(),
            succeeded: true,
            status_code,
            error_message: None,
        }
    }

    pub fn failed(key: impl Into<String>, status_code: u16, message: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            succeeded: false,
            status_code,
            error_message: Some(message.into()),
        }
    }
}
