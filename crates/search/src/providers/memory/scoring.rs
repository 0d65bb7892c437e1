//! Ranking primitives for the in-memory service.

use crate::schema::{IndexSchema, SearchField, SemanticConfiguration};
use crate::types::Document;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Reciprocal rank fusion constant.
pub const RRF_K: f64 = 60.0;

/// Lowercased alphanumeric terms of `text`.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Concatenated text of every searchable string field, nested ones included.
pub fn searchable_text(schema: &IndexSchema, document: &Document) -> String {
    let mut out = String::new();
    for field in &schema.fields {
        if let Some(value) = document.fields().get(&field.name) {
            collect_text(field, value, &mut out);
        }
    }
    out
}

fn collect_text(field: &SearchField, value: &Value, out: &mut String) {
    if field.field_type.is_complex() {
        let objects: Vec<&Value> = match value {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        for object in objects.iter().filter_map(|v| v.as_object()) {
            for sub in &field.fields {
                if let Some(v) = object.get(&sub.name) {
                    collect_text(sub, v, out);
                }
            }
        }
        return;
    }

    if !(field.searchable && field.field_type.is_string()) {
        return;
    }
    match value {
        Value::String(s) => {
            out.push(' ');
            out.push_str(s);
        }
        Value::Array(items) => {
            for s in items.iter().filter_map(Value::as_str) {
                out.push(' ');
                out.push_str(s);
            }
        }
        _ => {}
    }
}

/// Fraction-weighted term overlap: matched query terms plus term frequency.
pub fn term_overlap(query_terms: &HashSet<String>, text: &str) -> f64 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let mut frequencies: HashMap<String, usize> = HashMap::new();
    for term in tokenize(text) {
        *frequencies.entry(term).or_insert(0) += 1;
    }

    let matched: Vec<usize> = query_terms
        .iter()
        .filter_map(|t| frequencies.get(t).copied())
        .collect();
    if matched.is_empty() {
        return 0.0;
    }

    let coverage = matched.len() as f64 / query_terms.len() as f64;
    let frequency: f64 = matched.iter().map(|f| (*f as f64).ln_1p()).sum();
    coverage + frequency * 0.1
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64) * (*x as f64);
        norm_b += (*y as f64) * (*y as f64);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Read a dense vector stored in a document field.
pub fn document_vector(document: &Document, field: &str) -> Option<Vec<f32>> {
    document
        .get(field)?
        .as_array()?
        .iter()
        .map(|v| v.as_f64().map(|f| f as f32))
        .collect()
}

/// Fuse ranked lists of `(doc_index, score)` with `1 / (k + rank + 1)`.
///
/// Ties break on document index so the output is deterministic.
pub fn reciprocal_rank_fusion(lists: &[Vec<(usize, f64)>]) -> Vec<(usize, f64)> {
    let mut scores: HashMap<usize, f64> = HashMap::new();
    for list in lists {
        for (rank, (doc, _)) in list.iter().enumerate() {
            *scores.entry(*doc).or_insert(0.0) += 1.0 / (RRF_K + rank as f64 + 1.0);
        }
    }

    let mut fused: Vec<(usize, f64)> = scores.into_iter().collect();
    sort_ranked(&mut fused);
    fused
}

/// Sort descending by score, then ascending by index.
pub fn sort_ranked(ranked: &mut [(usize, f64)]) {
    ranked.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

/// Reranker score in `[0, 4]` from weighted overlap with prioritized fields.
pub fn semantic_score(
    configuration: &SemanticConfiguration,
    query_terms: &HashSet<String>,
    document: &Document,
) -> f64 {
    let fields = &configuration.prioritized_fields;
    let text_of = |name: &str| -> String {
        match document.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" "),
            _ => String::new(),
        }
    };

    let mut weighted = 0.0;
    let mut total_weight = 0.0;
    let mut add = |name: &str, weight: f64| {
        let text = text_of(name);
        let coverage = term_overlap(query_terms, &text).min(1.0);
        weighted += coverage * weight;
        total_weight += weight;
    };

    if let Some(title) = &fields.title_field {
        add(&title.name, 3.0);
    }
    for content in &fields.content_fields {
        add(&content.name, 2.0);
    }
    for keyword in &fields.keywords_fields {
        add(&keyword.name, 1.0);
    }

    if total_weight == 0.0 {
        0.0
    } else {
        4.0 * weighted / total_weight
    }
}
