//! Grounding context formatting.
//!
//! Renders ranked hits as plain-text records restricted to a projection:
//!
//! ```text
//! HotelName: Old Century Hotel
//! Tags: pool, free wifi, concierge
//! ---
//! HotelName: Gastronomic Landscape Hotel
//! ...
//! ```

use crate::types::{SearchHit, SearchResultSet};
use serde_json::{Map, Value};
use std::fmt;

/// Separator placed between rendered documents.
pub const RECORD_DELIMITER: &str = "\n---\n";

/// Textual sources handed to the prompt assembler.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroundingContext {
    text: String,
    /// Positions in the result set of the hits rendered, in order
    rendered: Vec<usize>,
}

impl GroundingContext {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Number of documents rendered into the context.
    pub fn document_count(&self) -> usize {
        self.rendered.len()
    }

    /// Indices into `SearchResultSet::hits` of the rendered documents.
    pub fn rendered_hits(&self) -> &[usize] {
        &self.rendered
    }

    pub fn is_empty(&self) -> bool {
        self.rendered.is_empty()
    }
}

impl fmt::Display for GroundingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Render up to `max_documents` hits (all when `None`) in ranked order.
///
/// Each document becomes one `Field: value` line per projected field that is
/// present and non-null. A document with no such field is skipped.
pub fn format_results(
    results: &SearchResultSet,
    projection: &[String],
    max_documents: Option<usize>,
) -> GroundingContext {
    let limit = max_documents.unwrap_or(results.hits.len());

    let (rendered, records): (Vec<usize>, Vec<String>) = results
        .hits
        .iter()
        .enumerate()
        .take(limit)
        .filter_map(|(index, hit)| {
            let record = render_hit(hit, projection);
            if record.is_none() {
                tracing::debug!(rank = index + 1, "Skipping hit with no projected fields");
            }
            record.map(|r| (index, r))
        })
        .unzip();

    GroundingContext {
        text: records.join(RECORD_DELIMITER),
        rendered,
    }
}

fn render_hit(hit: &SearchHit, projection: &[String]) -> Option<String> {
    let lines: Vec<String> = projection
        .iter()
        .filter_map(|path| {
            let value = hit.document.get(path)?;
            let rendered = render_value(value)?;
            Some(format!("{}: {}", path, rendered))
        })
        .collect();

    if lines.is_empty() {
        None
    } else {
        Some(lines.join("\n"))
    }
}

fn render_value(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_value).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(", "))
            }
        }
        Value::Object(map) => render_geo_point(map).or_else(|| render_object(map)),
    }
}

/// GeoJSON `{"type": "Point", "coordinates": [lon, lat]}` as `POINT(lon lat)`.
fn render_geo_point(map: &Map<String, Value>) -> Option<String> {
    if map.get("type")?.as_str()? != "Point" {
        return None;
    }
    match map.get("coordinates")?.as_array()?.as_slice() {
        [lon, lat] => Some(format!("POINT({} {})", lon.as_f64()?, lat.as_f64()?)),
        _ => None,
    }
}

fn render_object(map: &Map<String, Value>) -> Option<String> {
    let parts: Vec<String> = map
        .iter()
        .filter_map(|(name, value)| render_value(value).map(|v| format!("{}: {}", name, v)))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;
    use proptest::prelude::*;
    use serde_json::json;

    fn hit(value: Value, score: f64) -> SearchHit {
        SearchHit {
            document: Document::from_value(value).unwrap(),
            score,
            reranker_score: None,
        }
    }

    fn projection(fields: &[&str]) -> Vec<String> {
        fields.iter().map(|f| f.to_string()).collect()
    }

    fn results(hits: Vec<SearchHit>) -> SearchResultSet {
        SearchResultSet {
            hits,
            ..Default::default()
        }
    }

    #[test]
    fn test_renders_projection_in_order() {
        let rs = results(vec![
            hit(
                json!({"HotelName": "A", "Description": "Near the beach", "Tags": ["pool", "bar"]}),
                2.0,
            ),
            hit(json!({"HotelName": "B", "Description": "Downtown"}), 1.0),
        ]);

        let context = format_results(&rs, &projection(&["HotelName", "Tags", "Description"]), None);
        assert_eq!(
            context.as_str(),
            "HotelName: A\nTags: pool, bar\nDescription: Near the beach\n---\nHotelName: B\nDescription: Downtown"
        );
        assert_eq!(context.document_count(), 2);
    }

    #[test]
    fn test_max_documents_bounds_output() {
        let rs = results(
            (0..5)
                .map(|i| hit(json!({"HotelName": format!("Hotel {}", i)}), 5.0 - i as f64))
                .collect(),
        );

        let context = format_results(&rs, &projection(&["HotelName"]), Some(2));
        assert_eq!(context.as_str(), "HotelName: Hotel 0\n---\nHotelName: Hotel 1");
        assert_eq!(context.document_count(), 2);
        assert_eq!(context.rendered_hits(), &[0, 1]);
    }

    #[test]
    fn test_nulls_and_absent_fields_are_omitted() {
        let rs = results(vec![hit(
            json!({"HotelName": "A", "Description": null, "Rating": 4.5}),
            1.0,
        )]);
        let context = format_results(
            &rs,
            &projection(&["HotelName", "Description", "Category", "Rating"]),
            None,
        );
        assert_eq!(context.as_str(), "HotelName: A\nRating: 4.5");
    }

    #[test]
    fn test_nested_objects_and_geo_points() {
        let rs = results(vec![hit(
            json!({
                "HotelName": "A",
                "Address": {"City": "Seattle", "StateProvince": "WA", "PostalCode": null},
                "Location": {"type": "Point", "coordinates": [-122.3, 47.6]},
                "ParkingIncluded": false
            }),
            1.0,
        )]);

        let context = format_results(
            &rs,
            &projection(&["Address", "Address/City", "Location", "ParkingIncluded"]),
            None,
        );
        assert_eq!(
            context.as_str(),
            "Address: City: Seattle; StateProvince: WA\nAddress/City: Seattle\nLocation: POINT(-122.3 47.6)\nParkingIncluded: false"
        );
    }

    #[test]
    fn test_empty_results_give_empty_context() {
        let context = format_results(&SearchResultSet::default(), &projection(&["HotelName"]), None);
        assert!(context.is_empty());
        assert_eq!(context.as_str(), "");
    }

    #[test]
    fn test_documents_without_projected_fields_are_skipped() {
        let rs = results(vec![
            hit(json!({"Other": "x"}), 2.0),
            hit(json!({"HotelName": "B"}), 1.0),
        ]);
        let context = format_results(&rs, &projection(&["HotelName"]), None);
        assert_eq!(context.as_str(), "HotelName: B");
        assert_eq!(context.document_count(), 1);
        assert_eq!(context.rendered_hits(), &[1]);
    }

    proptest! {
        #[test]
        fn prop_formatting_is_deterministic(
            names in proptest::collection::vec("[A-Za-z ]{0,12}", 0..8),
            limit in proptest::option::of(0usize..10)
        ) {
            let rs = results(
                names
                    .iter()
                    .enumerate()
                    .map(|(i, n)| hit(json!({"HotelName": n, "Tags": [n, "wifi"]}), i as f64))
                    .collect(),
            );
            let fields = projection(&["HotelName", "Tags"]);

            let first = format_results(&rs, &fields, limit);
            let second = format_results(&rs.clone(), &fields, limit);
            prop_assert_eq!(&first, &second);

            let expected = limit.map_or(names.len(), |l| l.min(names.len()));
            prop_assert_eq!(first.document_count(), expected);
        }
    }
}
