//! The hotels sample index.

use super::{
    DistanceMetric, ExhaustiveKnnParameters, FieldRef, FieldType, HnswParameters, IndexSchema,
    PrioritizedFields, SearchField, SemanticConfiguration, SemanticSettings, VectorAlgorithm,
    VectorProfile, VectorSearchConfig,
};

pub const HOTEL_INDEX_NAME: &str = "hotels-sample-index";
pub const HOTEL_VECTOR_DIMENSIONS: usize = 1536;
pub const HOTEL_VECTOR_PROFILE: &str = "my-vector-profile";
pub const HOTEL_SEMANTIC_CONFIGURATION: &str = "my-semantic-config";

/// Schema for the hotels sample: text, vector, filterable and complex fields.
pub fn hotel_index_schema() -> IndexSchema {
    IndexSchema {
        name: HOTEL_INDEX_NAME.to_string(),
        fields: vec![
            SearchField::key("HotelId"),
            SearchField::new("HotelName", FieldType::String)
                .searchable()
                .sortable(),
            SearchField::vector("HotelNameVector", HOTEL_VECTOR_DIMENSIONS, HOTEL_VECTOR_PROFILE),
            SearchField::new("Description", FieldType::String).searchable(),
            SearchField::vector(
                "DescriptionVector",
                HOTEL_VECTOR_DIMENSIONS,
                HOTEL_VECTOR_PROFILE,
            ),
            SearchField::new("Description_fr", FieldType::String)
                .searchable()
                .with_analyzer("en.microsoft"),
            SearchField::vector(
                "Description_frvector",
                HOTEL_VECTOR_DIMENSIONS,
                HOTEL_VECTOR_PROFILE,
            ),
            SearchField::new("Category", FieldType::String)
                .searchable()
                .filterable()
                .sortable()
                .facetable(),
            SearchField::new("Tags", FieldType::StringCollection)
                .searchable()
                .filterable()
                .facetable(),
            SearchField::new("ParkingIncluded", FieldType::Boolean)
                .filterable()
                .sortable()
                .facetable(),
            SearchField::new("LastRenovationDate", FieldType::DateTimeOffset)
                .filterable()
                .sortable()
                .facetable(),
            SearchField::new("Rating", FieldType::Double)
                .filterable()
                .sortable()
                .facetable(),
            SearchField::complex(
                "Address",
                vec![
                    SearchField::new("StreetAddress", FieldType::String).searchable(),
                    address_part("City"),
                    address_part("StateProvince"),
                    address_part("PostalCode"),
                    address_part("Country"),
                ],
            ),
            SearchField::new("Location", FieldType::GeographyPoint)
                .filterable()
                .sortable(),
        ],
        vector_search: VectorSearchConfig {
            algorithms: vec![
                VectorAlgorithm::Hnsw {
                    name: "my-hnsw-vector-config-1".to_string(),
                    parameters: HnswParameters {
                        m: Some(4),
                        ef_construction: Some(400),
                        ef_search: Some(500),
                        metric: DistanceMetric::Cosine,
                    },
                },
                VectorAlgorithm::Hnsw {
                    name: "my-hnsw-vector-config-2".to_string(),
                    parameters: HnswParameters {
                        m: Some(4),
                        metric: DistanceMetric::Euclidean,
                        ..Default::default()
                    },
                },
                VectorAlgorithm::ExhaustiveKnn {
                    name: "my-eknn-vector-config".to_string(),
                    parameters: ExhaustiveKnnParameters {
                        metric: DistanceMetric::Cosine,
                    },
                },
            ],
            profiles: vec![VectorProfile {
                name: HOTEL_VECTOR_PROFILE.to_string(),
                algorithm_configuration_name: "my-hnsw-vector-config-1".to_string(),
            }],
        },
        semantic: SemanticSettings {
            configurations: vec![SemanticConfiguration {
                name: HOTEL_SEMANTIC_CONFIGURATION.to_string(),
                prioritized_fields: PrioritizedFields {
                    title_field: Some(FieldRef::new("HotelName")),
                    content_fields: vec![FieldRef::new("Description")],
                    keywords_fields: vec![FieldRef::new("Category")],
                },
            }],
        },
    }
}

fn address_part(name: &str) -> SearchField {
    SearchField::new(name, FieldType::String)
        .searchable()
        .filterable()
        .sortable()
        .facetable()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hotel_schema_is_valid() {
        hotel_index_schema().validate().unwrap();
    }

    #[test]
    fn test_hotel_schema_round_trips_through_json() {
        let schema = hotel_index_schema();
        let json = serde_json::to_string_pretty(&schema).unwrap();
        assert!(json.contains("\"vectorSearchDimensions\": 1536"));
        assert!(json.contains("\"kind\": \"exhaustiveKnn\""));
        assert!(json.contains("\"semanticSearch\""));

        let parsed: IndexSchema = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, schema);
    }

    #[test]
    fn test_hotel_vector_fields() {
        let schema = hotel_index_schema();
        let vectors: Vec<&str> = schema
            .fields
            .iter()
            .filter(|f| f.field_type.is_vector())
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(
            vectors,
            vec!["HotelNameVector", "DescriptionVector", "Description_frvector"]
        );
    }
}
