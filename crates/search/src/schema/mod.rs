//! Index schema model and validation.
//!
//! A schema is a recursive tree of field definitions plus the vector-search
//! and semantic configuration the fields refer to. The JSON shape follows the
//! index definition documents used to provision the service (`hidden`,
//! `analyzerName`, `vectorSearchDimensions`, `vectorSearchProfileName`).

pub mod hotels;

use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub use hotels::{
    hotel_index_schema, HOTEL_INDEX_NAME, HOTEL_SEMANTIC_CONFIGURATION, HOTEL_VECTOR_DIMENSIONS,
    HOTEL_VECTOR_PROFILE,
};

/// Entity data model type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "Edm.String")]
    String,
    #[serde(rename = "Edm.Int32")]
    Int32,
    #[serde(rename = "Edm.Int64")]
    Int64,
    #[serde(rename = "Edm.Double")]
    Double,
    #[serde(rename = "Edm.Boolean")]
    Boolean,
    #[serde(rename = "Edm.DateTimeOffset")]
    DateTimeOffset,
    #[serde(rename = "Edm.GeographyPoint")]
    GeographyPoint,
    #[serde(rename = "Edm.ComplexType")]
    ComplexType,
    #[serde(rename = "Collection(Edm.String)")]
    StringCollection,
    #[serde(rename = "Collection(Edm.Int32)")]
    Int32Collection,
    #[serde(rename = "Collection(Edm.Double)")]
    DoubleCollection,
    #[serde(rename = "Collection(Edm.Single)")]
    SingleCollection,
    #[serde(rename = "Collection(Edm.ComplexType)")]
    ComplexCollection,
}

impl FieldType {
    pub fn is_complex(self) -> bool {
        matches!(self, FieldType::ComplexType | FieldType::ComplexCollection)
    }

    /// Dense float vector fields.
    pub fn is_vector(self) -> bool {
        self == FieldType::SingleCollection
    }

    pub fn is_string(self) -> bool {
        matches!(self, FieldType::String | FieldType::StringCollection)
    }
}

/// A field definition. Complex fields carry nested `fields`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchField {
    pub name: String,

    #[serde(rename = "type")]
    pub field_type: FieldType,

    #[serde(default, skip_serializing_if = "is_false")]
    pub key: bool,

    #[serde(default)]
    pub searchable: bool,

    #[serde(default)]
    pub filterable: bool,

    #[serde(default)]
    pub sortable: bool,

    #[serde(default)]
    pub facetable: bool,

    /// Excluded from search results
    #[serde(default)]
    pub hidden: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_dimensions: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vector_search_profile_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<SearchField>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl SearchField {
    /// A simple field with every attribute off.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            key: false,
            searchable: false,
            filterable: false,
            sortable: false,
            facetable: false,
            hidden: false,
            analyzer_name: None,
            vector_search_dimensions: None,
            vector_search_profile_name: None,
            fields: Vec::new(),
        }
    }

    /// The document key field: a filterable, non-searchable string.
    pub fn key(name: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldType::String);
        field.key = true;
        field.filterable = true;
        field
    }

    /// A searchable dense vector field bound to a vector profile.
    pub fn vector(name: impl Into<String>, dimensions: usize, profile: impl Into<String>) -> Self {
        let mut field = Self::new(name, FieldType::SingleCollection);
        field.searchable = true;
        field.vector_search_dimensions = Some(dimensions);
        field.vector_search_profile_name = Some(profile.into());
        field
    }

    /// A complex field with nested sub-fields.
    pub fn complex(name: impl Into<String>, fields: Vec<SearchField>) -> Self {
        let mut field = Self::new(name, FieldType::ComplexType);
        field.fields = fields;
        field
    }

    pub fn searchable(mut self) -> Self {
        self.searchable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn facetable(mut self) -> Self {
        self.facetable = true;
        self
    }

    pub fn with_analyzer(mut self, analyzer: impl Into<String>) -> Self {
        self.analyzer_name = Some(analyzer.into());
        self
    }
}

/// Similarity metric for vector comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DistanceMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HnswParameters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub m: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_construction: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ef_search: Option<u32>,
    #[serde(default)]
    pub metric: DistanceMetric,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExhaustiveKnnParameters {
    #[serde(default)]
    pub metric: DistanceMetric,
}

/// A named vector algorithm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum VectorAlgorithm {
    #[serde(rename = "hnsw")]
    Hnsw {
        name: String,
        #[serde(default)]
        parameters: HnswParameters,
    },
    #[serde(rename = "exhaustiveKnn")]
    ExhaustiveKnn {
        name: String,
        #[serde(default)]
        parameters: ExhaustiveKnnParameters,
    },
}

impl VectorAlgorithm {
    pub fn name(&self) -> &str {
        match self {
            VectorAlgorithm::Hnsw { name, .. } | VectorAlgorithm::ExhaustiveKnn { name, .. } => name,
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        match self {
            VectorAlgorithm::Hnsw { parameters, .. } => parameters.metric,
            VectorAlgorithm::ExhaustiveKnn { parameters, .. } => parameters.metric,
        }
    }
}

/// Binds a profile name to an algorithm configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorProfile {
    pub name: String,
    pub algorithm_configuration_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VectorSearchConfig {
    #[serde(default)]
    pub algorithms: Vec<VectorAlgorithm>,
    #[serde(default)]
    pub profiles: Vec<VectorProfile>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRef {
    pub name: String,
}

impl FieldRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrioritizedFields {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_field: Option<FieldRef>,
    #[serde(default)]
    pub content_fields: Vec<FieldRef>,
    #[serde(default)]
    pub keywords_fields: Vec<FieldRef>,
}

impl PrioritizedFields {
    fn all(&self) -> impl Iterator<Item = &FieldRef> {
        self.title_field
            .iter()
            .chain(self.content_fields.iter())
            .chain(self.keywords_fields.iter())
    }
}

/// Named prioritization of fields for semantic reranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SemanticConfiguration {
    pub name: String,
    pub prioritized_fields: PrioritizedFields,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SemanticSettings {
    #[serde(default)]
    pub configurations: Vec<SemanticConfiguration>,
}

/// Full index definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexSchema {
    /// Default index name; callers may provision under another name
    pub name: String,

    pub fields: Vec<SearchField>,

    #[serde(default)]
    pub vector_search: VectorSearchConfig,

    #[serde(default, rename = "semanticSearch")]
    pub semantic: SemanticSettings,
}

impl IndexSchema {
    /// Load a schema from a JSON index definition file.
    pub fn from_file(path: &Path) -> AppResult<Self> {
        tracing::debug!("Loading index schema from: {:?}", path);
        let contents = std::fs::read_to_string(path)?;
        let schema: IndexSchema = serde_json::from_str(&contents)?;
        Ok(schema)
    }

    /// The top-level key field, if exactly one is declared.
    pub fn key_field(&self) -> Option<&SearchField> {
        let mut keys = self.fields.iter().filter(|f| f.key);
        match (keys.next(), keys.next()) {
            (Some(key), None) => Some(key),
            _ => None,
        }
    }

    /// Resolve a `/`-separated field path such as `Address/City`.
    pub fn field(&self, path: &str) -> Option<&SearchField> {
        let mut segments = path.split('/');
        let first = segments.next()?;
        let mut current = self.fields.iter().find(|f| f.name == first)?;
        for segment in segments {
            current = current.fields.iter().find(|f| f.name == segment)?;
        }
        Some(current)
    }

    /// Look up a semantic configuration by name, or the first one if `name` is `None`.
    pub fn semantic_configuration(&self, name: Option<&str>) -> Option<&SemanticConfiguration> {
        match name {
            Some(name) => self.semantic.configurations.iter().find(|c| c.name == name),
            None => self.semantic.configurations.first(),
        }
    }

    pub fn vector_profile(&self, name: &str) -> Option<&VectorProfile> {
        self.vector_search.profiles.iter().find(|p| p.name == name)
    }

    pub fn vector_algorithm(&self, name: &str) -> Option<&VectorAlgorithm> {
        self.vector_search
            .algorithms
            .iter()
            .find(|a| a.name() == name)
    }

    /// Check every structural invariant at every depth of the field tree.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("Index name cannot be empty"));
        }
        if self.fields.is_empty() {
            return Err(invalid("Index must declare at least one field"));
        }

        self.validate_vector_search()?;
        validate_level(self, &self.fields, "")?;

        let keys: Vec<&SearchField> = self.fields.iter().filter(|f| f.key).collect();
        let key = match keys.as_slice() {
            [key] => *key,
            [] => return Err(invalid("Index must declare exactly one key field (found none)")),
            many => {
                return Err(invalid(format!(
                    "Index must declare exactly one key field (found {})",
                    many.len()
                )))
            }
        };
        if key.field_type != FieldType::String {
            return Err(invalid(format!("Key field '{}' must be Edm.String", key.name)));
        }
        if !key.filterable || key.searchable {
            return Err(invalid(format!(
                "Key field '{}' must be filterable and not searchable",
                key.name
            )));
        }

        self.validate_semantic()?;

        tracing::debug!(index = %self.name, fields = self.fields.len(), "Index schema validated");
        Ok(())
    }

    fn validate_vector_search(&self) -> AppResult<()> {
        let mut algorithm_names = HashSet::new();
        for algorithm in &self.vector_search.algorithms {
            if !algorithm_names.insert(algorithm.name()) {
                return Err(invalid(format!(
                    "Duplicate vector algorithm configuration '{}'",
                    algorithm.name()
                )));
            }
        }

        let mut profile_names = HashSet::new();
        for profile in &self.vector_search.profiles {
            if !profile_names.insert(profile.name.as_str()) {
                return Err(invalid(format!("Duplicate vector profile '{}'", profile.name)));
            }
            if !algorithm_names.contains(profile.algorithm_configuration_name.as_str()) {
                return Err(invalid(format!(
                    "Vector profile '{}' references unknown algorithm '{}'",
                    profile.name, profile.algorithm_configuration_name
                )));
            }
        }

        Ok(())
    }

    fn validate_semantic(&self) -> AppResult<()> {
        let mut names = HashSet::new();
        for config in &self.semantic.configurations {
            if !names.insert(config.name.as_str()) {
                return Err(invalid(format!(
                    "Duplicate semantic configuration '{}'",
                    config.name
                )));
            }
            if config.prioritized_fields.title_field.is_none()
                && config.prioritized_fields.content_fields.is_empty()
                && config.prioritized_fields.keywords_fields.is_empty()
            {
                return Err(invalid(format!(
                    "Semantic configuration '{}' prioritizes no fields",
                    config.name
                )));
            }

            for field_ref in config.prioritized_fields.all() {
                let field = self
                    .fields
                    .iter()
                    .find(|f| f.name == field_ref.name)
                    .ok_or_else(|| {
                        invalid(format!(
                            "Semantic configuration '{}' references unknown field '{}'",
                            config.name, field_ref.name
                        ))
                    })?;
                if !field.field_type.is_string() {
                    return Err(invalid(format!(
                        "Semantic configuration '{}' references non-string field '{}'",
                        config.name, field_ref.name
                    )));
                }
            }
        }
        Ok(())
    }
}

fn validate_level(schema: &IndexSchema, fields: &[SearchField], parent: &str) -> AppResult<()> {
    let mut names = HashSet::new();

    for field in fields {
        let path = if parent.is_empty() {
            field.name.clone()
        } else {
            format!("{}/{}", parent, field.name)
        };

        if field.name.trim().is_empty() || field.name.contains('/') {
            return Err(invalid(format!("Invalid field name '{}'", path)));
        }
        if !names.insert(field.name.as_str()) {
            return Err(invalid(format!("Duplicate field name '{}'", path)));
        }
        if field.key && !parent.is_empty() {
            return Err(invalid(format!("Nested field '{}' cannot be a key", path)));
        }

        if field.field_type.is_complex() {
            if field.fields.is_empty() {
                return Err(invalid(format!(
                    "Complex field '{}' must declare sub-fields",
                    path
                )));
            }
        } else if !field.fields.is_empty() {
            return Err(invalid(format!(
                "Simple field '{}' cannot declare sub-fields",
                path
            )));
        }

        if field.field_type.is_vector() {
            match field.vector_search_dimensions {
                Some(d) if d >= 1 => {}
                _ => {
                    return Err(invalid(format!(
                        "Vector field '{}' must declare dimensions >= 1",
                        path
                    )))
                }
            }
            let profile = field.vector_search_profile_name.as_deref().ok_or_else(|| {
                invalid(format!("Vector field '{}' must declare a vector profile", path))
            })?;
            if schema.vector_profile(profile).is_none() {
                return Err(invalid(format!(
                    "Vector field '{}' references unknown profile '{}'",
                    path, profile
                )));
            }
        } else if field.vector_search_dimensions.is_some()
            || field.vector_search_profile_name.is_some()
        {
            return Err(invalid(format!(
                "Non-vector field '{}' cannot declare vector settings",
                path
            )));
        }

        validate_level(schema, &field.fields, &path)?;
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::InvalidSchema(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> IndexSchema {
        IndexSchema {
            name: "minimal".to_string(),
            fields: vec![
                SearchField::key("Id"),
                SearchField::new("Title", FieldType::String).searchable(),
                SearchField::vector("TitleVector", 4, "profile"),
            ],
            vector_search: VectorSearchConfig {
                algorithms: vec![VectorAlgorithm::ExhaustiveKnn {
                    name: "eknn".to_string(),
                    parameters: ExhaustiveKnnParameters::default(),
                }],
                profiles: vec![VectorProfile {
                    name: "profile".to_string(),
                    algorithm_configuration_name: "eknn".to_string(),
                }],
            },
            semantic: SemanticSettings {
                configurations: vec![SemanticConfiguration {
                    name: "semantic".to_string(),
                    prioritized_fields: PrioritizedFields {
                        title_field: Some(FieldRef::new("Title")),
                        ..Default::default()
                    },
                }],
            },
        }
    }

    fn expect_invalid(schema: &IndexSchema, needle: &str) {
        match schema.validate() {
            Err(AppError::InvalidSchema(msg)) => {
                assert!(msg.contains(needle), "expected '{}' in '{}'", needle, msg)
            }
            other => panic!("Expected invalid schema, got {:?}", other),
        }
    }

    #[test]
    fn test_minimal_schema_is_valid() {
        minimal().validate().unwrap();
    }

    #[test]
    fn test_duplicate_names_checked_per_level() {
        let mut schema = minimal();
        schema.fields.push(SearchField::complex(
            "Address",
            vec![
                SearchField::new("City", FieldType::String),
                SearchField::new("City", FieldType::String),
            ],
        ));
        expect_invalid(&schema, "Duplicate field name 'Address/City'");

        // The same name at different levels is fine.
        let mut schema = minimal();
        schema.fields.push(SearchField::complex(
            "Address",
            vec![SearchField::new("Title", FieldType::String)],
        ));
        schema.validate().unwrap();
    }

    #[test]
    fn test_key_rules() {
        let mut schema = minimal();
        schema.fields.push(SearchField::key("OtherId"));
        expect_invalid(&schema, "exactly one key field (found 2)");

        let mut schema = minimal();
        schema.fields[0].searchable = true;
        expect_invalid(&schema, "must be filterable and not searchable");

        let mut schema = minimal();
        schema.fields[0].field_type = FieldType::Int32;
        expect_invalid(&schema, "must be Edm.String");

        let mut schema = minimal();
        schema.fields.remove(0);
        expect_invalid(&schema, "found none");
    }

    #[test]
    fn test_nested_key_rejected() {
        let mut schema = minimal();
        schema.fields.push(SearchField::complex(
            "Meta",
            vec![SearchField::key("InnerId")],
        ));
        expect_invalid(&schema, "Nested field 'Meta/InnerId' cannot be a key");
    }

    #[test]
    fn test_complex_and_simple_sub_fields() {
        let mut schema = minimal();
        schema.fields.push(SearchField::complex("Empty", Vec::new()));
        expect_invalid(&schema, "must declare sub-fields");

        let mut schema = minimal();
        let mut simple = SearchField::new("Flat", FieldType::String);
        simple.fields.push(SearchField::new("Inner", FieldType::String));
        schema.fields.push(simple);
        expect_invalid(&schema, "cannot declare sub-fields");
    }

    #[test]
    fn test_vector_field_rules() {
        let mut schema = minimal();
        schema.fields[2].vector_search_dimensions = Some(0);
        expect_invalid(&schema, "dimensions >= 1");

        let mut schema = minimal();
        schema.fields[2].vector_search_profile_name = Some("missing".to_string());
        expect_invalid(&schema, "unknown profile 'missing'");

        let mut schema = minimal();
        schema.fields[1].vector_search_dimensions = Some(4);
        expect_invalid(&schema, "Non-vector field 'Title'");
    }

    #[test]
    fn test_vector_field_deep_in_tree_is_checked() {
        let mut schema = minimal();
        schema.fields.push(SearchField::complex(
            "Outer",
            vec![SearchField::complex(
                "Inner",
                vec![SearchField::vector("Deep", 4, "nope")],
            )],
        ));
        expect_invalid(&schema, "'Outer/Inner/Deep' references unknown profile");
    }

    #[test]
    fn test_profile_must_resolve_to_one_algorithm() {
        let mut schema = minimal();
        schema.vector_search.profiles[0].algorithm_configuration_name = "hnsw".to_string();
        expect_invalid(&schema, "unknown algorithm 'hnsw'");

        let mut schema = minimal();
        let duplicate = schema.vector_search.algorithms[0].clone();
        schema.vector_search.algorithms.push(duplicate);
        expect_invalid(&schema, "Duplicate vector algorithm configuration 'eknn'");
    }

    #[test]
    fn test_semantic_fields_must_be_top_level_strings() {
        let mut schema = minimal();
        schema.semantic.configurations[0]
            .prioritized_fields
            .content_fields
            .push(FieldRef::new("Missing"));
        expect_invalid(&schema, "unknown field 'Missing'");

        let mut schema = minimal();
        schema.semantic.configurations[0].prioritized_fields.title_field =
            Some(FieldRef::new("TitleVector"));
        expect_invalid(&schema, "non-string field 'TitleVector'");
    }

    #[test]
    fn test_field_path_lookup() {
        let schema = hotel_index_schema();
        assert_eq!(
            schema.field("Address/City").map(|f| f.field_type),
            Some(FieldType::String)
        );
        assert!(schema.field("Address/Nope").is_none());
        assert!(schema.field("Nope").is_none());
        assert_eq!(schema.key_field().map(|f| f.name.as_str()), Some("HotelId"));
    }

    #[test]
    fn test_deserialize_index_definition() {
        let json = serde_json::json!({
            "name": "docs",
            "fields": [
                {"name": "id", "type": "Edm.String", "key": true, "filterable": true},
                {"name": "body", "type": "Edm.String", "searchable": true, "analyzerName": "en.microsoft"},
                {"name": "bodyVector", "type": "Collection(Edm.Single)", "searchable": true,
                 "vectorSearchDimensions": 3, "vectorSearchProfileName": "p"}
            ],
            "vectorSearch": {
                "algorithms": [
                    {"name": "h", "kind": "hnsw", "parameters": {"m": 4, "efConstruction": 400, "metric": "euclidean"}}
                ],
                "profiles": [{"name": "p", "algorithmConfigurationName": "h"}]
            }
        });

        let schema: IndexSchema = serde_json::from_value(json).unwrap();
        schema.validate().unwrap();
        assert_eq!(schema.fields[1].analyzer_name.as_deref(), Some("en.microsoft"));
        let algorithm = schema.vector_algorithm("h").unwrap();
        assert_eq!(algorithm.metric(), DistanceMetric::Euclidean);
        assert!(schema.semantic.configurations.is_empty());
    }
}
