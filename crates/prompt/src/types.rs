//! Prompt definition types.

use serde::{Deserialize, Serialize};

/// A grounded prompt definition loaded from YAML.
///
/// ```yaml
/// id: hotels.grounded
/// title: Hotel recommendations
/// apiVersion: "1.0"
/// template: |
///   Query: {{query}}
///   Sources:
///   {{sources}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptDefinition {
    /// Unique prompt identifier
    pub id: String,

    /// Human-readable title
    pub title: String,

    /// API version for schema evolution
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Creator identifier
    #[serde(rename = "createdBy", default, skip_serializing_if = "String::is_empty")]
    pub created_by: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Template text with `{{query}}` and `{{sources}}` placeholders
    pub template: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_definition_deserialization() {
        let yaml = r#"
id: hotels.grounded
title: Hotel recommendations
apiVersion: "1.0"
createdBy: search-team
template: "Query: {{query}}\nSources: {{sources}}"
"#;

        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(def.id, "hotels.grounded");
        assert_eq!(def.api_version, "1.0");
        assert_eq!(def.created_by, "search-team");
        assert!(def.description.is_none());
        assert!(def.template.contains("{{sources}}"));
    }

    #[test]
    fn test_created_by_is_optional() {
        let yaml = "id: a\ntitle: b\napiVersion: \"1.0\"\ntemplate: t\n";
        let def: PromptDefinition = serde_yaml::from_str(yaml).unwrap();
        assert!(def.created_by.is_empty());
    }
}
