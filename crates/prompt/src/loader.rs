//! Loader for YAML prompt definitions.

use crate::template::GroundedTemplate;
use crate::types::PromptDefinition;
use grounded_core::{AppError, AppResult};
use std::path::Path;

/// Load and validate a prompt definition file.
///
/// # Example
/// ```no_run
/// use grounded_prompt::load_prompt;
/// use std::path::Path;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let prompt = load_prompt(Path::new("prompts/hotels.yml"))?;
/// println!("Loaded prompt: {}", prompt.title);
/// # Ok(())
/// # }
/// ```
pub fn load_prompt(path: &Path) -> AppResult<PromptDefinition> {
    tracing::debug!("Loading prompt from: {:?}", path);

    if !path.exists() {
        return Err(AppError::Template(format!(
            "Prompt file not found: {:?}",
            path
        )));
    }

    let contents = std::fs::read_to_string(path).map_err(|e| {
        AppError::Template(format!("Failed to read prompt file {:?}: {}", path, e))
    })?;

    let definition: PromptDefinition = serde_yaml::from_str(&contents).map_err(|e| {
        AppError::Template(format!("Failed to parse prompt YAML {:?}: {}", path, e))
    })?;

    validate_prompt(&definition)?;

    tracing::info!("Loaded prompt: {} ({})", definition.id, definition.title);

    Ok(definition)
}

/// Load a prompt definition and compile its template.
pub fn load_template(path: &Path) -> AppResult<GroundedTemplate> {
    let definition = load_prompt(path)?;
    GroundedTemplate::new(definition.template)
}

fn validate_prompt(def: &PromptDefinition) -> AppResult<()> {
    if def.id.is_empty() {
        return Err(AppError::Template("Prompt ID cannot be empty".to_string()));
    }

    if def.title.is_empty() {
        return Err(AppError::Template(
            "Prompt title cannot be empty".to_string(),
        ));
    }

    if def.template.trim().is_empty() {
        return Err(AppError::Template(
            "Prompt template cannot be empty".to_string(),
        ));
    }

    // Simple 'x.y' check
    if !def.api_version.contains('.') {
        return Err(AppError::Template(format!(
            "Invalid apiVersion format: {}. Expected format: 'x.y'",
            def.api_version
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write_prompt(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    const VALID: &str = r#"
id: hotels.grounded
title: "Hotel recommendations"
apiVersion: "1.0"
template: |
  Answer only from the sources.
  Query: {{query}}
  Sources:
  {{sources}}
"#;

    #[test]
    fn test_load_valid_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(temp_dir.path(), "hotels.yml", VALID);

        let prompt = load_prompt(&path).unwrap();
        assert_eq!(prompt.id, "hotels.grounded");
        assert_eq!(prompt.title, "Hotel recommendations");
    }

    #[test]
    fn test_load_template_compiles() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(temp_dir.path(), "hotels.yml", VALID);

        let template = load_template(&path).unwrap();
        let prompt = template.assemble("pool", "HotelName: A").unwrap();
        assert!(prompt.contains("Query: pool\n"));
        assert!(prompt.ends_with("HotelName: A\n"));
    }

    #[test]
    fn test_load_nonexistent_prompt() {
        let temp_dir = TempDir::new().unwrap();
        let result = load_prompt(&temp_dir.path().join("missing.yml"));
        assert!(matches!(result, Err(AppError::Template(_))));
    }

    #[test]
    fn test_load_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(temp_dir.path(), "bad.yml", "invalid: yaml: content:");
        assert!(load_prompt(&path).is_err());
    }

    #[test]
    fn test_bad_api_version() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(
            temp_dir.path(),
            "v.yml",
            "id: a\ntitle: b\napiVersion: \"1\"\ntemplate: \"{{query}} {{sources}}\"\n",
        );
        match load_prompt(&path) {
            Err(AppError::Template(msg)) => assert!(msg.contains("Invalid apiVersion")),
            other => panic!("Expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_template_without_sources_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write_prompt(
            temp_dir.path(),
            "nosrc.yml",
            "id: a\ntitle: b\napiVersion: \"1.0\"\ntemplate: \"{{query}}\"\n",
        );
        assert!(matches!(load_template(&path), Err(AppError::Template(_))));
    }
}
