//! Grounded prompt template.
//!
//! A grounded template is plain text with exactly one `{{query}}` and one
//! `{{sources}}` placeholder. Rendering substitutes those two values
//! verbatim; nothing else in the template is interpreted.

use grounded_core::{AppError, AppResult};
use handlebars::Handlebars;
use serde::Serialize;

/// Placeholder for the user's question.
pub const QUERY_PLACEHOLDER: &str = "query";

/// Placeholder for the formatted grounding context.
pub const SOURCES_PLACEHOLDER: &str = "sources";

const TEMPLATE_NAME: &str = "grounded";

/// Default grounded prompt for the hotels sample.
///
/// The sources start on the line after `Sources:`, one record block per hit.
pub const DEFAULT_GROUNDED_TEMPLATE: &str = "You are a friendly assistant that recommends hotels based on activities and amenities.
Answer the query using only the sources provided below in a friendly and concise bulleted manner.
Answer ONLY with the facts listed in the list of sources below.
If there isn't enough information below, say you don't know.
Do not generate answers that don't use the sources below.
Query: {{query}}
Sources:
{{sources}}
";

#[derive(Serialize)]
struct TemplateData<'a> {
    query: &'a str,
    sources: &'a str,
}

/// A validated, compiled grounded prompt template.
pub struct GroundedTemplate {
    source: String,
    registry: Handlebars<'static>,
}

impl GroundedTemplate {
    /// Validate and compile `template`.
    ///
    /// # Errors
    /// `AppError::Template` if a placeholder is missing or repeated, if any
    /// other expression appears, or if a placeholder is escaped or
    /// triple-stashed.
    pub fn new(template: impl Into<String>) -> AppResult<Self> {
        let source = template.into();
        check_placeholders(&source)?;

        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(true);
        registry
            .register_template_string(TEMPLATE_NAME, &source)
            .map_err(|e| AppError::Template(format!("Failed to compile template: {}", e)))?;

        Ok(Self { source, registry })
    }

    /// Template text as supplied.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Substitute `query` and `sources` into the template.
    pub fn assemble(&self, query: &str, sources: &str) -> AppResult<String> {
        tracing::debug!(
            query_len = query.len(),
            sources_len = sources.len(),
            "Assembling grounded prompt"
        );

        self.registry
            .render(TEMPLATE_NAME, &TemplateData { query, sources })
            .map_err(|e| AppError::Template(format!("Failed to render template: {}", e)))
    }
}

impl Default for GroundedTemplate {
    fn default() -> Self {
        // The built-in template always validates.
        match Self::new(DEFAULT_GROUNDED_TEMPLATE) {
            Ok(template) => template,
            Err(e) => unreachable!("default grounded template is invalid: {}", e),
        }
    }
}

impl std::fmt::Debug for GroundedTemplate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroundedTemplate")
            .field("source", &self.source)
            .finish_non_exhaustive()
    }
}

/// Scan every `{{ ... }}` expression and require exactly one `query` and one
/// `sources` with nothing else.
fn check_placeholders(template: &str) -> AppResult<()> {
    if template.contains("{{{") {
        return Err(AppError::Template(
            "Triple-stash expressions are not allowed".to_string(),
        ));
    }
    if template.contains("\\{{") {
        return Err(AppError::Template(
            "Escaped placeholders are not allowed".to_string(),
        ));
    }

    let mut query_count = 0;
    let mut sources_count = 0;
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        let after_open = &rest[start + 2..];
        let end = after_open.find("}}").ok_or_else(|| {
            AppError::Template("Unterminated '{{' in template".to_string())
        })?;

        match &after_open[..end] {
            QUERY_PLACEHOLDER => query_count += 1,
            SOURCES_PLACEHOLDER => sources_count += 1,
            other => {
                return Err(AppError::Template(format!(
                    "Unsupported template expression '{{{{{}}}}}'",
                    other
                )))
            }
        }

        rest = &after_open[end + 2..];
    }

    for (name, count) in [
        (QUERY_PLACEHOLDER, query_count),
        (SOURCES_PLACEHOLDER, sources_count),
    ] {
        if count != 1 {
            return Err(AppError::Template(format!(
                "Placeholder '{{{{{}}}}}' must appear exactly once (found {})",
                name, count
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn expect_template_error(template: &str, needle: &str) {
        match GroundedTemplate::new(template) {
            Err(AppError::Template(msg)) => assert!(
                msg.contains(needle),
                "expected '{}' in '{}'",
                needle,
                msg
            ),
            other => panic!("Expected template error, got {:?}", other),
        }
    }

    #[test]
    fn test_default_template_keeps_refusal_instruction() {
        let template = GroundedTemplate::default();
        assert!(template
            .source()
            .contains("If there isn't enough information below, say you don't know."));
    }

    #[test]
    fn test_default_template_layout() {
        let prompt = GroundedTemplate::default()
            .assemble("Any pools?", "HotelName: A")
            .unwrap();
        assert!(prompt.starts_with("You are a friendly assistant that recommends hotels"));
        assert!(prompt.ends_with(
            "Do not generate answers that don't use the sources below.\nQuery: Any pools?\nSources:\nHotelName: A\n"
        ));
    }

    #[test]
    fn test_assemble_substitutes_both_placeholders() {
        let template = GroundedTemplate::new("Q={{query}}\nS={{sources}}").unwrap();
        let prompt = template
            .assemble("pool?", "HotelName: A\n---\nHotelName: B")
            .unwrap();
        assert_eq!(prompt, "Q=pool?\nS=HotelName: A\n---\nHotelName: B");
    }

    #[test]
    fn test_values_are_not_html_escaped() {
        let template = GroundedTemplate::new("{{query}}|{{sources}}").unwrap();
        let prompt = template.assemble("<b>&</b>", "\"quoted\"").unwrap();
        assert_eq!(prompt, "<b>&</b>|\"quoted\"");
    }

    #[test]
    fn test_missing_placeholder() {
        expect_template_error("Query: {{query}}", "'{{sources}}' must appear exactly once");
    }

    #[test]
    fn test_repeated_placeholder() {
        expect_template_error(
            "{{query}} {{query}} {{sources}}",
            "'{{query}}' must appear exactly once (found 2)",
        );
    }

    #[test]
    fn test_unknown_expression() {
        expect_template_error("{{query}} {{sources}} {{extra}}", "Unsupported template expression");
        expect_template_error("{{query}} {{ sources }}", "Unsupported template expression");
        expect_template_error("{{#if query}}{{query}}{{/if}} {{sources}}", "Unsupported");
    }

    #[test]
    fn test_triple_stash_and_escape_rejected() {
        expect_template_error("{{{query}}} {{sources}}", "Triple-stash");
        expect_template_error("\\{{query}} {{query}} {{sources}}", "Escaped");
    }

    #[test]
    fn test_unterminated_expression() {
        expect_template_error("{{query}} {{sources", "Unterminated");
    }

    proptest! {
        #[test]
        fn prop_assemble_is_exact_substitution(
            query in any::<String>(),
            sources in any::<String>()
        ) {
            let template = GroundedTemplate::default();
            let prompt = template.assemble(&query, &sources).unwrap();

            let (head, tail) = DEFAULT_GROUNDED_TEMPLATE.split_once("{{query}}").unwrap();
            let (middle, end) = tail.split_once("{{sources}}").unwrap();
            let expected = format!("{}{}{}{}{}", head, query, middle, sources, end);
            prop_assert_eq!(prompt, expected);
        }
    }
}
