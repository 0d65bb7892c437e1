//! Schema command handler.
//!
//! Prints the built-in hotels schema or checks a schema file.

use clap::Args;
use grounded_core::{AppError, AppResult};
use grounded_search::{hotel_index_schema, IndexSchema};
use std::path::{Path, PathBuf};

/// Print or validate an index schema
#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Schema file (JSON index definition); defaults to the hotels sample
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Only validate, printing a one-line summary
    #[arg(long)]
    pub validate: bool,
}

impl SchemaCommand {
    pub fn execute(&self) -> AppResult<()> {
        tracing::info!("Executing schema command");

        let schema = load_schema(self.file.as_deref())?;

        if self.validate {
            println!(
                "Schema '{}' is valid: {} top-level fields, {} vector profiles, {} semantic configurations",
                schema.name,
                schema.fields.len(),
                schema.vector_search.profiles.len(),
                schema.semantic.configurations.len()
            );
            return Ok(());
        }

        let json = serde_json::to_string_pretty(&schema)
            .map_err(|e| AppError::Serialization(e.to_string()))?;
        println!("{}", json);
        Ok(())
    }
}

/// Load and validate a schema file, or fall back to the hotels sample.
pub fn load_schema(path: Option<&Path>) -> AppResult<IndexSchema> {
    let schema = match path {
        Some(path) => IndexSchema::from_file(path)?,
        None => hotel_index_schema(),
    };
    schema.validate()?;
    tracing::debug!(
        schema = %schema.name,
        fields = schema.fields.len(),
        "Index schema loaded"
    );
    Ok(schema)
}
