//! Grounded prompt assembly.
//!
//! This crate provides:
//! - The [`GroundedTemplate`] that merges a query and its retrieved sources
//! - YAML prompt definitions for replacing the built-in template

pub mod loader;
pub mod template;
pub mod types;

// Re-export main types
pub use loader::{load_prompt, load_template};
pub use template::{GroundedTemplate, DEFAULT_GROUNDED_TEMPLATE};
pub use types::PromptDefinition;
