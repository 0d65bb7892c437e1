//! Command handlers for the grounded CLI.
//!
//! This module organizes all CLI commands into separate submodules.

pub mod ask;
pub mod provision;
pub mod schema;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use provision::ProvisionCommand;
pub use schema::SchemaCommand;
