//! Grounded CLI
//!
//! Main entry point for the grounded command-line tool.
//! Answers questions from an Azure AI Search index and provisions that index.

mod commands;

use clap::{Parser, Subcommand};
use commands::{AskCommand, ProvisionCommand, SchemaCommand};
use grounded_core::{config::AppConfig, logging, AppResult};
use std::path::PathBuf;

/// Grounded answers over an Azure AI Search index
#[derive(Parser, Debug)]
#[command(name = "grounded")]
#[command(about = "Grounded answers over an Azure AI Search index", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "GROUNDED_CONFIG")]
    config: Option<PathBuf>,

    /// Search index name
    #[arg(short, long, global = true)]
    index: Option<String>,

    /// Chat deployment name
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, env = "RUST_LOG")]
    log_level: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Answer a question grounded in retrieved documents
    Ask(AskCommand),

    /// Recreate the index, upload documents and wait for ingestion
    Provision(ProvisionCommand),

    /// Print or validate an index schema
    Schema(SchemaCommand),
}

#[tokio::main]
async fn main() -> AppResult<()> {
    // Parse command-line arguments first (needed for logging config)
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config)?.with_overrides(
        cli.index,
        cli.model,
        cli.log_level,
        cli.verbose,
        cli.no_color,
    );

    logging::init_logging(config.log_level.as_deref(), config.no_color)?;

    tracing::info!("Grounded CLI starting");
    tracing::debug!("Config file: {:?}", config.config_file);
    tracing::debug!("Index: {:?}", config.search.index_name);

    let command_name = match &cli.command {
        Commands::Ask(_) => "ask",
        Commands::Provision(_) => "provision",
        Commands::Schema(_) => "schema",
    };
    let _span = tracing::info_span!("command", name = command_name).entered();

    let result = match cli.command {
        Commands::Ask(cmd) => cmd.execute(&config).await,
        Commands::Provision(cmd) => cmd.execute(&config).await,
        Commands::Schema(cmd) => cmd.execute(),
    };

    match &result {
        Ok(_) => tracing::info!("Command completed successfully"),
        Err(e) => tracing::error!("Command failed: {}", e),
    }

    result
}
