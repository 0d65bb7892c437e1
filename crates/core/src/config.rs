//! Configuration management for the grounded pipeline.
//!
//! Configuration is merged from three sources, lowest precedence first:
//! - Built-in defaults
//! - A YAML config file (`grounded.yaml`, or the path in `GROUNDED_CONFIG`)
//! - Environment variables (`AZURE_SEARCH_*`, `AZURE_OPENAI_*`, ...)
//!
//! Command-line flags are applied last through [`AppConfig::with_overrides`].
//! Presence of the service endpoints and credentials is checked once, when
//! [`AppConfig::search_settings`] / [`AppConfig::completion_settings`] resolve
//! the raw values into fully-populated settings structs.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_FILE: &str = "grounded.yaml";

/// Default REST API version for the search service.
pub const DEFAULT_SEARCH_API_VERSION: &str = "2024-07-01";

pub const ENV_SEARCH_ENDPOINT: &str = "AZURE_SEARCH_ENDPOINT";
pub const ENV_SEARCH_API_KEY: &str = "AZURE_SEARCH_API_KEY";
pub const ENV_SEARCH_INDEX_NAME: &str = "AZURE_SEARCH_INDEX_NAME";
pub const ENV_OPENAI_ENDPOINT: &str = "AZURE_OPENAI_ENDPOINT";
pub const ENV_OPENAI_API_KEY: &str = "AZURE_OPENAI_API_KEY";
pub const ENV_OPENAI_VERSION: &str = "AZURE_OPENAI_VERSION";
pub const ENV_DEPLOYMENT_MODEL: &str = "AZURE_DEPLOYMENT_MODEL";
pub const ENV_EMBEDDING_MODEL: &str = "AZURE_EMBEDDING_MODEL";

/// Main application configuration.
///
/// Every service value is optional here; use the `*_settings` accessors to
/// obtain validated settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Config file that was merged, if any
    pub config_file: Option<PathBuf>,

    /// Search service connection
    pub search: SearchConfig,

    /// Completion (and embedding) service connection and sampling
    pub completion: CompletionConfig,

    /// Query-path defaults
    pub retrieval: RetrievalConfig,

    /// Ingestion reconciliation budget
    pub provisioning: ProvisioningConfig,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,
}

/// Search service section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub index_name: Option<String>,
    pub api_version: Option<String>,
}

/// Completion service section of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompletionConfig {
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub api_version: Option<String>,

    /// Deployment (model) identifier used for chat completions
    pub model: Option<String>,

    /// Deployment used for query embeddings (vector strategies only)
    pub embedding_model: Option<String>,

    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

/// Query-path defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetrievalConfig {
    /// Default strategy: keyword, vector, hybrid or semantic
    pub strategy: String,

    /// Result limit (top-N)
    pub top: usize,

    /// Field projection used for both the query and the grounding context
    pub select: Vec<String>,

    /// Cap on documents rendered into the grounding context
    pub max_documents: Option<usize>,

    /// Semantic configuration name (defaults to the schema's first one)
    pub semantic_configuration: Option<String>,

    /// Vector field targeted by vector strategies
    pub vector_field: String,

    /// Neighbor count for vector sub-queries
    pub k: usize,

    /// Use exhaustive (exact) KNN for vector sub-queries
    pub exhaustive: bool,

    /// Optional YAML prompt definition overriding the built-in template
    pub prompt_file: Option<PathBuf>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            strategy: "keyword".to_string(),
            top: 5,
            select: vec![
                "HotelName".to_string(),
                "Description".to_string(),
                "Tags".to_string(),
            ],
            max_documents: None,
            semantic_configuration: None,
            vector_field: "DescriptionVector".to_string(),
            k: 5,
            exhaustive: false,
            prompt_file: None,
        }
    }
}

/// Ingestion reconciliation budget.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProvisioningConfig {
    pub max_attempts: u32,
    pub poll_interval_ms: u64,

    /// Wait between index creation and document upload
    pub settle_delay_ms: u64,
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval_ms: 5000,
            settle_delay_ms: 0,
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct ConfigFile {
    search: Option<SearchConfig>,
    completion: Option<CompletionConfig>,
    retrieval: Option<RetrievalConfig>,
    provisioning: Option<ProvisioningConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

/// Validated search service settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSettings {
    pub endpoint: String,
    pub api_key: String,
    pub index_name: String,
    pub api_version: String,
}

/// Validated completion service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSettings {
    pub endpoint: String,
    pub api_key: String,
    pub api_version: String,
    pub model: String,
    pub embedding_model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl AppConfig {
    /// Load configuration from the config file and environment variables.
    ///
    /// Environment variables:
    /// - `GROUNDED_CONFIG`: Path to config file (default `./grounded.yaml`)
    /// - `AZURE_SEARCH_ENDPOINT`, `AZURE_SEARCH_API_KEY`, `AZURE_SEARCH_INDEX_NAME`
    /// - `AZURE_OPENAI_ENDPOINT`, `AZURE_OPENAI_API_KEY`, `AZURE_OPENAI_VERSION`
    /// - `AZURE_DEPLOYMENT_MODEL`, `AZURE_EMBEDDING_MODEL`
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    ///
    /// # Example
    /// ```no_run
    /// use grounded_core::config::AppConfig;
    ///
    /// let config = AppConfig::load(None).expect("Failed to load config");
    /// println!("Index: {:?}", config.search.index_name);
    /// ```
    pub fn load(config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        let explicit = config_file.or_else(|| std::env::var("GROUNDED_CONFIG").ok().map(PathBuf::from));

        let config_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(AppError::Config(format!(
                        "Config file does not exist: {:?}",
                        path
                    )));
                }
                Some(path)
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                default_path.exists().then_some(default_path)
            }
        };

        if let Some(path) = config_path {
            config = config.merge_yaml(&path)?;
            tracing::debug!("Loaded config file {:?}", path);
            config.config_file = Some(path);
        }

        config.apply_env(|name| std::env::var(name).ok());

        if config.log_level.is_none() {
            config.log_level = std::env::var("RUST_LOG").ok();
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let mut result = self.clone();
        result.merge_yaml_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        Ok(result)
    }

    fn merge_yaml_str(&mut self, contents: &str) -> Result<(), serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;

        if let Some(search) = config_file.search {
            self.search = search;
        }

        if let Some(completion) = config_file.completion {
            self.completion = completion;
        }

        if let Some(retrieval) = config_file.retrieval {
            self.retrieval = retrieval;
        }

        if let Some(provisioning) = config_file.provisioning {
            self.provisioning = provisioning;
        }

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        Ok(())
    }

    /// Overlay service settings from environment-style lookups.
    ///
    /// Values present in the lookup replace file values; absent ones leave
    /// the current value untouched.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(v) = read(ENV_SEARCH_ENDPOINT) {
            self.search.endpoint = Some(v);
        }
        if let Some(v) = read(ENV_SEARCH_API_KEY) {
            self.search.api_key = Some(v);
        }
        if let Some(v) = read(ENV_SEARCH_INDEX_NAME) {
            self.search.index_name = Some(v);
        }
        if let Some(v) = read(ENV_OPENAI_ENDPOINT) {
            self.completion.endpoint = Some(v);
        }
        if let Some(v) = read(ENV_OPENAI_API_KEY) {
            self.completion.api_key = Some(v);
        }
        if let Some(v) = read(ENV_OPENAI_VERSION) {
            self.completion.api_version = Some(v);
        }
        if let Some(v) = read(ENV_DEPLOYMENT_MODEL) {
            self.completion.model = Some(v);
        }
        if let Some(v) = read(ENV_EMBEDDING_MODEL) {
            self.completion.embedding_model = Some(v);
        }
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// CLI flags take precedence over both the config file and the
    /// environment.
    pub fn with_overrides(
        mut self,
        index_name: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(index_name) = index_name {
            self.search.index_name = Some(index_name);
        }

        if let Some(model) = model {
            self.completion.model = Some(model);
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Resolve the search service settings, failing on any missing value.
    pub fn search_settings(&self) -> AppResult<SearchSettings> {
        let mut missing = Vec::new();
        let endpoint = require(&self.search.endpoint, ENV_SEARCH_ENDPOINT, &mut missing);
        let api_key = require(&self.search.api_key, ENV_SEARCH_API_KEY, &mut missing);
        let index_name = require(&self.search.index_name, ENV_SEARCH_INDEX_NAME, &mut missing);
        report_missing(missing)?;

        Ok(SearchSettings {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            index_name,
            api_version: self
                .search
                .api_version
                .clone()
                .unwrap_or_else(|| DEFAULT_SEARCH_API_VERSION.to_string()),
        })
    }

    /// Resolve the completion service settings, failing on any missing value.
    pub fn completion_settings(&self) -> AppResult<CompletionSettings> {
        let mut missing = Vec::new();
        let endpoint = require(&self.completion.endpoint, ENV_OPENAI_ENDPOINT, &mut missing);
        let api_key = require(&self.completion.api_key, ENV_OPENAI_API_KEY, &mut missing);
        let api_version = require(&self.completion.api_version, ENV_OPENAI_VERSION, &mut missing);
        let model = require(&self.completion.model, ENV_DEPLOYMENT_MODEL, &mut missing);
        report_missing(missing)?;

        Ok(CompletionSettings {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            api_version,
            model,
            embedding_model: self.completion.embedding_model.clone(),
            temperature: self.completion.temperature.unwrap_or(0.7),
            max_tokens: self.completion.max_tokens.unwrap_or(800),
        })
    }

    /// Validate everything the query and ingestion paths need.
    ///
    /// Missing values from both services are reported together.
    pub fn validate(&self) -> AppResult<()> {
        let mut missing = Vec::new();
        require(&self.search.endpoint, ENV_SEARCH_ENDPOINT, &mut missing);
        require(&self.search.api_key, ENV_SEARCH_API_KEY, &mut missing);
        require(&self.search.index_name, ENV_SEARCH_INDEX_NAME, &mut missing);
        require(&self.completion.endpoint, ENV_OPENAI_ENDPOINT, &mut missing);
        require(&self.completion.api_key, ENV_OPENAI_API_KEY, &mut missing);
        require(&self.completion.api_version, ENV_OPENAI_VERSION, &mut missing);
        require(&self.completion.model, ENV_DEPLOYMENT_MODEL, &mut missing);
        report_missing(missing)?;

        if self.retrieval.top == 0 {
            return Err(AppError::Config("retrieval.top must be at least 1".to_string()));
        }

        if self.retrieval.select.is_empty() {
            return Err(AppError::Config(
                "retrieval.select must name at least one field".to_string(),
            ));
        }

        if self.provisioning.max_attempts == 0 {
            return Err(AppError::Config(
                "provisioning.maxAttempts must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}

fn require(value: &Option<String>, name: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(name);
            String::new()
        }
    }
}

fn report_missing(missing: Vec<&'static str>) -> AppResult<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "Missing required configuration: {}",
            missing.join(", ")
        )))
    }
}
