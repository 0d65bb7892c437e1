//! Provision command handler.

use super::schema::load_schema;
use clap::Args;
use grounded_core::{config::AppConfig, AppError, AppResult};
use grounded_search::{reconcile, AzureSearchClient, Document, ReconcilePolicy, ReconciliationState};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Recreate the index, upload documents and wait for ingestion
#[derive(Args, Debug)]
pub struct ProvisionCommand {
    /// JSON file holding an array of documents
    #[arg(short, long)]
    pub data: PathBuf,

    /// Schema file describing the index (defaults to the hotels sample)
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Document count to wait for (defaults to the number of documents uploaded)
    #[arg(long)]
    pub expected: Option<u64>,

    /// Maximum statistics reads before giving up
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Milliseconds between statistics reads
    #[arg(long)]
    pub poll_interval_ms: Option<u64>,

    /// Milliseconds to wait between index creation and upload
    #[arg(long)]
    pub settle_delay_ms: Option<u64>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl ProvisionCommand {
    /// Execute the provision command.
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing provision command");
        tracing::debug!("Provision command options: {:?}", self);

        let settings = config.search_settings()?;
        let schema = load_schema(self.schema.as_deref())?;
        let documents = load_documents(&self.data)?;
        let expected = self.expected.unwrap_or(documents.len() as u64);
        let policy = self.policy(config);

        tracing::info!(
            index = %settings.index_name,
            documents = documents.len(),
            expected,
            max_attempts = policy.max_attempts,
            "Provisioning index"
        );

        let cancel = CancellationToken::new();
        let on_interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, stopping");
                on_interrupt.cancel();
            }
        });

        let client = AzureSearchClient::from_settings(&settings);
        let state = reconcile(
            &client,
            &schema,
            &settings.index_name,
            &documents,
            expected,
            &policy,
            &cancel,
        )
        .await?;

        self.report(&state)?;

        if state.is_converged() {
            Ok(())
        } else {
            Err(AppError::Other(format!(
                "Index '{}' did not reach {} documents after {} attempts ({:?})",
                state.index_name, state.expected_count, state.attempts, state.status
            )))
        }
    }

    fn policy(&self, config: &AppConfig) -> ReconcilePolicy {
        let mut policy = ReconcilePolicy::from(&config.provisioning);
        if let Some(max_attempts) = self.max_attempts {
            policy.max_attempts = max_attempts;
        }
        if let Some(ms) = self.poll_interval_ms {
            policy.poll_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = self.settle_delay_ms {
            policy.settle_delay = Duration::from_millis(ms);
        }
        policy
    }

    fn report(&self, state: &ReconciliationState) -> AppResult<()> {
        if self.json {
            let json = serde_json::to_string_pretty(state)
                .map_err(|e| AppError::Serialization(e.to_string()))?;
            println!("{}", json);
            return Ok(());
        }

        let observed = state
            .last_observed_count
            .map(|c| c.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        let outcome = if state.is_converged() {
            "converged"
        } else {
            "gave up"
        };
        println!(
            "{}: {} after {} attempt(s), {}/{} documents",
            state.index_name, outcome, state.attempts, observed, state.expected_count
        );
        if state.has_upload_failures() {
            println!("Rejected keys: {}", state.failed_keys.join(", "));
        }
        Ok(())
    }
}

/// Read a JSON array of documents from disk.
fn load_documents(path: &Path) -> AppResult<Vec<Document>> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        AppError::Serialization(format!(
            "Failed to parse documents from {}: {}",
            path.display(),
            e
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        provision: ProvisionCommand,
    }

    #[test]
    fn test_flags_override_config_policy() {
        let parsed = Wrapper::parse_from([
            "provision",
            "--data",
            "hotels.json",
            "--max-attempts",
            "4",
            "--poll-interval-ms",
            "250",
        ]);
        let policy = parsed.provision.policy(&AppConfig::default());

        assert_eq!(policy.max_attempts, 4);
        assert_eq!(policy.poll_interval, Duration::from_millis(250));
        assert_eq!(policy.settle_delay, Duration::ZERO);
    }

    #[test]
    fn test_load_documents() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hotels.json");
        std::fs::write(
            &path,
            r#"[{"HotelId": "1", "HotelName": "Stay-Kay City Hotel"}, {"HotelId": "2"}]"#,
        )
        .unwrap();

        let documents = load_documents(&path).unwrap();
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].key("HotelId").as_deref(), Some("1"));
    }

    #[test]
    fn test_load_documents_rejects_non_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("hotels.json");
        std::fs::write(&path, r#"{"HotelId": "1"}"#).unwrap();

        assert!(matches!(
            load_documents(&path),
            Err(AppError::Serialization(_))
        ));
    }
}
