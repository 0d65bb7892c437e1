//! Index provisioning and convergence polling.
//!
//! Ingestion is asynchronous on the service side: an accepted upload is not
//! immediately counted. [`reconcile`] recreates the index, uploads the
//! documents, then polls the document count until it reaches the expected
//! value or the attempt budget runs out.

use crate::schema::IndexSchema;
use crate::service::SearchService;
use crate::types::Document;
use grounded_core::config::ProvisioningConfig;
use grounded_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Retry budget for the convergence poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilePolicy {
    pub max_attempts: u32,
    pub poll_interval: Duration,
    /// Pause between index creation and upload
    pub settle_delay: Duration,
}

impl Default for ReconcilePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 30,
            poll_interval: Duration::from_millis(5000),
            settle_delay: Duration::ZERO,
        }
    }
}

impl From<&ProvisioningConfig> for ReconcilePolicy {
    fn from(config: &ProvisioningConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            settle_delay: Duration::from_millis(config.settle_delay_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GiveUpReason {
    AttemptsExhausted,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "status", content = "reason")]
pub enum ReconciliationStatus {
    Converged,
    GaveUp(GiveUpReason),
}

/// Outcome of one reconciliation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationState {
    pub index_name: String,
    pub expected_count: u64,
    /// Statistics reads performed, failed reads included
    pub attempts: u32,
    pub last_observed_count: Option<u64>,
    /// Keys the service rejected during upload
    pub failed_keys: Vec<String>,
    pub status: ReconciliationStatus,
}

impl ReconciliationState {
    pub fn is_converged(&self) -> bool {
        self.status == ReconciliationStatus::Converged
    }

    pub fn has_upload_failures(&self) -> bool {
        !self.failed_keys.is_empty()
    }
}

/// Recreate `index_name` from `schema`, upload `documents`, and wait until
/// the index reports at least `expected_count` documents.
///
/// Failed statistics reads consume an attempt. Cancellation during a wait
/// ends the run with `GaveUp(Cancelled)`.
///
/// # Errors
/// - `AppError::Config` if `max_attempts` is zero
/// - `AppError::InvalidSchema` if the schema is invalid
/// - `AppError::SearchUnavailable` if delete, create or the bulk upload fails
pub async fn reconcile(
    service: &dyn SearchService,
    schema: &IndexSchema,
    index_name: &str,
    documents: &[Document],
    expected_count: u64,
    policy: &ReconcilePolicy,
    cancel: &CancellationToken,
) -> AppResult<ReconciliationState> {
    if policy.max_attempts == 0 {
        return Err(AppError::Config(
            "Reconciliation max_attempts must be at least 1".to_string(),
        ));
    }
    schema.validate()?;

    let mut state = ReconciliationState {
        index_name: index_name.to_string(),
        expected_count,
        attempts: 0,
        last_observed_count: None,
        failed_keys: Vec::new(),
        status: ReconciliationStatus::GaveUp(GiveUpReason::AttemptsExhausted),
    };

    if service.delete_index(index_name).await? {
        tracing::info!(index = %index_name, "Deleted existing index");
    } else {
        tracing::debug!(index = %index_name, "No existing index to delete");
    }

    service.create_index(index_name, schema).await?;
    tracing::info!(index = %index_name, provider = service.provider_name(), "Created index");

    if !policy.settle_delay.is_zero() && !wait(policy.settle_delay, cancel).await {
        tracing::warn!(index = %index_name, "Reconciliation cancelled before upload");
        state.status = ReconciliationStatus::GaveUp(GiveUpReason::Cancelled);
        return Ok(state);
    }

    if documents.is_empty() {
        tracing::info!(index = %index_name, "No documents to upload");
    } else {
        let results = service.merge_or_upload(index_name, documents).await?;
        state.failed_keys = results
            .iter()
            .filter(|r| !r.succeeded)
            .map(|r| r.key.clone())
            .collect();

        if state.failed_keys.is_empty() {
            tracing::info!(index = %index_name, uploaded = results.len(), "Uploaded documents");
        } else {
            for failure in results.iter().filter(|r| !r.succeeded) {
                tracing::warn!(
                    key = %failure.key,
                    status = failure.status_code,
                    error = failure.error_message.as_deref().unwrap_or(""),
                    "Document rejected during upload"
                );
            }
            tracing::warn!(
                index = %index_name,
                failed = state.failed_keys.len(),
                uploaded = results.len() - state.failed_keys.len(),
                "Upload partially failed"
            );
        }
    }

    loop {
        state.attempts += 1;

        match service.index_statistics(index_name).await {
            Ok(stats) => {
                state.last_observed_count = Some(stats.document_count);
                tracing::info!(
                    attempt = state.attempts,
                    max_attempts = policy.max_attempts,
                    observed = stats.document_count,
                    expected = expected_count,
                    "Polled index statistics"
                );
                if stats.document_count >= expected_count {
                    state.status = ReconciliationStatus::Converged;
                    return Ok(state);
                }
            }
            Err(e) => {
                tracing::warn!(
                    attempt = state.attempts,
                    max_attempts = policy.max_attempts,
                    "Failed to read index statistics: {}",
                    e
                );
            }
        }

        if state.attempts >= policy.max_attempts {
            tracing::warn!(
                index = %index_name,
                attempts = state.attempts,
                last_observed = ?state.last_observed_count,
                "Index did not converge; giving up"
            );
            state.status = ReconciliationStatus::GaveUp(GiveUpReason::AttemptsExhausted);
            return Ok(state);
        }

        if !wait(policy.poll_interval, cancel).await {
            tracing::warn!(index = %index_name, attempts = state.attempts, "Reconciliation cancelled");
            state.status = ReconciliationStatus::GaveUp(GiveUpReason::Cancelled);
            return Ok(state);
        }
    }
}

/// Sleep for `duration`; returns `false` if cancelled first.
async fn wait(duration: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(duration) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconcilePolicy::default();
        assert_eq!(policy.max_attempts, 30);
        assert_eq!(policy.poll_interval, Duration::from_secs(5));
        assert!(policy.settle_delay.is_zero());
    }

    #[test]
    fn test_policy_from_config() {
        let config = ProvisioningConfig {
            max_attempts: 3,
            poll_interval_ms: 250,
            settle_delay_ms: 10_000,
        };
        let policy = ReconcilePolicy::from(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.poll_interval, Duration::from_millis(250));
        assert_eq!(policy.settle_delay, Duration::from_secs(10));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_value(ReconciliationStatus::GaveUp(GiveUpReason::Cancelled))
            .unwrap();
        assert_eq!(json, serde_json::json!({"status": "gaveUp", "reason": "cancelled"}));

        let json = serde_json::to_value(ReconciliationStatus::Converged).unwrap();
        assert_eq!(json, serde_json::json!({"status": "converged"}));
    }

    #[tokio::test]
    async fn test_wait_returns_false_when_cancelled() {
        let token = CancellationToken::new();
        token.cancel();
        assert!(!wait(Duration::from_secs(60), &token).await);
    }
}
