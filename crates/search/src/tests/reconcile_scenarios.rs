//! Provisioning and convergence scenarios.

use super::{hotel, no_breakfast_hotels, ScriptedService, FAST_POLL};
use crate::providers::InMemorySearchService;
use crate::reconcile::{
    reconcile, GiveUpReason, ReconcilePolicy, ReconciliationState, ReconciliationStatus,
};
use crate::schema::{hotel_index_schema, FieldType, IndexSchema, SearchField};
use crate::service::SearchService;
use crate::types::Document;
use grounded_core::{AppError, AppResult};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

fn policy(max_attempts: u32) -> ReconcilePolicy {
    ReconcilePolicy {
        max_attempts,
        poll_interval: FAST_POLL,
        settle_delay: Duration::ZERO,
    }
}

async fn run(
    service: &dyn SearchService,
    documents: &[Document],
    expected: u64,
    policy: &ReconcilePolicy,
    cancel: &CancellationToken,
) -> AppResult<ReconciliationState> {
    reconcile(
        service,
        &hotel_index_schema(),
        "hotels",
        documents,
        expected,
        policy,
        cancel,
    )
    .await
}

#[tokio::test]
async fn test_converges_when_count_reaches_expected() {
    let service = ScriptedService::counts(&[3, 7, 10]);
    let state = run(
        &service,
        &no_breakfast_hotels(),
        10,
        &policy(30),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(state.status, ReconciliationStatus::Converged);
    assert_eq!(state.attempts, 3);
    assert_eq!(state.last_observed_count, Some(10));
    assert!(state.failed_keys.is_empty());
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() {
    let service = ScriptedService::counts(&[5]);
    let state = run(
        &service,
        &no_breakfast_hotels(),
        10,
        &policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        state.status,
        ReconciliationStatus::GaveUp(GiveUpReason::AttemptsExhausted)
    );
    assert_eq!(state.attempts, 3);
    assert_eq!(state.last_observed_count, Some(5));
    assert_eq!(
        service.calls().iter().filter(|c| *c == "stats").count(),
        3
    );
}

#[tokio::test]
async fn test_cancellation_interrupts_the_poll_sleep() {
    let cancel = CancellationToken::new();
    let service = ScriptedService::counts(&[5]).cancelling_after(1, cancel.clone());
    let slow = ReconcilePolicy {
        max_attempts: 30,
        poll_interval: Duration::from_secs(3600),
        settle_delay: Duration::ZERO,
    };

    let state = tokio::time::timeout(
        Duration::from_secs(5),
        run(&service, &no_breakfast_hotels(), 10, &slow, &cancel),
    )
    .await
    .expect("cancellation should end the wait")
    .unwrap();

    assert_eq!(state.status, ReconciliationStatus::GaveUp(GiveUpReason::Cancelled));
    assert_eq!(state.last_observed_count, Some(5));
    assert_eq!(state.attempts, 1);
}

#[tokio::test]
async fn test_cancellation_during_settle_delay() {
    let cancel = CancellationToken::new();
    cancel.cancel();
    let service = ScriptedService::counts(&[2]);
    let settling = ReconcilePolicy {
        settle_delay: Duration::from_secs(3600),
        ..policy(3)
    };

    let state = run(&service, &no_breakfast_hotels(), 2, &settling, &cancel)
        .await
        .unwrap();

    assert_eq!(state.status, ReconciliationStatus::GaveUp(GiveUpReason::Cancelled));
    assert_eq!(state.attempts, 0);
    assert_eq!(state.last_observed_count, None);
    assert_eq!(service.calls(), vec!["delete", "create"]);
}

#[tokio::test]
async fn test_failed_statistics_read_consumes_an_attempt() {
    let service = ScriptedService::new(vec![
        Err("503 Service Unavailable".to_string()),
        Err("503 Service Unavailable".to_string()),
        Ok(2),
    ]);
    let state = run(
        &service,
        &no_breakfast_hotels(),
        2,
        &policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(state.is_converged());
    assert_eq!(state.attempts, 3);
}

#[tokio::test]
async fn test_only_failed_reads_give_up_without_a_count() {
    let service = ScriptedService::new(vec![
        Err("timeout".to_string()),
        Err("timeout".to_string()),
    ]);
    let state = run(
        &service,
        &no_breakfast_hotels(),
        2,
        &policy(2),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(
        state.status,
        ReconciliationStatus::GaveUp(GiveUpReason::AttemptsExhausted)
    );
    assert_eq!(state.last_observed_count, None);
}

#[tokio::test]
async fn test_partial_upload_failure_is_reported_not_raised() {
    let service = ScriptedService::counts(&[1]).rejecting(&["2"]);
    let state = run(
        &service,
        &no_breakfast_hotels(),
        1,
        &policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(state.is_converged());
    assert!(state.has_upload_failures());
    assert_eq!(state.failed_keys, vec!["2"]);
}

#[tokio::test]
async fn test_operations_run_in_order() {
    let service = ScriptedService::counts(&[2]);
    run(
        &service,
        &no_breakfast_hotels(),
        2,
        &policy(3),
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(service.calls(), vec!["delete", "create", "upload", "stats"]);
}

#[tokio::test]
async fn test_empty_document_set_skips_upload() {
    let service = ScriptedService::counts(&[0]);
    let state = run(&service, &[], 0, &policy(3), &CancellationToken::new())
        .await
        .unwrap();

    assert!(state.is_converged());
    assert_eq!(state.attempts, 1);
    assert!(!service.calls().contains(&"upload".to_string()));
}

#[tokio::test]
async fn test_invalid_schema_leaves_existing_index_alone() {
    let service = ScriptedService::counts(&[2]);
    let mut schema: IndexSchema = hotel_index_schema();
    schema.fields.push(SearchField::new("HotelName", FieldType::String));

    let result = reconcile(
        &service,
        &schema,
        "hotels",
        &no_breakfast_hotels(),
        2,
        &policy(3),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(AppError::InvalidSchema(_))));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_zero_attempts_is_a_config_error() {
    let service = ScriptedService::counts(&[2]);
    let result = run(
        &service,
        &no_breakfast_hotels(),
        2,
        &policy(0),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(AppError::Config(_))));
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_delete_failure_is_a_hard_error() {
    let service = ScriptedService::counts(&[2]).failing_delete();
    let result = run(
        &service,
        &no_breakfast_hotels(),
        2,
        &policy(3),
        &CancellationToken::new(),
    )
    .await;

    assert!(matches!(result, Err(AppError::SearchUnavailable(_))));
    assert_eq!(service.calls(), vec!["delete"]);
}

#[tokio::test]
async fn test_reprovisioning_the_memory_service_replaces_documents() {
    let service = InMemorySearchService::new();
    let cancel = CancellationToken::new();

    let first = run(&service, &no_breakfast_hotels(), 2, &policy(3), &cancel)
        .await
        .unwrap();
    assert!(first.is_converged());

    let replacement = vec![hotel("9", "Harbor Inn", "Rooms over the water.", &["view"], 4.2)];
    let second = run(&service, &replacement, 1, &policy(3), &cancel)
        .await
        .unwrap();

    assert!(second.is_converged());
    assert_eq!(second.last_observed_count, Some(1));
    let stats = service.index_statistics("hotels").await.unwrap();
    assert_eq!(stats.document_count, 1);
}
