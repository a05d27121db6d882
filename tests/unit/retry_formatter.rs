use std::time::Duration;

use yt_harvester::fetcher::retry_formatter::{RetryContext, RetryErrorType};
use yt_harvester::fetcher::{Endpoint, FetcherError};

fn sample_context(error: FetcherError) -> RetryContext {
    RetryContext::new(
        3,
        Duration::from_millis(6500),
        Duration::from_secs(20),
        Duration::from_secs(8),
        Endpoint::Videos,
        "chunk 2/4",
        &error,
    )
}

#[test]
fn format_retry_captures_attempt_wait_and_budget() {
    let ctx = sample_context(FetcherError::Network("timed out".into()));
    let message = ctx.format_retry();
    assert!(message.contains("Retrying videos (attempt 3)"));
    assert!(message.contains("network error"));
    assert!(message.contains("waiting 8.0s"));
    assert!(message.contains("6.5s of 20s budget used"));
    assert!(message.ends_with("[chunk 2/4]"));
}

#[test]
fn format_abandoned_reports_attempts_and_cause() {
    let ctx = sample_context(FetcherError::from_status(500, None, "Backend Error".into()));
    let message = ctx.format_abandoned();
    assert!(message.contains("after 3 attempts in 6.5s"));
    assert!(message.contains("HTTP 500: Backend Error"));
}

#[test]
fn forbidden_and_not_found_get_their_own_hints() {
    let forbidden = FetcherError::from_status(403, Some("commentsDisabled".into()), String::new());
    assert_eq!(RetryErrorType::from_error(&forbidden), RetryErrorType::Forbidden);
    assert!(RetryErrorType::Forbidden.suggestion().contains("disabled comments"));

    let missing = FetcherError::from_status(404, Some("videoNotFound".into()), String::new());
    assert_eq!(RetryErrorType::from_error(&missing), RetryErrorType::NotFound);
    assert!(RetryErrorType::NotFound.suggestion().contains("deleted"));
}

#[test]
fn rate_limit_reasons_count_as_quota() {
    let throttled = FetcherError::from_status(429, Some("rateLimitExceeded".into()), String::new());
    assert_eq!(RetryErrorType::from_error(&throttled), RetryErrorType::QuotaExhausted);

    let plain_429 = FetcherError::from_status(429, None, String::new());
    assert_eq!(RetryErrorType::from_error(&plain_429), RetryErrorType::ClientError(429));
}

#[test]
fn malformed_body_is_classified() {
    let ctx = sample_context(FetcherError::Parse("expected value at line 1".into()));
    assert_eq!(ctx.error_type, RetryErrorType::MalformedBody);
    assert!(ctx.format_failure().contains("Unit: chunk 2/4"));
}
