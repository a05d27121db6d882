//! Retry message formatting
//!
//! Turns a failed attempt into consistent, operator-friendly log lines:
//! a warning per retry, an info line when a unit of work is abandoned, and a
//! terminating message with remediation when the quota is gone.

use std::time::Duration;

use super::{Endpoint, FetcherError};

/// Classification of a failed attempt for user messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryErrorType {
    /// Daily quota exhausted or hard rate limit
    QuotaExhausted,
    /// Connection, DNS, or timeout failure
    Network,
    /// HTTP 5xx
    ServerError(u16),
    /// Resource gone or never existed (404)
    NotFound,
    /// Access refused for a non-quota reason (e.g. comments disabled)
    Forbidden,
    /// Other HTTP 4xx
    ClientError(u16),
    /// Body could not be decoded
    MalformedBody,
}

impl RetryErrorType {
    /// Classify an endpoint fault.
    pub fn from_error(err: &FetcherError) -> Self {
        match err {
            FetcherError::QuotaExhausted { .. } => Self::QuotaExhausted,
            FetcherError::Network(_) => Self::Network,
            FetcherError::Parse(_) => Self::MalformedBody,
            FetcherError::Http { status, .. } => match *status {
                404 => Self::NotFound,
                403 => Self::Forbidden,
                s if s >= 500 => Self::ServerError(s),
                s => Self::ClientError(s),
            },
        }
    }

    /// Short description used inside retry lines.
    pub fn description(&self) -> &'static str {
        match self {
            Self::QuotaExhausted => "quota exhausted",
            Self::Network => "network error",
            Self::ServerError(503) => "service unavailable",
            Self::ServerError(_) => "server error",
            Self::NotFound => "resource not found",
            Self::Forbidden => "access forbidden",
            Self::ClientError(_) => "client error",
            Self::MalformedBody => "malformed response body",
        }
    }

    /// Remediation hint for final failure messages.
    pub fn suggestion(&self) -> &'static str {
        match self {
            Self::QuotaExhausted => {
                "Wait for the daily quota reset (midnight Pacific time) before re-running"
            }
            Self::Network => "Check network connectivity and DNS resolution",
            Self::ServerError(_) => "The API may be degraded; the next scheduled run will retry",
            Self::NotFound => "The resource was likely deleted during collection",
            Self::Forbidden => "The owner may have disabled comments or restricted the resource",
            Self::ClientError(_) => "Review request parameters for this endpoint",
            Self::MalformedBody => "Upstream returned an unexpected payload; inspect the log",
        }
    }
}

/// Context for one failed attempt of a logical request.
#[derive(Debug, Clone)]
pub struct RetryContext {
    /// Attempt number (1-based)
    pub attempt: u32,
    /// Time spent on this request so far
    pub elapsed: Duration,
    /// Elapsed-time ceiling after which the request is abandoned
    pub ceiling: Duration,
    /// Wait before the next attempt
    pub backoff: Duration,
    /// Failure classification
    pub error_type: RetryErrorType,
    /// Endpoint being called
    pub endpoint: Endpoint,
    /// Unit of work (sub-window, chunk, parent ID)
    pub unit: String,
    /// Original error text
    pub error_message: String,
}

impl RetryContext {
    /// Build a context from the fault that just happened.
    pub fn new(
        attempt: u32,
        elapsed: Duration,
        ceiling: Duration,
        backoff: Duration,
        endpoint: Endpoint,
        unit: impl Into<String>,
        error: &FetcherError,
    ) -> Self {
        Self {
            attempt,
            elapsed,
            ceiling,
            backoff,
            error_type: RetryErrorType::from_error(error),
            endpoint,
            unit: unit.into(),
            error_message: error.to_string(),
        }
    }

    /// Warning line emitted before sleeping.
    pub fn format_retry(&self) -> String {
        let mut message = format!(
            "Retrying {} (attempt {}) after {} - waiting {:.1}s ({:.1}s of {:.0}s budget used)",
            self.endpoint,
            self.attempt,
            self.error_type.description(),
            self.backoff.as_secs_f64(),
            self.elapsed.as_secs_f64(),
            self.ceiling.as_secs_f64()
        );
        append_unit(&mut message, &self.unit);
        message
    }

    /// Info line emitted when the request is abandoned and the unit skipped.
    pub fn format_abandoned(&self) -> String {
        let mut message = format!(
            "Giving up on {} after {} attempts in {:.1}s: {}",
            self.endpoint,
            self.attempt,
            self.elapsed.as_secs_f64(),
            self.error_message
        );
        append_unit(&mut message, &self.unit);
        message
    }

    /// Multi-line summary for a terminating failure.
    pub fn format_failure(&self) -> String {
        let unit = if self.unit.is_empty() {
            "unknown"
        } else {
            &self.unit
        };
        let mut lines = vec![
            format!("[FAILED] {} request aborted the run", self.endpoint),
            format!("  Cause: {}", self.error_type.description()),
            format!("  Last error: {}", self.error_message),
            format!("  Unit: {unit}"),
            "  Suggestions:".to_string(),
        ];
        lines.push(format!("    - {}", self.error_type.suggestion()));
        lines.join("\n")
    }
}

fn append_unit(buffer: &mut String, unit: &str) {
    if !unit.is_empty() {
        buffer.push_str(" [");
        buffer.push_str(unit);
        buffer.push(']');
    }
}
