//! Upstream endpoint capability
//!
//! Collectors talk to the upstream API only through [`EndpointInvoker`]: one
//! `invoke` is one billed call. [`youtube_http::YoutubeHttpClient`] is the
//! production implementation; tests script their own.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

pub mod retry_formatter;
pub mod youtube_http;
pub mod youtube_parser;

/// Upstream reasons that signal an exhausted or throttled quota.
pub const QUOTA_REASONS: [&str; 4] = [
    "quotaExceeded",
    "rateLimitExceeded",
    "dailyLimitExceeded",
    "userRateLimitExceeded",
];

/// Logical upstream operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Windowed search (`search.list`)
    Search,
    /// Batch video detail lookup by ID (`videos.list`)
    Videos,
    /// Batch channel detail lookup by ID (`channels.list`)
    Channels,
    /// Comment threads under one video (`commentThreads.list`)
    CommentThreads,
    /// Replies under one thread (`comments.list`)
    Comments,
}

impl Endpoint {
    /// REST resource path relative to the API base URL.
    pub fn path(&self) -> &'static str {
        match self {
            Self::Search => "search",
            Self::Videos => "videos",
            Self::Channels => "channels",
            Self::CommentThreads => "commentThreads",
            Self::Comments => "comments",
        }
    }

    /// Quota units charged per call, independent of page size.
    pub fn unit_cost(&self) -> u64 {
        match self {
            Self::Search => crate::window::SEARCH_CALL_COST,
            _ => 1,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Immutable per-request parameter bag.
///
/// Every pagination step derives a new value instead of mutating a shared
/// one, so a retried request always re-sends exactly what it sent before.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequestParams(BTreeMap<String, String>);

impl RequestParams {
    /// Empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy with `key` set to `value`.
    pub fn with(&self, key: impl Into<String>, value: impl ToString) -> Self {
        let mut next = self.0.clone();
        next.insert(key.into(), value.to_string());
        Self(next)
    }

    /// Copy without `key`.
    pub fn without(&self, key: &str) -> Self {
        let mut next = self.0.clone();
        next.remove(key);
        Self(next)
    }

    /// Copy pointing at the given continuation page.
    pub fn with_page_token(&self, token: &str) -> Self {
        self.with("pageToken", token)
    }

    /// Value for `key`, if set.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Iterate key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parameters as a JSON object for provenance records.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

/// Retry classification of an endpoint fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Worth retrying with backoff
    Transient,
    /// Terminates the run
    Fatal,
}

/// Endpoint faults
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetcherError {
    /// Quota exhausted or hard rate limit hit
    #[error("quota exhausted ({reason}): {message}")]
    QuotaExhausted {
        /// Upstream reason code (e.g. `quotaExceeded`)
        reason: String,
        /// Upstream message
        message: String,
    },

    /// Non-success HTTP status
    #[error("HTTP {status}{}: {message}", .reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default())]
    Http {
        /// Status code
        status: u16,
        /// First upstream reason code, if the body carried one
        reason: Option<String>,
        /// Upstream message or raw body
        message: String,
    },

    /// Connection, timeout, or transport failure
    #[error("network error: {0}")]
    Network(String),

    /// Body was not valid JSON
    #[error("parse error: {0}")]
    Parse(String),
}

impl FetcherError {
    /// Transient vs. Fatal.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QuotaExhausted { .. } => ErrorKind::Fatal,
            _ => ErrorKind::Transient,
        }
    }

    /// HTTP status, if the fault came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::QuotaExhausted { .. } => Some(403),
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Upstream reason code, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::QuotaExhausted { reason, .. } => Some(reason),
            Self::Http { reason, .. } => reason.as_deref(),
            _ => None,
        }
    }

    /// Build the error for a non-success status, promoting quota reasons to Fatal.
    pub fn from_status(status: u16, reason: Option<String>, message: String) -> Self {
        let quota = matches!(status, 403 | 429)
            && reason
                .as_deref()
                .is_some_and(|r| QUOTA_REASONS.contains(&r));
        match (quota, reason) {
            (true, Some(reason)) => Self::QuotaExhausted { reason, message },
            (_, reason) => Self::Http {
                status,
                reason,
                message,
            },
        }
    }
}

/// Result type for endpoint calls
pub type FetcherResult<T> = Result<T, FetcherError>;

/// Capability to invoke one upstream operation.
#[async_trait]
pub trait EndpointInvoker: Send + Sync {
    /// Issue exactly one call and return the decoded body.
    async fn invoke(&self, endpoint: Endpoint, params: &RequestParams) -> FetcherResult<Value>;
}
