//! YouTube Data API v3 HTTP client
//!
//! Issues exactly one GET per [`EndpointInvoker::invoke`]. Retrying is the
//! executor's job; this client only classifies what came back:
//! - 2xx with a JSON body → `Ok(body)`
//! - 403/429 with a quota reason → [`FetcherError::QuotaExhausted`]
//! - anything else → a transient [`FetcherError`]

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use super::{Endpoint, EndpointInvoker, FetcherError, FetcherResult, RequestParams};

/// Public API root.
pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP implementation of the endpoint capability
pub struct YoutubeHttpClient {
    client: Arc<Client>,
    base_url: String,
    api_key: String,
}

impl YoutubeHttpClient {
    /// Create a client against the public API.
    pub fn new(api_key: impl Into<String>) -> FetcherResult<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FetcherError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(Arc::new(client), DEFAULT_BASE_URL, api_key))
    }

    /// Create a client from a shared reqwest client and explicit base URL.
    pub fn with_client(
        client: Arc<Client>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, endpoint: Endpoint) -> String {
        format!("{}/{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl EndpointInvoker for YoutubeHttpClient {
    async fn invoke(&self, endpoint: Endpoint, params: &RequestParams) -> FetcherResult<Value> {
        let url = self.url_for(endpoint);
        let mut query: Vec<(&str, &str)> = params.iter().collect();
        query.push(("key", self.api_key.as_str()));

        debug!(endpoint = %endpoint, params = params.iter().count(), "Issuing request");

        let response = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await
            .map_err(|e| FetcherError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| FetcherError::Network(format!("failed to read body: {e}")))?;

        if !status.is_success() {
            let (reason, message) = parse_error_body(&body);
            return Err(FetcherError::from_status(status.as_u16(), reason, message));
        }

        serde_json::from_str(&body).map_err(|e| FetcherError::Parse(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    reason: Option<String>,
}

/// Extract `(first reason, message)` from an API error body.
///
/// Unrecognised bodies yield no reason and the raw text as message.
pub fn parse_error_body(body: &str) -> (Option<String>, String) {
    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => {
            let reason = envelope
                .error
                .errors
                .into_iter()
                .find_map(|detail| detail.reason);
            (reason, envelope.error.message)
        }
        Err(_) => (None, body.trim().to_string()),
    }
}
