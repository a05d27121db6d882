//! Harvest observability metrics
//!
//! Counters for API calls, quota consumption, retries, skipped units and
//! integrity anomalies, exported through a Prometheus scrape endpoint.
//!
//! ## Architecture
//!
//! - Uses `metrics` crate for low-overhead metric collection
//! - Prometheus exporter is optional (`--metrics-addr`)
//! - Without an installed recorder every macro is a no-op

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use metrics_exporter_prometheus::PrometheusBuilder;
use once_cell::sync::Lazy;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::fetcher::{Endpoint, FetcherError};
use crate::harvester::{IntegrityAnomaly, PassSummary};
use crate::output::ResourceKind;

/// Global metrics registry initialization flag
static METRICS_INITIALIZED: Lazy<Arc<RwLock<bool>>> = Lazy::new(|| Arc::new(RwLock::new(false)));

/// Correlation ID generator for request tracing
static CORRELATION_COUNTER: Lazy<Arc<RwLock<u64>>> = Lazy::new(|| Arc::new(RwLock::new(0)));

/// Initialize metrics system with Prometheus exporter
///
/// Idempotent: later calls are ignored.
///
/// # Arguments
/// * `addr` - Socket address to bind Prometheus scrape endpoint (e.g., "0.0.0.0:9090")
pub async fn init_metrics(addr: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut initialized = METRICS_INITIALIZED.write().await;
    if *initialized {
        debug!("Metrics already initialized, skipping");
        return Ok(());
    }

    info!("Initializing metrics system on {}", addr);

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        "harvest_api_calls_total",
        Unit::Count,
        "Total number of calls issued to the YouTube Data API"
    );

    describe_counter!(
        "harvest_quota_units_total",
        Unit::Count,
        "Quota units consumed by issued calls"
    );

    describe_counter!(
        "harvest_retries_total",
        Unit::Count,
        "Total number of retry attempts after transient faults"
    );

    describe_histogram!(
        "harvest_retry_backoff_seconds",
        Unit::Seconds,
        "Duration of retry backoff in seconds"
    );

    describe_histogram!(
        "harvest_request_duration_seconds",
        Unit::Seconds,
        "API call duration in seconds"
    );

    describe_counter!(
        "harvest_skipped_units_total",
        Unit::Count,
        "Units of work abandoned after exhausting the retry budget"
    );

    describe_counter!(
        "harvest_integrity_anomalies_total",
        Unit::Count,
        "Records or parents with missing nested structure"
    );

    describe_counter!(
        "harvest_passes_completed_total",
        Unit::Count,
        "Collector passes that ran to completion"
    );

    describe_counter!(
        "harvest_passes_failed_total",
        Unit::Count,
        "Collector passes stopped by a fatal error"
    );

    *initialized = true;
    info!("Metrics system initialized successfully on {}", addr);
    Ok(())
}

/// Generate a new correlation ID for request tracing
pub async fn generate_correlation_id() -> String {
    let mut counter = CORRELATION_COUNTER.write().await;
    *counter += 1;
    format!("req-{:08x}", *counter)
}

/// Metrics for one API call
pub struct RequestMetrics {
    endpoint: Endpoint,
    start_time: Instant,
    correlation_id: String,
    attempt: u32,
}

impl RequestMetrics {
    /// Start recording a call. Every call is billed, so quota is counted here.
    pub async fn start(endpoint: Endpoint, attempt: u32) -> Self {
        let correlation_id = generate_correlation_id().await;

        counter!(
            "harvest_api_calls_total",
            "endpoint" => endpoint.path(),
        )
        .increment(1);
        counter!(
            "harvest_quota_units_total",
            "endpoint" => endpoint.path(),
        )
        .increment(endpoint.unit_cost());

        debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            attempt = attempt,
            "Issuing API call"
        );

        Self {
            endpoint,
            start_time: Instant::now(),
            correlation_id,
            attempt,
        }
    }

    /// Record a successful response
    pub fn record_complete(&self) {
        let duration = self.start_time.elapsed();
        histogram!(
            "harvest_request_duration_seconds",
            "endpoint" => self.endpoint.path(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            duration_ms = duration.as_millis(),
            "API call completed"
        );
    }

    /// Record a failed call
    pub fn record_failure(&self, err: &FetcherError) {
        let duration = self.start_time.elapsed();
        histogram!(
            "harvest_request_duration_seconds",
            "endpoint" => self.endpoint.path(),
        )
        .record(duration.as_secs_f64());

        debug!(
            correlation_id = %self.correlation_id,
            endpoint = %self.endpoint,
            attempt = self.attempt,
            status = err.status().unwrap_or(0),
            reason = err.reason().unwrap_or("-"),
            duration_ms = duration.as_millis(),
            "API call failed"
        );
    }

    /// Get the correlation ID for this call
    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Record retry backoff duration
pub fn record_retry_backoff(endpoint: Endpoint, duration: Duration, attempt: u32) {
    counter!(
        "harvest_retries_total",
        "endpoint" => endpoint.path(),
    )
    .increment(1);

    histogram!(
        "harvest_retry_backoff_seconds",
        "attempt" => attempt.to_string(),
    )
    .record(duration.as_secs_f64());
}

/// Record a unit of work abandoned after the retry budget ran out
pub fn record_skipped_unit(kind: ResourceKind) {
    counter!(
        "harvest_skipped_units_total",
        "kind" => kind.as_str(),
    )
    .increment(1);
}

/// Record an integrity anomaly
pub fn record_anomaly(kind: ResourceKind, anomaly: &IntegrityAnomaly) {
    counter!(
        "harvest_integrity_anomalies_total",
        "kind" => kind.as_str(),
        "cause" => anomaly.cause().to_string(),
    )
    .increment(1);
}

/// Collector pass metrics
pub struct PassMetrics {
    kind: ResourceKind,
    topic: String,
    start_time: Instant,
}

impl PassMetrics {
    /// Start tracking a pass
    pub fn start(kind: ResourceKind, topic: impl Into<String>) -> Self {
        let topic = topic.into();

        info!(kind = %kind, topic = %topic, "Collector pass started");

        Self {
            kind,
            topic,
            start_time: Instant::now(),
        }
    }

    /// Record pass completion
    pub fn record_success(&self, summary: &PassSummary) {
        let duration = self.start_time.elapsed();

        counter!(
            "harvest_passes_completed_total",
            "kind" => self.kind.as_str(),
        )
        .increment(1);

        info!(
            kind = %self.kind,
            topic = %self.topic,
            requests = summary.requests,
            items = summary.items,
            skipped_units = summary.skipped_units,
            anomalies = summary.anomalies,
            duration_secs = duration.as_secs(),
            "Collector pass completed"
        );
    }

    /// Record a pass stopped by an error
    pub fn record_failure(&self, error: &str) {
        let duration = self.start_time.elapsed();

        counter!(
            "harvest_passes_failed_total",
            "kind" => self.kind.as_str(),
        )
        .increment(1);

        error!(
            kind = %self.kind,
            topic = %self.topic,
            error = %error,
            duration_secs = duration.as_secs(),
            "Collector pass failed"
        );
    }
}

/// Check if metrics system is initialized
pub async fn is_initialized() -> bool {
    *METRICS_INITIALIZED.read().await
}
