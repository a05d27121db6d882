//! Request executor with bounded retry
//!
//! Every upstream call made by a collector goes through
//! [`RequestExecutor::execute`]. Transient faults are retried with exponential
//! backoff until the elapsed-time ceiling would be crossed, after which the
//! request is reported as [`RequestOutcome::Unavailable`] and the caller skips
//! that unit of work. Fatal faults are never retried: they unwind as
//! [`HarvestError::Fatal`] so the run stops at once.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use super::config::RetryPolicy;
use super::progress::{NoopObserver, SharedObserver};
use super::HarvestError;
use crate::clock::{SharedClock, SystemClock};
use crate::fetcher::retry_formatter::RetryContext;
use crate::fetcher::{Endpoint, EndpointInvoker, ErrorKind, FetcherError, RequestParams};
use crate::metrics::{self, RequestMetrics};

/// Result of one logical request.
#[derive(Debug, Clone)]
pub enum RequestOutcome {
    /// Decoded response body
    Page(Value),
    /// Retry budget exhausted on transient faults
    Unavailable {
        /// Attempts made
        attempts: u32,
        /// Fault of the last attempt
        last_error: FetcherError,
    },
}

/// Per-request retry bookkeeping.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    /// Attempts made so far
    pub attempt: u32,
    /// When the first attempt started
    pub started: Instant,
    /// Classification of the last fault
    pub error_kind: Option<ErrorKind>,
}

impl RetryState {
    fn begin() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
            error_kind: None,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Issues upstream calls one at a time, with retry
pub struct RequestExecutor {
    invoker: Arc<dyn EndpointInvoker>,
    policy: RetryPolicy,
    observer: SharedObserver,
    clock: SharedClock,
    calls_issued: AtomicU64,
    quota_used: AtomicU64,
}

impl RequestExecutor {
    /// Create an executor with the default policy, no observer and the system clock.
    pub fn new(invoker: Arc<dyn EndpointInvoker>) -> Self {
        Self {
            invoker,
            policy: RetryPolicy::default(),
            observer: Arc::new(NoopObserver),
            clock: Arc::new(SystemClock),
            calls_issued: AtomicU64::new(0),
            quota_used: AtomicU64::new(0),
        }
    }

    /// Set the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Attach an observer
    pub fn with_observer(mut self, observer: SharedObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Set the clock used for `query_time` stamps
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Observer shared with the collectors.
    pub fn observer(&self) -> &SharedObserver {
        &self.observer
    }

    /// Clock shared with the collectors.
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Retry policy in force.
    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Upstream calls issued so far, retries included.
    pub fn calls_issued(&self) -> u64 {
        self.calls_issued.load(Ordering::Relaxed)
    }

    /// Quota units consumed by the calls issued so far.
    pub fn quota_used(&self) -> u64 {
        self.quota_used.load(Ordering::Relaxed)
    }

    /// Execute one logical request.
    ///
    /// `unit` names the unit of work (sub-window, chunk, parent ID) for logs.
    pub async fn execute(
        &self,
        endpoint: Endpoint,
        params: &RequestParams,
        unit: &str,
    ) -> Result<RequestOutcome, HarvestError> {
        let mut state = RetryState::begin();

        loop {
            state.attempt += 1;
            self.calls_issued.fetch_add(1, Ordering::Relaxed);
            self.quota_used
                .fetch_add(endpoint.unit_cost(), Ordering::Relaxed);
            let request_metrics = RequestMetrics::start(endpoint, state.attempt).await;

            let err = match self.invoker.invoke(endpoint, params).await {
                Ok(body) => {
                    request_metrics.record_complete();
                    if state.attempt > 1 {
                        debug!(
                            endpoint = %endpoint,
                            unit = %unit,
                            attempts = state.attempt,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(RequestOutcome::Page(body));
                }
                Err(err) => err,
            };
            request_metrics.record_failure(&err);
            state.error_kind = Some(err.kind());

            if err.kind() == ErrorKind::Fatal {
                let context = RetryContext::new(
                    state.attempt,
                    state.elapsed(),
                    self.policy.max_elapsed,
                    Duration::ZERO,
                    endpoint,
                    unit,
                    &err,
                );
                error!(
                    correlation_id = %request_metrics.correlation_id(),
                    "{}",
                    context.format_failure()
                );
                return Err(HarvestError::Fatal {
                    endpoint,
                    unit: unit.to_string(),
                    source: err,
                });
            }

            let backoff = self.policy.backoff_for(state.attempt);
            let context = RetryContext::new(
                state.attempt,
                state.elapsed(),
                self.policy.max_elapsed,
                backoff,
                endpoint,
                unit,
                &err,
            );

            if !self.policy.allows_retry(context.elapsed, backoff) {
                info!("{}", context.format_abandoned());
                return Ok(RequestOutcome::Unavailable {
                    attempts: state.attempt,
                    last_error: err,
                });
            }

            warn!("{}", context.format_retry());
            self.observer.retrying(&context);
            metrics::record_retry_backoff(endpoint, backoff, state.attempt);
            tokio::time::sleep(backoff).await;
        }
    }
}
