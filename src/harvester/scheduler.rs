//! Recurring runner
//!
//! Repeats a job a fixed number of times, starting iterations `interval`
//! apart. The loop is explicit: run, measure, wait out the rest of the
//! interval, repeat. There is no wait after the last iteration, and none
//! when an iteration overran its interval. A failed iteration is recorded
//! and the next one still runs. Shutdown cuts the wait short and no further
//! iteration starts; a running iteration is never interrupted.

use std::fmt::{self, Display};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use tracing::{error, info};

use crate::clock::{SharedClock, SystemClock};
use crate::shutdown::SharedShutdown;

/// Result of one iteration.
#[derive(Debug)]
pub struct IterationOutcome<T, E> {
    /// 1-based iteration number
    pub iteration: u32,
    /// Wall-clock start
    pub started_at: DateTime<Utc>,
    /// Time the job took
    pub elapsed: Duration,
    /// Job result
    pub result: Result<T, E>,
}

/// Runs a job on a fixed interval
#[derive(Clone)]
pub struct RecurringRunner {
    iterations: u32,
    interval: Duration,
    shutdown: Option<SharedShutdown>,
    clock: SharedClock,
}

impl fmt::Debug for RecurringRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurringRunner")
            .field("iterations", &self.iterations)
            .field("interval", &self.interval)
            .finish_non_exhaustive()
    }
}

impl RecurringRunner {
    /// Create a runner for `iterations` runs started `interval` apart.
    pub fn new(iterations: u32, interval: Duration) -> Self {
        Self {
            iterations,
            interval,
            shutdown: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Stamp iteration starts with `clock`
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = clock;
        self
    }

    /// Stop waiting when shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Remaining wait after an iteration that took `elapsed`.
    pub fn wait_after(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }

    /// Run the job; `job` receives the 1-based iteration number.
    pub async fn run<F, Fut, T, E>(&self, mut job: F) -> Vec<IterationOutcome<T, E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut outcomes = Vec::with_capacity(self.iterations as usize);

        for iteration in 1..=self.iterations {
            if self.shutdown_requested() {
                info!(iteration = iteration, "Shutdown requested, not starting iteration");
                break;
            }

            info!(
                iteration = iteration,
                total = self.iterations,
                "Starting iteration {}/{}",
                iteration,
                self.iterations
            );
            let started_at = self.clock.now();
            let started = Instant::now();
            let result = job(iteration).await;
            let elapsed = started.elapsed();

            match &result {
                Ok(_) => info!(
                    iteration = iteration,
                    elapsed_secs = elapsed.as_secs(),
                    "Iteration completed"
                ),
                Err(e) => error!(
                    iteration = iteration,
                    elapsed_secs = elapsed.as_secs(),
                    error = %e,
                    "Iteration failed, continuing with the next one"
                ),
            }
            outcomes.push(IterationOutcome {
                iteration,
                started_at,
                elapsed,
                result,
            });

            if iteration == self.iterations {
                break;
            }
            let wait = self.wait_after(elapsed);
            if wait.is_zero() {
                info!(
                    iteration = iteration,
                    "Iteration overran the interval, starting the next one now"
                );
                continue;
            }
            info!(
                next_iteration = iteration + 1,
                wait_secs = wait.as_secs(),
                "Waiting for next iteration"
            );
            if !self.sleep_unless_shutdown(wait).await {
                info!("Shutdown requested during wait");
                break;
            }
        }

        outcomes
    }

    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|s| s.is_shutdown_requested())
    }

    /// Returns false if the wait was cut short by shutdown.
    async fn sleep_unless_shutdown(&self, wait: Duration) -> bool {
        match &self.shutdown {
            Some(shutdown) => {
                tokio::select! {
                    _ = tokio::time::sleep(wait) => true,
                    _ = shutdown.wait_for_shutdown() => false,
                }
            }
            None => {
                tokio::time::sleep(wait).await;
                true
            }
        }
    }
}
