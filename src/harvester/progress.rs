//! Progress reporting for collector passes.
//!
//! Collectors never log progress themselves: they report events to an
//! injected [`HarvestObserver`]. [`LogObserver`] turns those events into
//! periodic `tracing` lines using [`ProgressState`] to decide cadence,
//! percentages and remaining-time estimates. [`NoopObserver`] discards them.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{info, warn};

use super::IntegrityAnomaly;
use crate::fetcher::retry_formatter::RetryContext;
use crate::output::ResourceKind;

const DEFAULT_UPDATE_INTERVAL: Duration = Duration::from_secs(60);
const MIN_PASS_DURATION: Duration = Duration::from_secs(30);

/// Outcome counters of one collector pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    /// Stream the pass wrote to
    pub kind: ResourceKind,
    /// Units of work planned (sub-windows, chunks, parents)
    pub units: u64,
    /// Logical requests issued (retries not counted)
    pub requests: u64,
    /// Pages received
    pub pages: u64,
    /// Items written
    pub items: u64,
    /// Upstream `totalResults` estimates, summed over search sub-windows
    pub declared_results: u64,
    /// Units abandoned after the retry budget ran out
    pub skipped_units: u64,
    /// Gap markers written to the metadata stream
    pub gaps: u64,
    /// Integrity anomalies logged
    pub anomalies: u64,
}

impl PassSummary {
    /// Empty summary for a pass writing `kind`.
    pub fn new(kind: ResourceKind) -> Self {
        Self {
            kind,
            units: 0,
            requests: 0,
            pages: 0,
            items: 0,
            declared_results: 0,
            skipped_units: 0,
            gaps: 0,
            anomalies: 0,
        }
    }
}

/// Receiver of collector events.
///
/// All methods default to doing nothing.
pub trait HarvestObserver: Send + Sync {
    /// A pass over `total_units` units of work is starting.
    fn pass_started(&self, _kind: ResourceKind, _total_units: u64) {}

    /// One unit of work finished, having written `items` items.
    fn unit_finished(&self, _kind: ResourceKind, _unit: &str, _items: u64) {}

    /// One unit of work was abandoned.
    fn unit_skipped(&self, _kind: ResourceKind, _unit: &str, _reason: &str) {}

    /// Missing nested structure was found and read as empty.
    fn anomaly(&self, _kind: ResourceKind, _anomaly: &IntegrityAnomaly) {}

    /// A transient fault is about to be retried.
    fn retrying(&self, _context: &RetryContext) {}

    /// The pass completed.
    fn pass_finished(&self, _summary: &PassSummary) {}
}

/// Shared observer handle.
pub type SharedObserver = Arc<dyn HarvestObserver>;

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl HarvestObserver for NoopObserver {}

/// Progress tracking state for one pass.
#[derive(Debug, Clone)]
pub struct ProgressState {
    /// Kind being collected
    pub kind: ResourceKind,
    /// Units finished or skipped so far
    pub units_done: u64,
    /// Units planned
    pub total_units: u64,
    /// Items written so far
    pub items: u64,
    /// Timestamp when the pass started
    pub start_time: Instant,
    /// Last time progress was reported
    pub last_update: Instant,
    /// Minimum interval between time-based updates
    pub update_interval: Duration,
    /// Items per second
    pub current_rate: f64,
    /// Last reported completion percentage (0-100)
    pub last_reported_percentage: f64,
    /// Minimum percentage delta required to emit a new update
    pub min_percentage_step: f64,
}

impl ProgressState {
    /// Create a state with default cadence.
    pub fn new(kind: ResourceKind, total_units: u64) -> Self {
        let now = Instant::now();
        Self {
            kind,
            units_done: 0,
            total_units,
            items: 0,
            start_time: now,
            last_update: now,
            update_interval: DEFAULT_UPDATE_INTERVAL,
            current_rate: 0.0,
            last_reported_percentage: 0.0,
            min_percentage_step: 10.0,
        }
    }

    /// Count one more unit and its items.
    pub fn update(&mut self, new_items: u64) {
        self.units_done = self.units_done.saturating_add(1);
        self.items = self.items.saturating_add(new_items);
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.current_rate = self.items as f64 / elapsed;
        }
    }

    /// Whether an update should be emitted based on time or percentage.
    pub fn should_emit_update(&self) -> bool {
        if self.units_done == 0 {
            return false;
        }
        if self.percentage() - self.last_reported_percentage >= self.min_percentage_step {
            return true;
        }
        self.start_time.elapsed() >= MIN_PASS_DURATION
            && self.last_update.elapsed() >= self.update_interval
    }

    /// Call after emitting a progress line.
    pub fn mark_emitted(&mut self) {
        self.last_update = Instant::now();
        self.last_reported_percentage = self.percentage();
    }

    /// Completion percentage (0-100) by units.
    pub fn percentage(&self) -> f64 {
        if self.total_units == 0 {
            return 100.0;
        }
        (self.units_done as f64 / self.total_units as f64 * 100.0).min(100.0)
    }

    /// Remaining time, extrapolated from the unit completion rate.
    pub fn estimate_remaining(&self) -> Option<Duration> {
        if self.units_done == 0 || self.units_done >= self.total_units {
            return None;
        }
        let elapsed = self.start_time.elapsed().as_secs_f64();
        let per_unit = elapsed / self.units_done as f64;
        let remaining = (self.total_units - self.units_done) as f64 * per_unit;
        Some(Duration::from_secs_f64(remaining))
    }

    /// Human-readable progress string for logging.
    pub fn format_progress(&self) -> String {
        let mut parts = vec![format!(
            "[PROGRESS] {}: {}/{} {}s ({:.1}%) - {} items",
            self.kind,
            self.units_done,
            self.total_units,
            self.kind.unit_label(),
            self.percentage(),
            self.items
        )];

        if self.current_rate > 0.0 {
            parts.push(format!("at {:.0} items/sec", self.current_rate));
        }

        if let Some(remaining) = self.estimate_remaining() {
            parts.push(format!("- ~{} remaining", format_duration(remaining)));
        }

        parts.join(" ")
    }
}

/// Observer that writes progress through `tracing`
#[derive(Debug, Default)]
pub struct LogObserver {
    state: Mutex<Option<ProgressState>>,
}

impl LogObserver {
    /// Create an observer.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state(&self, f: impl FnOnce(&mut ProgressState)) {
        if let Ok(mut guard) = self.state.lock() {
            if let Some(state) = guard.as_mut() {
                f(state);
            }
        }
    }
}

impl HarvestObserver for LogObserver {
    fn pass_started(&self, kind: ResourceKind, total_units: u64) {
        info!(
            kind = %kind,
            total_units = total_units,
            "Starting {} pass over {} {}s",
            kind,
            total_units,
            kind.unit_label()
        );
        if let Ok(mut guard) = self.state.lock() {
            *guard = Some(ProgressState::new(kind, total_units));
        }
    }

    fn unit_finished(&self, _kind: ResourceKind, _unit: &str, items: u64) {
        self.with_state(|state| {
            state.update(items);
            if state.should_emit_update() {
                info!("{}", state.format_progress());
                state.mark_emitted();
            }
        });
    }

    fn unit_skipped(&self, kind: ResourceKind, unit: &str, reason: &str) {
        info!(kind = %kind, unit = %unit, reason = %reason, "Skipping unit of work");
        self.with_state(|state| state.update(0));
    }

    fn anomaly(&self, kind: ResourceKind, anomaly: &IntegrityAnomaly) {
        warn!(
            kind = %kind,
            parent_id = %anomaly.parent_id(),
            cause = %anomaly.cause(),
            "Integrity anomaly: {}",
            anomaly
        );
    }

    fn pass_finished(&self, summary: &PassSummary) {
        info!(
            kind = %summary.kind,
            units = summary.units,
            requests = summary.requests,
            pages = summary.pages,
            items = summary.items,
            declared_results = summary.declared_results,
            skipped_units = summary.skipped_units,
            gaps = summary.gaps,
            anomalies = summary.anomalies,
            "Finished {} pass",
            summary.kind
        );
        if let Ok(mut guard) = self.state.lock() {
            *guard = None;
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m", secs / 60)
    } else {
        format!("{:.1}h", secs as f64 / 3600.0)
    }
}
