//! Terminal progress bars

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;

use crate::fetcher::retry_formatter::RetryContext;
use crate::harvester::{HarvestObserver, IntegrityAnomaly, PassSummary};
use crate::output::ResourceKind;

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}";

/// Observer drawing one progress bar per collector pass
#[derive(Debug, Default)]
pub struct ProgressBarObserver {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarObserver {
    /// Create an observer with no active bar.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl HarvestObserver for ProgressBarObserver {
    fn pass_started(&self, kind: ResourceKind, total_units: u64) {
        let bar = create_progress_bar(kind, total_units);
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(previous) = guard.replace(bar) {
                previous.finish_and_clear();
            }
        }
    }

    fn unit_finished(&self, kind: ResourceKind, unit: &str, items: u64) {
        self.with_bar(|bar| {
            bar.inc(1);
            bar.set_message(format!("{kind}: {unit} ({items} items)"));
        });
    }

    fn unit_skipped(&self, kind: ResourceKind, unit: &str, _reason: &str) {
        self.with_bar(|bar| {
            bar.inc(1);
            bar.set_message(format!("{kind}: skipped {unit}"));
        });
    }

    fn anomaly(&self, _kind: ResourceKind, anomaly: &IntegrityAnomaly) {
        self.with_bar(|bar| bar.println(format!("anomaly: {anomaly}")));
    }

    fn retrying(&self, context: &RetryContext) {
        self.with_bar(|bar| bar.set_message(context.format_retry()));
    }

    fn pass_finished(&self, summary: &PassSummary) {
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                bar.finish_with_message(format!(
                    "{}: {} items from {} requests",
                    summary.kind, summary.items, summary.requests
                ));
            }
        }
    }
}

/// Create progress bar with style
fn create_progress_bar(kind: ResourceKind, total_units: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_units);
    let style = ProgressStyle::default_bar()
        .template(BAR_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    pb.set_message(format!("Collecting {kind}"));
    pb
}
