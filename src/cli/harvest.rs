//! Harvest, schedule and estimate commands

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use super::progress::ProgressBarObserver;
use super::CliError;
use crate::config::{HarvestSettings, TopicSet};
use crate::fetcher::youtube_http::YoutubeHttpClient;
use crate::harvester::{
    LogObserver, RecurringRunner, RequestExecutor, RetryPolicy, SharedObserver, TopicPipeline,
    TopicReport,
};
use crate::shutdown::SharedShutdown;
use crate::window::QuotaEstimate;

/// YouTube harvester CLI
#[derive(Parser, Debug)]
#[command(name = "yt-harvester")]
#[command(about = "Quota-aware incremental harvester for YouTube search, detail and comment data", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Topic file: JSON object of topic -> {"q", "focal_date"}
    #[arg(long, global = true, default_value = "topics.json")]
    pub topics: PathBuf,

    /// Data root directory; streams go to {data_dir}/{topic}/
    #[arg(long, global = true, default_value = "data")]
    pub data_dir: PathBuf,

    /// API key
    #[arg(long, global = true, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Search sub-window length in hours (each sub-window costs at least 100 units)
    #[arg(long, global = true, default_value = "1", value_parser = clap::value_parser!(i64).range(1..))]
    pub increment_hours: i64,

    /// Search the whole window in one go instead of hourly sub-windows
    #[arg(long, global = true, default_value_t = false, conflicts_with = "increment_hours")]
    pub whole_window: bool,

    /// Days on either side of each topic's focal date
    #[arg(long, global = true, default_value = "14", value_parser = clap::value_parser!(i64).range(1..))]
    pub span_days: i64,

    /// Threads with more replies than this get a full reply pass
    #[arg(long, global = true, default_value = "5")]
    pub reply_threshold: u64,

    /// Seconds a single request may spend retrying before it is skipped
    #[arg(long, global = true, default_value = "20", value_parser = clap::value_parser!(u64).range(1..=600))]
    pub retry_budget_secs: u64,

    /// Serve Prometheus metrics on this address (e.g. 0.0.0.0:9090)
    #[arg(long, global = true)]
    pub metrics_addr: Option<SocketAddr>,

    /// Do not write gap markers to the metadata stream
    #[arg(long, global = true, default_value_t = false)]
    pub no_gap_markers: bool,

    /// Suppress the quota warning and progress bars
    #[arg(long, global = true, default_value_t = false)]
    pub quiet: bool,

    /// Output format (json or human)
    #[arg(long, global = true, default_value = "human")]
    pub output_format: OutputFormat,
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest every topic once
    Harvest,

    /// Harvest every topic repeatedly on a fixed interval
    Schedule(ScheduleArgs),

    /// Print the advisory search quota cost per topic (no network)
    Estimate,
}

/// Recurring run arguments
#[derive(Args, Debug)]
pub struct ScheduleArgs {
    /// Number of runs
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    pub iterations: u32,

    /// Time between run starts, in `--unit`s
    #[arg(long, default_value = "24")]
    pub interval: u64,

    /// Unit of `--interval`: seconds, minutes, hours or days
    #[arg(long, default_value = "hours")]
    pub unit: TimeUnit,
}

impl ScheduleArgs {
    /// Interval as a duration.
    pub fn interval(&self) -> Duration {
        self.unit.duration(self.interval)
    }
}

/// Interval units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    /// Seconds
    Seconds,
    /// Minutes
    Minutes,
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TimeUnit {
    /// `amount` of this unit.
    pub fn duration(&self, amount: u64) -> Duration {
        let secs_per_unit = match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3600,
            Self::Days => 86_400,
        };
        Duration::from_secs(amount.saturating_mul(secs_per_unit))
    }
}

impl FromStr for TimeUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s" | "sec" | "seconds" => Ok(TimeUnit::Seconds),
            "m" | "min" | "minutes" => Ok(TimeUnit::Minutes),
            "h" | "hours" => Ok(TimeUnit::Hours),
            "d" | "days" => Ok(TimeUnit::Days),
            _ => Err(format!(
                "Invalid time unit: {s}. Valid options: seconds, minutes, hours, days"
            )),
        }
    }
}

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Human-readable output
    Human,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "json" => Ok(OutputFormat::Json),
            "human" => Ok(OutputFormat::Human),
            _ => Err(format!("Invalid output format: {s}")),
        }
    }
}

impl Cli {
    /// Harvest settings from the global flags.
    pub fn settings(&self) -> Result<HarvestSettings, CliError> {
        let defaults = HarvestSettings::default();
        let settings = HarvestSettings {
            span_days: self.span_days,
            increment_hours: (!self.whole_window).then_some(self.increment_hours),
            reply_threshold: self.reply_threshold,
            retry: RetryPolicy {
                max_elapsed: Duration::from_secs(self.retry_budget_secs),
                ..defaults.retry
            },
            gap_markers: !self.no_gap_markers,
            ..defaults
        };
        settings.validate()?;
        Ok(settings)
    }

    fn observer(&self) -> SharedObserver {
        if self.quiet {
            Arc::new(LogObserver::new())
        } else {
            Arc::new(ProgressBarObserver::new())
        }
    }

    fn pipeline(&self, shutdown: SharedShutdown) -> Result<TopicPipeline, CliError> {
        let api_key = self
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                CliError::InvalidArgument(
                    "an API key is required (--api-key or YOUTUBE_API_KEY)".to_string(),
                )
            })?;
        let settings = self.settings()?;
        let client = YoutubeHttpClient::new(api_key)?;
        let executor = RequestExecutor::new(Arc::new(client))
            .with_policy(settings.retry)
            .with_observer(self.observer());
        Ok(TopicPipeline::new(executor, settings, self.data_dir.clone()).with_shutdown(shutdown))
    }

    /// Per-topic estimates for the loaded topics.
    pub fn estimates(&self, topics: &TopicSet) -> Result<Vec<(String, QuotaEstimate)>, CliError> {
        let settings = self.settings()?;
        let increment = settings.increment()?;
        topics
            .iter()
            .map(|(name, topic)| -> Result<_, CliError> {
                let window = settings.window_for(name, topic)?;
                Ok((name.to_string(), QuotaEstimate::for_window(window, increment)))
            })
            .collect()
    }

    fn warn_quota(&self, topics: &TopicSet) -> Result<(), CliError> {
        if self.quiet {
            return Ok(());
        }
        let total: u64 = self
            .estimates(topics)?
            .iter()
            .map(|(_, estimate)| estimate.total_units())
            .sum();
        warn!(
            topics = topics.len(),
            "This run will cost a minimum of {} quota units for search alone. \
             Ensure the project has enough quota, or limit the number of topics.",
            total
        );
        Ok(())
    }
}

/// Run `harvest`.
pub async fn execute_harvest(cli: &Cli, shutdown: SharedShutdown) -> Result<(), CliError> {
    let topics = TopicSet::load(&cli.topics)?;
    cli.warn_quota(&topics)?;
    let pipeline = cli.pipeline(shutdown)?;

    let reports = pipeline.run_all(&topics).await?;
    print_reports(cli.output_format, &reports);
    Ok(())
}

/// Run `schedule`.
pub async fn execute_schedule(
    cli: &Cli,
    args: &ScheduleArgs,
    shutdown: SharedShutdown,
) -> Result<(), CliError> {
    let topics = TopicSet::load(&cli.topics)?;
    cli.warn_quota(&topics)?;
    let runner = RecurringRunner::new(args.iterations, args.interval()).with_shutdown(shutdown.clone());

    info!(
        iterations = args.iterations,
        interval_secs = args.interval().as_secs(),
        "Starting recurring harvest"
    );

    let outcomes = runner
        .run(|iteration| {
            let shutdown = shutdown.clone();
            let topics = &topics;
            async move {
                // A fresh pipeline per run so each run is dated by its own start.
                let pipeline = cli.pipeline(shutdown)?;
                let reports = pipeline.run_all(topics).await?;
                info!(iteration = iteration, topics = reports.len(), "Harvest run finished");
                print_reports(cli.output_format, &reports);
                Ok::<_, CliError>(())
            }
        })
        .await;

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed > 0 {
        return Err(CliError::IterationsFailed {
            failed,
            total: outcomes.len(),
        });
    }
    Ok(())
}

/// Run `estimate`.
pub fn execute_estimate(cli: &Cli) -> Result<(), CliError> {
    let topics = TopicSet::load(&cli.topics)?;
    let estimates = cli.estimates(&topics)?;
    let total: u64 = estimates.iter().map(|(_, e)| e.total_units()).sum();

    match cli.output_format {
        OutputFormat::Json => {
            let rows: Vec<_> = estimates
                .iter()
                .map(|(topic, estimate)| {
                    serde_json::json!({
                        "topic": topic,
                        "search_calls": estimate.calls,
                        "unit_cost": estimate.unit_cost,
                        "quota_units": estimate.total_units(),
                    })
                })
                .collect();
            println!(
                "{}",
                serde_json::json!({"topics": rows, "total_quota_units": total})
            );
        }
        OutputFormat::Human => {
            for (topic, estimate) in &estimates {
                println!(
                    "{topic}: {} search calls x {} units = {} units",
                    estimate.calls,
                    estimate.unit_cost,
                    estimate.total_units()
                );
            }
            println!("Total: at least {total} quota units (details and comments extra)");
        }
    }
    Ok(())
}

fn print_reports(format: OutputFormat, reports: &[TopicReport]) {
    match format {
        OutputFormat::Json => match serde_json::to_string(reports) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "Failed to encode run report"),
        },
        OutputFormat::Human => {
            for report in reports {
                println!("\nTopic {} harvested: {}", report.topic, report.window);
                for pass in &report.passes {
                    println!(
                        "  {:<9} {:>7} items, {:>6} requests, {} skipped, {} anomalies",
                        pass.kind.as_str(),
                        pass.items,
                        pass.requests,
                        pass.skipped_units,
                        pass.anomalies
                    );
                }
            }
        }
    }
}
