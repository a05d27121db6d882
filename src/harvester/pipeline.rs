//! Per-topic harvest pipeline
//!
//! Runs the passes for one topic in order, each reading its input IDs back
//! from the stream the previous pass wrote:
//!
//! 1. search over the sliced window -> `videos`, `metadata`
//! 2. video IDs from `videos` -> `details`
//! 3. channel IDs from `videos` -> `channels`
//! 4. video IDs from `videos` -> `threads`
//! 5. escalated thread IDs from `threads` -> `comments`
//!
//! A fatal error stops the pipeline right away; everything already flushed
//! stays on disk.

use std::future::Future;
use std::path::PathBuf;

use serde::Serialize;
use tracing::info;

use super::batch::{BatchLookup, BatchLookupCollector};
use super::executor::RequestExecutor;
use super::nested::{Escalation, EscalationRule, NestedLookup, NestedPaginatedCollector};
use super::progress::PassSummary;
use super::windowed::{SearchQuery, WindowedSearchCollector};
use super::HarvestError;
use crate::config::{HarvestSettings, TopicConfig, TopicSet};
use crate::fetcher::youtube_parser::YoutubeParser;
use crate::ids::IdSet;
use crate::metrics::{self, PassMetrics};
use crate::output::{read_records, NdjsonWriter, OutputPathBuilder, RecordWriter, ResourceKind};
use crate::shutdown::SharedShutdown;
use crate::window::{CollectionWindow, QuotaEstimate};

/// What one topic run did.
#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    /// Topic name
    pub topic: String,
    /// Window searched
    pub window: CollectionWindow,
    /// Advisory search cost
    pub estimate: QuotaEstimate,
    /// Pass summaries, in pipeline order
    pub passes: Vec<PassSummary>,
}

impl TopicReport {
    /// Summary of the pass that wrote `kind`.
    pub fn pass(&self, kind: ResourceKind) -> Option<&PassSummary> {
        self.passes.iter().find(|pass| pass.kind == kind)
    }
}

/// Harvests topics end to end
pub struct TopicPipeline {
    executor: RequestExecutor,
    settings: HarvestSettings,
    data_dir: PathBuf,
    shutdown: Option<SharedShutdown>,
}

impl TopicPipeline {
    /// Create a pipeline writing under `data_dir`.
    pub fn new(executor: RequestExecutor, settings: HarvestSettings, data_dir: PathBuf) -> Self {
        Self {
            executor,
            settings,
            data_dir,
            shutdown: None,
        }
    }

    /// Stop between topics once shutdown is requested
    pub fn with_shutdown(mut self, shutdown: SharedShutdown) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Executor shared by every pass.
    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    /// Settings in force.
    pub fn settings(&self) -> &HarvestSettings {
        &self.settings
    }

    /// Stream layout for `topic` on today's collection date.
    pub fn paths_for(&self, topic: &str) -> OutputPathBuilder {
        OutputPathBuilder::new(self.data_dir.clone(), topic)
            .with_collection_date(self.executor.clock().now())
    }

    /// Harvest every topic, in name order.
    ///
    /// A fatal error on any topic ends the run; topics after it are not started.
    pub async fn run_all(&self, topics: &TopicSet) -> Result<Vec<TopicReport>, HarvestError> {
        let mut reports = Vec::with_capacity(topics.len());
        for (name, topic) in topics.iter() {
            if self
                .shutdown
                .as_ref()
                .is_some_and(|s| s.is_shutdown_requested())
            {
                info!(topic = %name, "Shutdown requested, not starting remaining topics");
                break;
            }
            reports.push(self.run_topic(name, topic).await?);
        }
        Ok(reports)
    }

    /// Harvest one topic.
    pub async fn run_topic(&self, name: &str, topic: &TopicConfig) -> Result<TopicReport, HarvestError> {
        let window = self.settings.window_for(name, topic)?;
        let increment = self.settings.increment()?;
        let estimate = QuotaEstimate::for_window(window, increment);
        let paths = self.paths_for(name);
        paths.ensure_directories()?;

        info!(
            topic = %name,
            window = %window,
            search_calls = estimate.calls,
            search_units = estimate.total_units(),
            "Harvesting topic"
        );

        let mut passes = Vec::with_capacity(5);

        // 1. search
        let query = SearchQuery {
            q: topic.q.clone(),
            order: self.settings.search_order.clone(),
            safe_search: self.settings.safe_search.clone(),
            page_size: self.settings.search_page_size,
        };
        let mut videos_out = NdjsonWriter::create(paths.build(ResourceKind::Videos))?;
        let mut metadata_out = NdjsonWriter::create(paths.build(ResourceKind::Metadata))?;
        let result = self
            .tracked(
                ResourceKind::Videos,
                name,
                WindowedSearchCollector::new(&self.executor)
                    .with_gap_markers(self.settings.gap_markers)
                    .collect(&query, window, increment, &mut videos_out, &mut metadata_out),
            )
            .await;
        let closed = videos_out.close().and(metadata_out.close());
        passes.push(result?);
        closed?;

        let mut video_ids = IdSet::new();
        let mut channel_ids = IdSet::new();
        for record in read_records(paths.build(ResourceKind::Videos))? {
            let record = record?;
            video_ids.extend(YoutubeParser::search_video_id(&record));
            channel_ids.extend(YoutubeParser::channel_id(&record));
        }

        // 2-3. details
        let lookups = [
            (
                BatchLookup::video_details().with_chunk_size(self.settings.lookup_chunk_size),
                &video_ids,
            ),
            (
                BatchLookup::channel_details().with_chunk_size(self.settings.lookup_chunk_size),
                &channel_ids,
            ),
        ];
        for (lookup, ids) in &lookups {
            let mut out = NdjsonWriter::create(paths.build(lookup.kind))?;
            let result = self
                .tracked(
                    lookup.kind,
                    name,
                    BatchLookupCollector::new(&self.executor).collect(lookup, ids, &mut out),
                )
                .await;
            let closed = out.close();
            passes.push(result?);
            closed?;
        }

        // 4. threads
        let threads = NestedLookup::comment_threads()
            .with_page_size(self.settings.thread_page_size)
            .with_order(Some(self.settings.thread_order.clone()));
        let mut threads_out = NdjsonWriter::create(paths.build(ResourceKind::Threads))?;
        let result = self
            .tracked(
                ResourceKind::Threads,
                name,
                NestedPaginatedCollector::new(&self.executor).collect(&threads, &video_ids, &mut threads_out),
            )
            .await;
        let closed = threads_out.close();
        let mut threads_summary = result?;
        closed?;

        // 5. replies
        let rule = EscalationRule::new(self.settings.reply_threshold);
        let mut escalation = Escalation::default();
        for record in read_records(paths.build(ResourceKind::Threads))? {
            rule.consider(&record?, &mut escalation);
        }
        for anomaly in &escalation.anomalies {
            metrics::record_anomaly(ResourceKind::Threads, anomaly);
            self.executor.observer().anomaly(ResourceKind::Threads, anomaly);
        }
        threads_summary.anomalies += escalation.anomalies.len() as u64;
        passes.push(threads_summary);
        info!(
            topic = %name,
            threshold = self.settings.reply_threshold,
            escalated = escalation.parents.len(),
            "Escalating threads to reply collection"
        );

        let replies = NestedLookup::replies().with_page_size(self.settings.reply_page_size);
        let mut comments_out = NdjsonWriter::create(paths.build(ResourceKind::Comments))?;
        let result = self
            .tracked(
                ResourceKind::Comments,
                name,
                NestedPaginatedCollector::new(&self.executor).collect(
                    &replies,
                    &escalation.parents,
                    &mut comments_out,
                ),
            )
            .await;
        let closed = comments_out.close();
        passes.push(result?);
        closed?;

        info!(
            topic = %name,
            calls_issued = self.executor.calls_issued(),
            quota_used = self.executor.quota_used(),
            "Topic harvested"
        );

        Ok(TopicReport {
            topic: name.to_string(),
            window,
            estimate,
            passes,
        })
    }

    async fn tracked<F>(&self, kind: ResourceKind, topic: &str, pass: F) -> Result<PassSummary, HarvestError>
    where
        F: Future<Output = Result<PassSummary, HarvestError>>,
    {
        let pass_metrics = PassMetrics::start(kind, topic);
        let result = pass.await;
        match &result {
            Ok(summary) => pass_metrics.record_success(summary),
            Err(e) => pass_metrics.record_failure(&e.to_string()),
        }
        result
    }
}
