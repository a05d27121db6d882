//! Nested paginated collector
//!
//! Pages through child records under each parent independently: comment
//! threads under each video, replies under each escalated thread. A parent
//! whose request is abandoned, or that upstream reports as gone, costs only
//! that parent; its siblings are still collected.
//!
//! [`EscalationRule`] decides which threads need a reply pass: the thread
//! record only embeds a few replies, so any thread declaring strictly more
//! than the threshold is re-collected through the replies endpoint.

use serde_json::Value;
use tracing::debug;

use super::executor::{RequestExecutor, RequestOutcome};
use super::progress::PassSummary;
use super::{config, HarvestError, IntegrityAnomaly};
use crate::fetcher::youtube_parser::YoutubeParser;
use crate::fetcher::{Endpoint, FetcherError, RequestParams};
use crate::ids::IdSet;
use crate::metrics;
use crate::output::{RecordWriter, ResourceKind};

/// Upstream reasons meaning the parent no longer accepts child listings.
const GONE_REASONS: [&str; 5] = [
    "videoNotFound",
    "commentNotFound",
    "parentCommentNotFound",
    "commentsDisabled",
    "channelClosed",
];

/// What to page through, per parent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedLookup {
    /// Child listing endpoint
    pub endpoint: Endpoint,
    /// Output stream
    pub kind: ResourceKind,
    /// Parameter carrying the parent ID
    pub parent_param: String,
    /// `part` parameter
    pub part: String,
    /// Results per page
    pub page_size: u32,
    /// Optional `order` parameter
    pub order: Option<String>,
}

impl NestedLookup {
    /// Comment threads under a video, newest first.
    pub fn comment_threads() -> Self {
        Self {
            endpoint: Endpoint::CommentThreads,
            kind: ResourceKind::Threads,
            parent_param: "videoId".to_string(),
            part: "snippet,replies".to_string(),
            page_size: config::THREAD_PAGE_SIZE,
            order: Some("time".to_string()),
        }
    }

    /// Replies under a top-level comment.
    pub fn replies() -> Self {
        Self {
            endpoint: Endpoint::Comments,
            kind: ResourceKind::Comments,
            parent_param: "parentId".to_string(),
            part: "id,snippet".to_string(),
            page_size: config::THREAD_PAGE_SIZE,
            order: None,
        }
    }

    /// Override the page size
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Override the result order
    pub fn with_order(mut self, order: Option<String>) -> Self {
        self.order = order;
        self
    }

    fn params_for(&self, parent_id: &str) -> RequestParams {
        let params = RequestParams::new()
            .with("part", &self.part)
            .with(self.parent_param.as_str(), parent_id)
            .with("maxResults", self.page_size);
        match &self.order {
            Some(order) => params.with("order", order),
            None => params,
        }
    }
}

/// Whether a fault means the parent was deleted or closed.
pub fn is_parent_gone(err: &FetcherError) -> bool {
    err.status() == Some(404) || err.reason().is_some_and(|r| GONE_REASONS.contains(&r))
}

/// Pages child records per parent
pub struct NestedPaginatedCollector<'a> {
    executor: &'a RequestExecutor,
}

impl<'a> NestedPaginatedCollector<'a> {
    /// Create a collector.
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self { executor }
    }

    /// Run the pass over `parents`, in insertion order.
    pub async fn collect<W: RecordWriter>(
        &self,
        lookup: &NestedLookup,
        parents: &IdSet,
        out: &mut W,
    ) -> Result<PassSummary, HarvestError> {
        let observer = self.executor.observer();
        let kind = lookup.kind;
        let mut summary = PassSummary::new(kind);
        summary.units = parents.len() as u64;
        observer.pass_started(kind, summary.units);

        'parents: for parent_id in parents.iter() {
            let mut params = lookup.params_for(parent_id);
            let mut parent_items = 0u64;

            loop {
                summary.requests += 1;
                let body = match self
                    .executor
                    .execute(lookup.endpoint, &params, parent_id)
                    .await?
                {
                    RequestOutcome::Page(body) => body,
                    RequestOutcome::Unavailable { last_error, .. } => {
                        if is_parent_gone(&last_error) {
                            let anomaly = IntegrityAnomaly::ParentUnavailable {
                                parent_id: parent_id.to_string(),
                                reason: last_error
                                    .reason()
                                    .map(str::to_string)
                                    .unwrap_or_else(|| last_error.to_string()),
                            };
                            self.report_anomaly(kind, &anomaly, &mut summary);
                        } else {
                            summary.skipped_units += 1;
                            metrics::record_skipped_unit(kind);
                            observer.unit_skipped(kind, parent_id, &last_error.to_string());
                            continue 'parents;
                        }
                        break;
                    }
                };

                let Some(page) = YoutubeParser::split_page(body) else {
                    let anomaly = IntegrityAnomaly::MissingItems {
                        parent_id: parent_id.to_string(),
                    };
                    self.report_anomaly(kind, &anomaly, &mut summary);
                    break;
                };

                let count = page.items.len() as u64;
                out.write_records(&page.items)?;
                out.flush()?;
                summary.pages += 1;
                summary.items += count;
                parent_items += count;

                match page.next_page_token {
                    Some(token) => params = params.with_page_token(&token),
                    None => break,
                }
            }

            debug!(kind = %kind, parent_id = %parent_id, items = parent_items, "Parent collected");
            observer.unit_finished(kind, parent_id, parent_items);
        }

        observer.pass_finished(&summary);
        Ok(summary)
    }

    fn report_anomaly(
        &self,
        kind: ResourceKind,
        anomaly: &IntegrityAnomaly,
        summary: &mut PassSummary,
    ) {
        summary.anomalies += 1;
        metrics::record_anomaly(kind, anomaly);
        self.executor.observer().anomaly(kind, anomaly);
    }
}

/// Threads selected for a reply pass, plus what was wrong with the rest.
#[derive(Debug, Clone, Default)]
pub struct Escalation {
    /// Thread IDs to collect replies for
    pub parents: IdSet,
    /// Threads whose records lacked the expected structure
    pub anomalies: Vec<IntegrityAnomaly>,
}

/// Reply-count threshold above which a thread is escalated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscalationRule {
    /// Threads with strictly more replies than this are escalated
    pub threshold: u64,
}

impl Default for EscalationRule {
    fn default() -> Self {
        Self {
            threshold: config::REPLY_THRESHOLD,
        }
    }
}

impl EscalationRule {
    /// Create a rule with the given threshold.
    pub fn new(threshold: u64) -> Self {
        Self { threshold }
    }

    /// Whether a thread declaring `reply_count` replies is escalated.
    pub fn escalates(&self, reply_count: u64) -> bool {
        reply_count > self.threshold
    }

    /// Select threads from thread records, in record order.
    ///
    /// Records with a missing reply count are reported and never escalated.
    pub fn select<'v>(&self, records: impl IntoIterator<Item = &'v Value>) -> Escalation {
        let mut escalation = Escalation::default();
        for record in records {
            self.consider(record, &mut escalation);
        }
        escalation
    }

    /// Add one thread record to a running selection.
    pub fn consider(&self, record: &Value, escalation: &mut Escalation) {
        let inspection = YoutubeParser::inspect_thread(record);
        if let Some(anomaly) = inspection.anomaly {
            escalation.anomalies.push(anomaly);
        }
        if !self.escalates(inspection.reply_count) {
            return;
        }
        if let Some(thread_id) = inspection.thread_id {
            escalation.parents.insert(thread_id);
        }
    }
}
