//! Windowed search collector
//!
//! Search results are capped per query, so a collection window is sliced
//! into sub-windows (see [`crate::window::plan_increments`]) and each
//! sub-window is paged to exhaustion. Every page contributes its items to the
//! item stream and one metadata record (everything except `items`, plus
//! `item_count`, `query_time` and the exact `query` parameters) to the
//! metadata stream. A sub-window whose request is abandoned leaves a gap
//! marker in the metadata stream instead.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::executor::{RequestExecutor, RequestOutcome};
use super::progress::PassSummary;
use super::HarvestError;
use crate::fetcher::youtube_parser::YoutubeParser;
use crate::fetcher::{Endpoint, RequestParams};
use crate::metrics;
use crate::output::{RecordWriter, ResourceKind};
use crate::window::{format_api_timestamp, plan_increments, CollectionWindow, QuotaIncrement};

/// Fixed search parameters for one topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text query
    pub q: String,
    /// Result order (`date`)
    pub order: String,
    /// Safe-search mode (`none`)
    pub safe_search: String,
    /// Results per page
    pub page_size: u32,
}

impl SearchQuery {
    /// Query with the harvest defaults.
    pub fn new(q: impl Into<String>) -> Self {
        Self {
            q: q.into(),
            order: "date".to_string(),
            safe_search: "none".to_string(),
            page_size: super::config::SEARCH_PAGE_SIZE,
        }
    }

    /// Parameters shared by every request for this query.
    pub fn base_params(&self) -> RequestParams {
        RequestParams::new()
            .with("part", "snippet")
            .with("type", "video")
            .with("q", &self.q)
            .with("order", &self.order)
            .with("safeSearch", &self.safe_search)
            .with("maxResults", self.page_size)
    }

    /// First-page parameters for one sub-window.
    pub fn params_for(&self, window: &CollectionWindow) -> RequestParams {
        self.base_params()
            .with("publishedAfter", format_api_timestamp(window.start()))
            .with("publishedBefore", format_api_timestamp(window.end()))
    }
}

/// Collects search results over a sliced window
pub struct WindowedSearchCollector<'a> {
    executor: &'a RequestExecutor,
    gap_markers: bool,
}

impl<'a> WindowedSearchCollector<'a> {
    /// Create a collector that writes gap markers.
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self {
            executor,
            gap_markers: true,
        }
    }

    /// Enable or disable gap markers in the metadata stream
    pub fn with_gap_markers(mut self, enabled: bool) -> Self {
        self.gap_markers = enabled;
        self
    }

    /// Run the pass.
    ///
    /// Sub-windows are visited in chronological order; pages within a
    /// sub-window in upstream order. Streams are flushed after every page.
    pub async fn collect<I, M>(
        &self,
        query: &SearchQuery,
        window: CollectionWindow,
        increment: Option<QuotaIncrement>,
        items_out: &mut I,
        metadata_out: &mut M,
    ) -> Result<PassSummary, HarvestError>
    where
        I: RecordWriter,
        M: RecordWriter,
    {
        let observer = self.executor.observer();
        let plan = plan_increments(window, increment);
        let mut summary = PassSummary::new(ResourceKind::Videos);
        summary.units = plan.len() as u64;
        observer.pass_started(ResourceKind::Videos, summary.units);

        'units: for sub_window in &plan {
            let unit = sub_window.to_string();
            let mut params = query.params_for(sub_window);
            let mut unit_items = 0u64;
            let mut declared = None;

            loop {
                summary.requests += 1;
                let body = match self
                    .executor
                    .execute(Endpoint::Search, &params, &unit)
                    .await?
                {
                    RequestOutcome::Page(body) => body,
                    RequestOutcome::Unavailable { last_error, .. } => {
                        let reason = format!("request abandoned: {last_error}");
                        summary.skipped_units += 1;
                        metrics::record_skipped_unit(ResourceKind::Videos);
                        self.write_gap(metadata_out, &params, &reason, &mut summary)?;
                        observer.unit_skipped(ResourceKind::Videos, &unit, &reason);
                        continue 'units;
                    }
                };

                let Some(page) = YoutubeParser::split_page(body) else {
                    warn!(unit = %unit, "Search page without items array, ending sub-window");
                    self.write_gap(metadata_out, &params, "page without items array", &mut summary)?;
                    break;
                };

                if declared.is_none() {
                    declared = YoutubeParser::declared_total(&page.metadata);
                }
                let item_count = page.items.len() as u64;
                metadata_out.write_record(&self.metadata_record(page.metadata, item_count, &params))?;
                items_out.write_records(&page.items)?;
                items_out.flush()?;
                metadata_out.flush()?;

                summary.pages += 1;
                summary.items += item_count;
                unit_items += item_count;

                match page.next_page_token {
                    Some(token) => {
                        debug!(unit = %unit, "Following nextPageToken");
                        params = params.with_page_token(&token);
                    }
                    None => break,
                }
            }

            if let Some(declared) = declared {
                summary.declared_results += declared;
                debug!(unit = %unit, declared, retrieved = unit_items, "Sub-window exhausted");
            }
            observer.unit_finished(ResourceKind::Videos, &unit, unit_items);
        }

        observer.pass_finished(&summary);
        Ok(summary)
    }

    fn metadata_record(
        &self,
        mut metadata: Map<String, Value>,
        item_count: u64,
        params: &RequestParams,
    ) -> Value {
        metadata.insert("item_count".to_string(), json!(item_count));
        metadata.insert("query_time".to_string(), json!(self.query_time()));
        metadata.insert("query".to_string(), params.to_json());
        Value::Object(metadata)
    }

    fn write_gap<M: RecordWriter>(
        &self,
        metadata_out: &mut M,
        params: &RequestParams,
        reason: &str,
        summary: &mut PassSummary,
    ) -> Result<(), HarvestError> {
        if !self.gap_markers {
            return Ok(());
        }
        metadata_out.write_record(&json!({
            "gap": true,
            "reason": reason,
            "query_time": self.query_time(),
            "query": params.to_json(),
        }))?;
        metadata_out.flush()?;
        summary.gaps += 1;
        Ok(())
    }

    fn query_time(&self) -> String {
        format_api_timestamp(self.executor.clock().now())
    }
}
