//! Batch lookup collector
//!
//! Resolves full records for a set of IDs with one call per chunk of at most
//! `chunk_size` IDs, so a set of `n` IDs costs exactly `ceil(n / chunk_size)`
//! calls. The final partial chunk is always sent.

use tracing::{debug, info};

use super::executor::{RequestExecutor, RequestOutcome};
use super::progress::PassSummary;
use super::{config, HarvestError};
use crate::config::ConfigError;
use crate::fetcher::youtube_parser::YoutubeParser;
use crate::fetcher::{Endpoint, RequestParams};
use crate::ids::{IdChunk, IdSet};
use crate::metrics;
use crate::output::{RecordWriter, ResourceKind};

/// What to look up and where it goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLookup {
    /// Endpoint accepting a comma-separated `id` list
    pub endpoint: Endpoint,
    /// Output stream
    pub kind: ResourceKind,
    /// `part` parameter
    pub part: String,
    /// IDs per call
    pub chunk_size: usize,
}

impl BatchLookup {
    /// Video details: `snippet,contentDetails,statistics` for each video ID.
    pub fn video_details() -> Self {
        Self {
            endpoint: Endpoint::Videos,
            kind: ResourceKind::Details,
            part: "snippet,contentDetails,statistics".to_string(),
            chunk_size: config::LOOKUP_CHUNK_SIZE,
        }
    }

    /// Channel details for each channel ID.
    pub fn channel_details() -> Self {
        Self {
            endpoint: Endpoint::Channels,
            kind: ResourceKind::Channels,
            part: "snippet,contentDetails,statistics".to_string(),
            chunk_size: config::LOOKUP_CHUNK_SIZE,
        }
    }

    /// Override the chunk size
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    fn params_for(&self, chunk: &IdChunk) -> RequestParams {
        let ids: Vec<&str> = chunk.iter().map(String::as_str).collect();
        RequestParams::new()
            .with("part", &self.part)
            .with("id", ids.join(","))
            .with("maxResults", self.chunk_size)
    }
}

/// Looks up records in ID chunks
pub struct BatchLookupCollector<'a> {
    executor: &'a RequestExecutor,
}

impl<'a> BatchLookupCollector<'a> {
    /// Create a collector.
    pub fn new(executor: &'a RequestExecutor) -> Self {
        Self { executor }
    }

    /// Run the pass over `ids`, in insertion order.
    pub async fn collect<W: RecordWriter>(
        &self,
        lookup: &BatchLookup,
        ids: &IdSet,
        out: &mut W,
    ) -> Result<PassSummary, HarvestError> {
        if lookup.chunk_size == 0 {
            return Err(ConfigError::InvalidSetting(format!(
                "{} lookup chunk size must be positive",
                lookup.kind
            ))
            .into());
        }

        let observer = self.executor.observer();
        let total_chunks = ids.len().div_ceil(lookup.chunk_size);
        let mut summary = PassSummary::new(lookup.kind);
        summary.units = total_chunks as u64;
        info!(
            kind = %lookup.kind,
            ids = ids.len(),
            "Estimated quota cost: {} units",
            total_chunks as u64 * lookup.endpoint.unit_cost()
        );
        observer.pass_started(lookup.kind, summary.units);

        for (index, chunk) in ids.chunks(lookup.chunk_size).enumerate() {
            let unit = format!("chunk {}/{}", index + 1, total_chunks);
            let params = lookup.params_for(chunk);
            summary.requests += 1;

            let body = match self.executor.execute(lookup.endpoint, &params, &unit).await? {
                RequestOutcome::Page(body) => body,
                RequestOutcome::Unavailable { last_error, .. } => {
                    summary.skipped_units += 1;
                    metrics::record_skipped_unit(lookup.kind);
                    observer.unit_skipped(lookup.kind, &unit, &last_error.to_string());
                    continue;
                }
            };

            let items = YoutubeParser::split_page(body)
                .map(|page| page.items)
                .unwrap_or_default();
            if items.len() < chunk.len() {
                debug!(
                    unit = %unit,
                    requested = chunk.len(),
                    returned = items.len(),
                    "Lookup returned fewer records than requested"
                );
            }

            out.write_records(&items)?;
            out.flush()?;
            summary.pages += 1;
            summary.items += items.len() as u64;
            observer.unit_finished(lookup.kind, &unit, items.len() as u64);
        }

        observer.pass_finished(&summary);
        Ok(summary)
    }
}
