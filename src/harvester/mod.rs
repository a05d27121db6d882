//! Quota-aware harvesting engine
//!
//! # Overview
//!
//! One topic is harvested by a fixed sequence of passes, each driven by a
//! collector on top of the shared [`executor::RequestExecutor`]:
//!
//! 1. [`windowed::WindowedSearchCollector`] slices the collection window into
//!    quota-sized sub-windows and follows page tokens inside each
//! 2. [`batch::BatchLookupCollector`] resolves video and channel details in
//!    fixed-size ID chunks
//! 3. [`nested::NestedPaginatedCollector`] pages through comment threads per
//!    video, then through replies per escalated thread
//!
//! [`pipeline::TopicPipeline`] wires the passes together through the on-disk
//! streams and [`scheduler::RecurringRunner`] repeats the whole thing on a
//! fixed interval.
//!
//! # Error Handling
//!
//! Faults are resolved as low as possible:
//! - Transient endpoint faults are retried by the executor, then the unit of
//!   work (page, chunk, parent) is skipped
//! - Data-integrity anomalies are logged with the parent ID and read as empty
//! - Only [`HarvestError::Fatal`] (quota exhaustion) and output failures
//!   unwind out of a pass

use std::fmt;

use crate::config::ConfigError;
use crate::fetcher::{Endpoint, FetcherError};
use crate::output::OutputError;

pub mod batch;
pub mod config;
pub mod executor;
pub mod nested;
pub mod pipeline;
pub mod progress;
pub mod scheduler;
pub mod windowed;

pub use batch::{BatchLookup, BatchLookupCollector};
pub use config::RetryPolicy;
pub use executor::{RequestExecutor, RequestOutcome, RetryState};
pub use nested::{EscalationRule, NestedLookup, NestedPaginatedCollector};
pub use pipeline::{TopicPipeline, TopicReport};
pub use progress::{HarvestObserver, LogObserver, NoopObserver, PassSummary, SharedObserver};
pub use scheduler::{IterationOutcome, RecurringRunner};
pub use windowed::{SearchQuery, WindowedSearchCollector};

/// Harvest errors
#[derive(Debug, thiserror::Error)]
pub enum HarvestError {
    /// Quota exhausted or hard rate limited; the run must stop
    #[error("{endpoint} request for {unit} hit a fatal upstream fault: {source}")]
    Fatal {
        /// Endpoint that failed
        endpoint: Endpoint,
        /// Unit of work being fetched
        unit: String,
        /// Upstream fault
        source: FetcherError,
    },

    /// Output stream error
    #[error("output error: {0}")]
    Output(#[from] OutputError),

    /// Invalid harvest configuration
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl HarvestError {
    /// Whether this error is the quota/rate-limit stop.
    pub fn is_fatal_quota(&self) -> bool {
        matches!(self, Self::Fatal { .. })
    }
}

/// Broad cause of an integrity anomaly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnomalyCause {
    /// The parent was removed or closed while the run was in progress
    ParentGone,
    /// The payload no longer has the structure the harvester expects
    SchemaDrift,
}

impl fmt::Display for AnomalyCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ParentGone => "parent gone",
            Self::SchemaDrift => "schema drift",
        })
    }
}

/// Expected nested structure was missing; logged and read as zero items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityAnomaly {
    /// Upstream reports the parent as deleted, missing, or closed
    ParentUnavailable {
        /// Parent identifier
        parent_id: String,
        /// Upstream reason or status
        reason: String,
    },
    /// Thread record without a readable `snippet.totalReplyCount`
    MissingReplyCount {
        /// Thread identifier
        parent_id: String,
    },
    /// Positive reply count but no embedded replies payload
    MissingReplies {
        /// Thread identifier
        parent_id: String,
        /// Declared reply count
        declared: u64,
    },
    /// Page body for a parent had no `items` array
    MissingItems {
        /// Parent identifier
        parent_id: String,
    },
}

impl IntegrityAnomaly {
    /// Offending parent identifier.
    pub fn parent_id(&self) -> &str {
        match self {
            Self::ParentUnavailable { parent_id, .. }
            | Self::MissingReplyCount { parent_id }
            | Self::MissingReplies { parent_id, .. }
            | Self::MissingItems { parent_id } => parent_id,
        }
    }

    /// Deleted-mid-collection vs. schema drift.
    pub fn cause(&self) -> AnomalyCause {
        match self {
            Self::ParentUnavailable { .. } => AnomalyCause::ParentGone,
            _ => AnomalyCause::SchemaDrift,
        }
    }
}

impl fmt::Display for IntegrityAnomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ParentUnavailable { parent_id, reason } => {
                write!(f, "{parent_id}: no longer available ({reason})")
            }
            Self::MissingReplyCount { parent_id } => {
                write!(f, "{parent_id}: snippet.totalReplyCount missing")
            }
            Self::MissingReplies {
                parent_id,
                declared,
            } => write!(
                f,
                "{parent_id}: declares {declared} replies but carries no replies payload"
            ),
            Self::MissingItems { parent_id } => write!(f, "{parent_id}: page has no items array"),
        }
    }
}
