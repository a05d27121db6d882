//! Stream path layout
//!
//! Streams live under `{root}/{topic}/{date_label}_{kind}.ndjson`, where the
//! date label is the collection day (`oct_19`). Re-running on the same day
//! overwrites that day's streams.
//!
//! ```rust
//! use yt_harvester::output::{OutputPathBuilder, ResourceKind};
//! use chrono::{TimeZone, Utc};
//! use std::path::PathBuf;
//!
//! let builder = OutputPathBuilder::new(PathBuf::from("data"), "elections")
//!     .with_collection_date(Utc.with_ymd_and_hms(2024, 10, 19, 8, 0, 0).unwrap());
//!
//! let path = builder.build(ResourceKind::Threads);
//! assert_eq!(path, PathBuf::from("data/elections/oct_19_threads.ndjson"));
//! ```

use super::OutputError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Resource kinds, one stream each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// Search result items
    Videos,
    /// Per-page search metadata and gap markers
    Metadata,
    /// Video detail records
    Details,
    /// Channel detail records
    Channels,
    /// Top-level comment threads
    Threads,
    /// Nested replies
    Comments,
}

impl ResourceKind {
    /// Every kind, in pipeline order.
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Videos,
        ResourceKind::Metadata,
        ResourceKind::Details,
        ResourceKind::Channels,
        ResourceKind::Threads,
        ResourceKind::Comments,
    ];

    /// File-name suffix.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Videos => "videos",
            Self::Metadata => "metadata",
            Self::Details => "details",
            Self::Channels => "channels",
            Self::Threads => "threads",
            Self::Comments => "comments",
        }
    }

    /// Label for a single unit of work when reporting progress.
    pub fn unit_label(&self) -> &'static str {
        match self {
            Self::Videos | Self::Metadata => "sub-window",
            Self::Details | Self::Channels => "chunk",
            Self::Threads => "video",
            Self::Comments => "thread",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Path builder for one topic's streams on one collection day
#[derive(Debug, Clone)]
pub struct OutputPathBuilder {
    root_dir: PathBuf,
    topic: String,
    date_label: String,
}

impl OutputPathBuilder {
    /// Create a builder for `topic` under `root_dir`, dated today.
    ///
    /// The topic name is sanitized: separators and `..` cannot escape the root.
    pub fn new(root_dir: PathBuf, topic: &str) -> Self {
        Self {
            root_dir,
            topic: sanitize_topic(topic),
            date_label: date_label(Utc::now()),
        }
    }

    /// Date the streams by the given collection instant.
    pub fn with_collection_date(mut self, instant: DateTime<Utc>) -> Self {
        self.date_label = date_label(instant);
        self
    }

    /// Directory holding this topic's streams.
    pub fn topic_dir(&self) -> PathBuf {
        self.root_dir.join(&self.topic)
    }

    /// Path of the stream for `kind`.
    pub fn build(&self, kind: ResourceKind) -> PathBuf {
        self.topic_dir()
            .join(format!("{}_{}.ndjson", self.date_label, kind.as_str()))
    }

    /// Ensure the topic directory exists.
    pub fn ensure_directories(&self) -> Result<(), OutputError> {
        let dir = self.topic_dir();
        std::fs::create_dir_all(&dir).map_err(|e| {
            OutputError::IoError(format!("Failed to create directory {}: {e}", dir.display()))
        })
    }
}

/// `%b_%d`, lowercased (`oct_19`).
pub fn date_label(instant: DateTime<Utc>) -> String {
    instant.format("%b_%d").to_string().to_lowercase()
}

fn sanitize_topic(name: &str) -> String {
    let cleaned = name
        .trim()
        .replace("..", "__")
        .replace(['/', '\\', ':'], "_");
    if cleaned.is_empty() {
        "_".to_string()
    } else {
        cleaned
    }
}
