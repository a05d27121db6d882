//! Harvest configuration
//!
//! Two inputs drive a run: the topic file, a JSON object mapping topic names
//! to `{"q": ..., "focal_date": ...}`, and [`HarvestSettings`], the knobs
//! shared by every topic (window span, increment, page sizes, escalation
//! threshold, retry policy).

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::harvester::config::{
    LOOKUP_CHUNK_SIZE, REPLY_THRESHOLD, SEARCH_PAGE_SIZE, THREAD_PAGE_SIZE,
};
use crate::harvester::RetryPolicy;
use crate::window::{parse_focal_date, CollectionWindow, QuotaIncrement, WindowError};

/// Largest page the search and lookup endpoints accept.
const MAX_SEARCH_PAGE: u32 = 50;

/// Largest page the comment endpoints accept.
const MAX_COMMENT_PAGE: u32 = 100;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Topic file could not be read
    #[error("failed to read topic file {path}: {message}")]
    Io {
        /// File path
        path: String,
        /// Underlying error
        message: String,
    },

    /// Topic file is not the expected JSON shape
    #[error("failed to parse topic file {path}: {message}")]
    Parse {
        /// File path
        path: String,
        /// Decoder message
        message: String,
    },

    /// Topic entry with an unusable date or window
    #[error("topic '{topic}': {source}")]
    InvalidTopic {
        /// Topic name
        topic: String,
        /// Window problem
        #[source]
        source: WindowError,
    },

    /// Setting outside its accepted range
    #[error("invalid setting: {0}")]
    InvalidSetting(String),
}

/// One topic entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicConfig {
    /// Search query text
    pub q: String,
    /// Day (or instant) the collection window is centred on
    pub focal_date: String,
}

impl TopicConfig {
    /// Focal date as a UTC instant.
    pub fn focal_instant(&self) -> Result<DateTime<Utc>, WindowError> {
        parse_focal_date(&self.focal_date)
    }
}

/// Topics keyed by name, iterated in name order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TopicSet {
    topics: BTreeMap<String, TopicConfig>,
}

impl TopicSet {
    /// Load and validate a topic file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw, &path.display().to_string())
    }

    /// Parse and validate topic JSON; `origin` names the source in errors.
    pub fn from_json(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let set: TopicSet = serde_json::from_str(raw).map_err(|e| ConfigError::Parse {
            path: origin.to_string(),
            message: e.to_string(),
        })?;
        for (name, topic) in &set.topics {
            topic
                .focal_instant()
                .map_err(|source| ConfigError::InvalidTopic {
                    topic: name.clone(),
                    source,
                })?;
        }
        Ok(set)
    }

    /// Add or replace a topic
    pub fn insert(&mut self, name: impl Into<String>, topic: TopicConfig) {
        self.topics.insert(name.into(), topic);
    }

    /// Topic by name.
    pub fn get(&self, name: &str) -> Option<&TopicConfig> {
        self.topics.get(name)
    }

    /// Iterate topics in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TopicConfig)> {
        self.topics.iter().map(|(name, topic)| (name.as_str(), topic))
    }

    /// Number of topics.
    pub fn len(&self) -> usize {
        self.topics.len()
    }

    /// Whether there are no topics.
    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }
}

/// Run-wide harvest settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarvestSettings {
    /// Days on either side of the focal date
    pub span_days: i64,
    /// Search sub-window length; `None` searches the whole window at once
    pub increment_hours: Option<i64>,
    /// Search `order`
    pub search_order: String,
    /// Search `safeSearch`
    pub safe_search: String,
    /// Search results per page
    pub search_page_size: u32,
    /// IDs per lookup call
    pub lookup_chunk_size: usize,
    /// Threads per page
    pub thread_page_size: u32,
    /// Thread `order`
    pub thread_order: String,
    /// Replies per page
    pub reply_page_size: u32,
    /// Threads with more replies than this get a reply pass
    pub reply_threshold: u64,
    /// Retry policy for every request
    pub retry: RetryPolicy,
    /// Write gap markers to the metadata stream
    pub gap_markers: bool,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        Self {
            span_days: 14,
            increment_hours: Some(1),
            search_order: "date".to_string(),
            safe_search: "none".to_string(),
            search_page_size: SEARCH_PAGE_SIZE,
            lookup_chunk_size: LOOKUP_CHUNK_SIZE,
            thread_page_size: THREAD_PAGE_SIZE,
            thread_order: "time".to_string(),
            reply_page_size: THREAD_PAGE_SIZE,
            reply_threshold: REPLY_THRESHOLD,
            retry: RetryPolicy::default(),
            gap_markers: true,
        }
    }
}

impl HarvestSettings {
    /// Check every setting is in range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.span_days <= 0 {
            return Err(ConfigError::InvalidSetting(format!(
                "span must be at least one day, got {}",
                self.span_days
            )));
        }
        self.increment()?;
        check_page("search page size", self.search_page_size, MAX_SEARCH_PAGE)?;
        check_page(
            "lookup chunk size",
            u32::try_from(self.lookup_chunk_size).unwrap_or(u32::MAX),
            MAX_SEARCH_PAGE,
        )?;
        check_page("thread page size", self.thread_page_size, MAX_COMMENT_PAGE)?;
        check_page("reply page size", self.reply_page_size, MAX_COMMENT_PAGE)?;
        Ok(())
    }

    /// Collection window for a topic.
    pub fn window_for(&self, name: &str, topic: &TopicConfig) -> Result<CollectionWindow, ConfigError> {
        topic
            .focal_instant()
            .and_then(|focal| CollectionWindow::around(focal, Duration::days(self.span_days)))
            .map_err(|source| ConfigError::InvalidTopic {
                topic: name.to_string(),
                source,
            })
    }

    /// Search increment, if the window is sliced.
    pub fn increment(&self) -> Result<Option<QuotaIncrement>, ConfigError> {
        self.increment_hours
            .map(QuotaIncrement::hours)
            .transpose()
            .map_err(|e| ConfigError::InvalidSetting(e.to_string()))
    }
}

fn check_page(label: &str, value: u32, max: u32) -> Result<(), ConfigError> {
    if value == 0 || value > max {
        return Err(ConfigError::InvalidSetting(format!(
            "{label} must be between 1 and {max}, got {value}"
        )));
    }
    Ok(())
}
