//! # YouTube Harvester Library
//!
//! A quota-aware, incremental harvester for YouTube Data API result sets.
//! Built for longitudinal collection: the same topics are harvested on a
//! schedule, and every run leaves a complete, replayable record of what the
//! API returned and which query produced it.
//!
//! ## Features
//!
//! - **Windowed Search**: collection windows sliced into quota-sized sub-windows,
//!   each paged to exhaustion
//! - **Batch Lookups**: video and channel details in fixed-size ID chunks
//! - **Nested Pagination**: comment threads per video, replies per busy thread
//! - **Bounded Retry**: exponential backoff under an elapsed-time ceiling;
//!   quota exhaustion stops the run at once
//! - **Provenance**: one metadata record per search page with the exact query
//!   and query time, plus gap markers for abandoned sub-windows
//! - **Recurring Runs**: a fixed-interval runner for repeated collection
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use yt_harvester::config::{HarvestSettings, TopicSet};
//! use yt_harvester::fetcher::youtube_http::YoutubeHttpClient;
//! use yt_harvester::harvester::{RequestExecutor, TopicPipeline};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let topics = TopicSet::load("topics.json")?;
//! let client = YoutubeHttpClient::new(std::env::var("YOUTUBE_API_KEY")?)?;
//!
//! let pipeline = TopicPipeline::new(
//!     RequestExecutor::new(Arc::new(client)),
//!     HarvestSettings::default(),
//!     "data".into(),
//! );
//! for report in pipeline.run_all(&topics).await? {
//!     println!("{}: {} passes", report.topic, report.passes.len());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`window`] - Collection windows, increment planning and quota estimates
//! - [`fetcher`] - Endpoint capability, HTTP client and response parsing
//! - [`harvester`] - Executor, collectors, topic pipeline and recurring runner
//! - [`output`] - NDJSON streams and their on-disk layout
//! - [`config`] - Topic file and run settings
//!
//! ## Output
//!
//! Every topic gets six streams per collection day under
//! `{data_dir}/{topic}/`: `videos`, `metadata`, `details`, `channels`,
//! `threads` and `comments`, each `{date}_{kind}.ndjson`.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// CLI command implementations
pub mod cli;

/// Injectable time source
pub mod clock;

/// Topic file and harvest settings
pub mod config;

/// Endpoint capability and YouTube client
pub mod fetcher;

/// Harvest engine
pub mod harvester;

/// Insertion-ordered ID sets
pub mod ids;

/// Prometheus metrics
pub mod metrics;

/// Record stream writers
pub mod output;

/// Graceful shutdown coordination shared across modules
pub mod shutdown;

/// Collection windows and quota planning
pub mod window;

// Re-export commonly used types
pub use harvester::{HarvestError, IntegrityAnomaly};
pub use ids::IdSet;
pub use window::{CollectionWindow, QuotaEstimate, QuotaIncrement};
