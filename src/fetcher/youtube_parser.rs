//! YouTube response parser
//!
//! Stateless helpers that split a page body into items, continuation token
//! and page-level metadata, and that pull the identifiers the next pipeline
//! stage needs out of harvested records. Item payloads are never rewritten.

use serde_json::{Map, Value};

use crate::harvester::IntegrityAnomaly;

/// One upstream page split into its parts.
#[derive(Debug, Clone, PartialEq)]
pub struct PageParts {
    /// Items, in upstream order
    pub items: Vec<Value>,
    /// Continuation cursor, if more pages remain
    pub next_page_token: Option<String>,
    /// Everything in the body except `items`
    pub metadata: Map<String, Value>,
}

/// Reply-count view of a comment thread record.
#[derive(Debug, Clone, PartialEq)]
pub struct ThreadInspection {
    /// Thread identifier, if present
    pub thread_id: Option<String>,
    /// Declared reply count (zero when missing)
    pub reply_count: u64,
    /// Structural problem found while reading the record
    pub anomaly: Option<IntegrityAnomaly>,
}

/// Stateless parser for YouTube Data API responses
pub struct YoutubeParser;

impl YoutubeParser {
    /// Split a page body.
    ///
    /// Returns `None` when the body is not an object or has no `items` array;
    /// callers treat that as "no items, no continuation".
    pub fn split_page(body: Value) -> Option<PageParts> {
        let Value::Object(mut metadata) = body else {
            return None;
        };
        let items = match metadata.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return None,
        };
        let next_page_token = metadata
            .get("nextPageToken")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string);

        Some(PageParts {
            items,
            next_page_token,
            metadata,
        })
    }

    /// Declared `pageInfo.totalResults` of a page, if present.
    pub fn declared_total(metadata: &Map<String, Value>) -> Option<u64> {
        metadata
            .get("pageInfo")
            .and_then(|info| info.get("totalResults"))
            .and_then(Value::as_u64)
    }

    /// `id.videoId` of a search result.
    pub fn search_video_id(item: &Value) -> Option<&str> {
        item.get("id")
            .and_then(|id| id.get("videoId"))
            .and_then(Value::as_str)
    }

    /// `snippet.channelId` of a search result or detail record.
    pub fn channel_id(item: &Value) -> Option<&str> {
        item.get("snippet")
            .and_then(|snippet| snippet.get("channelId"))
            .and_then(Value::as_str)
    }

    /// Read the declared reply count of a comment thread record.
    ///
    /// A missing or non-numeric `snippet.totalReplyCount` is schema drift and
    /// reads as zero. A positive count with no embedded `replies.comments`
    /// payload is also reported, but the declared count is kept.
    pub fn inspect_thread(record: &Value) -> ThreadInspection {
        let thread_id = record.get("id").and_then(Value::as_str).map(str::to_string);
        let label = thread_id.clone().unwrap_or_else(|| "<unknown>".to_string());

        let declared = record
            .get("snippet")
            .and_then(|snippet| snippet.get("totalReplyCount"))
            .and_then(Value::as_u64);

        let Some(reply_count) = declared else {
            return ThreadInspection {
                thread_id,
                reply_count: 0,
                anomaly: Some(IntegrityAnomaly::MissingReplyCount { parent_id: label }),
            };
        };

        let embedded = record
            .get("replies")
            .and_then(|replies| replies.get("comments"))
            .and_then(Value::as_array);

        let anomaly = (reply_count > 0 && embedded.is_none()).then(|| {
            IntegrityAnomaly::MissingReplies {
                parent_id: label,
                declared: reply_count,
            }
        });

        ThreadInspection {
            thread_id,
            reply_count,
            anomaly,
        }
    }
}
