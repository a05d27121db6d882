//! Contract tests for the YouTube Data API v3
//!
//! These hit the live API and spend real quota, so they are ignored by
//! default. Run with `YOUTUBE_API_KEY=... cargo test -- --ignored`.

use serde_json::Value;
use yt_harvester::fetcher::youtube_http::YoutubeHttpClient;
use yt_harvester::fetcher::youtube_parser::YoutubeParser;
use yt_harvester::fetcher::{Endpoint, EndpointInvoker, RequestParams};

fn live_client() -> YoutubeHttpClient {
    let key = std::env::var("YOUTUBE_API_KEY").expect("YOUTUBE_API_KEY must be set");
    YoutubeHttpClient::new(key).expect("Failed to build client")
}

/// Search pages split into items, token and metadata the way the collector expects
#[tokio::test]
#[ignore]
async fn test_search_page_contract() {
    let params = RequestParams::new()
        .with("part", "snippet")
        .with("type", "video")
        .with("q", "weather")
        .with("order", "date")
        .with("safeSearch", "none")
        .with("maxResults", 5)
        .with("publishedAfter", "2024-01-01T00:00:00Z")
        .with("publishedBefore", "2024-01-02T00:00:00Z");

    let body = live_client()
        .invoke(Endpoint::Search, &params)
        .await
        .expect("search request failed");

    let page = YoutubeParser::split_page(body).expect("search body must carry items");
    assert!(page.metadata.contains_key("pageInfo"));
    for item in &page.items {
        assert!(YoutubeParser::search_video_id(item).is_some(), "{item}");
        assert!(YoutubeParser::channel_id(item).is_some(), "{item}");
    }
}

/// Video lookups accept a comma-separated ID list
#[tokio::test]
#[ignore]
async fn test_video_lookup_contract() {
    let params = RequestParams::new()
        .with("part", "snippet,contentDetails,statistics")
        .with("id", "dQw4w9WgXcQ,jNQXAC9IVRw");

    let body: Value = live_client()
        .invoke(Endpoint::Videos, &params)
        .await
        .expect("videos request failed");

    let page = YoutubeParser::split_page(body).expect("videos body must carry items");
    assert_eq!(page.items.len(), 2);
    assert!(page.items[0].get("statistics").is_some());
}

/// Thread records expose the reply count the escalation rule reads
#[tokio::test]
#[ignore]
async fn test_comment_thread_contract() {
    let params = RequestParams::new()
        .with("part", "snippet,replies")
        .with("videoId", "dQw4w9WgXcQ")
        .with("maxResults", 20)
        .with("order", "time");

    let body = live_client()
        .invoke(Endpoint::CommentThreads, &params)
        .await
        .expect("commentThreads request failed");

    let page = YoutubeParser::split_page(body).expect("thread body must carry items");
    for record in &page.items {
        let inspection = YoutubeParser::inspect_thread(record);
        assert!(inspection.thread_id.is_some());
        assert!(
            !matches!(
                inspection.anomaly,
                Some(yt_harvester::IntegrityAnomaly::MissingReplyCount { .. })
            ),
            "{record}"
        );
    }
}
