//! Unit tests for response parsing helpers

use serde_json::json;
use yt_harvester::fetcher::youtube_parser::YoutubeParser;
use yt_harvester::IntegrityAnomaly;

#[test]
fn test_split_page_keeps_items_untouched() {
    let item = json!({"id": {"videoId": "abc"}, "snippet": {"title": "ünïcode", "extra": [1, 2]}});
    let parts = YoutubeParser::split_page(json!({
        "kind": "youtube#searchListResponse",
        "regionCode": "GB",
        "items": [item.clone()]
    }))
    .unwrap();

    assert_eq!(parts.items, vec![item]);
    assert_eq!(parts.next_page_token, None);
    assert_eq!(parts.metadata["regionCode"], "GB");
    assert!(!parts.metadata.contains_key("items"));
}

#[test]
fn test_empty_token_ends_pagination() {
    let parts = YoutubeParser::split_page(json!({"items": [], "nextPageToken": ""})).unwrap();
    assert_eq!(parts.next_page_token, None);
}

#[test]
fn test_body_without_items_array() {
    assert!(YoutubeParser::split_page(json!({"kind": "x"})).is_none());
    assert!(YoutubeParser::split_page(json!({"items": "nope"})).is_none());
    assert!(YoutubeParser::split_page(json!([1, 2, 3])).is_none());
}

#[test]
fn test_declared_total() {
    let parts = YoutubeParser::split_page(json!({
        "pageInfo": {"totalResults": 1000000, "resultsPerPage": 50},
        "items": []
    }))
    .unwrap();
    assert_eq!(YoutubeParser::declared_total(&parts.metadata), Some(1_000_000));
}

#[test]
fn test_identifier_extraction() {
    let item = json!({
        "id": {"kind": "youtube#video", "videoId": "v42"},
        "snippet": {"channelId": "UC42"}
    });
    assert_eq!(YoutubeParser::search_video_id(&item), Some("v42"));
    assert_eq!(YoutubeParser::channel_id(&item), Some("UC42"));

    // Playlists and channels in search results have no videoId
    let playlist = json!({"id": {"kind": "youtube#playlist", "playlistId": "PL1"}});
    assert_eq!(YoutubeParser::search_video_id(&playlist), None);
    assert_eq!(YoutubeParser::channel_id(&playlist), None);
}

#[test]
fn test_thread_with_embedded_replies() {
    let record = json!({
        "id": "Ugx1",
        "snippet": {"totalReplyCount": 7},
        "replies": {"comments": [{"id": "Ugx1.a"}]}
    });
    let inspection = YoutubeParser::inspect_thread(&record);
    assert_eq!(inspection.thread_id.as_deref(), Some("Ugx1"));
    assert_eq!(inspection.reply_count, 7);
    assert_eq!(inspection.anomaly, None);
}

#[test]
fn test_thread_without_reply_payload() {
    let record = json!({"id": "Ugx2", "snippet": {"totalReplyCount": 3}});
    let inspection = YoutubeParser::inspect_thread(&record);
    assert_eq!(inspection.reply_count, 3);
    assert_eq!(
        inspection.anomaly,
        Some(IntegrityAnomaly::MissingReplies {
            parent_id: "Ugx2".to_string(),
            declared: 3
        })
    );
}

#[test]
fn test_thread_without_replies_needs_no_payload() {
    let record = json!({"id": "Ugx3", "snippet": {"totalReplyCount": 0}});
    assert_eq!(YoutubeParser::inspect_thread(&record).anomaly, None);
}

#[test]
fn test_thread_with_non_numeric_count() {
    let record = json!({"id": "Ugx4", "snippet": {"totalReplyCount": "many"}});
    let inspection = YoutubeParser::inspect_thread(&record);
    assert_eq!(inspection.reply_count, 0);
    assert!(matches!(
        inspection.anomaly,
        Some(IntegrityAnomaly::MissingReplyCount { .. })
    ));
}
