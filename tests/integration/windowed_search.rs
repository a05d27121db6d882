//! Integration tests for the windowed search collector

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use yt_harvester::fetcher::Endpoint;
use yt_harvester::harvester::{SearchQuery, WindowedSearchCollector};
use yt_harvester::output::{NdjsonWriter, RecordWriter};
use yt_harvester::{CollectionWindow, QuotaIncrement};

use crate::support::{self, page, search_item, FakeApi, TickLog};

fn two_hour_window() -> CollectionWindow {
    CollectionWindow::new(
        Utc.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2024, 10, 1, 2, 0, 0).unwrap(),
    )
    .unwrap()
}

/// First hour: two pages of two items. Second hour: one page of two items.
fn paged_api() -> std::sync::Arc<FakeApi> {
    FakeApi::new(|_, params, _| {
        let after = params.get("publishedAfter").unwrap_or_default();
        let token = params.get("pageToken");
        Ok(match (after, token) {
            ("2024-10-01T00:00:00Z", None) => page(
                vec![search_item("v1", "c1"), search_item("v2", "c1")],
                Some("P2"),
            ),
            ("2024-10-01T00:00:00Z", Some("P2")) => {
                page(vec![search_item("v3", "c2"), search_item("v4", "c2")], None)
            }
            _ => page(vec![search_item("v5", "c3"), search_item("v6", "c1")], None),
        })
    })
}

#[tokio::test]
async fn test_collects_every_page_of_every_sub_window() {
    let api = paged_api();
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    let summary = WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    assert_eq!(api.call_count(), 3);
    assert_eq!(items.len(), 6);
    assert_eq!(metadata.len(), 3, "one metadata record per page");
    assert_eq!(summary.units, 2);
    assert_eq!(summary.pages, 3);
    assert_eq!(summary.items, 6);
    assert_eq!(summary.gaps, 0);
    // totalResults is taken from the first page of each sub-window
    assert_eq!(summary.declared_results, 4);

    // Item order follows sub-window order, then page order
    let ids: Vec<&str> = items
        .iter()
        .filter_map(|item| item["id"]["videoId"].as_str())
        .collect();
    assert_eq!(ids, vec!["v1", "v2", "v3", "v4", "v5", "v6"]);
}

#[tokio::test]
async fn test_six_hours_in_two_hour_increments() {
    let api = FakeApi::new(|_, params, _| {
        let after = params.get("publishedAfter").unwrap_or_default().to_string();
        Ok(page(
            vec![search_item(&format!("{after}-a"), "c"), search_item(&format!("{after}-b"), "c")],
            None,
        ))
    });
    let executor = support::executor(api.clone());
    let window = CollectionWindow::new(
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 1, 6, 0, 0).unwrap(),
    )
    .unwrap();
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("q"),
            window,
            Some(QuotaIncrement::hours(2).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    assert_eq!(items.len(), 6);
    let calls = api.calls_to(Endpoint::Search);
    let bounds: Vec<(&str, &str)> = calls
        .iter()
        .map(|p| {
            (
                p.get("publishedAfter").unwrap_or_default(),
                p.get("publishedBefore").unwrap_or_default(),
            )
        })
        .collect();
    assert_eq!(
        bounds,
        vec![
            ("2025-01-01T00:00:00Z", "2025-01-01T02:00:00Z"),
            ("2025-01-01T02:00:00Z", "2025-01-01T04:00:00Z"),
            ("2025-01-01T04:00:00Z", "2025-01-01T06:00:00Z"),
        ]
    );
}

#[tokio::test]
async fn test_page_token_is_scoped_to_its_sub_window() {
    let api = paged_api();
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    let calls = api.calls_to(Endpoint::Search);
    assert_eq!(calls[0].get("pageToken"), None);
    assert_eq!(calls[1].get("pageToken"), Some("P2"));
    assert_eq!(calls[1].get("publishedAfter"), Some("2024-10-01T00:00:00Z"));
    // The second sub-window starts fresh
    assert_eq!(calls[2].get("pageToken"), None);
    assert_eq!(calls[2].get("publishedAfter"), Some("2024-10-01T01:00:00Z"));
    assert_eq!(calls[2].get("publishedBefore"), Some("2024-10-01T02:00:00Z"));
}

#[tokio::test]
async fn test_metadata_records_carry_provenance() {
    let api = paged_api();
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    let first = &metadata[0];
    assert!(first.get("items").is_none(), "items never go to the metadata stream");
    assert_eq!(first["item_count"], 2);
    assert_eq!(first["nextPageToken"], "P2");
    assert_eq!(first["query_time"], "2024-10-19T08:30:00Z");
    assert_eq!(first["query"]["q"], "flood");
    assert_eq!(first["query"]["maxResults"], "50");
    assert!(first["query"].get("pageToken").is_none());

    let second = &metadata[1];
    assert_eq!(second["query"]["pageToken"], "P2");
}

#[tokio::test]
async fn test_whole_window_issues_a_single_query() {
    let api = FakeApi::new(|_, _, _| Ok(page(vec![search_item("v1", "c1")], None)));
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            None,
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    let calls = api.calls_to(Endpoint::Search);
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].get("publishedAfter"), Some("2024-10-01T00:00:00Z"));
    assert_eq!(calls[0].get("publishedBefore"), Some("2024-10-01T02:00:00Z"));
}

#[tokio::test]
async fn test_reruns_produce_identical_streams() {
    let dir = TempDir::new().unwrap();

    for run in ["a", "b"] {
        let executor = support::executor(paged_api());
        let mut items = NdjsonWriter::create(dir.path().join(format!("{run}_videos.ndjson"))).unwrap();
        let mut metadata =
            NdjsonWriter::create(dir.path().join(format!("{run}_metadata.ndjson"))).unwrap();
        WindowedSearchCollector::new(&executor)
            .collect(
                &SearchQuery::new("flood"),
                two_hour_window(),
                Some(QuotaIncrement::hours(1).unwrap()),
                &mut items,
                &mut metadata,
            )
            .await
            .unwrap();
        items.close().unwrap();
        metadata.close().unwrap();
    }

    for kind in ["videos", "metadata"] {
        let a = std::fs::read(dir.path().join(format!("a_{kind}.ndjson"))).unwrap();
        let b = std::fs::read(dir.path().join(format!("b_{kind}.ndjson"))).unwrap();
        assert!(!a.is_empty());
        assert_eq!(a, b, "{kind} stream differs between runs");
    }
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_sub_window_leaves_gap_marker() {
    let api = FakeApi::new(|_, params, _| {
        if params.get("publishedAfter") == Some("2024-10-01T00:00:00Z") {
            Err(support::service_unavailable())
        } else {
            Ok(page(vec![search_item("v9", "c9")], None))
        }
    });
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    let summary = WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    // The failed hour is skipped; the next one is still collected
    assert_eq!(items.len(), 1);
    assert_eq!(summary.skipped_units, 1);
    assert_eq!(summary.gaps, 1);

    let gap = &metadata[0];
    assert_eq!(gap["gap"], true);
    assert_eq!(gap["query"]["publishedAfter"], "2024-10-01T00:00:00Z");
    assert!(gap["reason"].as_str().unwrap().contains("HTTP 503"));
    assert_eq!(metadata[1]["item_count"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_skipped_sub_window_ticks_progress_once() {
    let api = FakeApi::new(|_, params, _| {
        if params.get("publishedAfter") == Some("2024-10-01T00:00:00Z") {
            Err(support::service_unavailable())
        } else {
            Ok(page(vec![search_item("v9", "c9")], None))
        }
    });
    let ticks = Arc::new(TickLog::default());
    let executor = support::executor(api.clone()).with_observer(ticks.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    assert_eq!(ticks.units(), 2);
    assert_eq!(
        ticks.ticks(),
        vec![
            "skipped [2024-10-01T00:00:00Z, 2024-10-01T01:00:00Z)",
            "finished [2024-10-01T01:00:00Z, 2024-10-01T02:00:00Z)",
        ]
    );
}

#[tokio::test]
async fn test_page_without_items_ends_sub_window_with_gap() {
    let api = FakeApi::new(|_, params, _| {
        if params.get("publishedAfter") == Some("2024-10-01T00:00:00Z") {
            Ok(json!({"kind": "x", "nextPageToken": "LOOP"}))
        } else {
            Ok(page(vec![search_item("v9", "c9")], None))
        }
    });
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    let summary = WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    // The token on the bad page is never followed
    let calls = api.calls_to(Endpoint::Search);
    assert_eq!(calls.len(), 2);
    assert!(calls.iter().all(|c| c.get("pageToken").is_none()));

    assert_eq!(items.len(), 1);
    assert_eq!(summary.gaps, 1);
    assert_eq!(summary.skipped_units, 0);
    assert_eq!(metadata[0]["gap"], true);
    assert_eq!(metadata[0]["reason"], "page without items array");
    assert_eq!(metadata[0]["query"]["publishedAfter"], "2024-10-01T00:00:00Z");
    assert_eq!(metadata[1]["item_count"], 1);
}

#[tokio::test(start_paused = true)]
async fn test_gap_markers_can_be_disabled() {
    let api = FakeApi::new(|_, params, _| {
        if params.get("publishedAfter") == Some("2024-10-01T00:00:00Z") {
            Err(support::service_unavailable())
        } else {
            Ok(page(vec![search_item("v9", "c9")], None))
        }
    });
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    let summary = WindowedSearchCollector::new(&executor)
        .with_gap_markers(false)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await
        .unwrap();

    assert_eq!(summary.skipped_units, 1);
    assert_eq!(summary.gaps, 0);
    assert_eq!(metadata.len(), 1);
    assert!(metadata[0].get("gap").is_none());
}

#[tokio::test]
async fn test_quota_exhaustion_stops_immediately_and_keeps_output() {
    let api = FakeApi::new(|_, _, index| match index {
        1 => Ok(page(vec![search_item("v1", "c1")], Some("P2"))),
        2 => Ok(page(vec![search_item("v2", "c1")], Some("P3"))),
        _ => Err(support::quota_exceeded()),
    });
    let executor = support::executor(api.clone());
    let mut items: Vec<Value> = Vec::new();
    let mut metadata: Vec<Value> = Vec::new();

    let result = WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await;

    let err = result.unwrap_err();
    assert!(err.is_fatal_quota());
    // Never retried, nothing after it issued
    assert_eq!(api.call_count(), 3);
    assert_eq!(items.len(), 2);
    assert_eq!(metadata.len(), 2);
}

#[tokio::test]
async fn test_flushed_output_survives_fatal_stop() {
    let dir = TempDir::new().unwrap();
    let api = FakeApi::new(|_, _, index| match index {
        1 => Ok(page(vec![search_item("v1", "c1")], Some("P2"))),
        _ => Err(support::quota_exceeded()),
    });
    let executor = support::executor(api);
    let videos_path = dir.path().join("videos.ndjson");
    let mut items = NdjsonWriter::create(&videos_path).unwrap();
    let mut metadata = NdjsonWriter::create(dir.path().join("metadata.ndjson")).unwrap();

    let result = WindowedSearchCollector::new(&executor)
        .collect(
            &SearchQuery::new("flood"),
            two_hour_window(),
            Some(QuotaIncrement::hours(1).unwrap()),
            &mut items,
            &mut metadata,
        )
        .await;
    assert!(result.is_err());

    // Read before close: the page was already flushed
    let written = support::read_stream(&videos_path);
    assert_eq!(written.len(), 1);
    assert_eq!(written[0]["id"]["videoId"], "v1");
}
