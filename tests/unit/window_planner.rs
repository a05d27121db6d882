//! Unit tests for window slicing and quota estimates

use chrono::{Duration, TimeZone, Utc};
use yt_harvester::window::{format_api_timestamp, parse_focal_date, plan_increments};
use yt_harvester::{CollectionWindow, QuotaEstimate, QuotaIncrement};

fn window(hours: i64) -> CollectionWindow {
    let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    CollectionWindow::new(start, start + Duration::hours(hours)).unwrap()
}

#[test]
fn test_sub_windows_tile_the_window() {
    let plan = plan_increments(window(5), Some(QuotaIncrement::hours(2).unwrap()));

    assert_eq!(plan.len(), 3);
    assert_eq!(plan[0].start(), window(5).start());
    for pair in plan.windows(2) {
        assert_eq!(pair[0].end(), pair[1].start(), "sub-windows must be contiguous");
    }
    // The last sub-window is clamped to the window end
    assert_eq!(plan[2].end(), window(5).end());
    assert_eq!(plan[2].span(), Duration::hours(1));
}

#[test]
fn test_exact_multiple_has_no_sliver() {
    let plan = plan_increments(window(24), Some(QuotaIncrement::hours(1).unwrap()));
    assert_eq!(plan.len(), 24);
    assert!(plan.iter().all(|w| w.span() == Duration::hours(1)));
}

#[test]
fn test_no_increment_is_one_window() {
    let plan = plan_increments(window(72), None);
    assert_eq!(plan, vec![window(72)]);
}

#[test]
fn test_estimate_for_default_span() {
    // Fourteen days either side, hourly: 672 calls at 100 units each
    let focal = parse_focal_date("2024-06-15").unwrap();
    let window = CollectionWindow::around(focal, Duration::days(14)).unwrap();

    let estimate = QuotaEstimate::for_window(window, Some(QuotaIncrement::hours(1).unwrap()));
    assert_eq!(estimate.calls, 672);
    assert_eq!(estimate.total_units(), 67_200);
}

#[test]
fn test_estimate_rounds_up_partial_increment() {
    let estimate = QuotaEstimate::for_window(window(5), Some(QuotaIncrement::hours(2).unwrap()));
    assert_eq!(estimate.calls, 3);
    assert_eq!(QuotaEstimate::for_window(window(5), None).calls, 1);
}

#[test]
fn test_empty_or_inverted_window_rejected() {
    let t = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
    assert!(CollectionWindow::new(t, t).is_err());
    assert!(CollectionWindow::new(t, t - Duration::hours(1)).is_err());
}

#[test]
fn test_non_positive_increment_rejected() {
    assert!(QuotaIncrement::hours(0).is_err());
    assert!(QuotaIncrement::hours(-3).is_err());
}

#[test]
fn test_focal_date_formats() {
    let midnight = Utc.with_ymd_and_hms(2024, 6, 15, 0, 0, 0).unwrap();
    assert_eq!(parse_focal_date("2024-06-15").unwrap(), midnight);
    assert_eq!(parse_focal_date(" 2024-06-15 ").unwrap(), midnight);
    assert_eq!(
        parse_focal_date("2024-06-15T02:00:00+02:00").unwrap(),
        midnight
    );
    assert!(parse_focal_date("15/06/2024").is_err());
}

#[test]
fn test_api_timestamp_has_second_precision() {
    let t = Utc.with_ymd_and_hms(2024, 6, 15, 9, 5, 3).unwrap() + Duration::milliseconds(250);
    assert_eq!(format_api_timestamp(t), "2024-06-15T09:05:03Z");
}
