//! Collection windows and quota-sized increment planning
//!
//! A [`CollectionWindow`] is the half-open `[start, end)` range a search pass
//! harvests. [`plan_increments`] slices it into contiguous sub-windows of at
//! most one [`QuotaIncrement`] each, and [`QuotaEstimate`] prices the plan
//! for the operator. The estimate is advisory only; the upstream service is
//! the sole enforcer of the real budget.

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Quota units charged by the upstream service for one search call.
pub const SEARCH_CALL_COST: u64 = 100;

/// Window errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    /// Start is not strictly before end
    #[error("window start {start} must be before end {end}")]
    Empty {
        /// Window start (RFC3339)
        start: String,
        /// Window end (RFC3339)
        end: String,
    },

    /// Increment is zero or negative
    #[error("increment must be positive, got {0} seconds")]
    NonPositiveIncrement(i64),

    /// Date arithmetic left the representable range
    #[error("date out of range: {0}")]
    OutOfRange(String),

    /// Unparseable date or datetime
    #[error("invalid date '{0}': expected YYYY-MM-DD or RFC3339")]
    InvalidDate(String),
}

/// Half-open time range `[start, end)` being harvested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl CollectionWindow {
    /// Create a window, rejecting empty or inverted ranges.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::Empty {
                start: format_api_timestamp(start),
                end: format_api_timestamp(end),
            });
        }
        Ok(Self { start, end })
    }

    /// Window spanning `span` on either side of a focal instant.
    pub fn around(focal: DateTime<Utc>, span: Duration) -> Result<Self, WindowError> {
        let start = focal
            .checked_sub_signed(span)
            .ok_or_else(|| WindowError::OutOfRange(format!("{focal} - {span}")))?;
        let end = focal
            .checked_add_signed(span)
            .ok_or_else(|| WindowError::OutOfRange(format!("{focal} + {span}")))?;
        Self::new(start, end)
    }

    /// Inclusive lower bound.
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// Exclusive upper bound.
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    /// Length of the window.
    pub fn span(&self) -> Duration {
        self.end - self.start
    }

    /// Whether an instant falls inside `[start, end)`.
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

impl fmt::Display for CollectionWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            format_api_timestamp(self.start),
            format_api_timestamp(self.end)
        )
    }
}

/// Maximum span harvested before the search cursor advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaIncrement(Duration);

impl QuotaIncrement {
    /// Wrap a duration, rejecting zero and negative increments.
    pub fn new(duration: Duration) -> Result<Self, WindowError> {
        if duration <= Duration::zero() {
            return Err(WindowError::NonPositiveIncrement(duration.num_seconds()));
        }
        Ok(Self(duration))
    }

    /// Increment of a whole number of hours.
    pub fn hours(hours: i64) -> Result<Self, WindowError> {
        Self::new(Duration::hours(hours))
    }

    /// Underlying duration.
    pub fn duration(&self) -> Duration {
        self.0
    }
}

/// Slice a window into contiguous sub-windows of at most `increment` each.
///
/// Without an increment the whole window is a single sub-window. The last
/// sub-window is clamped so that its end equals the window end even when the
/// span is not a multiple of the increment.
pub fn plan_increments(
    window: CollectionWindow,
    increment: Option<QuotaIncrement>,
) -> Vec<CollectionWindow> {
    let Some(increment) = increment else {
        return vec![window];
    };

    let mut planned = Vec::new();
    let mut cursor = window.start;
    while cursor < window.end {
        let next = cursor
            .checked_add_signed(increment.duration())
            .map(|t| t.min(window.end))
            .unwrap_or(window.end);
        planned.push(CollectionWindow {
            start: cursor,
            end: next,
        });
        cursor = next;
    }
    planned
}

/// Advisory cost of an incremental search pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuotaEstimate {
    /// Minimum number of search calls (one per sub-window)
    pub calls: u64,
    /// Cost of a single call
    pub unit_cost: u64,
}

impl QuotaEstimate {
    /// `ceil(span / increment)` calls at [`SEARCH_CALL_COST`] each.
    pub fn for_window(window: CollectionWindow, increment: Option<QuotaIncrement>) -> Self {
        let calls = match increment {
            None => 1,
            Some(increment) => {
                let span = window.span().num_seconds().max(0) as u64;
                let step = increment.duration().num_seconds().max(1) as u64;
                span.div_ceil(step)
            }
        };
        Self {
            calls,
            unit_cost: SEARCH_CALL_COST,
        }
    }

    /// Total quota units the pass will consume at minimum.
    pub fn total_units(&self) -> u64 {
        self.calls.saturating_mul(self.unit_cost)
    }
}

/// Format an instant the way the search endpoint and the metadata stream expect
/// (`2025-01-01T00:00:00Z`, second precision).
pub fn format_api_timestamp(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Parse a focal date from `YYYY-MM-DD` or RFC3339.
///
/// Date-only input is midnight UTC; datetimes without a zone are taken as UTC.
pub fn parse_focal_date(input: &str) -> Result<DateTime<Utc>, WindowError> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(&format!("{input}Z")) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .map_err(|_| WindowError::InvalidDate(input.to_string()))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| WindowError::InvalidDate(input.to_string()))?;
    Ok(midnight.and_utc())
}
