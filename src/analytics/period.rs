//! Previous-period computation for period-over-period deltas

use chrono::{Duration, NaiveDate};

use crate::types::DateRange;

/// Whole days from `from` to `to`. A single-day period spans 0 days.
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}

/// The period of equal length that ends the day before `range` starts.
///
/// Returns `None` for an unrestricted range, or when the previous period
/// would start before the earliest representable date. For `{from:
/// 2024-01-10, to: 2024-01-12}` the previous period is `{2024-01-07,
/// 2024-01-09}`.
pub fn previous_period(range: &DateRange) -> Option<DateRange> {
    let from = range.from?;
    let to = range.to.unwrap_or(from);
    let span_days = days_between(from, to);

    let prev_to = from.checked_sub_signed(Duration::days(1))?;
    let prev_from = prev_to.checked_sub_signed(Duration::days(span_days))?;

    Some(DateRange::between(prev_from, prev_to))
}
