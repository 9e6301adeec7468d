//! Calendar-day periods used to scope filtering and metrics

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// A closed period `[from, to]` expressed in whole calendar days (UTC).
///
/// An unset `from` means "no date restriction". An unset `to` means the
/// period is the single day `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    /// Period from `from` to `to`, both inclusive.
    pub fn between(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from: Some(from), to: Some(to) }
    }

    /// Single-day period.
    pub fn day(day: NaiveDate) -> Self {
        Self { from: Some(day), to: None }
    }

    /// Unrestricted period.
    pub fn all_time() -> Self {
        Self::default()
    }

    /// First day of `today`'s month through `today`.
    pub fn month_to_date(today: NaiveDate) -> Self {
        Self::between(today.with_day(1).unwrap_or(today), today)
    }

    /// The `days` calendar days ending with `today`, clamped at the
    /// earliest representable date.
    pub fn trailing_days(today: NaiveDate, days: u32) -> Self {
        let span = i64::from(days.max(1)) - 1;
        let from = today
            .checked_sub_signed(Duration::days(span))
            .unwrap_or(NaiveDate::MIN);
        Self::between(from, today)
    }

    /// Whether any date restriction applies.
    pub fn is_bounded(&self) -> bool {
        self.from.is_some()
    }

    /// Last day of the period (`to`, or `from` when `to` is unset).
    pub fn last_day(&self) -> Option<NaiveDate> {
        self.from.map(|from| self.to.unwrap_or(from))
    }

    /// Inclusive timestamp bounds: start of the first day to end of the
    /// last day. `None` when the period is unrestricted.
    pub fn bounds(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        let from = self.from?;
        let to = self.to.unwrap_or(from);
        Some((start_of_day(from), end_of_day(to)))
    }

    /// Whether `at` falls inside the period. Always true when unrestricted.
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        match self.bounds() {
            Some((start, end)) => start <= at && at <= end,
            None => true,
        }
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.from, self.last_day()) {
            (Some(from), Some(to)) => write!(f, "{from} .. {to}"),
            _ => write!(f, "all time"),
        }
    }
}

/// 00:00:00 UTC on `day`.
pub fn start_of_day(day: NaiveDate) -> DateTime<Utc> {
    day.and_time(NaiveTime::MIN).and_utc()
}

/// Last representable instant of `day` in UTC.
pub fn end_of_day(day: NaiveDate) -> DateTime<Utc> {
    start_of_day(day) + (Duration::days(1) - Duration::nanoseconds(1))
}
