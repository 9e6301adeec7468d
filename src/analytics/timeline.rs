//! Leads-per-day series for the dashboard bar chart

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::filter::AnnotatedLead;
use crate::types::DateRange;

/// Number of leads created on one calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub leads: usize,
}

/// One entry per day of `range`, zero-filled, oldest first.
///
/// An unrestricted range spans the earliest to the latest lead in `view`.
pub fn daily_counts(view: &[AnnotatedLead<'_>], range: &DateRange) -> Vec<DailyCount> {
    let mut per_day: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for entry in view {
        *per_day.entry(entry.lead.created_at.date_naive()).or_default() += 1;
    }

    let span = match (range.from, range.last_day()) {
        (Some(first), Some(last)) => Some((first, last)),
        _ => per_day
            .keys()
            .next()
            .copied()
            .zip(per_day.keys().next_back().copied()),
    };
    let Some((first, last)) = span else {
        return Vec::new();
    };

    first
        .iter_days()
        .take_while(|day| *day <= last)
        .map(|day| DailyCount {
            date: day,
            leads: per_day.get(&day).copied().unwrap_or(0),
        })
        .collect()
}
