//! Compound lead filtering
//!
//! Two read-only views are produced from the same annotated snapshot:
//! the table view (search + qualification + origin + date) and the metrics
//! view, which ignores the free-text search so dashboard cards only react
//! to the structured filters. Both preserve input order.

use serde::{Deserialize, Serialize};

use super::origin::{classify_origin, Origin};
use crate::types::{DateRange, Lead, QualificationStatus};

/// "All" sentinel or a single required value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Selection<T> {
    All,
    Only(T),
}

impl<T> Default for Selection<T> {
    fn default() -> Self {
        Selection::All
    }
}

impl<T: PartialEq> Selection<T> {
    pub fn matches(&self, value: &T) -> bool {
        match self {
            Selection::All => true,
            Selection::Only(wanted) => wanted == value,
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Selection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selection::All => f.write_str("all"),
            Selection::Only(value) => value.fmt(f),
        }
    }
}

impl<T: std::str::FromStr> std::str::FromStr for Selection<T> {
    type Err = T::Err;

    /// `all` / `todos` select everything, anything else parses as `T`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" | "todos" => Ok(Selection::All),
            _ => s.parse().map(Selection::Only),
        }
    }
}

/// Active dashboard filters.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    /// Case-insensitive substring matched against the lead name.
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub qualification: Selection<QualificationStatus>,
    #[serde(default)]
    pub origin: Selection<Origin>,
    #[serde(default)]
    pub range: DateRange,
}

impl FilterCriteria {
    /// Same criteria scoped to a different period.
    pub fn with_range(&self, range: DateRange) -> Self {
        Self { range, ..self.clone() }
    }
}

/// A lead paired with its derived origin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnotatedLead<'a> {
    pub lead: &'a Lead,
    pub origin: Origin,
}

/// Attach the derived origin to every lead. The origin is recomputed on
/// each call so it can never go stale.
pub fn annotate(leads: &[Lead]) -> Vec<AnnotatedLead<'_>> {
    leads
        .iter()
        .map(|lead| AnnotatedLead {
            lead,
            origin: classify_origin(lead.source.as_deref(), lead.utm_source.as_deref()),
        })
        .collect()
}

/// Leads shown in the table: every predicate including search.
pub fn table_view<'a>(leads: &[AnnotatedLead<'a>], criteria: &FilterCriteria) -> Vec<AnnotatedLead<'a>> {
    let needle = criteria.search.to_lowercase();
    leads
        .iter()
        .filter(|entry| matches_search(entry.lead, &needle) && matches_structured(entry, criteria))
        .copied()
        .collect()
}

/// Leads feeding the metric cards: every predicate except search.
pub fn metrics_view<'a>(leads: &[AnnotatedLead<'a>], criteria: &FilterCriteria) -> Vec<AnnotatedLead<'a>> {
    leads
        .iter()
        .filter(|entry| matches_structured(entry, criteria))
        .copied()
        .collect()
}

fn matches_search(lead: &Lead, needle: &str) -> bool {
    needle.is_empty()
        || lead
            .name
            .as_deref()
            .is_some_and(|name| name.to_lowercase().contains(needle))
}

fn matches_structured(entry: &AnnotatedLead<'_>, criteria: &FilterCriteria) -> bool {
    criteria.qualification.matches(&entry.lead.qualification_status)
        && criteria.origin.matches(&entry.origin)
        && criteria.range.contains(entry.lead.created_at)
}
