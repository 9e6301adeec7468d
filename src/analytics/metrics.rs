//! Dashboard metrics with period-over-period deltas
//!
//! The current set is the metrics view of the whole collection for the
//! active range. The previous set is recomputed from the whole collection
//! for the preceding period, never derived from the current set, since the
//! two periods are disjoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::filter::{annotate, metrics_view, AnnotatedLead, FilterCriteria};
use super::period::previous_period;
use crate::config::defaults::NEGATIVE_ZERO_BAND;
use crate::types::{Lead, PipelineStage, QualificationStatus};

/// Tracked dashboard counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Total,
    Hot,
    Warm,
    Cold,
    Won,
    /// Pipeline stage in {qualified, proposal, negotiation}.
    Qualified,
}

impl Metric {
    pub const ALL: [Self; 6] = [
        Self::Total,
        Self::Hot,
        Self::Warm,
        Self::Cold,
        Self::Won,
        Self::Qualified,
    ];

    /// Card title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Total => "Total de Leads",
            Self::Hot => "Leads Quentes",
            Self::Warm => "Leads Mornos",
            Self::Cold => "Leads Frios",
            Self::Won => "Vendas",
            Self::Qualified => "Leads Qualificados",
        }
    }

    fn count(&self, leads: &[AnnotatedLead<'_>]) -> usize {
        let status = match self {
            Self::Total => return leads.len(),
            Self::Qualified => {
                return leads
                    .iter()
                    .filter(|entry| entry.lead.status.is_some_and(|stage| stage.is_qualified()))
                    .count()
            }
            Self::Hot => QualificationStatus::Hot,
            Self::Warm => QualificationStatus::Warm,
            Self::Cold => QualificationStatus::Cold,
            Self::Won => QualificationStatus::Won,
        };
        leads
            .iter()
            .filter(|entry| entry.lead.qualification_status == status)
            .count()
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

/// One dashboard card: current-period value and formatted delta (percent).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue<T> {
    pub current: T,
    pub previous: T,
    pub delta: String,
}

/// Full set of dashboard numbers for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardMetrics {
    pub counts: BTreeMap<Metric, MetricValue<usize>>,
    /// Sum of lead values (absent values count as zero).
    pub pipeline_value: MetricValue<f64>,
    /// Share of leads whose pipeline stage is closed, one decimal place.
    pub conversion_rate: String,
    pub previous_conversion_rate: String,
}

impl DashboardMetrics {
    /// Card for `metric`. Every metric is always present.
    pub fn get(&self, metric: Metric) -> Option<&MetricValue<usize>> {
        self.counts.get(&metric)
    }

    pub fn current(&self, metric: Metric) -> usize {
        self.get(metric).map_or(0, |value| value.current)
    }

    pub fn delta(&self, metric: Metric) -> &str {
        self.get(metric).map_or("0.0", |value| value.delta.as_str())
    }
}

/// Percentage change from `previous` to `current`, formatted to one
/// decimal place.
///
/// A zero baseline reports `100.0` for any growth and `0.0` otherwise.
/// Results in `(-0.05, 0)` are reported as `0.0` instead of `-0.0`.
pub fn delta(current: f64, previous: f64) -> String {
    if previous == 0.0 {
        return if current > 0.0 { "100.0" } else { "0.0" }.to_string();
    }
    let change = (current - previous) / previous * 100.0;
    if change > NEGATIVE_ZERO_BAND && change < 0.0 {
        return "0.0".to_string();
    }
    format!("{change:.1}")
}

/// Computes dashboard metrics over the authoritative collection.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator;

impl MetricsAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Metrics for `criteria` (search is ignored) against the full
    /// collection.
    pub fn compute(&self, collection: &[Lead], criteria: &FilterCriteria) -> DashboardMetrics {
        let annotated = annotate(collection);
        let current = metrics_view(&annotated, criteria);
        let previous = previous_period(&criteria.range)
            .map(|prev_range| metrics_view(&annotated, &criteria.with_range(prev_range)))
            .unwrap_or_default();

        tracing::debug!(
            range = %criteria.range,
            current = current.len(),
            previous = previous.len(),
            "Computed metrics sets"
        );

        let counts = Metric::ALL
            .into_iter()
            .map(|metric| {
                let cur = metric.count(&current);
                let prev = metric.count(&previous);
                (metric, MetricValue { current: cur, previous: prev, delta: count_delta(cur, prev) })
            })
            .collect();

        let cur_value = total_value(&current);
        let prev_value = total_value(&previous);

        DashboardMetrics {
            counts,
            pipeline_value: MetricValue {
                current: cur_value,
                previous: prev_value,
                delta: delta(cur_value, prev_value),
            },
            conversion_rate: conversion_rate(&current),
            previous_conversion_rate: conversion_rate(&previous),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn count_delta(current: usize, previous: usize) -> String {
    delta(current as f64, previous as f64)
}

fn total_value(leads: &[AnnotatedLead<'_>]) -> f64 {
    leads.iter().filter_map(|entry| entry.lead.value).sum()
}

#[allow(clippy::cast_precision_loss)]
fn conversion_rate(leads: &[AnnotatedLead<'_>]) -> String {
    if leads.is_empty() {
        return "0.0".to_string();
    }
    let closed = leads
        .iter()
        .filter(|entry| entry.lead.status == Some(PipelineStage::Closed))
        .count();
    format!("{:.1}", closed as f64 / leads.len() as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::{Origin, Selection};
    use crate::types::{DateRange, LeadId};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn lead_on(id: i64, y: i32, m: u32, d: u32, status: QualificationStatus) -> Lead {
        Lead {
            qualification_status: status,
            ..Lead::new(LeadId(id), Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap())
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_delta_formatting() {
        assert_eq!(delta(0.0, 0.0), "0.0");
        assert_eq!(delta(5.0, 0.0), "100.0");
        assert_eq!(delta(100.0, 50.0), "100.0");
        assert_eq!(delta(50.0, 100.0), "-50.0");
        assert_eq!(delta(99.0, 100.0), "-1.0");
        assert_eq!(delta(0.0, 7.0), "-100.0");
        assert_eq!(delta(10.0, 10.0), "0.0");
    }

    #[test]
    fn test_delta_clamps_tiny_negative_values() {
        // -0.03%
        assert_eq!(delta(9997.0, 10000.0), "0.0");
        assert_eq!(delta(9996.0, 10000.0), "0.0");
        // -0.5% is well outside the band
        assert_eq!(delta(995.0, 1000.0), "-0.5");
        // tiny positive values format normally
        assert_eq!(delta(10003.0, 10000.0), "0.0");
    }

    #[test]
    fn test_scenario_month_against_empty_previous_month() {
        let collection = vec![
            lead_on(1, 2024, 1, 5, QualificationStatus::New),
            lead_on(2, 2024, 1, 20, QualificationStatus::Hot),
        ];
        let criteria = FilterCriteria {
            range: DateRange::between(date(2024, 1, 1), date(2024, 1, 31)),
            ..Default::default()
        };
        let metrics = MetricsAggregator::new().compute(&collection, &criteria);

        assert_eq!(metrics.current(Metric::Total), 2);
        assert_eq!(metrics.current(Metric::Hot), 1);
        assert_eq!(metrics.get(Metric::Total).unwrap().previous, 0);
        assert_eq!(metrics.get(Metric::Hot).unwrap().previous, 0);
        assert_eq!(metrics.delta(Metric::Total), "100.0");
        assert_eq!(metrics.delta(Metric::Hot), "100.0");
        assert_eq!(metrics.delta(Metric::Cold), "0.0");
    }

    #[test]
    fn test_previous_set_comes_from_full_collection() {
        let collection = vec![
            lead_on(4, 2024, 1, 20, QualificationStatus::Hot),
            lead_on(3, 2024, 1, 10, QualificationStatus::Hot),
            lead_on(2, 2023, 12, 20, QualificationStatus::Hot),
            lead_on(1, 2023, 12, 15, QualificationStatus::Cold),
        ];
        let criteria = FilterCriteria {
            range: DateRange::between(date(2024, 1, 1), date(2024, 1, 31)),
            qualification: Selection::Only(QualificationStatus::Hot),
            ..Default::default()
        };
        let metrics = MetricsAggregator::new().compute(&collection, &criteria);

        let total = metrics.get(Metric::Total).unwrap();
        assert_eq!(total.current, 2);
        assert_eq!(total.previous, 1);
        assert_eq!(total.delta, "100.0");
        assert_eq!(metrics.get(Metric::Cold).unwrap().previous, 0);
    }

    #[test]
    fn test_search_does_not_affect_metrics() {
        let mut named = lead_on(1, 2024, 1, 5, QualificationStatus::Warm);
        named.name = Some("Ana".into());
        let collection = vec![named];
        let criteria = FilterCriteria { search: "zzz".into(), ..Default::default() };
        let metrics = MetricsAggregator::new().compute(&collection, &criteria);
        assert_eq!(metrics.current(Metric::Total), 1);
        assert_eq!(metrics.current(Metric::Warm), 1);
    }

    #[test]
    fn test_unbounded_range_has_empty_previous_set() {
        let collection = vec![lead_on(1, 2024, 1, 5, QualificationStatus::Won)];
        let metrics = MetricsAggregator::new().compute(&collection, &FilterCriteria::default());
        let won = metrics.get(Metric::Won).unwrap();
        assert_eq!((won.current, won.previous), (1, 0));
        assert_eq!(won.delta, "100.0");
    }

    #[test]
    fn test_origin_filter_applies_to_both_periods() {
        let mut google_now = lead_on(3, 2024, 2, 10, QualificationStatus::New);
        google_now.utm_source = Some("go-ads".into());
        let mut google_before = lead_on(2, 2024, 1, 10, QualificationStatus::New);
        google_before.source = Some("google-ads".into());
        let mut linkedin_before = lead_on(1, 2024, 1, 11, QualificationStatus::New);
        linkedin_before.source = Some("linkedin".into());

        let collection = vec![google_now, google_before, linkedin_before];
        let criteria = FilterCriteria {
            origin: Selection::Only(Origin::Google),
            range: DateRange::between(date(2024, 2, 1), date(2024, 2, 29)),
            ..Default::default()
        };
        let metrics = MetricsAggregator::new().compute(&collection, &criteria);
        let total = metrics.get(Metric::Total).unwrap();
        assert_eq!((total.current, total.previous), (1, 1));
        assert_eq!(total.delta, "0.0");
    }

    #[test]
    fn test_qualified_value_and_conversion() {
        let mut a = lead_on(1, 2024, 1, 5, QualificationStatus::Hot);
        a.status = Some(PipelineStage::Proposal);
        a.value = Some(1000.0);
        let mut b = lead_on(2, 2024, 1, 6, QualificationStatus::Won);
        b.status = Some(PipelineStage::Closed);
        b.value = Some(500.0);
        let mut c = lead_on(3, 2024, 1, 7, QualificationStatus::New);
        c.status = Some(PipelineStage::Negotiation);
        let d = lead_on(4, 2024, 1, 8, QualificationStatus::New);

        let collection = vec![a, b, c, d];
        let criteria = FilterCriteria {
            range: DateRange::between(date(2024, 1, 1), date(2024, 1, 31)),
            ..Default::default()
        };
        let metrics = MetricsAggregator::new().compute(&collection, &criteria);
        assert_eq!(metrics.current(Metric::Qualified), 2);
        assert!((metrics.pipeline_value.current - 1500.0).abs() < f64::EPSILON);
        assert_eq!(metrics.pipeline_value.delta, "100.0");
        assert_eq!(metrics.conversion_rate, "25.0");
        assert_eq!(metrics.previous_conversion_rate, "0.0");
    }
}
