//! Lead Analytics
//!
//! Pure functions evaluated over each collection snapshot:
//!
//! ```text
//! snapshot ─► annotate (origin) ─┬─► table_view   ─► lead table
//!                                ├─► metrics_view ─► MetricsAggregator ◄─ previous_period
//!                                └─► daily_counts ─► leads-by-day chart
//! ```
//!
//! Nothing here holds state; callers re-run the functions whenever the
//! authoritative collection publishes a new snapshot.

mod origin;
mod period;
mod filter;
mod metrics;
mod timeline;

pub use origin::{classify_origin, Origin};
pub use period::{days_between, previous_period};
pub use filter::{annotate, metrics_view, table_view, AnnotatedLead, FilterCriteria, Selection};
pub use metrics::{delta, DashboardMetrics, Metric, MetricValue, MetricsAggregator};
pub use timeline::{daily_counts, DailyCount};
