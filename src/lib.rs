//! Leadflow: CRM Lead Analytics & Real-Time Synchronization
//!
//! Keeps one authoritative in-memory lead collection in sync with a
//! persistence backend and derives the dashboard from it.
//!
//! ## Architecture
//!
//! - **Storage**: `LeadStore` trait with in-memory and sled backends, each
//!   publishing ordered change notifications
//! - **Sync**: session lifecycle, realtime reconciliation, optimistic
//!   qualification changes with rollback
//! - **Analytics**: origin classification, filtering, period math, metric
//!   cards with period-over-period deltas

pub mod analytics;
pub mod config;
pub mod display;
pub mod storage;
pub mod sync;
pub mod types;

// Re-export configuration
pub use config::{ConfigError, DashboardConfig};

// Re-export commonly used types
pub use types::{
    ChangeEvent, ChangeKind, DateRange, Lead, LeadId, NewLead, PipelineStage, QualificationStatus,
};

// Re-export analytics
pub use analytics::{
    classify_origin, delta, previous_period, DashboardMetrics, FilterCriteria, Metric,
    MetricsAggregator, Origin, Selection,
};

// Re-export storage
pub use storage::{InMemoryLeadStore, LeadStore, SledLeadStore, StoreError};

// Re-export sync components
pub use sync::{
    BulkMutationCoordinator, DashboardSession, LeadCollection, MutationError, MutationOutcome,
    RealtimeReconciler, SessionSettings,
};
