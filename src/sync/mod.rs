//! Lead Synchronization
//!
//! Keeps the dashboard's single authoritative lead collection current:
//!
//! - `collection`: snapshot owner with observer subscriptions
//! - `reconciler`: merges store change notifications
//! - `bulk`: optimistic qualification changes with rollback, row selection
//! - `notice`: user-visible success/error messages
//! - `session`: init (subscribe + load), background reconciliation, teardown
//!
//! The reconciler and the mutation coordinator are the only writers, and
//! both go through [`LeadCollection`].

pub mod bulk;
pub mod collection;
pub mod notice;
pub mod reconciler;
pub mod session;

pub use bulk::{BulkMutationCoordinator, MutationError, MutationOutcome};
pub use collection::{LeadCollection, Snapshot};
pub use notice::{Notice, NoticeBus, NoticeLevel};
pub use reconciler::{reconcile, RealtimeReconciler, StreamExit};
pub use session::{DashboardSession, DashboardView, LeadRow, SessionSettings};
