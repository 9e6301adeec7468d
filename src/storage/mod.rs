//! Lead Persistence
//!
//! The dashboard core reaches storage only through the [`LeadStore`]
//! trait. Two backends ship with the crate:
//!
//! - [`InMemoryLeadStore`]: tests, demos, seeded JSON snapshots
//! - [`SledLeadStore`]: durable embedded database

pub mod feed;
pub mod persistence;
pub mod sled_store;

pub use feed::{ChangeFeed, ChangeSubscription, SubscriptionId};
pub use persistence::{InMemoryLeadStore, LeadStore, StoreError};
pub use sled_store::SledLeadStore;
