//! Shared data structures for lead analytics
//!
//! - `Lead` and its categorical fields (qualification, pipeline stage)
//! - `DateRange` calendar periods
//! - `ChangeEvent` realtime notifications from the lead store

mod lead;
mod range;
mod change;

pub use lead::*;
pub use range::*;
pub use change::*;
