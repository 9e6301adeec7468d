//! Dashboard Configuration Module
//!
//! Store backend, session defaults and the filters a dashboard opens with,
//! loaded from TOML.
//!
//! ## Loading Order
//!
//! 1. `LEADFLOW_CONFIG` environment variable (path to TOML file)
//! 2. `leadflow.toml` in the current working directory
//! 3. Built-in defaults
//!
//! ## Usage
//!
//! The loaded config is passed explicitly to whatever needs it:
//!
//! ```ignore
//! let config = DashboardConfig::load();
//! let store = open_store(&config.store)?;
//! let settings = SessionSettings {
//!     criteria: config.default_criteria(Utc::now().date_naive()),
//!     notice_capacity: config.session.notice_capacity,
//! };
//! let session = DashboardSession::start(store, settings).await?;
//! ```

mod dashboard_config;
pub mod defaults;

pub use dashboard_config::*;
