//! System-wide default constants.
//!
//! Grouped by subsystem for easy discovery.

// ============================================================================
// Configuration Files
// ============================================================================

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV_VAR: &str = "LEADFLOW_CONFIG";

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "leadflow.toml";

// ============================================================================
// Session
// ============================================================================

/// Notices buffered per subscriber before the oldest are dropped.
pub const NOTICE_CAPACITY: usize = 64;

// ============================================================================
// Dashboard Ranges
// ============================================================================

/// Length of the "last 7 days" preset, today included.
pub const SHORT_RANGE_DAYS: u32 = 7;

/// Length of the "last 30 days" preset, today included.
pub const LONG_RANGE_DAYS: u32 = 30;

// ============================================================================
// Metrics
// ============================================================================

/// Percent changes in `(NEGATIVE_ZERO_BAND, 0)` are displayed as `0.0`.
pub const NEGATIVE_ZERO_BAND: f64 = -0.05;
