//! Dashboard configuration
//!
//! Loaded from TOML. Every section is optional; missing keys take the
//! built-in defaults.
//!
//! Search order:
//! 1. `$LEADFLOW_CONFIG` env var
//! 2. `./leadflow.toml`
//! 3. Built-in defaults

use std::path::{Path, PathBuf};

use std::fmt::Display;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{info, warn};

use super::defaults;
use crate::analytics::{FilterCriteria, Origin, Selection};
use crate::types::{DateRange, QualificationStatus};

// ============================================================================
// Top-level config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub dashboard: DashboardSection,
    #[serde(default)]
    pub session: SessionSection,
}

impl DashboardConfig {
    /// Load configuration using the standard search order. Unreadable or
    /// invalid files are logged and skipped.
    pub fn load() -> Self {
        // 1. Check env var
        if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
            let p = PathBuf::from(&path);
            if p.exists() {
                match Self::load_from_file(&p) {
                    Ok(config) => {
                        info!(path = %p.display(), backend = %config.store.backend, "Loaded config from {}", defaults::CONFIG_ENV_VAR);
                        return config;
                    }
                    Err(e) => {
                        warn!(path = %p.display(), error = %e, "Failed to load config from {}, falling back", defaults::CONFIG_ENV_VAR);
                    }
                }
            } else {
                warn!(path = %path, "{} points to non-existent file, falling back", defaults::CONFIG_ENV_VAR);
            }
        }

        // 2. Check ./leadflow.toml
        let local = PathBuf::from(defaults::LOCAL_CONFIG_FILE);
        if local.exists() {
            match Self::load_from_file(&local) {
                Ok(config) => {
                    info!(backend = %config.store.backend, "Loaded config from ./{}", defaults::LOCAL_CONFIG_FILE);
                    return config;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to load ./{}, using defaults", defaults::LOCAL_CONFIG_FILE);
                }
            }
        }

        // 3. Defaults
        info!("No {} found, using built-in defaults", defaults::LOCAL_CONFIG_FILE);
        Self::default()
    }

    /// Load from a specific TOML file path.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e))?;
        let config: Self = toml::from_str(&contents)
            .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints. All problems are reported at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.store.backend == StoreBackend::Sled && self.store.path.is_none() {
            errors.push("store.path is required when store.backend = \"sled\"".to_string());
        }
        if self.session.notice_capacity == 0 {
            errors.push("session.notice_capacity must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    /// Filters a new session opens with, relative to `today`.
    pub fn default_criteria(&self, today: NaiveDate) -> FilterCriteria {
        FilterCriteria {
            search: String::new(),
            qualification: self.dashboard.qualification,
            origin: self.dashboard.origin,
            range: self.dashboard.default_range.resolve(today),
        }
    }
}

// ============================================================================
// Sections
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sled,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Memory => write!(f, "memory"),
            StoreBackend::Sled => write!(f, "sled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    /// Database directory for the sled backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Period preset applied when a session opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DefaultRange {
    #[default]
    MonthToDate,
    #[serde(rename = "last_7_days")]
    Last7Days,
    #[serde(rename = "last_30_days")]
    Last30Days,
    AllTime,
}

impl DefaultRange {
    pub fn resolve(self, today: NaiveDate) -> DateRange {
        match self {
            DefaultRange::MonthToDate => DateRange::month_to_date(today),
            DefaultRange::Last7Days => DateRange::trailing_days(today, defaults::SHORT_RANGE_DAYS),
            DefaultRange::Last30Days => DateRange::trailing_days(today, defaults::LONG_RANGE_DAYS),
            DefaultRange::AllTime => DateRange::all_time(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DashboardSection {
    #[serde(default)]
    pub default_range: DefaultRange,
    /// `all` or a qualification status (English or Portuguese).
    #[serde(default, with = "selection_text")]
    pub qualification: Selection<QualificationStatus>,
    /// `all` or an origin label.
    #[serde(default, with = "selection_text")]
    pub origin: Selection<Origin>,
}

/// Filter selections written as plain text, e.g. `"all"` or `"Quente"`.
mod selection_text {
    use super::*;

    pub fn serialize<T, S>(value: &Selection<T>, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Display,
        S: Serializer,
    {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Selection<T>, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSection {
    #[serde(default = "default_notice_capacity")]
    pub notice_capacity: usize,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self { notice_capacity: default_notice_capacity() }
    }
}

fn default_notice_capacity() -> usize {
    defaults::NOTICE_CAPACITY
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config I/O error ({}): {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("config parse error ({}): {1}", .0.display())]
    Parse(PathBuf, #[source] toml::de::Error),
    #[error("config validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = DashboardConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.session.notice_capacity, defaults::NOTICE_CAPACITY);
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: DashboardConfig = toml::from_str(
            r#"
            [dashboard]
            default_range = "last_7_days"
            qualification = "Quente"
            "#,
        )
        .unwrap();

        assert_eq!(config.dashboard.default_range, DefaultRange::Last7Days);
        assert_eq!(config.dashboard.origin, Selection::All);
        assert_eq!(config.session.notice_capacity, defaults::NOTICE_CAPACITY);

        let criteria = config.default_criteria(date(2024, 3, 10));
        assert_eq!(criteria.qualification, Selection::Only(QualificationStatus::Hot));
        assert_eq!(criteria.origin, Selection::All);
        assert_eq!(criteria.range, DateRange::between(date(2024, 3, 4), date(2024, 3, 10)));
    }

    #[test]
    fn test_month_to_date_is_default_range() {
        let criteria = DashboardConfig::default().default_criteria(date(2024, 2, 17));
        assert_eq!(criteria.range, DateRange::between(date(2024, 2, 1), date(2024, 2, 17)));
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let config: DashboardConfig = toml::from_str(
            r#"
            [store]
            backend = "sled"

            [session]
            notice_capacity = 0
            "#,
        )
        .unwrap();

        match config.validate() {
            Err(ConfigError::Invalid(errors)) => assert_eq!(errors.len(), 2),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn test_documented_range_presets_parse() {
        for (text, preset) in [
            ("month_to_date", DefaultRange::MonthToDate),
            ("last_7_days", DefaultRange::Last7Days),
            ("last_30_days", DefaultRange::Last30Days),
            ("all_time", DefaultRange::AllTime),
        ] {
            let config: DashboardConfig =
                toml::from_str(&format!("[dashboard]\ndefault_range = \"{text}\"\n")).unwrap();
            assert_eq!(config.dashboard.default_range, preset, "{text}");
        }
    }

    #[test]
    fn test_unknown_filter_value_fails_to_parse() {
        let result: Result<DashboardConfig, _> =
            toml::from_str("[dashboard]\norigin = \"Orkut\"\n");
        let err = result.unwrap_err();
        assert!(err.to_string().contains("unknown origin 'Orkut'"), "{err}");
    }

    #[test]
    fn test_filter_selections_serialize_as_text() {
        let config = DashboardConfig {
            dashboard: DashboardSection {
                default_range: DefaultRange::Last7Days,
                qualification: Selection::Only(QualificationStatus::Won),
                origin: Selection::All,
            },
            ..Default::default()
        };
        let text = toml::to_string(&config).unwrap();
        assert!(text.contains("default_range = \"last_7_days\""), "{text}");
        assert!(text.contains("qualification = \"Won\""), "{text}");
        assert!(text.contains("origin = \"all\""), "{text}");

        let back: DashboardConfig = toml::from_str(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[store]\nbackend = \"sled\"\npath = \"/tmp/leads.db\"").unwrap();

        let config = DashboardConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.store.backend, StoreBackend::Sled);
        assert_eq!(config.store.path, Some(PathBuf::from("/tmp/leads.db")));
    }

    #[test]
    fn test_load_from_missing_file() {
        let result = DashboardConfig::load_from_file(Path::new("/nonexistent/leadflow.toml"));
        assert!(matches!(result, Err(ConfigError::Io(..))));
    }
}
