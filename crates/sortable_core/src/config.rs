//! Runtime configuration.
//!
//! # Responsibility
//! - Resolve database location, sort-order attribute, and logging settings
//!   from the process environment.
//!
//! # Invariants
//! - Blank values fall back to defaults.
//! - A loaded config always carries a valid sort-order field name and a
//!   supported log level.

use crate::logging::{default_log_level, normalize_level};
use crate::model::entry::{validate_field_name, EntryValidationError};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Attribute holding the sort index when nothing else is configured.
pub const DEFAULT_SORT_ORDER_FIELD: &str = "sortOrder";

pub const ENV_DB_PATH: &str = "SORTABLE_DB_PATH";
pub const ENV_SORT_ORDER_FIELD: &str = "SORTABLE_SORT_ORDER_FIELD";
pub const ENV_LOG_LEVEL: &str = "SORTABLE_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "SORTABLE_LOG_DIR";

const DEFAULT_DB_FILE_NAME: &str = "sortable_entries.sqlite3";

/// Errors from configuration loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidSortOrderField(EntryValidationError),
    InvalidLogLevel(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidSortOrderField(err) => {
                write!(f, "{ENV_SORT_ORDER_FIELD}: {err}")
            }
            Self::InvalidLogLevel(message) => write!(f, "{ENV_LOG_LEVEL}: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidSortOrderField(err) => Some(err),
            Self::InvalidLogLevel(_) => None,
        }
    }
}

/// Settings shared by every front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortableConfig {
    pub db_path: PathBuf,
    pub sort_order_field: String,
    pub log_level: &'static str,
    /// File logging is disabled when `None`.
    pub log_dir: Option<PathBuf>,
}

impl Default for SortableConfig {
    fn default() -> Self {
        Self {
            db_path: std::env::temp_dir().join(DEFAULT_DB_FILE_NAME),
            sort_order_field: DEFAULT_SORT_ORDER_FIELD.to_string(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

impl SortableConfig {
    /// Loads settings from `SORTABLE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads settings through an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let value = |key: &str| {
            lookup(key)
                .map(|raw| raw.trim().to_string())
                .filter(|raw| !raw.is_empty())
        };

        let mut config = Self::default();
        if let Some(path) = value(ENV_DB_PATH) {
            config.db_path = PathBuf::from(path);
        }
        if let Some(field) = value(ENV_SORT_ORDER_FIELD) {
            validate_field_name(&field).map_err(ConfigError::InvalidSortOrderField)?;
            config.sort_order_field = field;
        }
        if let Some(level) = value(ENV_LOG_LEVEL) {
            config.set_log_level(&level)?;
        }
        config.log_dir = value(ENV_LOG_DIR).map(PathBuf::from);
        Ok(config)
    }

    /// Replaces the log level; used for command-line overrides.
    pub fn set_log_level(&mut self, level: &str) -> Result<(), ConfigError> {
        self.log_level = normalize_level(level)
            .map_err(|err| ConfigError::InvalidLogLevel(err.to_string()))?;
        Ok(())
    }
}
