use std::path::PathBuf;
use thiserror::Error;

/// Errors produced by the KPI core outside of data loading.
///
/// Load-time failures live in `kpi_data::error::DataFormatError`; this enum
/// covers configuration and the plumbing around it.
#[derive(Error, Debug)]
pub enum KpiError {
    /// A configuration file could not be opened or read from disk.
    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A JSON document could not be parsed.
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// A date supplied on the command line or in a filter did not parse.
    #[error("Invalid date: {0}")]
    InvalidDate(String),

    /// A configuration value is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience alias used throughout the KPI crates.
pub type Result<T> = std::result::Result<T, KpiError>;
