//! Error types for survey ingestion.

use thiserror::Error;

/// Failures while retrieving raw CSV text.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP {status}: {reason}")]
    Status { status: u16, reason: String },

    #[error("Timeout after {0}ms")]
    Timeout(u128),

    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Structural problems that make a CSV body unusable for one attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("CSV file is empty")]
    Empty,

    #[error("Unable to auto-detect delimiting character; header uses {0:?}")]
    Delimiter(char),

    #[error("Quoted field unterminated")]
    Quotes,

    #[error("No header fields found in CSV")]
    NoHeaders,

    #[error("No data rows found in CSV")]
    NoRows,

    #[error("CSV parsing failed: {0}")]
    Malformed(String),
}

/// A failed load attempt, as recorded in the loader's error list.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Configuration file problems. Only the CLI surfaces these.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Invalid {
        path: String,
        source: serde_json::Error,
    },
}
