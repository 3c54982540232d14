use thiserror::Error;

use crate::axes::Combination;

/// Main error type for the sweep harness
#[derive(Error, Debug)]
pub enum SweepError {
    #[error("invalid axis: {0}")]
    InvalidAxis(String),

    #[error(transparent)]
    Run(#[from] RunError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),
}

/// One combination's external invocation failed or produced unreadable output.
///
/// Recovered by skipping that combination; the sweep continues.
#[derive(Error, Debug, Clone)]
#[error("run failed for {combination}: {cause}")]
pub struct RunError {
    pub combination: Combination,
    pub cause: String,
}

impl RunError {
    pub fn new(combination: &Combination, cause: impl Into<String>) -> Self {
        Self {
            combination: combination.clone(),
            cause: cause.into(),
        }
    }
}

/// Tool output was present but a required field was missing or not coercible.
#[derive(Error, Debug, Clone)]
#[error("failed to parse field `{field}`: {cause}")]
pub struct ParseError {
    pub field: &'static str,
    pub cause: String,
}

impl ParseError {
    pub fn new(field: &'static str, cause: impl Into<String>) -> Self {
        Self {
            field,
            cause: cause.into(),
        }
    }
}

/// Result type for sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;
