//! Error types for the spot-deconv-curator library.

use thiserror::Error;

/// Main error type for the library.
#[derive(Error, Debug)]
pub enum CurateError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid contribution value '{value}' at row {row}, column {col}")]
    InvalidValue {
        value: String,
        row: usize,
        col: usize,
    },

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Duplicate identifier: {0}")]
    DuplicateId(String),

    #[error("Degenerate input: {0}")]
    DegenerateInput(String),

    #[error("{} spot(s) missing from metadata: {}", .missing.len(), .missing.join(", "))]
    KeyAlignment { missing: Vec<String> },

    #[error("Empty data: {0}")]
    EmptyData(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("YAML serialization error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, CurateError>;
