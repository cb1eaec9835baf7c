use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the loader, filter registry and filter engine.
#[derive(Debug, Error)]
pub enum DashError {
    /// A required column or sheet is absent.
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// A cell could not be interpreted (malformed date, non-numeric total).
    #[error("row {row}, column '{column}': cannot parse '{value}' ({expected})")]
    Parse {
        row: usize,
        column: String,
        value: String,
        expected: &'static str,
    },

    /// The workbook or source directory does not exist.
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    /// The source exists but could not be decoded.
    #[error("failed to read {}: {message}", path.display())]
    Source {
        path: PathBuf,
        message: String,
        #[source]
        source: anyhow::Error,
    },

    /// The dashboard configuration is inconsistent.
    #[error("invalid dashboard configuration: {0}")]
    Config(String),
}

impl DashError {
    pub fn missing_column(column: &str) -> Self {
        DashError::Schema(format!("column '{column}' is not present in the dataset"))
    }
}

pub type Result<T, E = DashError> = std::result::Result<T, E>;
