use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChartError {
    #[error("Failed to read chart file: {path}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed chart JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported {format} format version: {version}")]
    UnsupportedVersion { format: &'static str, version: i64 },

    #[error("Unrecognized chart format")]
    UnknownFormat,

    #[error("Line {line} is part of a parent cycle")]
    ParentCycle { line: usize },

    #[error("Invalid chart: {0}")]
    Invalid(String),
}
