//! Error types for the flattening pass
//!
//! The resolver itself never fails a pass: unreachable references degrade to
//! their raw string. These errors belong to the layers around it (sources,
//! document parsing, configuration).

use thiserror::Error;

/// Result type for flattening operations
pub type Result<T> = std::result::Result<T, FlattenError>;

/// Flattening errors
#[derive(Error, Debug)]
pub enum FlattenError {
    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Unsupported location for this source: {0}")]
    UnsupportedLocation(String),

    #[error("Invalid document {location}: {reason}")]
    InvalidDocument { location: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Config error: {0}")]
    Config(#[from] config_crate::ConfigError),
}
