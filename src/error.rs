//! Error types for the consistency engine
//!
//! Only structural failures live here: a document that cannot be read or
//! decoded means no further analysis is meaningful. Everything a checker can
//! report and continue past is a [`crate::report::DiagnosticItem`] instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, CheckError>;

/// Fatal errors that abort a run
#[derive(Error, Debug)]
pub enum CheckError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON validation failed:\n{}", .0.join("\n"))]
    InvalidJson(Vec<String>),

    #[error("Malformed document {path}: {reason}")]
    MalformedDocument { path: PathBuf, reason: String },

    #[error("Required file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Failed to compile meta-schema {path}: {reason}")]
    MetaSchema { path: PathBuf, reason: String },

    #[error("Failed to parse proto file {path}: {reason}")]
    Proto { path: PathBuf, reason: String },

    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("Entity not found: {entity_type} '{name}'")]
    EntityNotFound { entity_type: String, name: String },

    #[error("Entity {entity_type} '{name}' could not be resolved: {reason}")]
    Unresolved {
        entity_type: String,
        name: String,
        reason: String,
    },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl CheckError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedDocument {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
