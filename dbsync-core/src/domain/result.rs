//! Result and error types for the core library

use std::path::PathBuf;

use thiserror::Error;

use crate::ports::ExecutionError;

/// Core library error type
///
/// Variants follow the failure classes of a sync run: configuration problems
/// are raised before any database contact, provisioning and record-write
/// failures are fatal, and transport failures are never folded into a
/// script's own SQL error.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid version format: '{0}' (expected major.minor[.patch])")]
    InvalidVersionFormat(String),

    #[error("Invalid schema name: '{0}'")]
    InvalidSchemaName(String),

    #[error("Source unavailable: {}: {source}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot find source folder for schema '{schema}' under {}", root.display())]
    SchemaSourceMissing { schema: String, root: PathBuf },

    #[error("Schema creation failed for '{schema}' ({}): {reason}", script.display())]
    SchemaCreationFailed {
        schema: String,
        script: PathBuf,
        reason: String,
    },

    #[error("Baseline script failed for '{schema}' ({}): {reason}", script.display())]
    BaselineScriptFailed {
        schema: String,
        script: PathBuf,
        reason: String,
    },

    #[error("Could not create tracking storage in '{schema}': {reason}")]
    TrackingStorageFailed { schema: String, reason: String },

    #[error("Script '{script_id}' (version {version}) failed: {reason}")]
    ScriptExecutionFailed {
        script_id: String,
        version: String,
        reason: String,
    },

    #[error("Script '{script_id}' (version {version}) ran but could not be recorded in '{schema}': {reason}")]
    RecordWriteFailed {
        schema: String,
        version: String,
        script_id: String,
        reason: String,
    },

    #[error("Execution engine unavailable: {0}")]
    Transport(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Whether this error was raised before the database was contacted
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::InvalidVersionFormat(_)
                | Self::InvalidSchemaName(_)
                | Self::SourceUnavailable { .. }
                | Self::SchemaSourceMissing { .. }
        )
    }

    /// Map an executor error, keeping transport failures in their own class.
    ///
    /// `wrap` builds the context-specific error from the SQL failure message.
    pub(crate) fn from_execution(err: ExecutionError, wrap: impl FnOnce(String) -> Error) -> Self {
        match err {
            ExecutionError::Transport(msg) => Self::Transport(msg),
            other => wrap(other.to_string()),
        }
    }
}

/// Core library result type
pub type Result<T> = std::result::Result<T, Error>;
