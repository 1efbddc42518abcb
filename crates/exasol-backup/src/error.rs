//! Error types for the backup library.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main error type for backup operations.
#[derive(Error, Debug)]
pub enum BackupError {
    /// Configuration error (invalid YAML, missing fields, bad destination, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A match/skip pattern could not be compiled
    #[error("Invalid pattern '{pattern}': {message}")]
    Criteria { pattern: String, message: String },

    /// Source database connection or query error
    #[error("Source database error: {0}")]
    Source(String),

    /// Catalog query failed or returned unexpected data for an object type
    #[error("Catalog error reading {object_type}: {message}")]
    Catalog {
        object_type: String,
        message: String,
    },

    /// Filesystem operation failed on a backup artifact
    #[error("Filesystem error at {}: {source}", .path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Row data export failed for a specific object
    #[error("Export failed for {object}: {message}")]
    Export { object: String, message: String },

    /// IO error (file operations without a known path)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Several concurrent stages failed
    #[error("{} errors occurred: {}", .0.len(), join_errors(.0))]
    Multiple(Vec<BackupError>),

    /// Backup was cancelled (SIGINT, a failed peer stage, etc.)
    #[error("Backup cancelled")]
    Cancelled,
}

fn join_errors(errors: &[BackupError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl BackupError {
    /// Create a Catalog error for an object type
    pub fn catalog(object_type: impl Into<String>, message: impl Into<String>) -> Self {
        BackupError::Catalog {
            object_type: object_type.into(),
            message: message.into(),
        }
    }

    /// Create an Export error
    pub fn export(object: impl Into<String>, message: impl Into<String>) -> Self {
        BackupError::Export {
            object: object.into(),
            message: message.into(),
        }
    }

    /// Create a Filesystem error carrying the path it happened on
    pub fn fs(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        BackupError::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Whether this error only reports that the operation was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, BackupError::Cancelled)
    }

    /// Merge the errors of concurrently running stages.
    ///
    /// Cancellations caused by a failing peer are dropped when a real error
    /// is present. Returns `Ok(())` when no stage failed.
    pub fn collect(errors: Vec<BackupError>) -> Result<()> {
        if !errors.is_empty() && errors.iter().all(BackupError::is_cancelled) {
            return Err(BackupError::Cancelled);
        }
        let mut errors: Vec<BackupError> =
            errors.into_iter().filter(|e| !e.is_cancelled()).collect();

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(BackupError::Multiple(errors)),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            BackupError::Config(_) | BackupError::Criteria { .. } | BackupError::Yaml(_) => 2,
            BackupError::Cancelled => 130,
            _ => 1,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, BackupError>;
