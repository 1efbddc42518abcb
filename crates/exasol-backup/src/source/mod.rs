//! Source database access.
//!
//! The backup engine only needs two things from the database: tabular catalog
//! queries and a streaming export of a query's rows as CSV bytes. Both are
//! behind the [`Source`] trait so the engine can run against the ODBC client
//! in production and an in-memory catalog in tests.

mod odbc;
mod types;

pub use odbc::OdbcSource;
pub use types::*;

use crate::error::{BackupError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Trait for source database operations.
#[async_trait]
pub trait Source: Send + Sync {
    /// Run a query and return every row.
    async fn fetch(&self, sql: &str) -> Result<Vec<Row>>;

    /// Run a statement that returns no rows.
    async fn execute(&self, sql: &str) -> Result<()>;

    /// Stream the rows of `sql` as CSV into `sink`, one chunk at a time.
    ///
    /// Chunks must be sent in row order. The implementation stops early when
    /// `cancel` fires or the receiving side goes away, returning
    /// [`BackupError::Cancelled`]. Returns the number of bytes sent.
    async fn stream_export(
        &self,
        sql: &str,
        sink: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
    ) -> Result<u64>;

    /// Short identifier of the source, for logging.
    fn source_type(&self) -> &str;
}

/// One catalog row: nullable values in their text representation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(pub Vec<Option<String>>);

impl Row {
    /// Build a row from nullable text values.
    pub fn new(values: Vec<Option<String>>) -> Self {
        Self(values)
    }

    /// Number of columns.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the row has no columns.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Nullable text value of a column.
    pub fn opt_str(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).and_then(|v| v.as_deref())
    }

    /// Non-null text value of a column.
    pub fn str(&self, idx: usize) -> Result<&str> {
        self.opt_str(idx).ok_or_else(|| Self::missing(idx))
    }

    /// Text value, with NULL read as the empty string.
    pub fn string_or_empty(&self, idx: usize) -> String {
        self.opt_str(idx).unwrap_or_default().to_string()
    }

    /// Boolean column. Drivers render these as `1`/`0` or `true`/`false`.
    pub fn bool(&self, idx: usize) -> Result<bool> {
        let value = self.str(idx)?;
        match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "t" | "y" | "yes" => Ok(true),
            "0" | "false" | "f" | "n" | "no" => Ok(false),
            other => Err(BackupError::Source(format!(
                "column {} is not a boolean: '{}'",
                idx, other
            ))),
        }
    }

    /// Nullable numeric column.
    pub fn opt_f64(&self, idx: usize) -> Result<Option<f64>> {
        match self.opt_str(idx) {
            None => Ok(None),
            Some(v) if v.trim().is_empty() => Ok(None),
            Some(v) => v.trim().parse::<f64>().map(Some).map_err(|e| {
                BackupError::Source(format!("column {} is not numeric ('{}'): {}", idx, v, e))
            }),
        }
    }

    /// Non-null numeric column.
    pub fn f64(&self, idx: usize) -> Result<f64> {
        self.opt_f64(idx)?.ok_or_else(|| Self::missing(idx))
    }

    /// Numeric column as an unsigned count, NULL read as zero.
    pub fn u64_or_zero(&self, idx: usize) -> Result<u64> {
        Ok(self.opt_f64(idx)?.map(|v| v.max(0.0) as u64).unwrap_or(0))
    }

    /// Numeric column as an integer, NULL read as zero.
    pub fn i64_or_zero(&self, idx: usize) -> Result<i64> {
        Ok(self.opt_f64(idx)?.map(|v| v as i64).unwrap_or(0))
    }

    fn missing(idx: usize) -> BackupError {
        BackupError::Source(format!("column {} is NULL or missing", idx))
    }
}

impl From<Vec<Option<&str>>> for Row {
    fn from(values: Vec<Option<&str>>) -> Self {
        Self(values.into_iter().map(|v| v.map(str::to_string)).collect())
    }
}

/// Quote an identifier for Exasol: `a"b` -> `"a""b"`.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Escape a string literal body: `O'Brien` -> `O''Brien`.
pub fn escape_literal(value: &str) -> String {
    value.replace('\'', "''")
}
