//! ODBC-based Exasol source.
//!
//! **Requirements:**
//! - The Exasol ODBC driver must be installed and registered with the driver
//!   manager (unixODBC on Linux/macOS), or a DSN must be configured and
//!   referenced through `source.connection_string`.
//!
//! ODBC calls are blocking, so every query runs on the blocking thread pool.
//! A mutex serializes them: the backup never has more than one logical query
//! in flight against the source.

use crate::config::SourceConfig;
use crate::error::{BackupError, Result};
use crate::source::{Row, Source};
use async_trait::async_trait;
use bytes::Bytes;
use odbc_api::{buffers::TextRowSet, ConnectionOptions, Cursor, Environment, ResultSetMetadata};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Rows fetched per round trip for catalog queries. Kept small because view
/// and script texts are bound with a large per-value buffer.
const CATALOG_BATCH_ROWS: usize = 64;

/// Longest text value fetched for catalog columns (view and script texts).
const CATALOG_MAX_STR: usize = 1_048_576;

/// Longest text value fetched for exported row data. Longer values fail the
/// fetch instead of being cut short.
const EXPORT_MAX_STR: usize = 65536;

/// ODBC source for Exasol.
pub struct OdbcSource {
    env: Arc<Environment>,
    connection_string: String,
    session_statements: Arc<Vec<String>>,
    export_batch_rows: usize,
    /// Serializes ODBC operations (one logical query at a time)
    conn_mutex: Mutex<()>,
}

impl OdbcSource {
    /// Connect to Exasol through ODBC.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The ODBC environment cannot be created
    /// - The driver is not installed or the connection is refused
    /// - A session statement fails
    pub async fn connect(config: &SourceConfig) -> Result<Self> {
        let env = Environment::new().map_err(|e| {
            BackupError::Source(format!(
                "Failed to create ODBC environment: {}. \
                 Make sure unixODBC and the Exasol ODBC driver are installed.",
                e
            ))
        })?;

        let source = Self {
            env: Arc::new(env),
            connection_string: config.connection_string(),
            session_statements: Arc::new(config.session_statements.clone()),
            export_batch_rows: config.export_batch_rows,
            conn_mutex: Mutex::new(()),
        };

        debug!("ODBC connection: {}", config.redacted_connection_string());

        // Test connection and session setup
        source.fetch("SELECT 1").await?;

        info!("Connected to Exasol via ODBC: {}", config.display_target());
        Ok(source)
    }

    /// Run `work` on a fresh connection inside the blocking pool.
    async fn with_connection<T, F>(&self, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&odbc_api::Connection<'_>) -> Result<T> + Send + 'static,
    {
        let _lock = self.conn_mutex.lock().await;

        let env = Arc::clone(&self.env);
        let connection_string = self.connection_string.clone();
        let session_statements = Arc::clone(&self.session_statements);

        tokio::task::spawn_blocking(move || {
            let conn = env
                .connect_with_connection_string(&connection_string, ConnectionOptions::default())
                .map_err(|e| BackupError::Source(format!("ODBC connection failed: {}", e)))?;

            for stmt in session_statements.iter() {
                conn.execute(stmt, ()).map_err(|e| {
                    BackupError::Source(format!("Session setup failed: {} - SQL: {}", e, stmt))
                })?;
            }

            work(&conn)
        })
        .await
        .map_err(|e| BackupError::Source(format!("ODBC worker task failed: {}", e)))?
    }
}

#[async_trait]
impl Source for OdbcSource {
    async fn fetch(&self, sql: &str) -> Result<Vec<Row>> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            let mut rows = Vec::new();

            let Some(mut cursor) = conn
                .execute(&sql, ())
                .map_err(|e| BackupError::Source(format!("Query failed: {} - SQL: {}", e, sql)))?
            else {
                return Ok(rows);
            };

            let num_cols = cursor
                .num_result_cols()
                .map_err(|e| BackupError::Source(format!("Failed to get column count: {}", e)))?
                as usize;

            let mut buffers =
                TextRowSet::for_cursor(CATALOG_BATCH_ROWS, &mut cursor, Some(CATALOG_MAX_STR))
                    .map_err(|e| {
                        BackupError::Source(format!("Failed to create row buffer: {}", e))
                    })?;

            let mut row_cursor = cursor
                .bind_buffer(&mut buffers)
                .map_err(|e| BackupError::Source(format!("Failed to bind buffer: {}", e)))?;

            while let Some(batch) = row_cursor
                .fetch_with_truncation_check(true)
                .map_err(|e| fetch_error(e, CATALOG_MAX_STR))?
            {
                for row_idx in 0..batch.num_rows() {
                    let values = (0..num_cols)
                        .map(|col_idx| {
                            batch
                                .at(col_idx, row_idx)
                                .map(|bytes| String::from_utf8_lossy(bytes).to_string())
                        })
                        .collect();
                    rows.push(Row::new(values));
                }
            }

            Ok(rows)
        })
        .await
    }

    async fn execute(&self, sql: &str) -> Result<()> {
        let sql = sql.to_string();
        self.with_connection(move |conn| {
            conn.execute(&sql, ())
                .map_err(|e| BackupError::Source(format!("Statement failed: {} - SQL: {}", e, sql)))?;
            Ok(())
        })
        .await
    }

    async fn stream_export(
        &self,
        sql: &str,
        sink: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
    ) -> Result<u64> {
        let sql = sql.to_string();
        let batch_rows = self.export_batch_rows;

        self.with_connection(move |conn| {
            let Some(mut cursor) = conn
                .execute(&sql, ())
                .map_err(|e| BackupError::Source(format!("Export query failed: {} - SQL: {}", e, sql)))?
            else {
                return Ok(0);
            };

            let num_cols = cursor
                .num_result_cols()
                .map_err(|e| BackupError::Source(format!("Failed to get column count: {}", e)))?
                as usize;

            let mut buffers = TextRowSet::for_cursor(batch_rows, &mut cursor, Some(EXPORT_MAX_STR))
                .map_err(|e| BackupError::Source(format!("Failed to create row buffer: {}", e)))?;

            let mut row_cursor = cursor
                .bind_buffer(&mut buffers)
                .map_err(|e| BackupError::Source(format!("Failed to bind buffer: {}", e)))?;

            let mut bytes_sent = 0u64;
            loop {
                if cancel.is_cancelled() {
                    return Err(BackupError::Cancelled);
                }

                let Some(batch) = row_cursor
                    .fetch_with_truncation_check(true)
                    .map_err(|e| fetch_error(e, EXPORT_MAX_STR))?
                else {
                    break;
                };

                let mut writer = csv::WriterBuilder::new()
                    .terminator(csv::Terminator::Any(b'\n'))
                    .from_writer(Vec::new());

                for row_idx in 0..batch.num_rows() {
                    let record: Vec<&[u8]> = (0..num_cols)
                        .map(|col_idx| batch.at(col_idx, row_idx).unwrap_or(b""))
                        .collect();
                    writer
                        .write_record(record)
                        .map_err(|e| BackupError::Source(format!("CSV encoding failed: {}", e)))?;
                }

                let chunk = writer
                    .into_inner()
                    .map_err(|e| BackupError::Source(format!("CSV encoding failed: {}", e)))?;
                bytes_sent += chunk.len() as u64;

                // Receiver dropped: the writer stage has stopped
                if sink.blocking_send(Bytes::from(chunk)).is_err() {
                    return Err(BackupError::Cancelled);
                }
            }

            Ok(bytes_sent)
        })
        .await
    }

    fn source_type(&self) -> &str {
        "exasol-odbc"
    }
}

/// Map a fetch failure. A value longer than its bound buffer is an error.
fn fetch_error(err: odbc_api::Error, max_len: usize) -> BackupError {
    match err {
        odbc_api::Error::TooLargeValueForBuffer {
            indicator,
            buffer_index,
        } => {
            let size = indicator
                .map(|len| format!("{} bytes", len))
                .unwrap_or_else(|| "unknown length".to_string());
            BackupError::Source(format!(
                "Value in column {} ({}) exceeds the {} byte fetch buffer and would be truncated",
                buffer_index + 1,
                size,
                max_len
            ))
        }
        other => BackupError::Source(format!("Failed to fetch rows: {}", other)),
    }
}
