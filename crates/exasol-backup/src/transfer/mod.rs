//! Streaming export of row data into CSV files.
//!
//! Every export job is a two-stage pipeline:
//! - a reader stage pulling CSV chunks out of the source ([`produce`])
//! - a writer stage appending them to the data file ([`consume`])
//!
//! The stages share a bounded channel and a job-level cancellation token.
//! Whichever stage fails first cancels the token and the other one winds down,
//! so a broken job never leaves the peer blocked on the channel.

use crate::error::{BackupError, Result};
use crate::source::{quote_ident, Source, Table, View};
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default number of chunks buffered between reader and writer.
pub const DEFAULT_BUFFER_CHUNKS: usize = 10_000;

/// Export job for a single table or view.
#[derive(Debug, Clone)]
pub struct ExportJob {
    /// Object label for logs and errors (`SCHEMA.NAME`).
    pub object: String,

    /// Query producing the rows, with a deterministic `ORDER BY`.
    pub sql: String,

    /// Data file to write.
    pub path: PathBuf,

    /// Row count known before the export started.
    pub row_count: u64,
}

impl ExportJob {
    pub fn for_table(table: &Table, path: PathBuf) -> Self {
        Self {
            object: table.full_name(),
            sql: export_query(&table.schema, &table.name, &table.ordering_columns()),
            path,
            row_count: table.row_count,
        }
    }

    pub fn for_view(view: &View, row_count: u64, path: PathBuf) -> Self {
        Self {
            object: view.full_name(),
            sql: export_query(&view.schema, &view.name, &view.columns),
            path,
            row_count,
        }
    }
}

/// Lifecycle of an export job.
///
/// `Pending -> Streaming -> Draining -> Closed` on success,
/// `Pending -> Streaming -> Failed` otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportState {
    Pending,
    Streaming,
    Draining,
    Closed,
    Failed,
}

/// Statistics from an export job.
#[derive(Debug, Clone)]
pub struct ExportStats {
    pub object: String,
    pub state: ExportState,

    /// Bytes written to the data file.
    pub bytes: u64,

    /// Rows exported, as counted before the export.
    pub rows: u64,

    pub elapsed: Duration,
}

impl ExportStats {
    pub fn mb_per_sec(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / 1_048_576.0 / secs
        } else {
            0.0
        }
    }

    pub fn rows_per_sec(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            (self.rows as f64 / secs) as u64
        } else {
            0
        }
    }

    pub(crate) fn log(&self) {
        info!(
            "{}: exported {} rows ({} bytes) in {:?} ({:.2} MB/s, {} rows/sec)",
            self.object,
            self.rows,
            self.bytes,
            self.elapsed,
            self.mb_per_sec(),
            self.rows_per_sec()
        );
    }
}

/// Whether row data should be exported for an object with `row_count`
/// rows. A zero limit disables export; empty objects are never exported.
pub fn should_export(row_count: u64, max_rows: u64) -> bool {
    max_rows > 0 && row_count > 0 && row_count <= max_rows
}

/// `SELECT * FROM "S"."N" ORDER BY "C1","C2"`.
pub fn export_query(schema: &str, name: &str, order_by: &[String]) -> String {
    let mut sql = format!("SELECT * FROM {}.{}", quote_ident(schema), quote_ident(name));
    if !order_by.is_empty() {
        let cols: Vec<String> = order_by.iter().map(|c| quote_ident(c)).collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&cols.join(","));
    }
    sql
}

/// Reader stage: stream the job's rows into `sink`.
///
/// On failure the job token is cancelled before returning. The channel
/// closes when `sink` is dropped.
pub async fn produce(
    source: Arc<dyn Source>,
    object: &str,
    sql: &str,
    sink: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
) -> Result<u64> {
    debug!("{}: {}", object, sql);
    // Keep our sender alive until the token is cancelled, so the writer
    // never sees a clean close for a failed stream.
    let result = source.stream_export(sql, sink.clone(), cancel.clone()).await;
    if result.is_err() {
        cancel.cancel();
    }
    drop(sink);
    result.map_err(|e| match e {
        BackupError::Cancelled | BackupError::Export { .. } => e,
        other => BackupError::export(object, other.to_string()),
    })
}

/// Writer stage: append received chunks to `path` in receipt order.
///
/// If the token fires before the channel closes cleanly, the partial file
/// is removed and [`BackupError::Cancelled`] is returned.
pub async fn consume(
    path: &Path,
    mut chunks: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
) -> Result<u64> {
    let mut file = match create_file(path).await {
        Ok(file) => file,
        Err(e) => {
            cancel.cancel();
            return Err(e);
        }
    };

    let mut written = 0u64;
    loop {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            chunk = chunks.recv() => chunk,
        };
        let Some(chunk) = chunk else {
            break;
        };
        if let Err(e) = file.write_all(&chunk).await {
            cancel.cancel();
            drop(chunks);
            discard(path).await;
            return Err(BackupError::fs(path, e));
        }
        written += chunk.len() as u64;
    }
    drop(chunks);

    if cancel.is_cancelled() {
        drop(file);
        discard(path).await;
        return Err(BackupError::Cancelled);
    }

    if let Err(e) = file.flush().await {
        cancel.cancel();
        discard(path).await;
        return Err(BackupError::fs(path, e));
    }
    Ok(written)
}

async fn create_file(path: &Path) -> Result<tokio::fs::File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BackupError::fs(parent, e))?;
    }
    tokio::fs::File::create(path)
        .await
        .map_err(|e| BackupError::fs(path, e))
}

async fn discard(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => debug!("Removed partial data file {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!("Failed to remove partial data file {}: {}", path.display(), e),
    }
}

/// Runs export jobs one at a time, each as a reader/writer task pair.
#[derive(Clone)]
pub struct ExportPipeline {
    source: Arc<dyn Source>,
    buffer_chunks: usize,
}

impl ExportPipeline {
    pub fn new(source: Arc<dyn Source>, buffer_chunks: usize) -> Self {
        Self {
            source,
            buffer_chunks: buffer_chunks.max(1),
        }
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        &self.source
    }

    /// A fresh bounded channel for one job.
    pub fn channel(&self) -> (mpsc::Sender<Bytes>, mpsc::Receiver<Bytes>) {
        mpsc::channel(self.buffer_chunks)
    }

    /// Export one job. Errors from both stages are collected; a stage that
    /// only stopped because its peer failed does not mask the real error.
    pub async fn run(&self, job: &ExportJob, cancel: &CancellationToken) -> Result<ExportStats> {
        let start = Instant::now();
        let token = cancel.child_token();
        let (tx, rx) = self.channel();
        let mut state = ExportState::Pending;
        transition(&job.object, &mut state, ExportState::Streaming);

        let reader = {
            let source = self.source.clone();
            let object = job.object.clone();
            let sql = job.sql.clone();
            let token = token.clone();
            tokio::spawn(async move { produce(source, &object, &sql, tx, token).await })
        };
        let writer = {
            let path = job.path.clone();
            let token = token.clone();
            tokio::spawn(async move { consume(&path, rx, token).await })
        };

        let mut errors = Vec::new();
        let read = join_stage(&job.object, "reader", reader).await;
        if read.is_ok() {
            transition(&job.object, &mut state, ExportState::Draining);
        }
        let written = join_stage(&job.object, "writer", writer).await;

        let read = read.unwrap_or_else(|e| {
            errors.push(e);
            0
        });
        let written = written.unwrap_or_else(|e| {
            errors.push(e);
            0
        });
        if let Err(e) = BackupError::collect(errors) {
            transition(&job.object, &mut state, ExportState::Failed);
            return Err(e);
        }
        if read != written {
            warn!(
                "{}: reader sent {} bytes but writer wrote {}",
                job.object, read, written
            );
        }
        transition(&job.object, &mut state, ExportState::Closed);

        let stats = ExportStats {
            object: job.object.clone(),
            state,
            bytes: written,
            rows: job.row_count,
            elapsed: start.elapsed(),
        };
        stats.log();
        Ok(stats)
    }
}

async fn join_stage(
    object: &str,
    stage: &str,
    handle: tokio::task::JoinHandle<Result<u64>>,
) -> Result<u64> {
    handle
        .await
        .map_err(|e| BackupError::export(object, format!("{} task failed: {}", stage, e)))?
}

fn transition(object: &str, state: &mut ExportState, next: ExportState) {
    debug!("{}: {:?} -> {:?}", object, state, next);
    *state = next;
}
