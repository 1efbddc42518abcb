//! Table step: a catalog reader task and a file writer task joined by a
//! bounded queue of [`TableWork`] items.
//!
//! The reader pushes each table onto the queue, then streams its rows into
//! the item's data channel while the writer writes the DDL and drains that
//! channel into the CSV file. Items are handled strictly in queue order, so
//! at most one data channel is active at a time.

use super::steps::reconcile;
use super::{StepContext, StepReport};
use crate::config::ObjectType;
use crate::error::{BackupError, Result};
use crate::source::Table;
use crate::transfer::{consume, produce, should_export, ExportJob, ExportState, ExportStats};
use bytes::Bytes;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Instrument, Span};

/// One table handed from the reader to the writer.
struct TableWork {
    table: Table,
    data: Option<DataStream>,
}

/// Receiving end of a table's export.
struct DataStream {
    job: ExportJob,
    chunks: mpsc::Receiver<Bytes>,
    token: CancellationToken,
}

#[derive(Default)]
struct ReaderOutcome {
    files_removed: usize,
    errors: Vec<BackupError>,
}

#[derive(Default)]
struct WriterOutcome {
    objects_written: usize,
    data_files_written: usize,
    files_removed: usize,
    bytes_exported: u64,
    errors: Vec<BackupError>,
}

pub(crate) async fn backup_tables(
    ctx: &StepContext,
    cancel: &CancellationToken,
    report: &mut StepReport,
) -> Result<()> {
    let step_token = cancel.child_token();
    let (queue_tx, queue_rx) = mpsc::channel::<TableWork>(ctx.config.backup.metadata_queue.max(1));

    let reader = {
        let ctx = ctx.clone();
        let token = step_token.clone();
        tokio::spawn(read_tables(ctx, queue_tx, token).instrument(Span::current()))
    };
    let writer = {
        let ctx = ctx.clone();
        let token = step_token.clone();
        tokio::spawn(write_tables(ctx, queue_rx, token).instrument(Span::current()))
    };

    let mut errors = Vec::new();
    match reader.await {
        Ok(Ok(outcome)) => {
            report.files_removed += outcome.files_removed;
            errors.extend(outcome.errors);
        }
        Ok(Err(e)) => {
            step_token.cancel();
            errors.push(e);
        }
        Err(e) => {
            step_token.cancel();
            errors.push(BackupError::export("tables", format!("reader task failed: {}", e)));
        }
    }
    match writer.await {
        Ok(Ok(outcome)) => {
            report.objects_written += outcome.objects_written;
            report.data_files_written += outcome.data_files_written;
            report.files_removed += outcome.files_removed;
            report.bytes_exported += outcome.bytes_exported;
            errors.extend(outcome.errors);
        }
        Ok(Err(e)) => errors.push(e),
        Err(e) => errors.push(BackupError::export("tables", format!("writer task failed: {}", e))),
    }

    if cancel.is_cancelled() {
        return Err(BackupError::Cancelled);
    }
    BackupError::collect(errors)
}

async fn read_tables(
    ctx: StepContext,
    queue: mpsc::Sender<TableWork>,
    step_token: CancellationToken,
) -> Result<ReaderOutcome> {
    let tables = ctx.catalog.tables().await?;
    let mut outcome = ReaderOutcome {
        files_removed: reconcile(&ctx, ObjectType::Tables, &tables).await?.len(),
        ..Default::default()
    };
    debug!("{} tables selected", tables.len());

    let max_rows = ctx.config.backup.max_table_rows;
    for table in tables {
        if step_token.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        if !should_export(table.row_count, max_rows) {
            queue
                .send(TableWork { table, data: None })
                .await
                .map_err(|_| BackupError::Cancelled)?;
            continue;
        }

        let path = ctx
            .writer
            .data_path(&table.schema, ObjectType::Tables, &table.name);
        let job = ExportJob::for_table(&table, path);
        let token = step_token.child_token();
        let (tx, rx) = ctx.pipeline.channel();
        queue
            .send(TableWork {
                table,
                data: Some(DataStream {
                    job: job.clone(),
                    chunks: rx,
                    token: token.clone(),
                }),
            })
            .await
            .map_err(|_| BackupError::Cancelled)?;

        match produce(ctx.pipeline.source().clone(), &job.object, &job.sql, tx, token).await {
            Ok(_) => {}
            // The writer gave up on this table and reports why
            Err(e) if e.is_cancelled() && !step_token.is_cancelled() => {}
            Err(e) if e.is_cancelled() => return Err(e),
            Err(e) => outcome.errors.push(e),
        }
    }
    Ok(outcome)
}

async fn write_tables(
    ctx: StepContext,
    mut queue: mpsc::Receiver<TableWork>,
    step_token: CancellationToken,
) -> Result<WriterOutcome> {
    let mut outcome = WriterOutcome::default();

    while let Some(work) = queue.recv().await {
        if let Err(e) = ctx.writer.write_table(&work.table).await {
            step_token.cancel();
            return Err(e);
        }
        outcome.objects_written += 1;

        let Some(DataStream { job, chunks, token }) = work.data else {
            if ctx.config.backup.drop_extras {
                let table = &work.table;
                match ctx
                    .writer
                    .remove_data(&table.schema, ObjectType::Tables, &table.name)
                    .await
                {
                    Ok(Some(_)) => outcome.files_removed += 1,
                    Ok(None) => {}
                    Err(e) => {
                        step_token.cancel();
                        return Err(e);
                    }
                }
            }
            continue;
        };

        let start = Instant::now();
        match consume(&job.path, chunks, token).await {
            Ok(bytes) => {
                let stats = ExportStats {
                    object: job.object,
                    state: ExportState::Closed,
                    bytes,
                    rows: job.row_count,
                    elapsed: start.elapsed(),
                };
                stats.log();
                outcome.data_files_written += 1;
                outcome.bytes_exported += bytes;
            }
            Err(e) if e.is_cancelled() && step_token.is_cancelled() => return Err(e),
            // The reader failed this table and reports why
            Err(e) if e.is_cancelled() => {}
            Err(e) => outcome.errors.push(e),
        }
    }
    Ok(outcome)
}
