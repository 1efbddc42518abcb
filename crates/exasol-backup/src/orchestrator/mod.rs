//! Backup orchestrator - runs one step per selected object type.

mod steps;
mod tables;

use crate::catalog::CatalogReader;
use crate::config::{Config, ObjectType};
use crate::criteria::Criteria;
use crate::error::{BackupError, Result};
use crate::source::{Capabilities, OdbcSource, Source};
use crate::target::ArtifactWriter;
use crate::transfer::ExportPipeline;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

/// Backup orchestrator.
pub struct Orchestrator {
    config: Config,
    source: Arc<dyn Source>,
}

/// Outcome of one object-type step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepReport {
    pub object_type: ObjectType,

    /// `completed` or `failed`.
    pub status: String,

    /// DDL artifacts written (one per object, or per object in a shared file).
    pub objects_written: usize,

    /// CSV data files written.
    pub data_files_written: usize,

    /// Artifacts removed as extraneous or stale.
    pub files_removed: usize,

    /// Bytes of row data exported.
    pub bytes_exported: u64,

    pub duration_seconds: f64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepReport {
    pub(crate) fn new(object_type: ObjectType) -> Self {
        Self {
            object_type,
            status: "completed".to_string(),
            objects_written: 0,
            data_files_written: 0,
            files_removed: 0,
            bytes_exported: 0,
            duration_seconds: 0.0,
            error: None,
        }
    }
}

/// Result of a backup run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResult {
    /// Unique run identifier.
    pub run_id: String,

    /// Final status.
    pub status: String,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,

    /// Per object-type steps, in execution order.
    pub steps: Vec<StepReport>,

    pub objects_written: usize,
    pub data_files_written: usize,
    pub files_removed: usize,
    pub bytes_exported: u64,
}

impl BackupResult {
    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn log(&self) {
        info!(
            "Backup {}: {} objects, {} data files ({} bytes), {} removed in {:.1}s",
            self.status,
            self.objects_written,
            self.data_files_written,
            self.bytes_exported,
            self.files_removed,
            self.duration_seconds
        );
    }
}

/// Result of a connectivity check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub healthy: bool,
    pub source_connected: bool,
    pub source_latency_ms: u64,
    pub source_error: Option<String>,
    pub database_major_version: Option<u32>,
}

/// Everything a step needs, shared by all steps of a run.
#[derive(Clone)]
pub(crate) struct StepContext {
    pub config: Arc<Config>,
    pub criteria: Arc<Criteria>,
    pub catalog: CatalogReader,
    pub writer: ArtifactWriter,
    pub pipeline: ExportPipeline,
}

impl Orchestrator {
    /// Connect to the configured database over ODBC.
    pub async fn connect(config: Config) -> Result<Self> {
        let source = OdbcSource::connect(&config.source).await?;
        Ok(Self::new(config, Arc::new(source)))
    }

    /// Create an orchestrator over an existing source.
    pub fn new(config: Config, source: Arc<dyn Source>) -> Self {
        Self { config, source }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Check that the database answers and report its version.
    pub async fn health_check(&self) -> Result<HealthCheckResult> {
        let start = Instant::now();
        let result = match self.source.fetch("SELECT 1").await {
            Ok(_) => {
                let latency = start.elapsed().as_millis() as u64;
                let caps = CatalogReader::detect_capabilities(self.source.as_ref()).await?;
                HealthCheckResult {
                    healthy: true,
                    source_connected: true,
                    source_latency_ms: latency,
                    source_error: None,
                    database_major_version: Some(caps.major_version),
                }
            }
            Err(e) => HealthCheckResult {
                healthy: false,
                source_connected: false,
                source_latency_ms: start.elapsed().as_millis() as u64,
                source_error: Some(e.to_string()),
                database_major_version: None,
            },
        };
        Ok(result)
    }

    /// Run every selected step in order.
    ///
    /// Without `continue_on_error` the first failing step ends the run. With
    /// it every step runs and the first failure is returned at the end.
    /// Cancellation always ends the run immediately.
    pub async fn run(&self, cancel: CancellationToken) -> Result<BackupResult> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!(
            "Starting backup run {} from {} into {}",
            run_id,
            self.source.source_type(),
            self.config.backup.destination.display()
        );

        let ctx = self.context().await?;
        let kinds = self.config.backup.selected_objects();
        let mut steps = Vec::with_capacity(kinds.len());
        let mut first_error: Option<BackupError> = None;

        for kind in kinds {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled);
            }
            let span = info_span!("backup_step", object_type = %kind);
            let start = Instant::now();
            let mut report = StepReport::new(kind);
            let outcome = steps::run_step(&ctx, kind, &cancel, &mut report)
                .instrument(span)
                .await;
            report.duration_seconds = start.elapsed().as_secs_f64();

            if let Err(e) = outcome {
                if e.is_cancelled() {
                    return Err(e);
                }
                error!("Step {} failed: {}", kind, e);
                report.status = "failed".to_string();
                report.error = Some(e.to_string());
                steps.push(report);
                if !self.config.backup.continue_on_error {
                    return Err(e);
                }
                first_error.get_or_insert(e);
                continue;
            }

            info!(
                "Step {} done: {} objects, {} data files, {} removed",
                kind, report.objects_written, report.data_files_written, report.files_removed
            );
            steps.push(report);
        }

        let completed_at = Utc::now();
        let duration = (completed_at - started_at).num_milliseconds() as f64 / 1000.0;
        let failed = steps.iter().any(|s| s.status == "failed");
        let result = BackupResult {
            run_id,
            status: if failed { "failed" } else { "completed" }.to_string(),
            duration_seconds: duration,
            started_at,
            completed_at,
            objects_written: steps.iter().map(|s| s.objects_written).sum(),
            data_files_written: steps.iter().map(|s| s.data_files_written).sum(),
            files_removed: steps.iter().map(|s| s.files_removed).sum(),
            bytes_exported: steps.iter().map(|s| s.bytes_exported).sum(),
            steps,
        };
        result.log();

        match first_error {
            Some(e) => Err(e),
            None => Ok(result),
        }
    }

    async fn context(&self) -> Result<StepContext> {
        let criteria = Arc::new(self.config.backup.criteria()?);
        let capabilities = if self.needs_capabilities() {
            CatalogReader::detect_capabilities(self.source.as_ref()).await?
        } else {
            Capabilities::default()
        };
        info!(
            "Selection: match '{}', skip '{}' (database version {})",
            criteria.match_patterns(),
            criteria.skip_patterns(),
            capabilities.major_version
        );

        Ok(StepContext {
            config: Arc::new(self.config.clone()),
            catalog: CatalogReader::new(self.source.clone(), criteria.clone(), capabilities),
            writer: ArtifactWriter::new(&self.config.backup.destination)?,
            pipeline: ExportPipeline::new(
                self.source.clone(),
                self.config.backup.export_buffer_chunks,
            ),
            criteria,
        })
    }

    /// Only version-dependent steps need the database version.
    fn needs_capabilities(&self) -> bool {
        self.config.backup.selected_objects().iter().any(|k| {
            matches!(
                k,
                ObjectType::Schemas
                    | ObjectType::ConsumerGroups
                    | ObjectType::Users
                    | ObjectType::Roles
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_json_shape() {
        let now = Utc::now();
        let mut step = StepReport::new(ObjectType::Tables);
        step.objects_written = 2;
        let result = BackupResult {
            run_id: "r".into(),
            status: "completed".into(),
            duration_seconds: 1.5,
            started_at: now,
            completed_at: now,
            steps: vec![step],
            objects_written: 2,
            data_files_written: 0,
            files_removed: 0,
            bytes_exported: 0,
        };
        let json: serde_json::Value = serde_json::from_str(&result.to_json().unwrap()).unwrap();
        assert_eq!(json["steps"][0]["object_type"], "tables");
        assert_eq!(json["objects_written"], 2);
        assert!(json["steps"][0].get("error").is_none());
    }
}
