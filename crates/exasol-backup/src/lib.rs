//! # exasol-backup
//!
//! Metadata backup for Exasol databases.
//!
//! Reads the database catalog and writes a directory tree of replayable SQL
//! files, one per object, plus CSV data files for small tables and views:
//!
//! - **Selection** by `SCHEMA.OBJECT` glob patterns with match/skip lists
//! - **Reconciliation** that prunes artifacts of dropped or renamed objects
//! - **Streaming export** of row data through bounded reader/writer pipelines
//! - **Version-aware DDL** for users, roles, and consumer/priority groups
//!
//! ## Example
//!
//! ```rust,no_run
//! use exasol_backup::{Config, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> exasol_backup::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let orchestrator = Orchestrator::connect(config).await?;
//!     let result = orchestrator.run(CancellationToken::new()).await?;
//!     println!("Wrote {} objects", result.objects_written);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod criteria;
pub mod error;
pub mod orchestrator;
pub mod reconcile;
pub mod source;
pub mod target;
pub mod transfer;

// Re-exports for convenient access
pub use catalog::CatalogReader;
pub use config::{BackupConfig, Config, ObjectType, SourceConfig};
pub use criteria::Criteria;
pub use error::{BackupError, Result};
pub use orchestrator::{BackupResult, HealthCheckResult, Orchestrator, StepReport};
pub use reconcile::{remove_extraneous, ReconcileReport};
pub use source::{DbObject, OdbcSource, Row, Source};
pub use target::ArtifactWriter;
pub use transfer::{should_export, ExportJob, ExportPipeline, ExportState, ExportStats};
