//! Configuration validation.

use super::Config;
use crate::error::{BackupError, Result};

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Source validation
    if config.source.connection_string.is_none() {
        if config.source.host.is_empty() {
            return Err(BackupError::Config(
                "source.host is required (or set source.connection_string)".into(),
            ));
        }
        if config.source.user.is_empty() {
            return Err(BackupError::Config("source.user is required".into()));
        }
    }
    if config.source.export_batch_rows == 0 {
        return Err(BackupError::Config(
            "source.export_batch_rows must be at least 1".into(),
        ));
    }

    // Destination must already exist
    let destination = &config.backup.destination;
    if destination.as_os_str().is_empty() {
        return Err(BackupError::Config("backup.destination is required".into()));
    }
    if !destination.exists() {
        return Err(BackupError::Config(format!(
            "backup.destination '{}' does not exist",
            destination.display()
        )));
    }
    if !destination.is_dir() {
        return Err(BackupError::Config(format!(
            "backup.destination '{}' is not a directory",
            destination.display()
        )));
    }

    if config.backup.objects.is_empty() {
        return Err(BackupError::Config(
            "backup.objects must name at least one object type".into(),
        ));
    }

    // Channel capacities
    if config.backup.export_buffer_chunks == 0 {
        return Err(BackupError::Config(
            "backup.export_buffer_chunks must be at least 1".into(),
        ));
    }
    if config.backup.metadata_queue == 0 {
        return Err(BackupError::Config(
            "backup.metadata_queue must be at least 1".into(),
        ));
    }

    config.backup.criteria()?;

    Ok(())
}
