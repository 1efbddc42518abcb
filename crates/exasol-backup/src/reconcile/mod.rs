//! Pruning of backup artifacts whose objects no longer exist upstream.

use crate::config::ObjectType;
use crate::criteria::Criteria;
use crate::error::{BackupError, Result};
use crate::source::{CatalogObject, DbObject};
use crate::target::{DestinationEntry, SCHEMAS_DIR};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Files and directories removed by one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    pub removed: Vec<PathBuf>,
}

impl ReconcileReport {
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }
}

/// Remove artifacts of `kind` below `<destination>/schemas/` that fall
/// within `criteria` but have no counterpart in `live`.
///
/// For [`ObjectType::Schemas`] whole schema directories are removed;
/// for every other schema-scoped kind individual `<NAME>.*` files are.
pub async fn remove_extraneous<T: DbObject>(
    kind: ObjectType,
    live: &[T],
    destination: &Path,
    criteria: &Criteria,
) -> Result<ReconcileReport> {
    let schemas_dir = destination.join(SCHEMAS_DIR);
    tokio::fs::create_dir_all(&schemas_dir)
        .await
        .map_err(|e| BackupError::fs(&schemas_dir, e))?;

    let live: HashSet<CatalogObject> = live.iter().map(|o| CatalogObject::of(o)).collect();
    let mut report = ReconcileReport::default();

    for schema in list_entries(&schemas_dir, EntryKind::Dir).await? {
        let Some(schema) = file_name(&schema) else {
            continue;
        };
        if !criteria.matches(&schema, "") {
            continue;
        }

        if kind == ObjectType::Schemas {
            if !live.contains(&CatalogObject::schema_only(&schema)) {
                let dir = schemas_dir.join(&schema);
                tokio::fs::remove_dir_all(&dir)
                    .await
                    .map_err(|e| BackupError::fs(&dir, e))?;
                info!("Removed extraneous schema {}", schema);
                report.removed.push(dir);
            }
            continue;
        }

        let kind_dir = schemas_dir.join(&schema).join(kind.as_str());
        if !kind_dir.is_dir() {
            debug!("No {} directory for schema {}", kind, schema);
            continue;
        }

        for path in list_entries(&kind_dir, EntryKind::File).await? {
            let Some(entry) = DestinationEntry::from_path(&schema, kind, path) else {
                continue;
            };
            if !criteria.matches(&entry.schema, &entry.base_name) {
                continue;
            }
            if live.contains(&CatalogObject::new(&entry.schema, &entry.base_name)) {
                continue;
            }
            tokio::fs::remove_file(&entry.path)
                .await
                .map_err(|e| BackupError::fs(&entry.path, e))?;
            info!(
                "Removed extraneous {} file {}",
                kind,
                entry.path.display()
            );
            report.removed.push(entry.path);
        }
    }

    if !report.is_empty() {
        info!("Removed {} extraneous {} artifacts", report.len(), kind);
    }
    Ok(report)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

async fn list_entries(dir: &Path, want: EntryKind) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| BackupError::fs(dir, e))?;
    let mut paths = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BackupError::fs(dir, e))?
    {
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| BackupError::fs(entry.path(), e))?;
        let keep = match want {
            EntryKind::Dir => file_type.is_dir(),
            EntryKind::File => file_type.is_file(),
        };
        if keep {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

fn file_name(path: &Path) -> Option<String> {
    path.file_name()?.to_str().map(str::to_string)
}
