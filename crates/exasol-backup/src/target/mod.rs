//! Backup tree layout and artifact writing.
//!
//! ```text
//! <root>/parameters.sql
//! <root>/connections.sql
//! <root>/consumer_groups.sql | priority_groups.sql
//! <root>/users/<USER>.sql
//! <root>/roles/<ROLE>.sql
//! <root>/schemas/<SCHEMA>/schema.sql
//! <root>/schemas/<SCHEMA>/{tables,views,scripts,functions}/<NAME>.sql [+ .csv]
//! ```

pub mod ddl;

use crate::config::ObjectType;
use crate::error::{BackupError, Result};
use crate::source::{
    Capabilities, Connection, ConsumerGroup, Function, Parameter, PriorityGroup, Privilege, Role,
    Schema, Script, Table, User, View,
};
use ddl::DdlRenderer;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

pub const SCHEMAS_DIR: &str = "schemas";
pub const SCHEMA_FILE: &str = "schema.sql";
pub const DDL_EXT: &str = "sql";
pub const DATA_EXT: &str = "csv";

const PARAMETERS_FILE: &str = "parameters.sql";
const CONNECTIONS_FILE: &str = "connections.sql";
const CONSUMER_GROUPS_FILE: &str = "consumer_groups.sql";
const PRIORITY_GROUPS_FILE: &str = "priority_groups.sql";

/// A backup artifact below `schemas/<SCHEMA>/<kind>/`, identified by the
/// file name without its extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationEntry {
    pub schema: String,
    pub base_name: String,
    pub kind: ObjectType,
    pub path: PathBuf,
}

impl DestinationEntry {
    /// Decompose an artifact path. Returns `None` for paths without a
    /// usable file name.
    pub fn from_path(schema: &str, kind: ObjectType, path: PathBuf) -> Option<Self> {
        let base_name = path.file_stem()?.to_str()?.to_string();
        Some(Self {
            schema: schema.to_string(),
            base_name,
            kind,
            path,
        })
    }
}

/// Writes rendered DDL to deterministic paths below the backup root.
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    root: PathBuf,
    renderer: DdlRenderer,
}

impl ArtifactWriter {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            renderer: DdlRenderer::new()?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn schemas_dir(&self) -> PathBuf {
        self.root.join(SCHEMAS_DIR)
    }

    pub fn schema_dir(&self, schema: &str) -> PathBuf {
        self.schemas_dir().join(schema)
    }

    /// `schemas/<SCHEMA>/<kind>/`
    pub fn object_dir(&self, schema: &str, kind: ObjectType) -> PathBuf {
        self.schema_dir(schema).join(kind.as_str())
    }

    pub fn ddl_path(&self, schema: &str, kind: ObjectType, name: &str) -> PathBuf {
        self.object_dir(schema, kind)
            .join(format!("{}.{}", name, DDL_EXT))
    }

    pub fn data_path(&self, schema: &str, kind: ObjectType, name: &str) -> PathBuf {
        self.object_dir(schema, kind)
            .join(format!("{}.{}", name, DATA_EXT))
    }

    /// `users/` or `roles/`.
    pub fn principal_dir(&self, kind: ObjectType) -> PathBuf {
        self.root.join(kind.as_str())
    }

    pub fn principal_path(&self, kind: ObjectType, name: &str) -> PathBuf {
        self.principal_dir(kind)
            .join(format!("{}.{}", name, DDL_EXT))
    }

    pub async fn write_schema(&self, schema: &Schema) -> Result<PathBuf> {
        let path = self.schema_dir(&schema.name).join(SCHEMA_FILE);
        debug!("Writing schema {}", schema.name);
        write_file(&path, &ddl::schema(schema)).await?;
        Ok(path)
    }

    pub async fn write_table(&self, table: &Table) -> Result<PathBuf> {
        let path = self.ddl_path(&table.schema, ObjectType::Tables, &table.name);
        debug!("Writing table {}", table.full_name());
        write_file(&path, &ddl::table(table)).await?;
        Ok(path)
    }

    pub async fn write_view(&self, view: &View) -> Result<PathBuf> {
        let path = self.ddl_path(&view.schema, ObjectType::Views, &view.name);
        debug!("Writing view {}", view.full_name());
        write_file(&path, &self.renderer.view(view)).await?;
        Ok(path)
    }

    pub async fn write_script(&self, script: &Script) -> Result<PathBuf> {
        let path = self.ddl_path(&script.schema, ObjectType::Scripts, &script.name);
        debug!("Writing script {}.{}", script.schema, script.name);
        write_file(&path, &ddl::script(script)).await?;
        Ok(path)
    }

    pub async fn write_function(&self, function: &Function) -> Result<PathBuf> {
        let path = self.ddl_path(&function.schema, ObjectType::Functions, &function.name);
        debug!("Writing function {}.{}", function.schema, function.name);
        write_file(&path, &self.renderer.function(function)).await?;
        Ok(path)
    }

    pub async fn write_parameters(&self, params: &[Parameter]) -> Result<PathBuf> {
        let sql: String = params.iter().map(ddl::parameter).collect();
        let path = self.root.join(PARAMETERS_FILE);
        write_file(&path, &sql).await?;
        Ok(path)
    }

    pub async fn write_connections(&self, connections: &[Connection]) -> Result<PathBuf> {
        let sql: String = connections.iter().map(ddl::connection).collect();
        let path = self.root.join(CONNECTIONS_FILE);
        write_file(&path, &sql).await?;
        Ok(path)
    }

    /// Write `consumer_groups.sql` and drop a stale `priority_groups.sql`.
    pub async fn write_consumer_groups(&self, groups: &[ConsumerGroup]) -> Result<PathBuf> {
        let sql: String = groups.iter().map(ddl::consumer_group).collect();
        let path = self.root.join(CONSUMER_GROUPS_FILE);
        write_file(&path, &sql).await?;
        remove_file_if_exists(&self.root.join(PRIORITY_GROUPS_FILE)).await?;
        Ok(path)
    }

    /// Write `priority_groups.sql` and drop a stale `consumer_groups.sql`.
    pub async fn write_priority_groups(&self, groups: &[PriorityGroup]) -> Result<PathBuf> {
        let sql: String = groups.iter().map(ddl::priority_group).collect();
        let path = self.root.join(PRIORITY_GROUPS_FILE);
        write_file(&path, &sql).await?;
        remove_file_if_exists(&self.root.join(CONSUMER_GROUPS_FILE)).await?;
        Ok(path)
    }

    pub async fn write_user(&self, user: &User, caps: Capabilities) -> Result<PathBuf> {
        let path = self.principal_path(ObjectType::Users, &user.name);
        debug!("Writing user {}", user.name);
        write_file(&path, &ddl::user(user, caps)).await?;
        Ok(path)
    }

    pub async fn write_role(&self, role: &Role, caps: Capabilities) -> Result<PathBuf> {
        let path = self.principal_path(ObjectType::Roles, &role.name);
        debug!("Writing role {}", role.name);
        write_file(&path, &ddl::role(role, caps)).await?;
        Ok(path)
    }

    /// Append privilege statements to the grantees' existing files in
    /// `users/` or `roles/`.
    pub async fn append_privileges(&self, kind: ObjectType, privileges: &[Privilege]) -> Result<()> {
        let mut by_grantee: BTreeMap<&str, String> = BTreeMap::new();
        for p in privileges {
            by_grantee
                .entry(p.grantee())
                .or_default()
                .push_str(&ddl::privilege(p));
        }

        for (grantee, sql) in by_grantee {
            let path = self.principal_path(kind, grantee);
            let mut file = tokio::fs::OpenOptions::new()
                .append(true)
                .open(&path)
                .await
                .map_err(|e| BackupError::fs(&path, e))?;
            file.write_all(sql.as_bytes())
                .await
                .map_err(|e| BackupError::fs(&path, e))?;
            file.flush().await.map_err(|e| BackupError::fs(&path, e))?;
        }
        Ok(())
    }

    /// Remove `users/` or `roles/` entirely.
    pub async fn clear_principal_dir(&self, kind: ObjectType) -> Result<Vec<PathBuf>> {
        let dir = self.principal_dir(kind);
        let removed = list_files(&dir).await?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!("Removed {} previously backed up {}", removed.len(), kind);
                Ok(removed)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(BackupError::fs(&dir, e)),
        }
    }

    /// Remove a stale data file. Returns the path if one was removed.
    pub async fn remove_data(
        &self,
        schema: &str,
        kind: ObjectType,
        name: &str,
    ) -> Result<Option<PathBuf>> {
        let path = self.data_path(schema, kind, name);
        if remove_file_if_exists(&path).await? {
            info!("Removed stale data file {}", path.display());
            Ok(Some(path))
        } else {
            Ok(None)
        }
    }
}

/// Write a whole file, creating parent directories.
pub async fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| BackupError::fs(parent, e))?;
    }
    tokio::fs::write(path, contents)
        .await
        .map_err(|e| BackupError::fs(path, e))
}

/// Remove a file, treating "already gone" as success. Returns whether a
/// file was removed.
pub async fn remove_file_if_exists(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(BackupError::fs(path, e)),
    }
}

async fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(BackupError::fs(dir, e)),
    };
    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| BackupError::fs(dir, e))?
    {
        files.push(entry.path());
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn writer(dir: &Path) -> ArtifactWriter {
        ArtifactWriter::new(dir).unwrap()
    }

    #[test]
    fn test_paths() {
        let w = writer(Path::new("/backup"));
        assert_eq!(
            w.ddl_path("S", ObjectType::Tables, "T"),
            PathBuf::from("/backup/schemas/S/tables/T.sql")
        );
        assert_eq!(
            w.data_path("S", ObjectType::Views, "V"),
            PathBuf::from("/backup/schemas/S/views/V.csv")
        );
        assert_eq!(
            w.principal_path(ObjectType::Users, "U"),
            PathBuf::from("/backup/users/U.sql")
        );
    }

    #[test]
    fn test_destination_entry_strips_last_extension() {
        let e = DestinationEntry::from_path(
            "S",
            ObjectType::Tables,
            PathBuf::from("/b/schemas/S/tables/T.V2.csv"),
        )
        .unwrap();
        assert_eq!(e.base_name, "T.V2");
        assert_eq!(e.schema, "S");
    }

    #[tokio::test]
    async fn test_group_files_are_exclusive() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());

        w.write_priority_groups(&[]).await.unwrap();
        assert!(dir.path().join("priority_groups.sql").exists());

        w.write_consumer_groups(&[]).await.unwrap();
        assert!(dir.path().join("consumer_groups.sql").exists());
        assert!(!dir.path().join("priority_groups.sql").exists());
    }

    #[tokio::test]
    async fn test_privileges_are_appended_per_grantee() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let caps = Capabilities::default();
        for name in ["A", "B"] {
            w.write_role(
                &Role {
                    name: name.into(),
                    group: None,
                    comment: None,
                },
                caps,
            )
            .await
            .unwrap();
        }

        let privileges = vec![
            Privilege::System {
                grantee: "B".into(),
                privilege: "CREATE SESSION".into(),
                admin_option: false,
            },
            Privilege::Role {
                grantee: "A".into(),
                role: "B".into(),
                admin_option: false,
            },
        ];
        w.append_privileges(ObjectType::Roles, &privileges)
            .await
            .unwrap();

        let a = std::fs::read_to_string(dir.path().join("roles/A.sql")).unwrap();
        let b = std::fs::read_to_string(dir.path().join("roles/B.sql")).unwrap();
        assert_eq!(a, "CREATE ROLE \"A\";\nGRANT \"B\" TO \"A\";\n");
        assert_eq!(b, "CREATE ROLE \"B\";\nGRANT CREATE SESSION TO \"B\";\n");
    }

    #[tokio::test]
    async fn test_privileges_for_unwritten_grantee_fail() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        let privileges = vec![Privilege::Impersonation {
            grantee: "GHOST".into(),
            on: "SYS".into(),
        }];
        let err = w
            .append_privileges(ObjectType::Users, &privileges)
            .await
            .unwrap_err();
        assert!(matches!(err, BackupError::Filesystem { .. }));
    }

    #[tokio::test]
    async fn test_clear_principal_dir() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        assert!(w.clear_principal_dir(ObjectType::Users).await.unwrap().is_empty());

        w.write_user(
            &User {
                name: "U".into(),
                ..Default::default()
            },
            Capabilities::default(),
        )
        .await
        .unwrap();
        let removed = w.clear_principal_dir(ObjectType::Users).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert!(!dir.path().join("users").exists());
    }

    #[tokio::test]
    async fn test_remove_data() {
        let dir = tempfile::tempdir().unwrap();
        let w = writer(dir.path());
        assert!(w.remove_data("S", ObjectType::Tables, "T").await.unwrap().is_none());

        let path = w.data_path("S", ObjectType::Tables, "T");
        write_file(&path, "1\n").await.unwrap();
        assert_eq!(
            w.remove_data("S", ObjectType::Tables, "T").await.unwrap(),
            Some(path)
        );
    }
}
