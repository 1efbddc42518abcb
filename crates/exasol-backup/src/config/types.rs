//! Configuration type definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Source database configuration (Exasol).
    pub source: SourceConfig,

    /// Backup behavior configuration.
    pub backup: BackupConfig,
}

/// Source database (Exasol) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Database host or host range (e.g. `10.0.0.11..14`).
    #[serde(default)]
    pub host: String,

    /// Database port (default: 8563).
    #[serde(default = "default_exasol_port")]
    pub port: u16,

    /// Username.
    #[serde(default)]
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Registered ODBC driver name (default: "EXASolution Driver").
    #[serde(default = "default_driver")]
    pub driver: String,

    /// Encrypt the connection (default: true).
    #[serde(default = "default_true")]
    pub encryption: bool,

    /// Server certificate fingerprint to pin.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    /// Full ODBC connection string. Overrides host/port/user/password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,

    /// Statements run on every new connection.
    #[serde(default = "default_session_statements")]
    pub session_statements: Vec<String>,

    /// Rows fetched per round trip while exporting data (default: 1000).
    #[serde(default = "default_export_batch_rows")]
    pub export_batch_rows: usize,
}

impl fmt::Debug for SourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("driver", &self.driver)
            .field("encryption", &self.encryption)
            .field("fingerprint", &self.fingerprint)
            .field(
                "connection_string",
                &self.connection_string.as_ref().map(|_| "[REDACTED]"),
            )
            .field("session_statements", &self.session_statements)
            .field("export_batch_rows", &self.export_batch_rows)
            .finish()
    }
}

/// Backup behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupConfig {
    /// Root directory of the backup tree. Must already exist.
    #[serde(default)]
    pub destination: PathBuf,

    /// Object types to back up (default: all).
    #[serde(default = "default_objects")]
    pub objects: Vec<ObjectType>,

    /// Comma separated `schema.object` globs to include (default: "*.*").
    #[serde(default = "default_match", rename = "match")]
    pub match_patterns: String,

    /// Comma separated `schema.object` globs to exclude.
    #[serde(default, rename = "skip")]
    pub skip_patterns: String,

    /// Export table data when the row count is at most this (0 = never).
    #[serde(default)]
    pub max_table_rows: u64,

    /// Export view data when the row count is at most this (0 = never).
    #[serde(default)]
    pub max_view_rows: u64,

    /// Remove backup files of objects that no longer exist.
    #[serde(default)]
    pub drop_extras: bool,

    /// Keep going with the next object type after a step fails.
    #[serde(default)]
    pub continue_on_error: bool,

    /// Capacity of each export job's chunk channel (default: 10000).
    #[serde(default = "default_export_buffer_chunks")]
    pub export_buffer_chunks: usize,

    /// Capacity of the table metadata queue (default: 10).
    #[serde(default = "default_metadata_queue")]
    pub metadata_queue: usize,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            destination: PathBuf::new(),
            objects: default_objects(),
            match_patterns: default_match(),
            skip_patterns: String::new(),
            max_table_rows: 0,
            max_view_rows: 0,
            drop_extras: false,
            continue_on_error: false,
            export_buffer_chunks: default_export_buffer_chunks(),
            metadata_queue: default_metadata_queue(),
        }
    }
}

impl BackupConfig {
    /// Selected object types in backup order, `all` expanded.
    pub fn selected_objects(&self) -> Vec<ObjectType> {
        if self.objects.contains(&ObjectType::All) {
            return ObjectType::ORDERED.to_vec();
        }
        ObjectType::ORDERED
            .iter()
            .copied()
            .filter(|t| self.objects.contains(t))
            .collect()
    }
}

/// Kind of catalog object backed up as a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectType {
    All,
    Parameters,
    #[serde(alias = "priority_groups")]
    ConsumerGroups,
    Schemas,
    Tables,
    Views,
    Scripts,
    Functions,
    Connections,
    Roles,
    Users,
}

impl ObjectType {
    /// Every concrete object type, in backup order.
    pub const ORDERED: [ObjectType; 10] = [
        ObjectType::Parameters,
        ObjectType::ConsumerGroups,
        ObjectType::Schemas,
        ObjectType::Tables,
        ObjectType::Views,
        ObjectType::Scripts,
        ObjectType::Functions,
        ObjectType::Connections,
        ObjectType::Roles,
        ObjectType::Users,
    ];

    /// Configuration name of the type.
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectType::All => "all",
            ObjectType::Parameters => "parameters",
            ObjectType::ConsumerGroups => "consumer_groups",
            ObjectType::Schemas => "schemas",
            ObjectType::Tables => "tables",
            ObjectType::Views => "views",
            ObjectType::Scripts => "scripts",
            ObjectType::Functions => "functions",
            ObjectType::Connections => "connections",
            ObjectType::Roles => "roles",
            ObjectType::Users => "users",
        }
    }

    /// Parse a configuration name (as accepted in YAML and on the command line).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Some(ObjectType::All),
            "parameters" => Some(ObjectType::Parameters),
            "consumer_groups" | "priority_groups" => Some(ObjectType::ConsumerGroups),
            "schemas" => Some(ObjectType::Schemas),
            "tables" => Some(ObjectType::Tables),
            "views" => Some(ObjectType::Views),
            "scripts" => Some(ObjectType::Scripts),
            "functions" => Some(ObjectType::Functions),
            "connections" => Some(ObjectType::Connections),
            "roles" => Some(ObjectType::Roles),
            "users" => Some(ObjectType::Users),
            _ => None,
        }
    }

    /// Whether objects of this type live under `schemas/<SCHEMA>/`.
    pub fn is_schema_scoped(&self) -> bool {
        matches!(
            self,
            ObjectType::Schemas
                | ObjectType::Tables
                | ObjectType::Views
                | ObjectType::Scripts
                | ObjectType::Functions
        )
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Default value functions for serde
fn default_exasol_port() -> u16 {
    8563
}

fn default_driver() -> String {
    "EXASolution Driver".to_string()
}

fn default_true() -> bool {
    true
}

fn default_session_statements() -> Vec<String> {
    vec!["ALTER SESSION SET NLS_TIMESTAMP_FORMAT='YYYY-MM-DD HH24:MI:SS.FF3'".to_string()]
}

fn default_export_batch_rows() -> usize {
    1000
}

fn default_objects() -> Vec<ObjectType> {
    vec![ObjectType::All]
}

fn default_match() -> String {
    crate::criteria::MATCH_ALL.to_string()
}

fn default_export_buffer_chunks() -> usize {
    crate::transfer::DEFAULT_BUFFER_CHUNKS
}

fn default_metadata_queue() -> usize {
    10
}
