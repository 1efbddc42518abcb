//! In-memory catalog used by the integration tests.
//!
//! `MemorySource` answers the catalog queries the backup issues from a small
//! mutable model and streams table/view rows as CSV. It ignores the SQL
//! selection predicates; the catalog reader filters rows locally as well.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use exasol_backup::{BackupError, Config, Result, Row, Source};
use std::path::Path;
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Default)]
pub struct MemTable {
    pub schema: String,
    pub name: String,
    pub columns: Vec<(String, String)>,
    pub primary_key: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl MemTable {
    pub fn new(schema: &str, name: &str) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            columns: vec![
                ("ID".into(), "DECIMAL(18,0)".into()),
                ("NAME".into(), "VARCHAR(100) UTF8".into()),
            ],
            primary_key: vec!["ID".into()],
            rows: Vec::new(),
        }
    }

    pub fn with_rows(mut self, n: usize) -> Self {
        self.rows = (1..=n)
            .map(|i| vec![Some(i.to_string()), Some(format!("name {}", i))])
            .collect();
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemView {
    pub schema: String,
    pub name: String,
    pub text: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl MemView {
    /// A view whose stored text was created under `created_as`.
    pub fn new(schema: &str, name: &str, created_as: &str) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
            text: format!("CREATE VIEW {} AS SELECT ID FROM T", created_as),
            columns: vec!["ID".into()],
            rows: vec![vec![Some("1".into())], vec![Some("2".into())]],
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Model {
    pub schemas: Vec<String>,
    pub tables: Vec<MemTable>,
    pub views: Vec<MemView>,
}

#[derive(Default)]
pub struct MemorySource {
    pub model: Mutex<Model>,

    /// Catalog queries containing this fragment fail.
    pub fail_on: Mutex<Option<String>>,

    pub queries: Mutex<Vec<String>>,
}

impl MemorySource {
    pub fn new(model: Model) -> Self {
        Self {
            model: Mutex::new(model),
            ..Default::default()
        }
    }

    pub fn update(&self, f: impl FnOnce(&mut Model)) {
        f(&mut self.model.lock().unwrap());
    }

    fn rows_of(&self, schema: &str, name: &str) -> Option<Vec<Vec<Option<String>>>> {
        let model = self.model.lock().unwrap();
        model
            .tables
            .iter()
            .find(|t| t.schema == schema && t.name == name)
            .map(|t| t.rows.clone())
            .or_else(|| {
                model
                    .views
                    .iter()
                    .find(|v| v.schema == schema && v.name == name)
                    .map(|v| v.rows.clone())
            })
    }
}

fn text(values: Vec<Option<String>>) -> Row {
    Row::new(values)
}

fn s(v: &str) -> Option<String> {
    Some(v.to_string())
}

/// `"S"."N"` following `FROM `, up to an optional `ORDER BY`.
fn object_after_from(sql: &str) -> Option<(String, String)> {
    let tail = sql.split_once(" FROM ")?.1;
    let tail = tail.split(" ORDER BY ").next()?.trim();
    let (schema, name) = tail.trim_matches('"').split_once("\".\"")?;
    Some((schema.replace("\"\"", "\""), name.replace("\"\"", "\"")))
}

#[async_trait]
impl Source for MemorySource {
    async fn fetch(&self, sql: &str) -> Result<Vec<Row>> {
        self.queries.lock().unwrap().push(sql.to_string());
        if let Some(fragment) = self.fail_on.lock().unwrap().as_deref() {
            if sql.contains(fragment) {
                return Err(BackupError::Source(format!("injected failure on {}", fragment)));
            }
        }

        if sql.starts_with("SELECT COUNT(*)") {
            let count = object_after_from(sql)
                .and_then(|(schema, name)| self.rows_of(&schema, &name))
                .map(|rows| rows.len())
                .unwrap_or(0);
            return Ok(vec![text(vec![s(&count.to_string())])]);
        }
        if sql == "SELECT 1" {
            return Ok(vec![text(vec![s("1")])]);
        }

        let model = self.model.lock().unwrap();
        let rows = if sql.contains("exa_metadata") {
            vec![text(vec![s("7.1.24")])]
        } else if sql.contains("exa_dba_virtual_schema_properties") {
            Vec::new()
        } else if sql.contains("FROM exa_schemas") {
            model
                .schemas
                .iter()
                .map(|name| text(vec![s(name), None, s("0"), None, None]))
                .collect()
        } else if sql.contains("exa_all_constraints") {
            model
                .tables
                .iter()
                .filter(|t| !t.primary_key.is_empty())
                .map(|t| {
                    text(vec![
                        s(&t.schema),
                        s(&t.name),
                        s("PRIMARY KEY"),
                        s("TRUE"),
                        s(&t.primary_key.join(",")),
                    ])
                })
                .collect()
        } else if sql.contains("FROM exa_all_columns") && sql.contains("'TABLE'") {
            model
                .tables
                .iter()
                .flat_map(|t| {
                    t.columns.iter().map(move |(name, ty)| {
                        text(vec![s(&t.schema), s(&t.name), s(name), s(ty), None, None, None])
                    })
                })
                .collect()
        } else if sql.contains("FROM exa_all_columns") && sql.contains("'VIEW'") {
            model
                .views
                .iter()
                .flat_map(|v| {
                    v.columns
                        .iter()
                        .map(move |c| text(vec![s(&v.schema), s(&v.name), s(c)]))
                })
                .collect()
        } else if sql.contains("FROM exa_all_tables") {
            model
                .tables
                .iter()
                .map(|t| {
                    text(vec![
                        s(&t.schema),
                        s(&t.name),
                        s(&t.rows.len().to_string()),
                        None,
                    ])
                })
                .collect()
        } else if sql.contains("FROM exa_all_views") {
            model
                .views
                .iter()
                .map(|v| text(vec![s(&v.schema), s(&v.name), s(&v.schema), s(&v.text)]))
                .collect()
        } else {
            Vec::new()
        };
        Ok(rows)
    }

    async fn execute(&self, _sql: &str) -> Result<()> {
        Ok(())
    }

    async fn stream_export(
        &self,
        sql: &str,
        sink: mpsc::Sender<Bytes>,
        cancel: CancellationToken,
    ) -> Result<u64> {
        let (schema, name) = object_after_from(sql)
            .ok_or_else(|| BackupError::Source(format!("unexpected export query: {}", sql)))?;
        let rows = self
            .rows_of(&schema, &name)
            .ok_or_else(|| BackupError::Source(format!("object {}.{} not found", schema, name)))?;

        let mut sent = 0u64;
        for row in rows {
            if cancel.is_cancelled() {
                return Err(BackupError::Cancelled);
            }
            let mut writer = csv::WriterBuilder::new()
                .terminator(csv::Terminator::Any(b'\n'))
                .from_writer(Vec::new());
            writer
                .write_record(row.iter().map(|v| v.as_deref().unwrap_or("")))
                .map_err(|e| BackupError::Source(e.to_string()))?;
            let chunk = writer
                .into_inner()
                .map_err(|e| BackupError::Source(e.to_string()))?;
            sent += chunk.len() as u64;
            sink.send(Bytes::from(chunk))
                .await
                .map_err(|_| BackupError::Cancelled)?;
        }
        Ok(sent)
    }

    fn source_type(&self) -> &str {
        "memory"
    }
}

/// Configuration backing up into `dest`, with extra `backup:` keys.
pub fn config(dest: &Path, backup_extra: &str) -> Config {
    let mut yaml = format!(
        "source:\n  host: localhost\n  user: sys\nbackup:\n  destination: {}\n",
        dest.display()
    );
    for line in backup_extra.lines().filter(|l| !l.trim().is_empty()) {
        yaml.push_str("  ");
        yaml.push_str(line.trim());
        yaml.push('\n');
    }
    Config::from_yaml(&yaml).unwrap()
}
