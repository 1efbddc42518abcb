//! Catalog extraction.
//!
//! Every schema-scoped query aliases its schema column as `s` and its object
//! column as `o`, so the criteria predicate can be spliced into the `WHERE`
//! clause unchanged. Rows coming back are filtered once more with the local
//! matcher: SQL `LIKE` also treats `_` as a wildcard, the glob matcher does
//! not.

mod privileges;

use crate::criteria::Criteria;
use crate::error::{BackupError, Result};
use crate::source::{
    quote_ident, Capabilities, Column, Connection, ConsumerGroup, Constraint, ConstraintKind,
    Function, Parameter, PriorityGroup, Role, Row, Schema, SchemaProperty, Script, Source, Table,
    User, View,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Reads typed descriptors from the source catalog, scoped by a [`Criteria`].
#[derive(Clone)]
pub struct CatalogReader {
    source: Arc<dyn Source>,
    criteria: Arc<Criteria>,
    capabilities: Capabilities,
}

impl CatalogReader {
    pub fn new(source: Arc<dyn Source>, criteria: Arc<Criteria>, capabilities: Capabilities) -> Self {
        Self {
            source,
            criteria,
            capabilities,
        }
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Detect the database major version from `EXA_METADATA`.
    ///
    /// Falls back to the default capabilities when the version is missing or
    /// unparsable.
    pub async fn detect_capabilities(source: &dyn Source) -> Result<Capabilities> {
        let rows = source
            .fetch(
                "SELECT param_value FROM exa_metadata \
                 WHERE param_name = 'databaseProductVersion'",
            )
            .await
            .map_err(|e| catalog_error("capabilities", e))?;

        let version = rows.first().and_then(|r| r.opt_str(0)).unwrap_or_default();
        match parse_major_version(version) {
            Some(major_version) => {
                debug!("Database version {} (major {})", version, major_version);
                Ok(Capabilities { major_version })
            }
            None => {
                let caps = Capabilities::default();
                warn!(
                    "Unable to parse database version '{}', assuming {}",
                    version, caps.major_version
                );
                Ok(caps)
            }
        }
    }

    async fn query(&self, object_type: &str, sql: &str) -> Result<Vec<Row>> {
        debug!(object_type, "Catalog query: {}", sql.trim());
        self.source
            .fetch(sql)
            .await
            .map_err(|e| catalog_error(object_type, e))
    }

    /// Schemas (including virtual schemas) selected by the criteria.
    pub async fn schemas(&self) -> Result<Vec<Schema>> {
        let adapter_column = if self.capabilities.split_adapter_columns() {
            "CONCAT(vs.adapter_script_schema, '.', vs.adapter_script_name)"
        } else {
            "vs.adapter_script"
        };
        let sql = format!(
            "SELECT s.schema_name AS s, \
                    s.schema_comment, \
                    (vs.schema_name IS NOT NULL) AS is_virtual, \
                    {adapter_column}, \
                    os.raw_object_size_limit \
             FROM exa_schemas AS s \
             LEFT JOIN exa_all_object_sizes AS os \
               ON s.schema_name = os.object_name AND os.object_type = 'SCHEMA' \
             LEFT JOIN exa_all_virtual_schemas AS vs \
               ON s.schema_name = vs.schema_name \
             WHERE {} \
             ORDER BY local.s",
            self.criteria.schema_sql_predicate()
        );
        let rows = self.query("schemas", &sql).await?;

        let mut schemas = parse_rows("schemas", &rows, |row| {
            Ok(Schema {
                name: row.str(0)?.to_string(),
                comment: non_empty(row.opt_str(1)),
                is_virtual: row.bool(2)?,
                adapter: non_empty(row.opt_str(3)),
                size_limit: row.u64_or_zero(4)?,
                properties: Vec::new(),
            })
        })?;
        schemas.retain(|s| self.criteria.matches(&s.name, ""));

        if schemas.iter().any(|s| s.is_virtual) {
            self.add_virtual_schema_properties(&mut schemas).await?;
        }
        Ok(schemas)
    }

    async fn add_virtual_schema_properties(&self, schemas: &mut [Schema]) -> Result<()> {
        let sql = format!(
            "SELECT schema_name AS s, property_name, property_value \
             FROM exa_dba_virtual_schema_properties \
             WHERE {} \
             ORDER BY schema_name, property_name",
            self.criteria.schema_sql_predicate()
        );
        let rows = self.query("schemas", &sql).await?;

        let index: HashMap<String, usize> = schemas
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        for row in &rows {
            let (schema_name, prop) = parse_row("schemas", row, |row| {
                Ok((
                    row.str(0)?.to_string(),
                    SchemaProperty {
                        name: row.str(1)?.to_string(),
                        value: row.string_or_empty(2),
                    },
                ))
            })?;
            match index.get(&schema_name) {
                Some(&i) => schemas[i].properties.push(prop),
                None => debug!("Skipping property of unselected schema {}", schema_name),
            }
        }
        Ok(())
    }

    /// Physical tables with their columns and constraints.
    pub async fn tables(&self) -> Result<Vec<Table>> {
        let predicate = self.criteria.sql_predicate();
        let sql = format!(
            "SELECT table_schema AS s, table_name AS o, table_row_count, table_comment \
             FROM exa_all_tables \
             WHERE table_is_virtual = FALSE AND ({predicate}) \
             ORDER BY local.s, local.o"
        );
        let rows = self.query("tables", &sql).await?;

        let mut tables = parse_rows("tables", &rows, |row| {
            Ok(Table {
                schema: row.str(0)?.to_string(),
                name: row.str(1)?.to_string(),
                row_count: row.u64_or_zero(2)?,
                columns: Vec::new(),
                constraints: Vec::new(),
                comment: non_empty(row.opt_str(3)),
            })
        })?;
        tables.retain(|t| self.criteria.matches(&t.schema, &t.name));
        if tables.is_empty() {
            return Ok(tables);
        }

        let index = index_by_identity(tables.iter().map(|t| (&t.schema, &t.name)));
        self.add_table_columns(&mut tables, &index).await?;
        self.add_table_constraints(&mut tables, &index).await?;
        Ok(tables)
    }

    async fn add_table_columns(
        &self,
        tables: &mut [Table],
        index: &HashMap<(String, String), usize>,
    ) -> Result<()> {
        let sql = format!(
            "SELECT column_schema AS s, column_table AS o, \
                    column_name, column_type, column_default, column_identity, column_comment \
             FROM exa_all_columns \
             WHERE column_object_type = 'TABLE' AND column_is_virtual = FALSE AND ({}) \
             ORDER BY column_schema, column_table, column_ordinal_position",
            self.criteria.sql_predicate()
        );
        let rows = self.query("tables", &sql).await?;

        for row in &rows {
            let (key, column) = parse_row("tables", row, |row| {
                Ok((
                    (row.str(0)?.to_string(), row.str(1)?.to_string()),
                    Column {
                        name: row.str(2)?.to_string(),
                        data_type: row.str(3)?.to_string(),
                        default: non_empty(row.opt_str(4)),
                        identity: non_empty(row.opt_str(5)),
                        comment: non_empty(row.opt_str(6)),
                    },
                ))
            })?;
            if let Some(&i) = index.get(&key) {
                tables[i].columns.push(column);
            }
        }
        Ok(())
    }

    async fn add_table_constraints(
        &self,
        tables: &mut [Table],
        index: &HashMap<(String, String), usize>,
    ) -> Result<()> {
        let predicate = self.criteria.sql_predicate();
        let sql = format!(
            "SELECT con.constraint_schema AS s, con.constraint_table AS o, \
                    con.constraint_type, con.constraint_enabled, cols.columns \
             FROM exa_all_constraints AS con \
             JOIN ( \
                 SELECT constraint_schema AS s, constraint_table AS o, constraint_name, \
                        GROUP_CONCAT(column_name ORDER BY ordinal_position SEPARATOR ',') AS columns \
                 FROM exa_all_constraint_columns \
                 WHERE {predicate} \
                 GROUP BY local.s, local.o, constraint_name \
             ) AS cols \
               ON con.constraint_schema = cols.s \
              AND con.constraint_table = cols.o \
              AND con.constraint_name = cols.constraint_name \
             WHERE con.constraint_type IN ('PRIMARY KEY', 'NOT NULL') AND ({predicate}) \
             ORDER BY local.s, local.o"
        );
        let rows = self.query("tables", &sql).await?;

        for row in &rows {
            let parsed = parse_row("tables", row, |row| {
                let key = (row.str(0)?.to_string(), row.str(1)?.to_string());
                let kind = ConstraintKind::parse(row.str(2)?);
                let enabled = row.bool(3)?;
                let columns: Vec<String> = row.str(4)?.split(',').map(str::to_string).collect();
                Ok((key, kind, enabled, columns))
            })?;
            let (key, kind, enabled, columns) = parsed;
            let Some(kind) = kind else { continue };
            if let Some(&i) = index.get(&key) {
                tables[i].constraints.push(Constraint {
                    kind,
                    columns,
                    enabled,
                });
            }
        }
        Ok(())
    }

    /// Views with their column names.
    pub async fn views(&self) -> Result<Vec<View>> {
        let sql = format!(
            "SELECT view_schema AS s, view_name AS o, scope_schema, view_text \
             FROM exa_all_views \
             WHERE {} \
             ORDER BY local.s, local.o",
            self.criteria.sql_predicate()
        );
        let rows = self.query("views", &sql).await?;

        let mut views = parse_rows("views", &rows, |row| {
            let schema = row.str(0)?.to_string();
            Ok(View {
                scope: row.opt_str(2).unwrap_or(&schema).to_string(),
                name: row.str(1)?.to_string(),
                text: row.str(3)?.to_string(),
                columns: Vec::new(),
                schema,
            })
        })?;
        views.retain(|v| self.criteria.matches(&v.schema, &v.name));
        if views.is_empty() {
            return Ok(views);
        }

        let sql = format!(
            "SELECT column_schema AS s, column_table AS o, column_name \
             FROM exa_all_columns \
             WHERE column_object_type = 'VIEW' AND ({}) \
             ORDER BY column_schema, column_table, column_ordinal_position",
            self.criteria.sql_predicate()
        );
        let rows = self.query("views", &sql).await?;
        let index = index_by_identity(views.iter().map(|v| (&v.schema, &v.name)));
        for row in &rows {
            let (key, column) = parse_row("views", row, |row| {
                Ok((
                    (row.str(0)?.to_string(), row.str(1)?.to_string()),
                    row.str(2)?.to_string(),
                ))
            })?;
            if let Some(&i) = index.get(&key) {
                views[i].columns.push(column);
            }
        }
        Ok(views)
    }

    /// Current number of rows a view returns.
    pub async fn view_row_count(&self, view: &View) -> Result<u64> {
        let sql = format!(
            "SELECT COUNT(*) FROM {}.{}",
            quote_ident(&view.schema),
            quote_ident(&view.name)
        );
        let rows = self.query("views", &sql).await?;
        match rows.first() {
            Some(row) => parse_row("views", row, |row| row.u64_or_zero(0)),
            None => Ok(0),
        }
    }

    /// Lua/UDF scripts.
    pub async fn scripts(&self) -> Result<Vec<Script>> {
        let sql = format!(
            "SELECT script_schema AS s, script_name AS o, script_text, script_comment \
             FROM exa_all_scripts \
             WHERE {} \
             ORDER BY local.s, local.o",
            self.criteria.sql_predicate()
        );
        let rows = self.query("scripts", &sql).await?;
        let mut scripts = parse_rows("scripts", &rows, |row| {
            Ok(Script {
                schema: row.str(0)?.to_string(),
                name: row.str(1)?.to_string(),
                text: row.str(2)?.to_string(),
                comment: non_empty(row.opt_str(3)),
            })
        })?;
        scripts.retain(|s| self.criteria.matches(&s.schema, &s.name));
        Ok(scripts)
    }

    /// SQL functions.
    pub async fn functions(&self) -> Result<Vec<Function>> {
        let sql = format!(
            "SELECT function_schema AS s, function_name AS o, function_text, function_comment \
             FROM exa_all_functions \
             WHERE {} \
             ORDER BY local.s, local.o",
            self.criteria.sql_predicate()
        );
        let rows = self.query("functions", &sql).await?;
        let mut functions = parse_rows("functions", &rows, |row| {
            Ok(Function {
                schema: row.str(0)?.to_string(),
                name: row.str(1)?.to_string(),
                text: row.str(2)?.to_string(),
                comment: non_empty(row.opt_str(3)),
            })
        })?;
        functions.retain(|f| self.criteria.matches(&f.schema, &f.name));
        Ok(functions)
    }

    /// Connection objects. Not affected by the criteria.
    pub async fn connections(&self) -> Result<Vec<Connection>> {
        let rows = self
            .query(
                "connections",
                "SELECT connection_name, connection_string, user_name, connection_comment \
                 FROM exa_dba_connections \
                 ORDER BY connection_name",
            )
            .await?;
        parse_rows("connections", &rows, |row| {
            Ok(Connection {
                name: row.str(0)?.to_string(),
                connection_string: row.string_or_empty(1),
                user: row.string_or_empty(2),
                comment: non_empty(row.opt_str(3)),
            })
        })
    }

    /// System parameters, except `NICE`.
    pub async fn parameters(&self) -> Result<Vec<Parameter>> {
        let rows = self
            .query(
                "parameters",
                "SELECT parameter_name, system_value \
                 FROM exa_parameters \
                 WHERE parameter_name != 'NICE' \
                 ORDER BY parameter_name",
            )
            .await?;
        parse_rows("parameters", &rows, |row| {
            Ok(Parameter {
                name: row.str(0)?.to_string(),
                value: row.string_or_empty(1),
            })
        })
    }

    /// Database users, except `SYS`.
    pub async fn users(&self) -> Result<Vec<User>> {
        let group_column = if self.capabilities.consumer_groups() {
            "user_consumer_group"
        } else {
            "user_priority"
        };
        let sql = format!(
            "SELECT user_name, distinguished_name, kerberos_principal, {group_column}, \
                    user_comment, password_state, password_expiry_policy \
             FROM exa_dba_users \
             WHERE user_name != 'SYS' \
             ORDER BY user_name"
        );
        let rows = self.query("users", &sql).await?;
        parse_rows("users", &rows, |row| {
            Ok(User {
                name: row.str(0)?.to_string(),
                ldap_dn: non_empty(row.opt_str(1)),
                kerberos_principal: non_empty(row.opt_str(2)),
                group: non_empty(row.opt_str(3)),
                comment: non_empty(row.opt_str(4)),
                password_state: non_empty(row.opt_str(5)),
                password_policy: non_empty(row.opt_str(6)),
            })
        })
    }

    /// Database roles.
    pub async fn roles(&self) -> Result<Vec<Role>> {
        let group_column = if self.capabilities.consumer_groups() {
            "role_consumer_group"
        } else {
            "role_priority"
        };
        let sql = format!(
            "SELECT role_name, {group_column}, role_comment \
             FROM exa_all_roles \
             ORDER BY role_name"
        );
        let rows = self.query("roles", &sql).await?;
        parse_rows("roles", &rows, |row| {
            Ok(Role {
                name: row.str(0)?.to_string(),
                group: non_empty(row.opt_str(1)),
                comment: non_empty(row.opt_str(2)),
            })
        })
    }

    /// Consumer groups, flagging the system default group.
    pub async fn consumer_groups(&self) -> Result<Vec<ConsumerGroup>> {
        let rows = self
            .query(
                "consumer_groups",
                "SELECT system_value FROM exa_parameters \
                 WHERE parameter_name = 'DEFAULT_CONSUMER_GROUP'",
            )
            .await?;
        let default_group = rows
            .first()
            .and_then(|r| r.opt_str(0))
            .unwrap_or_default()
            .to_string();

        let rows = self
            .query(
                "consumer_groups",
                "SELECT consumer_group_name, precedence, cpu_weight, \
                        group_temp_db_ram_limit, user_temp_db_ram_limit, session_temp_db_ram_limit, \
                        query_timeout, idle_timeout, consumer_group_comment \
                 FROM exa_consumer_groups \
                 ORDER BY consumer_group_name",
            )
            .await?;
        parse_rows("consumer_groups", &rows, |row| {
            let name = row.str(0)?.to_string();
            Ok(ConsumerGroup {
                is_default: name == default_group,
                precedence: row.i64_or_zero(1)?,
                cpu_weight: row.i64_or_zero(2)?,
                group_temp_db_ram_limit: row.i64_or_zero(3)?,
                user_temp_db_ram_limit: row.i64_or_zero(4)?,
                session_temp_db_ram_limit: row.i64_or_zero(5)?,
                query_timeout: row.i64_or_zero(6)?,
                idle_timeout: row.i64_or_zero(7)?,
                comment: non_empty(row.opt_str(8)),
                name,
            })
        })
    }

    /// Priority groups (databases before 7.0).
    pub async fn priority_groups(&self) -> Result<Vec<PriorityGroup>> {
        let rows = self
            .query(
                "priority_groups",
                "SELECT priority_group_name, priority_group_weight, priority_group_comment \
                 FROM exa_priority_groups \
                 ORDER BY priority_group_name",
            )
            .await?;
        parse_rows("priority_groups", &rows, |row| {
            Ok(PriorityGroup {
                name: row.str(0)?.to_string(),
                weight: row.i64_or_zero(1)?,
                comment: non_empty(row.opt_str(2)),
            })
        })
    }
}

/// Leading integer of a version string such as `7.1.24`.
fn parse_major_version(version: &str) -> Option<u32> {
    version.trim().split('.').next()?.trim().parse().ok()
}

fn catalog_error(object_type: &str, err: BackupError) -> BackupError {
    match err {
        BackupError::Cancelled | BackupError::Catalog { .. } => err,
        other => BackupError::catalog(object_type, other.to_string()),
    }
}

fn parse_row<T>(object_type: &str, row: &Row, f: impl FnOnce(&Row) -> Result<T>) -> Result<T> {
    f(row).map_err(|e| catalog_error(object_type, e))
}

fn parse_rows<T>(object_type: &str, rows: &[Row], f: impl Fn(&Row) -> Result<T>) -> Result<Vec<T>> {
    rows.iter().map(|row| parse_row(object_type, row, &f)).collect()
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|v| !v.is_empty()).map(str::to_string)
}

fn index_by_identity<'a>(
    items: impl Iterator<Item = (&'a String, &'a String)>,
) -> HashMap<(String, String), usize> {
    items
        .enumerate()
        .map(|(i, (schema, name))| ((schema.clone(), name.clone()), i))
        .collect()
}
