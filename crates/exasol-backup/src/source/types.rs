//! Catalog descriptors and object identity.

use serde::{Deserialize, Serialize};

/// Identity of a schema-scoped catalog object.
///
/// Reconciliation and criteria matching only ever look at these two names,
/// so every schema-level descriptor implements this trait.
pub trait DbObject {
    /// Object name. Empty for schemas themselves.
    fn name(&self) -> &str;

    /// Owning schema name.
    fn schema(&self) -> &str;
}

/// Owned `(schema, name)` identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogObject {
    pub schema: String,
    pub name: String,
}

impl CatalogObject {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    /// Identity of a whole schema.
    pub fn schema_only(schema: impl Into<String>) -> Self {
        Self::new(schema, "")
    }

    /// Identity of any descriptor.
    pub fn of(obj: &dyn DbObject) -> Self {
        Self::new(obj.schema(), obj.name())
    }
}

impl DbObject for CatalogObject {
    fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self) -> &str {
        &self.schema
    }
}

macro_rules! impl_db_object {
    ($ty:ty) => {
        impl DbObject for $ty {
            fn name(&self) -> &str {
                &self.name
            }

            fn schema(&self) -> &str {
                &self.schema
            }
        }
    };
}

/// Schema metadata, including virtual schema bindings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Schema {
    /// Schema name.
    pub name: String,

    /// Schema comment.
    pub comment: Option<String>,

    /// Whether the schema is backed by an adapter script.
    pub is_virtual: bool,

    /// Adapter script as `SCHEMA.SCRIPT` (virtual schemas only).
    pub adapter: Option<String>,

    /// Raw object size limit in bytes (0 = none).
    pub size_limit: u64,

    /// Virtual schema properties, ordered by name.
    pub properties: Vec<SchemaProperty>,
}

impl DbObject for Schema {
    fn name(&self) -> &str {
        ""
    }

    fn schema(&self) -> &str {
        &self.name
    }
}

/// Virtual schema property.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaProperty {
    pub name: String,
    pub value: String,
}

/// Table metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Table {
    /// Schema name.
    pub schema: String,

    /// Table name.
    pub name: String,

    /// Row count reported by the catalog.
    pub row_count: u64,

    /// Column definitions in ordinal order.
    pub columns: Vec<Column>,

    /// PRIMARY KEY and NOT NULL constraints.
    pub constraints: Vec<Constraint>,

    /// Table comment.
    pub comment: Option<String>,
}

impl_db_object!(Table);

impl Table {
    /// Get the fully qualified table name.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }

    /// Primary key column names, empty if the table has none.
    pub fn primary_key(&self) -> Vec<String> {
        self.constraints
            .iter()
            .find(|c| c.kind == ConstraintKind::PrimaryKey)
            .map(|c| c.columns.clone())
            .unwrap_or_default()
    }

    /// NOT NULL constraint on a column, if any.
    pub fn not_null(&self, column: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| {
            c.kind == ConstraintKind::NotNull && c.columns.first().map(String::as_str) == Some(column)
        })
    }

    /// Columns giving a deterministic row order: the primary key when one
    /// exists, otherwise every column.
    pub fn ordering_columns(&self) -> Vec<String> {
        let pk = self.primary_key();
        if pk.is_empty() {
            self.columns.iter().map(|c| c.name.clone()).collect()
        } else {
            pk
        }
    }
}

/// Column metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,

    /// Full type text (e.g. `DECIMAL(18,0)`, `VARCHAR(100) UTF8`).
    pub data_type: String,

    /// Default expression.
    pub default: Option<String>,

    /// Identity column start value.
    pub identity: Option<String>,

    /// Column comment.
    pub comment: Option<String>,
}

/// Kind of table constraint kept in a backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConstraintKind {
    PrimaryKey,
    NotNull,
}

impl ConstraintKind {
    /// Parse the catalog's `constraint_type` text.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PRIMARY KEY" => Some(ConstraintKind::PrimaryKey),
            "NOT NULL" => Some(ConstraintKind::NotNull),
            _ => None,
        }
    }
}

/// Table constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub columns: Vec<String>,
    pub enabled: bool,
}

/// View metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct View {
    pub schema: String,
    pub name: String,

    /// Schema the view text was created in (unqualified names resolve here).
    pub scope: String,

    /// Original `CREATE VIEW` text.
    pub text: String,

    /// Column names in ordinal order.
    pub columns: Vec<String>,
}

impl_db_object!(View);

impl View {
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.schema, self.name)
    }
}

/// Script metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Script {
    pub schema: String,
    pub name: String,
    pub text: String,
    pub comment: Option<String>,
}

impl_db_object!(Script);

/// Function metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Function {
    pub schema: String,
    pub name: String,
    pub text: String,
    pub comment: Option<String>,
}

impl_db_object!(Function);

/// Connection object. The password is never readable from the catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Connection {
    pub name: String,
    pub connection_string: String,
    pub user: String,
    pub comment: Option<String>,
}

/// System parameter.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: String,
}

/// Database user.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub ldap_dn: Option<String>,
    pub kerberos_principal: Option<String>,
    /// Consumer group (7.x+) or priority group (older) assigned to the user.
    pub group: Option<String>,
    pub comment: Option<String>,
    pub password_state: Option<String>,
    pub password_policy: Option<String>,
}

/// Database role.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    /// Consumer group (7.x+) or priority group (older) assigned to the role.
    pub group: Option<String>,
    pub comment: Option<String>,
}

/// Consumer group (resource management, 7.x+).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConsumerGroup {
    pub name: String,
    pub is_default: bool,
    pub precedence: i64,
    pub cpu_weight: i64,
    pub group_temp_db_ram_limit: i64,
    pub user_temp_db_ram_limit: i64,
    pub session_temp_db_ram_limit: i64,
    pub query_timeout: i64,
    pub idle_timeout: i64,
    pub comment: Option<String>,
}

/// Priority group (resource management, before 7.x).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PriorityGroup {
    pub name: String,
    pub weight: i64,
    pub comment: Option<String>,
}

/// A privilege held by a user or role, written into the grantee's file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Privilege {
    /// `GRANT CONNECTION c TO g`
    Connection {
        grantee: String,
        connection: String,
        admin_option: bool,
    },
    /// `GRANT p ON <type> <object> TO g`
    Object {
        grantee: String,
        privilege: String,
        object_type: String,
        object_schema: Option<String>,
        object_name: String,
    },
    /// `GRANT p ON <type> <object> FOR <type> <object> TO g`
    RestrictedObject {
        grantee: String,
        privilege: String,
        object_type: String,
        object_schema: Option<String>,
        object_name: String,
        for_object_type: String,
        for_object_schema: Option<String>,
        for_object_name: String,
    },
    /// `GRANT role TO g`
    Role {
        grantee: String,
        role: String,
        admin_option: bool,
    },
    /// `GRANT <system privilege> TO g`
    System {
        grantee: String,
        privilege: String,
        admin_option: bool,
    },
    /// `GRANT IMPERSONATION ON u TO g`
    Impersonation { grantee: String, on: String },
    /// Schema ownership, restored with `ALTER SCHEMA .. CHANGE OWNER`.
    SchemaOwner {
        owner: String,
        schema: String,
        is_virtual: bool,
    },
}

impl Privilege {
    /// User or role whose file receives the statement.
    pub fn grantee(&self) -> &str {
        match self {
            Privilege::Connection { grantee, .. }
            | Privilege::Object { grantee, .. }
            | Privilege::RestrictedObject { grantee, .. }
            | Privilege::Role { grantee, .. }
            | Privilege::System { grantee, .. }
            | Privilege::Impersonation { grantee, .. } => grantee,
            Privilege::SchemaOwner { owner, .. } => owner,
        }
    }
}

/// Detected database capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Database major version.
    pub major_version: u32,
}

impl Capabilities {
    /// Consumer groups replaced priority groups in 7.0.
    pub fn consumer_groups(&self) -> bool {
        self.major_version >= 7
    }

    /// Virtual schema adapters are reported as separate schema/name columns
    /// from 8.0 on.
    pub fn split_adapter_columns(&self) -> bool {
        self.major_version >= 8
    }
}

impl Default for Capabilities {
    fn default() -> Self {
        Self { major_version: 7 }
    }
}
