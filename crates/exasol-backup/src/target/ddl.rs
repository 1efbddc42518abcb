//! DDL rendering for backup artifacts.
//!
//! Every renderer returns complete, `;`-terminated statements ready to be
//! replayed with an SQL client. Identifiers are always double-quoted.

use crate::error::{BackupError, Result};
use crate::source::{
    escape_literal, quote_ident, Capabilities, Connection, ConsumerGroup, ConstraintKind,
    Function, Parameter, PriorityGroup, Privilege, Role, Schema, Script, Table, User, View,
};
use regex::{NoExpand, Regex};

/// Parameters whose values are keywords or numbers and must stay unquoted.
const UNQUOTED_PARAMETERS: &[&str] = &[
    "NLS_FIRST_DAY_OF_WEEK",
    "QUERY_TIMEOUT",
    "ST_MAX_DECIMAL_DIGITS",
    "SQL_PREPROCESSOR_SCRIPT",
    "DEFAULT_PRIORITY_GROUP",
    "DEFAULT_CONSUMER_GROUP",
];

/// Roles that exist in every database and are never created.
const BUILTIN_ROLES: &[&str] = &["DBA", "PUBLIC"];

/// Placeholder for credentials that cannot be read back from the catalog.
const MASKED_PASSWORD: &str = "********";

/// A quoted identifier (with `""` escapes) or a bare one.
const VIEW_IDENT: &str = r#"(?:"(?:[^"]|"")+"|[\w$-]+)"#;

/// Renders the objects whose DDL is patched from stored source text.
#[derive(Debug, Clone)]
pub struct DdlRenderer {
    view_header: Regex,
    trailing_slash: Regex,
}

impl DdlRenderer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            view_header: compile(&format!(
                r"(?is)^.*?CREATE[^V]+?VIEW\s+(?:{id}\s*\.\s*)?{id}",
                id = VIEW_IDENT
            ))?,
            trailing_slash: compile(r"(?m)/\s*$")?,
        })
    }

    /// `CREATE OR REPLACE FORCE VIEW` under the view's current name.
    ///
    /// The stored text keeps the name the view was created with, so the
    /// header is rewritten even when the view has since been renamed.
    pub fn view(&self, view: &View) -> String {
        let header = format!(
            "CREATE OR REPLACE FORCE VIEW {}.{}",
            quote_ident(&view.schema),
            quote_ident(&view.name)
        );
        let text = self.view_header.replace(&view.text, NoExpand(&header));
        format!("OPEN SCHEMA {};\n{};\n", quote_ident(&view.scope), text)
    }

    pub fn function(&self, function: &Function) -> String {
        let text = self.trailing_slash.replace_all(&function.text, "");
        let mut sql = format!(
            "OPEN SCHEMA {};\n--/\nCREATE OR REPLACE {}\n/\n",
            quote_ident(&function.schema),
            text
        );
        if let Some(comment) = &function.comment {
            sql.push_str(&format!(
                "COMMENT ON FUNCTION {}.{} IS '{}';\n",
                quote_ident(&function.schema),
                quote_ident(&function.name),
                escape_literal(comment)
            ));
        }
        sql
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| BackupError::Config(format!("invalid DDL pattern '{}': {}", pattern, e)))
}

fn qualified(schema: &str, name: &str) -> String {
    format!("{}.{}", quote_ident(schema), quote_ident(name))
}

fn enabled_keyword(enabled: bool) -> &'static str {
    if enabled {
        "ENABLE"
    } else {
        "DISABLE"
    }
}

fn admin_option(admin: bool) -> &'static str {
    if admin {
        " WITH ADMIN OPTION"
    } else {
        ""
    }
}

/// `schema.sql`: plain or virtual schema, comment and size limit.
pub fn schema(schema: &Schema) -> String {
    let name = quote_ident(&schema.name);
    let mut sql = match (&schema.adapter, schema.is_virtual) {
        (Some(adapter), true) => {
            let adapter = match adapter.split_once('.') {
                Some((adapter_schema, script)) => qualified(adapter_schema, script),
                None => quote_ident(adapter),
            };
            let mut props = String::new();
            if !schema.properties.is_empty() {
                props.push_str("\nWITH");
                for p in &schema.properties {
                    props.push_str(&format!("\n  {} = '{}'", p.name, escape_literal(&p.value)));
                }
            }
            format!(
                "CREATE VIRTUAL SCHEMA IF NOT EXISTS {}\nUSING {}{};\n",
                name, adapter, props
            )
        }
        _ => format!("CREATE SCHEMA IF NOT EXISTS {};\n", name),
    };

    if let Some(comment) = &schema.comment {
        sql.push_str(&format!(
            "COMMENT ON SCHEMA {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    if schema.size_limit > 0 {
        sql.push_str(&format!(
            "ALTER SCHEMA {} SET RAW_SIZE_LIMIT = {};\n",
            name, schema.size_limit
        ));
    }
    sql
}

/// `CREATE OR REPLACE TABLE` rebuilt from column and constraint metadata.
pub fn table(table: &Table) -> String {
    let mut defs: Vec<String> = table
        .columns
        .iter()
        .map(|c| {
            let mut def = format!("{} {}", quote_ident(&c.name), c.data_type);
            if let Some(default) = &c.default {
                def.push_str(&format!(" DEFAULT {}", default));
            }
            if let Some(identity) = &c.identity {
                def.push_str(&format!(" IDENTITY {}", identity));
            }
            if let Some(not_null) = table.not_null(&c.name) {
                def.push_str(&format!(" NOT NULL {}", enabled_keyword(not_null.enabled)));
            }
            if let Some(comment) = &c.comment {
                def.push_str(&format!(" COMMENT IS '{}'", escape_literal(comment)));
            }
            def
        })
        .collect();

    for pk in table
        .constraints
        .iter()
        .filter(|c| c.kind == ConstraintKind::PrimaryKey)
    {
        let cols = pk
            .columns
            .iter()
            .map(|c| quote_ident(c))
            .collect::<Vec<_>>()
            .join(",");
        defs.push(format!("PRIMARY KEY ({}) {}", cols, enabled_keyword(pk.enabled)));
    }

    let name = qualified(&table.schema, &table.name);
    let mut sql = format!(
        "CREATE OR REPLACE TABLE {} (\n\t{}\n);\n",
        name,
        defs.join(",\n\t")
    );
    if let Some(comment) = &table.comment {
        sql.push_str(&format!(
            "COMMENT ON TABLE {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    sql
}

pub fn script(script: &Script) -> String {
    let text = match script.text.strip_prefix("CREATE ") {
        Some(rest) => format!("CREATE OR REPLACE {}", rest),
        None => script.text.clone(),
    };
    let mut sql = format!(
        "OPEN SCHEMA {};\n--/\n{}\n/\n",
        quote_ident(&script.schema),
        text
    );
    if let Some(comment) = &script.comment {
        sql.push_str(&format!(
            "COMMENT ON SCRIPT {} IS '{}';\n",
            qualified(&script.schema, &script.name),
            escape_literal(comment)
        ));
    }
    sql
}

/// One connection. The password is never readable, so it is masked.
pub fn connection(conn: &Connection) -> String {
    let name = quote_ident(&conn.name);
    let mut sql = format!(
        "CREATE OR REPLACE CONNECTION {} TO '{}'",
        name,
        escape_literal(&conn.connection_string)
    );
    if !conn.user.is_empty() {
        sql.push_str(&format!(
            " USER '{}' IDENTIFIED BY {}",
            escape_literal(&conn.user),
            MASKED_PASSWORD
        ));
    }
    sql.push_str(";\n");
    if let Some(comment) = &conn.comment {
        sql.push_str(&format!(
            "COMMENT ON CONNECTION {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    sql
}

pub fn parameter(param: &Parameter) -> String {
    if UNQUOTED_PARAMETERS.contains(&param.name.as_str()) {
        format!("ALTER SYSTEM SET {}={};\n", param.name, param.value)
    } else {
        format!(
            "ALTER SYSTEM SET {}='{}';\n",
            param.name,
            escape_literal(&param.value)
        )
    }
}

pub fn consumer_group(group: &ConsumerGroup) -> String {
    let name = quote_ident(&group.name);
    let head = if group.name == "SYS_CONSUMER_GROUP" || group.is_default {
        format!("ALTER CONSUMER GROUP {} SET", name)
    } else {
        format!(
            "DROP CONSUMER GROUP {};\nCREATE CONSUMER GROUP {} WITH",
            name, name
        )
    };
    let limit = |v: i64| {
        if v == 0 {
            "OFF".to_string()
        } else {
            v.to_string()
        }
    };
    let mut sql = format!(
        "{}\n   PRECEDENCE = {},\n   CPU_WEIGHT = {},\n   GROUP_TEMP_DB_RAM_LIMIT = '{}',\n   \
         USER_TEMP_DB_RAM_LIMIT = '{}',\n   SESSION_TEMP_DB_RAM_LIMIT = '{}',\n   \
         QUERY_TIMEOUT = {},\n   IDLE_TIMEOUT = {};\n",
        head,
        group.precedence,
        group.cpu_weight,
        limit(group.group_temp_db_ram_limit),
        limit(group.user_temp_db_ram_limit),
        limit(group.session_temp_db_ram_limit),
        group.query_timeout,
        group.idle_timeout,
    );
    if let Some(comment) = &group.comment {
        sql.push_str(&format!(
            "COMMENT ON CONSUMER GROUP {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    sql
}

pub fn priority_group(group: &PriorityGroup) -> String {
    let name = quote_ident(&group.name);
    let mut sql = if group.name == "MEDIUM" {
        format!("ALTER PRIORITY GROUP {} SET WEIGHT = {};\n", name, group.weight)
    } else {
        format!(
            "DROP PRIORITY GROUP {};\nCREATE PRIORITY GROUP {} WITH WEIGHT = {};\n",
            name, name, group.weight
        )
    };
    if let Some(comment) = &group.comment {
        sql.push_str(&format!(
            "COMMENT ON PRIORITY GROUP {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    sql
}

fn group_assignment(grantee: &str, kind: &str, group: &str, caps: Capabilities) -> String {
    if caps.consumer_groups() {
        format!(
            "ALTER {} {} SET CONSUMER_GROUP = {};\n",
            kind,
            quote_ident(grantee),
            quote_ident(group)
        )
    } else {
        format!(
            "GRANT PRIORITY GROUP {} TO {};\n",
            quote_ident(group),
            quote_ident(grantee)
        )
    }
}

/// `CREATE USER` with its authentication, group and password policy.
///
/// Local passwords cannot be read back; such users are created with a
/// masked password that has to be reset after a restore.
pub fn user(user: &User, caps: Capabilities) -> String {
    let name = quote_ident(&user.name);
    let mut sql = if let Some(principal) = &user.kerberos_principal {
        format!(
            "CREATE USER {} IDENTIFIED BY KERBEROS PRINCIPAL '{}';\n",
            name,
            escape_literal(principal)
        )
    } else if let Some(dn) = &user.ldap_dn {
        format!(
            "CREATE USER {} IDENTIFIED AT LDAP AS '{}';\n",
            name,
            escape_literal(dn)
        )
    } else {
        format!("CREATE USER {} IDENTIFIED BY {};\n", name, MASKED_PASSWORD)
    };

    if let Some(group) = &user.group {
        sql.push_str(&group_assignment(&user.name, "USER", group, caps));
    }
    if let Some(comment) = &user.comment {
        sql.push_str(&format!(
            "COMMENT ON USER {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    if let Some(policy) = &user.password_policy {
        sql.push_str(&format!(
            "ALTER USER {} SET PASSWORD_EXPIRY_POLICY='{}';\n",
            name,
            escape_literal(policy)
        ));
    }
    if user
        .password_state
        .as_deref()
        .is_some_and(|state| state != "VALID")
    {
        sql.push_str(&format!("ALTER USER {} PASSWORD EXPIRE;\n", name));
    }
    sql
}

pub fn role(role: &Role, caps: Capabilities) -> String {
    let name = quote_ident(&role.name);
    let mut sql = String::new();
    if !is_builtin_role(&role.name) {
        sql.push_str(&format!("CREATE ROLE {};\n", name));
    }
    if let Some(group) = &role.group {
        sql.push_str(&group_assignment(&role.name, "ROLE", group, caps));
    }
    if let Some(comment) = &role.comment {
        sql.push_str(&format!(
            "COMMENT ON ROLE {} IS '{}';\n",
            name,
            escape_literal(comment)
        ));
    }
    sql
}

/// Whether the role exists in every database.
pub fn is_builtin_role(name: &str) -> bool {
    BUILTIN_ROLES.contains(&name)
}

fn object_ref(schema: Option<&String>, name: &str) -> String {
    match schema {
        Some(schema) => qualified(schema, name),
        None => quote_ident(name),
    }
}

/// One privilege statement.
pub fn privilege(privilege: &Privilege) -> String {
    match privilege {
        Privilege::Connection {
            grantee,
            connection,
            admin_option: admin,
        } => format!(
            "GRANT CONNECTION {} TO {}{};\n",
            quote_ident(connection),
            quote_ident(grantee),
            admin_option(*admin)
        ),
        Privilege::Object {
            grantee,
            privilege,
            object_type,
            object_schema,
            object_name,
        } => format!(
            "GRANT {} ON {} {} TO {};\n",
            privilege,
            object_type,
            object_ref(object_schema.as_ref(), object_name),
            quote_ident(grantee)
        ),
        Privilege::RestrictedObject {
            grantee,
            privilege,
            object_type,
            object_schema,
            object_name,
            for_object_type,
            for_object_schema,
            for_object_name,
        } => format!(
            "GRANT {} ON {} {} FOR {} {} TO {};\n",
            privilege,
            object_type,
            object_ref(object_schema.as_ref(), object_name),
            for_object_type,
            object_ref(for_object_schema.as_ref(), for_object_name),
            quote_ident(grantee)
        ),
        Privilege::Role {
            grantee,
            role,
            admin_option: admin,
        } => format!(
            "GRANT {} TO {}{};\n",
            quote_ident(role),
            quote_ident(grantee),
            admin_option(*admin)
        ),
        Privilege::System {
            grantee,
            privilege,
            admin_option: admin,
        } => format!(
            "GRANT {} TO {}{};\n",
            privilege,
            quote_ident(grantee),
            admin_option(*admin)
        ),
        Privilege::Impersonation { grantee, on } => format!(
            "GRANT IMPERSONATION ON {} TO {};\n",
            quote_ident(on),
            quote_ident(grantee)
        ),
        Privilege::SchemaOwner {
            owner,
            schema,
            is_virtual,
        } => format!(
            "ALTER {}SCHEMA {} CHANGE OWNER {};\n",
            if *is_virtual { "VIRTUAL " } else { "" },
            quote_ident(schema),
            quote_ident(owner)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Column, Constraint, SchemaProperty};

    fn renderer() -> DdlRenderer {
        DdlRenderer::new().unwrap()
    }

    #[test]
    fn test_table_with_pk_not_null_and_comments() {
        let t = Table {
            schema: "S".into(),
            name: "T".into(),
            row_count: 0,
            columns: vec![
                Column {
                    name: "ID".into(),
                    data_type: "DECIMAL(18,0)".into(),
                    identity: Some("100".into()),
                    ..Default::default()
                },
                Column {
                    name: "NAME".into(),
                    data_type: "VARCHAR(100) UTF8".into(),
                    default: Some("'n/a'".into()),
                    comment: Some("it's a name".into()),
                    ..Default::default()
                },
            ],
            constraints: vec![
                Constraint {
                    kind: ConstraintKind::NotNull,
                    columns: vec!["NAME".into()],
                    enabled: false,
                },
                Constraint {
                    kind: ConstraintKind::PrimaryKey,
                    columns: vec!["ID".into()],
                    enabled: true,
                },
            ],
            comment: Some("orders".into()),
        };
        assert_eq!(
            table(&t),
            "CREATE OR REPLACE TABLE \"S\".\"T\" (\n\
             \t\"ID\" DECIMAL(18,0) IDENTITY 100,\n\
             \t\"NAME\" VARCHAR(100) UTF8 DEFAULT 'n/a' NOT NULL DISABLE COMMENT IS 'it''s a name',\n\
             \tPRIMARY KEY (\"ID\") ENABLE\n\
             );\n\
             COMMENT ON TABLE \"S\".\"T\" IS 'orders';\n"
        );
    }

    #[test]
    fn test_view_header_is_renamed() {
        let v = View {
            schema: "S".into(),
            name: "NEW_NAME".into(),
            scope: "S".into(),
            text: "create or replace view \"S\".\"OLD_NAME\" as select 1 a from dual".into(),
            columns: vec!["A".into()],
        };
        assert_eq!(
            renderer().view(&v),
            "OPEN SCHEMA \"S\";\n\
             CREATE OR REPLACE FORCE VIEW \"S\".\"NEW_NAME\" as select 1 a from dual;\n"
        );
    }

    #[test]
    fn test_view_header_with_quoted_names() {
        let v = View {
            schema: "S".into(),
            name: "my view".into(),
            scope: "S".into(),
            text: "CREATE VIEW \"my schema\".\"my \"\"old\"\" view\" AS SELECT 1 a".into(),
            columns: vec!["A".into()],
        };
        assert_eq!(
            renderer().view(&v),
            "OPEN SCHEMA \"S\";\n\
             CREATE OR REPLACE FORCE VIEW \"S\".\"my view\" AS SELECT 1 a;\n"
        );
    }

    #[test]
    fn test_view_header_keeps_body_and_comments() {
        let v = View {
            schema: "S".into(),
            name: "V".into(),
            scope: "OTHER".into(),
            text: "-- leading comment\nCREATE VIEW V (A COMMENT IS 'x$1') AS SELECT 1".into(),
            columns: vec![],
        };
        let sql = renderer().view(&v);
        assert!(sql.starts_with("OPEN SCHEMA \"OTHER\";\nCREATE OR REPLACE FORCE VIEW \"S\".\"V\" (A"));
        assert!(sql.contains("'x$1'"));
    }

    #[test]
    fn test_script_and_function() {
        let s = Script {
            schema: "S".into(),
            name: "LUA".into(),
            text: "CREATE LUA SCRIPT \"LUA\" () RETURNS ROWCOUNT AS\nreturn 1".into(),
            comment: Some("c".into()),
        };
        assert_eq!(
            script(&s),
            "OPEN SCHEMA \"S\";\n--/\nCREATE OR REPLACE LUA SCRIPT \"LUA\" () RETURNS ROWCOUNT AS\nreturn 1\n/\n\
             COMMENT ON SCRIPT \"S\".\"LUA\" IS 'c';\n"
        );

        let f = Function {
            schema: "S".into(),
            name: "F".into(),
            text: "FUNCTION F (x DECIMAL) RETURN DECIMAL IS\nBEGIN\n  RETURN x;\nEND F;\n/\n".into(),
            comment: None,
        };
        let sql = renderer().function(&f);
        assert!(sql.starts_with("OPEN SCHEMA \"S\";\n--/\nCREATE OR REPLACE FUNCTION F"));
        assert!(sql.ends_with("END F;\n\n/\n"));
    }

    #[test]
    fn test_virtual_schema() {
        let s = Schema {
            name: "VS".into(),
            comment: Some("remote".into()),
            is_virtual: true,
            adapter: Some("ADAPTERS.JDBC_ADAPTER".into()),
            size_limit: 0,
            properties: vec![SchemaProperty {
                name: "CONNECTION_NAME".into(),
                value: "JDBC".into(),
            }],
        };
        assert_eq!(
            schema(&s),
            "CREATE VIRTUAL SCHEMA IF NOT EXISTS \"VS\"\nUSING \"ADAPTERS\".\"JDBC_ADAPTER\"\nWITH\n  \
             CONNECTION_NAME = 'JDBC';\nCOMMENT ON SCHEMA \"VS\" IS 'remote';\n"
        );
    }

    #[test]
    fn test_plain_schema_with_limit() {
        let s = Schema {
            name: "S".into(),
            size_limit: 1024,
            ..Default::default()
        };
        assert_eq!(
            schema(&s),
            "CREATE SCHEMA IF NOT EXISTS \"S\";\nALTER SCHEMA \"S\" SET RAW_SIZE_LIMIT = 1024;\n"
        );
    }

    #[test]
    fn test_connection_password_is_masked() {
        let c = Connection {
            name: "FTP".into(),
            connection_string: "ftp://host/".into(),
            user: "bob".into(),
            comment: None,
        };
        assert_eq!(
            connection(&c),
            "CREATE OR REPLACE CONNECTION \"FTP\" TO 'ftp://host/' USER 'bob' IDENTIFIED BY ********;\n"
        );
    }

    #[test]
    fn test_parameters_quoting() {
        let quoted = Parameter {
            name: "NLS_DATE_FORMAT".into(),
            value: "YYYY-MM-DD".into(),
        };
        let unquoted = Parameter {
            name: "QUERY_TIMEOUT".into(),
            value: "0".into(),
        };
        assert_eq!(parameter(&quoted), "ALTER SYSTEM SET NLS_DATE_FORMAT='YYYY-MM-DD';\n");
        assert_eq!(parameter(&unquoted), "ALTER SYSTEM SET QUERY_TIMEOUT=0;\n");
    }

    #[test]
    fn test_consumer_groups() {
        let default = ConsumerGroup {
            name: "MEDIUM".into(),
            is_default: true,
            precedence: 300,
            cpu_weight: 300,
            group_temp_db_ram_limit: 1000,
            query_timeout: 60,
            ..Default::default()
        };
        let custom = ConsumerGroup {
            name: "ETL".into(),
            precedence: 500,
            cpu_weight: 200,
            ..Default::default()
        };
        let sql = consumer_group(&default);
        assert!(sql.starts_with("ALTER CONSUMER GROUP \"MEDIUM\" SET\n   PRECEDENCE = 300,"));
        assert!(sql.contains("GROUP_TEMP_DB_RAM_LIMIT = '1000'"));
        assert!(sql.contains("USER_TEMP_DB_RAM_LIMIT = 'OFF'"));
        assert!(sql.ends_with("QUERY_TIMEOUT = 60,\n   IDLE_TIMEOUT = 0;\n"));

        let sql = consumer_group(&custom);
        assert!(sql.starts_with("DROP CONSUMER GROUP \"ETL\";\nCREATE CONSUMER GROUP \"ETL\" WITH\n"));
    }

    #[test]
    fn test_priority_groups() {
        let medium = PriorityGroup {
            name: "MEDIUM".into(),
            weight: 300,
            comment: None,
        };
        assert_eq!(
            priority_group(&medium),
            "ALTER PRIORITY GROUP \"MEDIUM\" SET WEIGHT = 300;\n"
        );
    }

    #[test]
    fn test_users() {
        let caps = Capabilities { major_version: 7 };
        let local = User {
            name: "ALICE".into(),
            group: Some("HIGH".into()),
            password_state: Some("EXPIRED".into()),
            ..Default::default()
        };
        assert_eq!(
            user(&local, caps),
            "CREATE USER \"ALICE\" IDENTIFIED BY ********;\n\
             ALTER USER \"ALICE\" SET CONSUMER_GROUP = \"HIGH\";\n\
             ALTER USER \"ALICE\" PASSWORD EXPIRE;\n"
        );

        let ldap = User {
            name: "BOB".into(),
            ldap_dn: Some("cn=bob,dc=example".into()),
            group: Some("HIGH".into()),
            password_state: Some("VALID".into()),
            ..Default::default()
        };
        assert_eq!(
            user(&ldap, Capabilities { major_version: 6 }),
            "CREATE USER \"BOB\" IDENTIFIED AT LDAP AS 'cn=bob,dc=example';\n\
             GRANT PRIORITY GROUP \"HIGH\" TO \"BOB\";\n"
        );
    }

    #[test]
    fn test_builtin_roles_are_not_created() {
        let caps = Capabilities::default();
        let dba = Role {
            name: "DBA".into(),
            group: Some("SYS_CONSUMER_GROUP".into()),
            comment: None,
        };
        assert_eq!(
            role(&dba, caps),
            "ALTER ROLE \"DBA\" SET CONSUMER_GROUP = \"SYS_CONSUMER_GROUP\";\n"
        );

        let analyst = Role {
            name: "ANALYST".into(),
            group: None,
            comment: Some("read only".into()),
        };
        assert_eq!(
            role(&analyst, caps),
            "CREATE ROLE \"ANALYST\";\nCOMMENT ON ROLE \"ANALYST\" IS 'read only';\n"
        );
    }

    #[test]
    fn test_privileges() {
        let cases = [
            (
                Privilege::Object {
                    grantee: "R".into(),
                    privilege: "SELECT".into(),
                    object_type: "TABLE".into(),
                    object_schema: Some("S".into()),
                    object_name: "T".into(),
                },
                "GRANT SELECT ON TABLE \"S\".\"T\" TO \"R\";\n",
            ),
            (
                Privilege::Object {
                    grantee: "R".into(),
                    privilege: "USAGE".into(),
                    object_type: "SCHEMA".into(),
                    object_schema: None,
                    object_name: "S".into(),
                },
                "GRANT USAGE ON SCHEMA \"S\" TO \"R\";\n",
            ),
            (
                Privilege::RestrictedObject {
                    grantee: "R".into(),
                    privilege: "ACCESS".into(),
                    object_type: "CONNECTION".into(),
                    object_schema: None,
                    object_name: "C".into(),
                    for_object_type: "SCRIPT".into(),
                    for_object_schema: Some("S".into()),
                    for_object_name: "X".into(),
                },
                "GRANT ACCESS ON CONNECTION \"C\" FOR SCRIPT \"S\".\"X\" TO \"R\";\n",
            ),
            (
                Privilege::Role {
                    grantee: "U".into(),
                    role: "R".into(),
                    admin_option: true,
                },
                "GRANT \"R\" TO \"U\" WITH ADMIN OPTION;\n",
            ),
            (
                Privilege::System {
                    grantee: "U".into(),
                    privilege: "CREATE SESSION".into(),
                    admin_option: false,
                },
                "GRANT CREATE SESSION TO \"U\";\n",
            ),
            (
                Privilege::SchemaOwner {
                    owner: "U".into(),
                    schema: "VS".into(),
                    is_virtual: true,
                },
                "ALTER VIRTUAL SCHEMA \"VS\" CHANGE OWNER \"U\";\n",
            ),
        ];
        for (p, expected) in cases {
            assert_eq!(privilege(&p), expected);
        }
    }
}
