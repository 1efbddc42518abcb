//! Privilege extraction for users and roles.

use super::{parse_rows, CatalogReader};
use crate::error::Result;
use crate::source::{escape_literal, Privilege};
use tracing::debug;

impl CatalogReader {
    /// Every privilege held by `grantees`, grouped by kind in restore order:
    /// connections, objects, restricted objects, roles, system privileges,
    /// impersonation, then schema ownership.
    pub async fn privileges(&self, grantees: &[String]) -> Result<Vec<Privilege>> {
        if grantees.is_empty() {
            return Ok(Vec::new());
        }
        let in_list = grantees
            .iter()
            .map(|g| format!("'{}'", escape_literal(g)))
            .collect::<Vec<_>>()
            .join(",");

        let mut privileges = Vec::new();
        privileges.extend(self.connection_privileges(&in_list).await?);
        privileges.extend(self.object_privileges(&in_list).await?);
        privileges.extend(self.restricted_object_privileges(&in_list).await?);
        privileges.extend(self.role_privileges(&in_list).await?);
        privileges.extend(self.system_privileges(&in_list).await?);
        privileges.extend(self.impersonation_privileges(&in_list).await?);
        privileges.extend(self.schema_owners(&in_list).await?);

        debug!(
            "Found {} privileges for {} grantees",
            privileges.len(),
            grantees.len()
        );
        Ok(privileges)
    }

    async fn connection_privileges(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT grantee, granted_connection, admin_option \
             FROM exa_dba_connection_privs \
             WHERE grantee IN ({in_list}) \
             ORDER BY 1, 2"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            Ok(Privilege::Connection {
                grantee: row.str(0)?.to_string(),
                connection: row.str(1)?.to_string(),
                admin_option: row.bool(2)?,
            })
        })
    }

    async fn object_privileges(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT object_schema, object_name, object_type, privilege, grantee \
             FROM exa_dba_obj_privs \
             WHERE grantee IN ({in_list}) \
             ORDER BY 1, 2, 3, 4, 5"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            let object_type = row.str(2)?.to_string();
            // Schema privileges name the schema in object_name
            let object_schema = if object_type == "SCHEMA" {
                None
            } else {
                row.opt_str(0).map(str::to_string)
            };
            Ok(Privilege::Object {
                object_schema,
                object_name: row.str(1)?.to_string(),
                object_type,
                privilege: row.str(3)?.to_string(),
                grantee: row.str(4)?.to_string(),
            })
        })
    }

    async fn restricted_object_privileges(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT object_schema, object_name, object_type, \
                    for_object_schema, for_object_name, for_object_type, \
                    privilege, grantee \
             FROM exa_dba_restricted_obj_privs \
             WHERE grantee IN ({in_list}) \
             ORDER BY 1, 2, 3, 4, 5, 6, 7, 8"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            Ok(Privilege::RestrictedObject {
                object_schema: row.opt_str(0).map(str::to_string),
                object_name: row.str(1)?.to_string(),
                object_type: row.str(2)?.to_string(),
                for_object_schema: row.opt_str(3).map(str::to_string),
                for_object_name: row.str(4)?.to_string(),
                for_object_type: row.str(5)?.to_string(),
                privilege: row.str(6)?.to_string(),
                grantee: row.str(7)?.to_string(),
            })
        })
    }

    async fn role_privileges(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT grantee, granted_role, admin_option \
             FROM exa_dba_role_privs \
             WHERE grantee IN ({in_list}) \
             ORDER BY 1, 2"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            Ok(Privilege::Role {
                grantee: row.str(0)?.to_string(),
                role: row.str(1)?.to_string(),
                admin_option: row.bool(2)?,
            })
        })
    }

    async fn system_privileges(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT grantee, privilege, admin_option \
             FROM exa_dba_sys_privs \
             WHERE grantee IN ({in_list}) \
             ORDER BY 1, 2"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            Ok(Privilege::System {
                grantee: row.str(0)?.to_string(),
                privilege: row.str(1)?.to_string(),
                admin_option: row.bool(2)?,
            })
        })
    }

    async fn impersonation_privileges(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT grantee, impersonation_on \
             FROM exa_dba_impersonation_privs \
             WHERE grantee IN ({in_list}) \
             ORDER BY 1, 2"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            Ok(Privilege::Impersonation {
                grantee: row.str(0)?.to_string(),
                on: row.str(1)?.to_string(),
            })
        })
    }

    async fn schema_owners(&self, in_list: &str) -> Result<Vec<Privilege>> {
        let sql = format!(
            "SELECT DISTINCT s.schema_name, s.schema_owner, \
                    (vs.schema_name IS NOT NULL) AS is_virtual \
             FROM exa_schemas AS s \
             LEFT JOIN exa_all_virtual_schemas AS vs \
               ON s.schema_name = vs.schema_name \
             WHERE s.schema_owner IN ({in_list}) \
             ORDER BY 1, 2"
        );
        let rows = self.query("privileges", &sql).await?;
        parse_rows("privileges", &rows, |row| {
            Ok(Privilege::SchemaOwner {
                schema: row.str(0)?.to_string(),
                owner: row.str(1)?.to_string(),
                is_virtual: row.bool(2)?,
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::ScriptedSource;
    use super::*;
    use crate::criteria::Criteria;
    use crate::source::Capabilities;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_no_grantees_issues_no_queries() {
        let source = Arc::new(ScriptedSource::default());
        let reader = CatalogReader::new(
            source.clone(),
            Arc::new(Criteria::new("*", "").unwrap()),
            Capabilities::default(),
        );
        assert!(reader.privileges(&[]).await.unwrap().is_empty());
        assert!(source.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_privileges_in_restore_order() {
        let source = Arc::new(
            ScriptedSource::default()
                .answer(
                    "exa_dba_role_privs",
                    vec![vec![Some("O'NEIL"), Some("ANALYST"), Some("0")]],
                )
                .answer(
                    "exa_dba_obj_privs",
                    vec![vec![Some("S"), Some("S"), Some("SCHEMA"), Some("USAGE"), Some("O'NEIL")]],
                )
                .answer(
                    "schema_owner IN",
                    vec![vec![Some("S"), Some("O'NEIL"), Some("false")]],
                ),
        );
        let reader = CatalogReader::new(
            source.clone(),
            Arc::new(Criteria::new("*", "").unwrap()),
            Capabilities::default(),
        );

        let privileges = reader.privileges(&["O'NEIL".to_string()]).await.unwrap();
        assert_eq!(privileges.len(), 3);
        assert!(matches!(
            privileges[0],
            Privilege::Object { object_schema: None, .. }
        ));
        assert!(matches!(privileges[1], Privilege::Role { admin_option: false, .. }));
        assert!(matches!(privileges[2], Privilege::SchemaOwner { .. }));

        let queries = source.queries.lock().unwrap();
        assert_eq!(queries.len(), 7);
        assert!(queries.iter().all(|q| q.contains("('O''NEIL')")));
    }
}
