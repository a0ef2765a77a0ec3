//! PostgreSQL functions.
//!
//! PostgreSQL procedures cannot return rows, so every action is a SQL-language
//! function: selects return `SETOF <table>`, inserts return the generated key
//! when the table has one, everything else returns `void`.

use crate::core::traits::Dialect;
use crate::drivers::PostgresDialect;
use crate::error::Result;
use crate::schema::{Column, Table};

use super::{
    all_columns, insertable_columns, key_columns, updatable_columns, ProcedureGenerator,
    ProcedureKind,
};

/// Renders `CREATE OR REPLACE FUNCTION` bodies for PostgreSQL.
#[derive(Debug, Clone, Default)]
pub struct PostgresProcedures {
    dialect: PostgresDialect,
}

impl PostgresProcedures {
    pub fn new() -> Self {
        Self {
            dialect: PostgresDialect::new(),
        }
    }

    fn function(
        &self,
        table: &Table,
        kind: ProcedureKind,
        parameters: &[&Column],
        returns: &str,
        body: &str,
    ) -> Result<String> {
        Ok(format!(
            "CREATE OR REPLACE FUNCTION {}({})\nRETURNS {} AS $$\n    {};\n$$ LANGUAGE sql",
            self.dialect
                .quote_ident(&self.procedure_name(table, kind))?,
            self.column_names_parameters(parameters),
            returns,
            body
        ))
    }

    fn select_list(&self, table: &Table) -> Result<String> {
        Ok(format!(
            "SELECT {} FROM {}",
            self.column_names(&all_columns(table))?,
            self.dialect.quote_ident(&table.name)?
        ))
    }

    fn row_type(&self, table: &Table) -> Result<String> {
        Ok(format!("SETOF {}", self.dialect.quote_ident(&table.name)?))
    }
}

impl ProcedureGenerator for PostgresProcedures {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    /// Serial columns take their underlying integer type.
    fn parameter_type(&self, column: &Column) -> String {
        let mut plain = column.clone();
        plain.is_auto_increment = false;
        self.dialect.column_type(&plain)
    }

    /// `p_col TYPE, ...`
    fn column_names_parameters(&self, columns: &[&Column]) -> String {
        columns
            .iter()
            .map(|c| format!("{} {}", self.parameter_name(&c.name), self.parameter_type(c)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_all(&self, table: &Table) -> Result<String> {
        let body = self.select_list(table)?;
        self.function(table, ProcedureKind::SelectAll, &[], &self.row_type(table)?, &body)
    }

    fn select_by_key(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        let body = format!(
            "{} WHERE {}",
            self.select_list(table)?,
            self.primary_key_where(table)?
        );
        self.function(
            table,
            ProcedureKind::SelectByKey,
            &keys,
            &self.row_type(table)?,
            &body,
        )
    }

    fn insert(&self, table: &Table) -> Result<String> {
        let columns = insertable_columns(table);
        let target = self.dialect.quote_ident(&table.name)?;
        let mut body = if columns.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", target)
        } else {
            format!(
                "INSERT INTO {} ({}) VALUES ({})",
                target,
                self.column_names(&columns)?,
                self.parameter_list(&columns)
            )
        };

        let returns = match table.identity_column() {
            Some(identity) => {
                body.push_str(&format!(
                    " RETURNING {}",
                    self.dialect.quote_ident(&identity.name)?
                ));
                self.parameter_type(identity)
            }
            None => "void".to_string(),
        };
        self.function(table, ProcedureKind::Insert, &columns, &returns, &body)
    }

    fn update(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        let updatable = updatable_columns(table);
        let mut parameters = keys.clone();
        parameters.extend(updatable.iter().copied());

        let body = format!(
            "UPDATE {} SET {} WHERE {}",
            self.dialect.quote_ident(&table.name)?,
            self.assignments(&updatable, ", ")?,
            self.primary_key_where(table)?
        );
        self.function(table, ProcedureKind::Update, &parameters, "void", &body)
    }

    fn delete(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        let body = format!(
            "DELETE FROM {} WHERE {}",
            self.dialect.quote_ident(&table.name)?,
            self.primary_key_where(table)?
        );
        self.function(table, ProcedureKind::Delete, &keys, "void", &body)
    }

    /// A changed return type cannot be replaced in place, so functions are
    /// dropped first.
    fn drop_statement(&self, table: &Table, kind: ProcedureKind) -> Result<String> {
        Ok(format!(
            "DROP FUNCTION IF EXISTS {}",
            self.dialect
                .quote_ident(&self.procedure_name(table, kind))?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbgen::tests::users;

    #[test]
    fn test_select_all_returns_setof() {
        let sql = PostgresProcedures::new().select_all(&users()).unwrap();
        assert_eq!(
            sql,
            "CREATE OR REPLACE FUNCTION \"users_select_all\"()\n\
             RETURNS SETOF \"users\" AS $$\n    \
             SELECT \"id\", \"name\", \"email\" FROM \"users\";\n\
             $$ LANGUAGE sql"
        );
    }

    #[test]
    fn test_select_by_key_uses_plain_integer_parameter() {
        let sql = PostgresProcedures::new().select_by_key(&users()).unwrap();
        assert!(sql.starts_with("CREATE OR REPLACE FUNCTION \"users_select_by_key\"(p_id INTEGER)"));
        assert!(sql.contains("WHERE \"id\" = p_id;"));
    }

    #[test]
    fn test_insert_returning_identity() {
        let sql = PostgresProcedures::new().insert(&users()).unwrap();
        assert!(sql.contains("(p_name VARCHAR(100), p_email VARCHAR(255))\nRETURNS INTEGER AS $$"));
        assert!(sql.contains(
            "INSERT INTO \"users\" (\"name\", \"email\") VALUES (p_name, p_email) RETURNING \"id\";"
        ));
    }

    #[test]
    fn test_insert_without_identity_returns_void() {
        let mut tags = Table::new("tags");
        tags.column("code").string(Some(20)).primary_key();
        let sql = PostgresProcedures::new().insert(&tags).unwrap();
        assert!(sql.contains("RETURNS void"));
        assert!(!sql.contains("RETURNING"));
    }

    #[test]
    fn test_insert_only_identity_column() {
        let mut counters = Table::new("counters");
        counters.column("id").bigserial().primary_key();
        let sql = PostgresProcedures::new().insert(&counters).unwrap();
        assert!(sql.contains("\"counters_insert\"()\nRETURNS BIGINT"));
        assert!(sql.contains("INSERT INTO \"counters\" DEFAULT VALUES RETURNING \"id\";"));
    }

    #[test]
    fn test_update_and_delete() {
        let gen = PostgresProcedures::new();
        let update = gen.update(&users()).unwrap();
        assert!(update.contains("(p_id INTEGER, p_name VARCHAR(100), p_email VARCHAR(255))\nRETURNS void"));
        assert!(update.contains("SET \"name\" = p_name, \"email\" = p_email WHERE \"id\" = p_id;"));

        let delete = gen.delete(&users()).unwrap();
        assert!(delete.contains("DELETE FROM \"users\" WHERE \"id\" = p_id;"));
    }

    #[test]
    fn test_drop_statement() {
        let sql = PostgresProcedures::new()
            .drop_statement(&users(), ProcedureKind::Insert)
            .unwrap();
        assert_eq!(sql, "DROP FUNCTION IF EXISTS \"users_insert\"");
    }
}
