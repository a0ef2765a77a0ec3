//! MySQL stored procedures.

use crate::core::traits::Dialect;
use crate::drivers::MysqlDialect;
use crate::error::Result;
use crate::schema::{Column, Table};

use super::{
    all_columns, insertable_columns, key_columns, updatable_columns, ProcedureGenerator,
    ProcedureKind,
};

/// Renders `CREATE PROCEDURE` bodies for MySQL.
#[derive(Debug, Clone, Default)]
pub struct MysqlProcedures {
    dialect: MysqlDialect,
}

impl MysqlProcedures {
    pub fn new() -> Self {
        Self {
            dialect: MysqlDialect::new(),
        }
    }

    fn procedure(
        &self,
        table: &Table,
        kind: ProcedureKind,
        parameters: &[&Column],
        body: &[String],
    ) -> Result<String> {
        let name = self
            .dialect
            .quote_ident(&self.procedure_name(table, kind))?;
        let mut sql = format!(
            "CREATE PROCEDURE {}({})\nBEGIN\n",
            name,
            self.column_names_parameters(parameters)
        );
        for statement in body {
            sql.push_str("    ");
            sql.push_str(statement);
            sql.push_str(";\n");
        }
        sql.push_str("END");
        Ok(sql)
    }

    fn select_list(&self, table: &Table) -> Result<String> {
        Ok(format!(
            "SELECT {} FROM {}",
            self.column_names(&all_columns(table))?,
            self.dialect.quote_ident(&table.name)?
        ))
    }
}

impl ProcedureGenerator for MysqlProcedures {
    fn dialect(&self) -> &dyn Dialect {
        &self.dialect
    }

    /// `IN p_col TYPE, ...`
    fn column_names_parameters(&self, columns: &[&Column]) -> String {
        columns
            .iter()
            .map(|c| format!("IN {} {}", self.parameter_name(&c.name), self.parameter_type(c)))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn select_all(&self, table: &Table) -> Result<String> {
        let body = [self.select_list(table)?];
        self.procedure(table, ProcedureKind::SelectAll, &[], &body)
    }

    fn select_by_key(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        let body = [format!(
            "{} WHERE {}",
            self.select_list(table)?,
            self.primary_key_where(table)?
        )];
        self.procedure(table, ProcedureKind::SelectByKey, &keys, &body)
    }

    fn insert(&self, table: &Table) -> Result<String> {
        let columns = insertable_columns(table);
        let target = self.dialect.quote_ident(&table.name)?;
        let mut body = vec![format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            self.column_names(&columns)?,
            self.parameter_list(&columns)
        )];
        if let Some(identity) = table.identity_column() {
            body.push(format!(
                "SELECT LAST_INSERT_ID() AS {}",
                self.dialect.quote_ident(&identity.name)?
            ));
        }
        self.procedure(table, ProcedureKind::Insert, &columns, &body)
    }

    fn update(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        let updatable = updatable_columns(table);
        let mut parameters = keys.clone();
        parameters.extend(updatable.iter().copied());

        let body = [format!(
            "UPDATE {} SET {} WHERE {}",
            self.dialect.quote_ident(&table.name)?,
            self.assignments(&updatable, ", ")?,
            self.primary_key_where(table)?
        )];
        self.procedure(table, ProcedureKind::Update, &parameters, &body)
    }

    fn delete(&self, table: &Table) -> Result<String> {
        let keys = key_columns(table)?;
        let body = [format!(
            "DELETE FROM {} WHERE {}",
            self.dialect.quote_ident(&table.name)?,
            self.primary_key_where(table)?
        )];
        self.procedure(table, ProcedureKind::Delete, &keys, &body)
    }

    fn drop_statement(&self, table: &Table, kind: ProcedureKind) -> Result<String> {
        Ok(format!(
            "DROP PROCEDURE IF EXISTS {}",
            self.dialect.quote_ident(&self.procedure_name(table, kind))?
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dbgen::tests::users;

    #[test]
    fn test_select_all() {
        let sql = MysqlProcedures::new().select_all(&users()).unwrap();
        assert_eq!(
            sql,
            "CREATE PROCEDURE `users_select_all`()\nBEGIN\n    \
             SELECT `id`, `name`, `email` FROM `users`;\nEND"
        );
    }

    #[test]
    fn test_select_by_key() {
        let sql = MysqlProcedures::new().select_by_key(&users()).unwrap();
        assert!(sql.starts_with("CREATE PROCEDURE `users_select_by_key`(IN p_id INT)"));
        assert!(sql.contains("FROM `users` WHERE `id` = p_id;"));
    }

    #[test]
    fn test_insert_returns_identity() {
        let sql = MysqlProcedures::new().insert(&users()).unwrap();
        assert_eq!(
            sql,
            "CREATE PROCEDURE `users_insert`(IN p_name VARCHAR(100), IN p_email VARCHAR(255))\n\
             BEGIN\n    \
             INSERT INTO `users` (`name`, `email`) VALUES (p_name, p_email);\n    \
             SELECT LAST_INSERT_ID() AS `id`;\n\
             END"
        );
    }

    #[test]
    fn test_update_sets_non_key_columns() {
        let sql = MysqlProcedures::new().update(&users()).unwrap();
        assert!(sql.contains("(IN p_id INT, IN p_name VARCHAR(100), IN p_email VARCHAR(255))"));
        assert!(sql.contains("UPDATE `users` SET `name` = p_name, `email` = p_email WHERE `id` = p_id;"));
    }

    #[test]
    fn test_delete() {
        let sql = MysqlProcedures::new().delete(&users()).unwrap();
        assert!(sql.contains("DELETE FROM `users` WHERE `id` = p_id;"));
    }

    #[test]
    fn test_column_names_parameters() {
        let table = users();
        let gen = MysqlProcedures::new();
        let columns: Vec<&Column> = table.columns.iter().collect();
        assert_eq!(
            gen.column_names_parameters(&columns),
            "IN p_id INT, IN p_name VARCHAR(100), IN p_email VARCHAR(255)"
        );
        assert_eq!(gen.column_names(&columns).unwrap(), "`id`, `name`, `email`");
    }

    #[test]
    fn test_drop_statement() {
        let sql = MysqlProcedures::new()
            .drop_statement(&users(), ProcedureKind::Update)
            .unwrap();
        assert_eq!(sql, "DROP PROCEDURE IF EXISTS `users_update`");
    }
}
