//! Schema introspection through the dialect's `INFORMATION_SCHEMA` queries.

use tracing::debug;

use crate::core::identifier::split_qualified;
use crate::core::row::ResultSet;
use crate::core::traits::Dialect;
use crate::core::value::Params;
use crate::error::Result;
use crate::schema::Table;

use super::Db;

/// `(qualified, params)` for a possibly schema-qualified table name.
fn table_params(table: &str) -> (bool, Params) {
    match split_qualified(table) {
        (Some(schema), name) => (true, Params::new().with("schema", schema).with("table", name)),
        (None, name) => (false, Params::new().with("table", name)),
    }
}

fn column_names(rows: ResultSet) -> Vec<String> {
    rows.iter()
        .filter_map(|row| row.get_str("COLUMN_NAME").map(str::to_string))
        .collect()
}

impl Db {
    pub(crate) async fn tables_inner(&mut self) -> Result<Vec<String>> {
        let sql = self.dialect.tables_query();
        let rows = self.run_query(&sql, &Params::new()).await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get_str("TABLE_NAME").map(str::to_string))
            .collect())
    }

    pub(crate) async fn columns_inner(&mut self, table: &str) -> Result<ResultSet> {
        let (qualified, params) = table_params(table);
        let sql = self.dialect.columns_query(qualified);
        self.run_query(&sql, &params).await
    }

    pub(crate) async fn primary_keys_inner(&mut self, table: &str) -> Result<Vec<String>> {
        let (qualified, params) = table_params(table);
        let sql = self.dialect.primary_keys_query(qualified);
        Ok(column_names(self.run_query(&sql, &params).await?))
    }

    pub(crate) async fn foreign_keys_inner(&mut self, table: &str) -> Result<ResultSet> {
        let (qualified, params) = table_params(table);
        let sql = self.dialect.foreign_keys_query(qualified);
        self.run_query(&sql, &params).await
    }

    pub(crate) async fn identity_column_inner(&mut self, table: &str) -> Result<Option<String>> {
        let (qualified, params) = table_params(table);
        let sql = self.dialect.identity_column_query(qualified);
        Ok(column_names(self.run_query(&sql, &params).await?)
            .into_iter()
            .next())
    }

    pub(crate) async fn constraint_columns_inner(
        &mut self,
        table: &str,
        constraint: Option<&str>,
    ) -> Result<ResultSet> {
        let (qualified, mut params) = table_params(table);
        if let Some(name) = constraint {
            params.set("constraint", name);
        }
        let sql = self
            .dialect
            .constraint_columns_query(qualified, constraint.is_some());
        self.run_query(&sql, &params).await
    }

    pub(crate) async fn table_exists_inner(&mut self, table: &str) -> Result<bool> {
        let (qualified, params) = table_params(table);
        let sql = self.dialect.table_exists_query(qualified);
        let count = self.run_scalar(&sql, &params).await?.as_i64().unwrap_or(0);
        Ok(count > 0)
    }

    /// Table names in the current schema.
    pub async fn get_tables(&mut self) -> Result<Vec<String>> {
        let result = self.tables_inner().await;
        self.finish(result).await
    }

    /// Column rows: `COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH,
    /// IS_NULLABLE, IS_IDENTITY, ORDINAL_POSITION`.
    pub async fn get_columns(&mut self, table: &str) -> Result<ResultSet> {
        let result = self.columns_inner(table).await;
        self.finish(result).await
    }

    /// Primary key column names in key order.
    pub async fn get_primary_keys(&mut self, table: &str) -> Result<Vec<String>> {
        let result = self.primary_keys_inner(table).await;
        self.finish(result).await
    }

    pub async fn get_foreign_keys(&mut self, table: &str) -> Result<ResultSet> {
        let result = self.foreign_keys_inner(table).await;
        self.finish(result).await
    }

    /// `CONSTRAINT_NAME, CONSTRAINT_TYPE` rows.
    pub async fn get_table_constraints(&mut self, table: &str) -> Result<ResultSet> {
        let result = async {
            let (qualified, params) = table_params(table);
            let sql = self.dialect.table_constraints_query(qualified);
            self.run_query(&sql, &params).await
        }
        .await;
        self.finish(result).await
    }

    /// The auto-increment column, if the table has one.
    pub async fn get_identity_column(&mut self, table: &str) -> Result<Option<String>> {
        let result = self.identity_column_inner(table).await;
        self.finish(result).await
    }

    /// Constraint/column pairs, optionally for one named constraint.
    pub async fn get_table_constraints_columns(
        &mut self,
        table: &str,
        constraint: Option<&str>,
    ) -> Result<ResultSet> {
        let result = self.constraint_columns_inner(table, constraint).await;
        self.finish(result).await
    }

    pub async fn table_exists(&mut self, table: &str) -> Result<bool> {
        let result = self.table_exists_inner(table).await;
        self.finish(result).await
    }

    /// Rebuild a [`Table`] descriptor from the live schema.
    pub async fn describe_table(&mut self, table: &str) -> Result<Table> {
        let result = async {
            let mut described = Table::new(table);
            described.accept_columns(&self.columns_inner(table).await?);
            described.accept_constraints(&self.constraint_columns_inner(table, None).await?);
            described.accept_foreign_keys(&self.foreign_keys_inner(table).await?);
            debug!(
                "Described {}: {} column(s), {} constraint(s)",
                table,
                described.columns.len(),
                described.constraints.len()
            );
            Ok(described)
        }
        .await;
        self.finish(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::value::SqlValue;

    #[test]
    fn test_table_params_unqualified() {
        let (qualified, params) = table_params("users");
        assert!(!qualified);
        assert_eq!(params.get("table"), Some(&SqlValue::Text("users".into())));
        assert!(!params.contains("schema"));
    }

    #[test]
    fn test_table_params_qualified() {
        let (qualified, params) = table_params("sales.orders");
        assert!(qualified);
        assert_eq!(params.get("schema"), Some(&SqlValue::Text("sales".into())));
        assert_eq!(params.get("table"), Some(&SqlValue::Text("orders".into())));
    }

    #[test]
    fn test_column_names_reads_standard_alias() {
        let rows = ResultSet::new(vec![
            crate::core::row::Row::new().with("column_name", "id"),
            crate::core::row::Row::new().with("COLUMN_NAME", "tenant_id"),
        ]);
        assert_eq!(column_names(rows), vec!["id", "tenant_id"]);
    }
}
