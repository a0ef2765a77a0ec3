//! PostgreSQL SQL dialect (Strategy pattern).
//!
//! Double-quote identifiers, `$n` placeholders and `LIMIT n OFFSET m`.
//! information_schema columns are domain types, so every introspection
//! column is cast to a plain type.

use crate::core::identifier::QuoteStyle;
use crate::core::traits::{Dialect, LimitPlacement, LimitSpec, DEFAULT_STRING_LENGTH};
use crate::schema::{Column, DataType};

/// Identity or serial-backed column.
const IS_IDENTITY_EXPR: &str =
    "(c.is_identity = 'YES' OR COALESCE(c.column_default, '') LIKE 'nextval(%')";

/// PostgreSQL dialect implementation.
#[derive(Debug, Clone, Default)]
pub struct PostgresDialect;

impl PostgresDialect {
    /// Create a new PostgreSQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for PostgresDialect {
    fn name(&self) -> &str {
        "postgres"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::DoubleQuote
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("${}", index)
    }

    fn limit_placement(&self, _limit: &LimitSpec) -> LimitPlacement {
        LimitPlacement::Trailing
    }

    fn current_schema_expr(&self) -> &'static str {
        "current_schema()"
    }

    fn tables_query(&self) -> String {
        "SELECT table_name::text AS TABLE_NAME \
         FROM information_schema.tables \
         WHERE table_schema = current_schema() AND table_type = 'BASE TABLE' \
         ORDER BY table_name"
            .to_string()
    }

    fn columns_query(&self, qualified: bool) -> String {
        format!(
            "SELECT c.column_name::text AS COLUMN_NAME, \
             c.data_type::text AS DATA_TYPE, \
             c.character_maximum_length::int AS CHARACTER_MAXIMUM_LENGTH, \
             c.is_nullable::text AS IS_NULLABLE, \
             CASE WHEN {} THEN 1 ELSE 0 END AS IS_IDENTITY, \
             c.ordinal_position::int AS ORDINAL_POSITION \
             FROM information_schema.columns c \
             WHERE {} AND c.table_name = :table \
             ORDER BY c.ordinal_position",
            IS_IDENTITY_EXPR,
            self.schema_predicate("c.table_schema", qualified)
        )
    }

    fn primary_keys_query(&self, qualified: bool) -> String {
        format!(
            "SELECT k.column_name::text AS COLUMN_NAME \
             FROM information_schema.table_constraints t \
             JOIN information_schema.key_column_usage k \
               ON k.constraint_name = t.constraint_name \
              AND k.table_schema = t.table_schema \
              AND k.table_name = t.table_name \
             WHERE t.constraint_type = 'PRIMARY KEY' AND {} AND t.table_name = :table \
             ORDER BY k.ordinal_position",
            self.schema_predicate("t.table_schema", qualified)
        )
    }

    fn foreign_keys_query(&self, qualified: bool) -> String {
        format!(
            "SELECT k.constraint_name::text AS CONSTRAINT_NAME, \
             k.column_name::text AS COLUMN_NAME, \
             u.table_name::text AS REFERENCED_TABLE_NAME, \
             u.column_name::text AS REFERENCED_COLUMN_NAME, \
             r.update_rule::text AS UPDATE_RULE, \
             r.delete_rule::text AS DELETE_RULE \
             FROM information_schema.table_constraints t \
             JOIN information_schema.key_column_usage k \
               ON k.constraint_name = t.constraint_name \
              AND k.constraint_schema = t.constraint_schema \
             JOIN information_schema.referential_constraints r \
               ON r.constraint_name = t.constraint_name \
              AND r.constraint_schema = t.constraint_schema \
             JOIN information_schema.key_column_usage u \
               ON u.constraint_name = r.unique_constraint_name \
              AND u.constraint_schema = r.unique_constraint_schema \
              AND u.ordinal_position = k.position_in_unique_constraint \
             WHERE t.constraint_type = 'FOREIGN KEY' AND {} AND t.table_name = :table \
             ORDER BY k.constraint_name, k.ordinal_position",
            self.schema_predicate("t.table_schema", qualified)
        )
    }

    fn table_constraints_query(&self, qualified: bool) -> String {
        format!(
            "SELECT constraint_name::text AS CONSTRAINT_NAME, \
             constraint_type::text AS CONSTRAINT_TYPE \
             FROM information_schema.table_constraints \
             WHERE {} AND table_name = :table \
             ORDER BY constraint_name",
            self.schema_predicate("table_schema", qualified)
        )
    }

    fn constraint_columns_query(&self, qualified: bool, named: bool) -> String {
        format!(
            "SELECT t.constraint_name::text AS CONSTRAINT_NAME, \
             t.constraint_type::text AS CONSTRAINT_TYPE, \
             k.column_name::text AS COLUMN_NAME, \
             k.ordinal_position::int AS ORDINAL_POSITION \
             FROM information_schema.table_constraints t \
             JOIN information_schema.key_column_usage k \
               ON k.constraint_name = t.constraint_name \
              AND k.table_schema = t.table_schema \
              AND k.table_name = t.table_name \
             WHERE {} AND t.table_name = :table{} \
             ORDER BY t.constraint_name, k.ordinal_position",
            self.schema_predicate("t.table_schema", qualified),
            if named { " AND t.constraint_name = :constraint" } else { "" }
        )
    }

    fn identity_column_query(&self, qualified: bool) -> String {
        format!(
            "SELECT c.column_name::text AS COLUMN_NAME \
             FROM information_schema.columns c \
             WHERE {} AND c.table_name = :table AND {} \
             ORDER BY c.ordinal_position \
             LIMIT 1",
            self.schema_predicate("c.table_schema", qualified),
            IS_IDENTITY_EXPR
        )
    }

    fn table_exists_query(&self, qualified: bool) -> String {
        format!(
            "SELECT COUNT(*) AS TABLE_COUNT FROM information_schema.tables \
             WHERE {} AND table_name = :table",
            self.schema_predicate("table_schema", qualified)
        )
    }

    fn column_type(&self, column: &Column) -> String {
        match column.data_type_or_default() {
            DataType::SmallInt if column.is_auto_increment => "SMALLSERIAL".to_string(),
            DataType::Int if column.is_auto_increment => "SERIAL".to_string(),
            DataType::BigInt if column.is_auto_increment => "BIGSERIAL".to_string(),
            DataType::String => format!(
                "VARCHAR({})",
                column.character_length.unwrap_or(DEFAULT_STRING_LENGTH)
            ),
            DataType::Text => "TEXT".to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Int => "INTEGER".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Decimal { precision, scale } => format!("NUMERIC({},{})", precision, scale),
            DataType::Float => "DOUBLE PRECISION".to_string(),
            DataType::Bool => "BOOLEAN".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Timestamp => "TIMESTAMP".to_string(),
            DataType::Uuid => "UUID".to_string(),
            DataType::Point => "POINT".to_string(),
            DataType::Other(name) => name.to_uppercase(),
        }
    }

    fn begin_transaction_sql(&self) -> &'static str {
        "BEGIN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::traits::SelectParts;

    #[test]
    fn test_quote_ident() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.quote_ident("users").unwrap(), "\"users\"");
        assert_eq!(dialect.quote_ident("table\"name").unwrap(), "\"table\"\"name\"");
        assert_eq!(dialect.quote_ident("public.users").unwrap(), "\"public\".\"users\"");
    }

    #[test]
    fn test_param_placeholder() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.param_placeholder(1), "$1");
        assert_eq!(dialect.param_placeholder(10), "$10");
    }

    #[test]
    fn test_render_select_limit_offset() {
        let dialect = PostgresDialect::new();
        let parts = SelectParts {
            columns: "id, name".into(),
            from: "users".into(),
            order_by: Some("name".into()),
            limit: Some(LimitSpec::new(10, Some(20))),
            ..Default::default()
        };
        assert_eq!(
            dialect.render_select(&parts),
            "SELECT id, name FROM users ORDER BY name LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn test_render_limit_without_offset() {
        let dialect = PostgresDialect::new();
        assert_eq!(dialect.render_limit(&LimitSpec::new(5, None)), "LIMIT 5");
        assert_eq!(
            dialect.render_limit(&LimitSpec::new(5, Some(0))),
            "LIMIT 5 OFFSET 0"
        );
    }

    #[test]
    fn test_serial_column_types() {
        let dialect = PostgresDialect::new();
        let mut column = Column::new("id", "users");
        column.data_type = Some(DataType::Int);
        column.is_auto_increment = true;
        assert_eq!(dialect.column_type(&column), "SERIAL");

        column.data_type = Some(DataType::BigInt);
        assert_eq!(dialect.column_type(&column), "BIGSERIAL");

        column.is_auto_increment = false;
        column.data_type = Some(DataType::Decimal { precision: 10, scale: 4 });
        assert_eq!(dialect.column_type(&column), "NUMERIC(10,4)");
    }

    #[test]
    fn test_introspection_casts_domains() {
        let dialect = PostgresDialect::new();
        let sql = dialect.foreign_keys_query(false);
        assert!(sql.contains("REFERENCED_TABLE_NAME"));
        assert!(sql.contains("t.table_schema = current_schema()"));
        assert!(dialect.identity_column_query(true).contains("c.table_schema = :schema"));
    }
}
