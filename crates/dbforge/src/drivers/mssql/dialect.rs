//! SQL Server SQL dialect (Strategy pattern).
//!
//! Shared by the `sqlserver` and `dblib` drivers: bracket quoting, `@Pn`
//! placeholders, and pagination through a leading `TOP(n)` or, when an
//! offset is requested, a `ROW_NUMBER()` wrapper.

use crate::core::identifier::QuoteStyle;
use crate::core::traits::{
    Dialect, LimitPlacement, LimitSpec, SelectParts, DEFAULT_STRING_LENGTH,
};
use crate::schema::{Column, DataType};

/// Row-number column added by the pagination wrapper.
pub const ROW_NUMBER_COLUMN: &str = "__row_num";

/// `1` when the column is an identity column.
const IS_IDENTITY_EXPR: &str = "COLUMNPROPERTY(OBJECT_ID(QUOTENAME(c.TABLE_SCHEMA) + '.' + \
     QUOTENAME(c.TABLE_NAME)), c.COLUMN_NAME, 'IsIdentity')";

/// Microsoft SQL Server dialect implementation.
#[derive(Debug, Clone)]
pub struct MssqlDialect {
    name: &'static str,
}

impl Default for MssqlDialect {
    fn default() -> Self {
        Self::new()
    }
}

impl MssqlDialect {
    /// Dialect for the `sqlserver` driver.
    pub fn new() -> Self {
        Self { name: "sqlserver" }
    }

    /// Dialect for the `dblib` (FreeTDS) driver.
    pub fn dblib() -> Self {
        Self { name: "dblib" }
    }
}

impl Dialect for MssqlDialect {
    fn name(&self) -> &str {
        self.name
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Bracket
    }

    fn param_placeholder(&self, index: usize) -> String {
        format!("@P{}", index)
    }

    fn limit_placement(&self, limit: &LimitSpec) -> LimitPlacement {
        if limit.effective_offset().is_some() {
            LimitPlacement::Wrapped
        } else {
            LimitPlacement::Leading
        }
    }

    fn render_select(&self, parts: &SelectParts) -> String {
        let order_suffix = parts
            .order_by
            .as_ref()
            .map(|o| format!(" ORDER BY {}", o))
            .unwrap_or_default();

        let Some(limit) = parts.limit else {
            return format!(
                "SELECT {} {}{}",
                parts.column_list(),
                parts.render_source(),
                order_suffix
            );
        };

        match self.limit_placement(&limit) {
            LimitPlacement::Wrapped => {
                // Callers check the window first; saturate rather than wrap.
                let (first, last) = limit.row_window().unwrap_or((u64::MAX, u64::MAX));
                format!(
                    "SELECT * FROM (SELECT {}, ROW_NUMBER() OVER(ORDER BY {}) AS {} {}) AS __paged \
                     WHERE {} BETWEEN {} AND {} ORDER BY {}",
                    parts.column_list(),
                    parts.wrapper_order(),
                    ROW_NUMBER_COLUMN,
                    parts.render_source(),
                    ROW_NUMBER_COLUMN,
                    first,
                    last,
                    ROW_NUMBER_COLUMN
                )
            }
            _ => format!(
                "SELECT TOP({}) {} {}{}",
                limit.count,
                parts.column_list(),
                parts.render_source(),
                order_suffix
            ),
        }
    }

    fn current_schema_expr(&self) -> &'static str {
        "SCHEMA_NAME()"
    }

    fn tables_query(&self) -> String {
        "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = SCHEMA_NAME() AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME"
            .to_string()
    }

    fn columns_query(&self, qualified: bool) -> String {
        format!(
            "SELECT c.COLUMN_NAME, c.DATA_TYPE, c.CHARACTER_MAXIMUM_LENGTH, c.IS_NULLABLE, \
             CAST(ISNULL({}, 0) AS INT) AS IS_IDENTITY, c.ORDINAL_POSITION \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             WHERE {} AND c.TABLE_NAME = :table \
             ORDER BY c.ORDINAL_POSITION",
            IS_IDENTITY_EXPR,
            self.schema_predicate("c.TABLE_SCHEMA", qualified)
        )
    }

    fn primary_keys_query(&self, qualified: bool) -> String {
        format!(
            "SELECT k.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS t \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
               ON k.CONSTRAINT_NAME = t.CONSTRAINT_NAME \
              AND k.TABLE_SCHEMA = t.TABLE_SCHEMA \
              AND k.TABLE_NAME = t.TABLE_NAME \
             WHERE t.CONSTRAINT_TYPE = 'PRIMARY KEY' AND {} AND t.TABLE_NAME = :table \
             ORDER BY k.ORDINAL_POSITION",
            self.schema_predicate("t.TABLE_SCHEMA", qualified)
        )
    }

    fn foreign_keys_query(&self, qualified: bool) -> String {
        format!(
            "SELECT k.CONSTRAINT_NAME, k.COLUMN_NAME, \
             u.TABLE_NAME AS REFERENCED_TABLE_NAME, \
             u.COLUMN_NAME AS REFERENCED_COLUMN_NAME, \
             r.UPDATE_RULE, r.DELETE_RULE \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS t \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
               ON k.CONSTRAINT_NAME = t.CONSTRAINT_NAME \
              AND k.CONSTRAINT_SCHEMA = t.CONSTRAINT_SCHEMA \
             JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS r \
               ON r.CONSTRAINT_NAME = t.CONSTRAINT_NAME \
              AND r.CONSTRAINT_SCHEMA = t.CONSTRAINT_SCHEMA \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE u \
               ON u.CONSTRAINT_NAME = r.UNIQUE_CONSTRAINT_NAME \
              AND u.CONSTRAINT_SCHEMA = r.UNIQUE_CONSTRAINT_SCHEMA \
              AND u.ORDINAL_POSITION = k.ORDINAL_POSITION \
             WHERE t.CONSTRAINT_TYPE = 'FOREIGN KEY' AND {} AND t.TABLE_NAME = :table \
             ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
            self.schema_predicate("t.TABLE_SCHEMA", qualified)
        )
    }

    fn table_constraints_query(&self, qualified: bool) -> String {
        format!(
            "SELECT CONSTRAINT_NAME, CONSTRAINT_TYPE \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS \
             WHERE {} AND TABLE_NAME = :table \
             ORDER BY CONSTRAINT_NAME",
            self.schema_predicate("TABLE_SCHEMA", qualified)
        )
    }

    fn constraint_columns_query(&self, qualified: bool, named: bool) -> String {
        format!(
            "SELECT t.CONSTRAINT_NAME, t.CONSTRAINT_TYPE, k.COLUMN_NAME, k.ORDINAL_POSITION \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS t \
             JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
               ON k.CONSTRAINT_NAME = t.CONSTRAINT_NAME \
              AND k.TABLE_SCHEMA = t.TABLE_SCHEMA \
              AND k.TABLE_NAME = t.TABLE_NAME \
             WHERE {} AND t.TABLE_NAME = :table{} \
             ORDER BY t.CONSTRAINT_NAME, k.ORDINAL_POSITION",
            self.schema_predicate("t.TABLE_SCHEMA", qualified),
            if named { " AND t.CONSTRAINT_NAME = :constraint" } else { "" }
        )
    }

    fn identity_column_query(&self, qualified: bool) -> String {
        format!(
            "SELECT TOP(1) c.COLUMN_NAME \
             FROM INFORMATION_SCHEMA.COLUMNS c \
             WHERE {} AND c.TABLE_NAME = :table AND {} = 1 \
             ORDER BY c.ORDINAL_POSITION",
            self.schema_predicate("c.TABLE_SCHEMA", qualified),
            IS_IDENTITY_EXPR
        )
    }

    fn table_exists_query(&self, qualified: bool) -> String {
        format!(
            "SELECT COUNT(*) AS TABLE_COUNT FROM INFORMATION_SCHEMA.TABLES \
             WHERE {} AND TABLE_NAME = :table",
            self.schema_predicate("TABLE_SCHEMA", qualified)
        )
    }

    fn column_type(&self, column: &Column) -> String {
        let base = match column.data_type_or_default() {
            DataType::String => format!(
                "NVARCHAR({})",
                column.character_length.unwrap_or(DEFAULT_STRING_LENGTH)
            ),
            DataType::Text => "NVARCHAR(MAX)".to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Int => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
            DataType::Float => "FLOAT".to_string(),
            DataType::Bool => "BIT".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Timestamp => "DATETIME2".to_string(),
            DataType::Uuid => "UNIQUEIDENTIFIER".to_string(),
            DataType::Point => "GEOGRAPHY".to_string(),
            DataType::Other(name) => name.to_uppercase(),
        };
        if column.is_auto_increment {
            format!("{} IDENTITY(1,1)", base)
        } else {
            base
        }
    }

    fn begin_transaction_sql(&self) -> &'static str {
        "BEGIN TRANSACTION"
    }

    fn commit_sql(&self) -> &'static str {
        "COMMIT TRANSACTION"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK TRANSACTION"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(limit: Option<LimitSpec>, order_by: Option<&str>) -> SelectParts {
        SelectParts {
            from: "users".into(),
            where_clause: Some("age = :age1".into()),
            order_by: order_by.map(String::from),
            limit,
            ..Default::default()
        }
    }

    #[test]
    fn test_quote_ident() {
        let dialect = MssqlDialect::new();
        assert_eq!(dialect.quote_ident("users").unwrap(), "[users]");
        assert_eq!(dialect.quote_ident("user]table").unwrap(), "[user]]table]");
        assert_eq!(dialect.quote_ident("dbo.users").unwrap(), "[dbo].[users]");
    }

    #[test]
    fn test_names() {
        assert_eq!(MssqlDialect::new().name(), "sqlserver");
        assert_eq!(MssqlDialect::dblib().name(), "dblib");
        assert_eq!(MssqlDialect::dblib().param_placeholder(2), "@P2");
    }

    #[test]
    fn test_leading_top_without_offset() {
        let dialect = MssqlDialect::new();
        let sql = dialect.render_select(&parts(Some(LimitSpec::new(10, None)), Some("name")));
        assert_eq!(
            sql,
            "SELECT TOP(10) * FROM users WHERE age = :age1 ORDER BY name"
        );

        let zero = dialect.render_select(&parts(Some(LimitSpec::new(10, Some(0))), None));
        assert_eq!(zero, "SELECT TOP(10) * FROM users WHERE age = :age1");
    }

    #[test]
    fn test_offset_always_uses_row_number_wrapper() {
        let dialect = MssqlDialect::dblib();
        let sql = dialect.render_select(&parts(Some(LimitSpec::new(5, Some(5))), Some("id")));
        assert!(sql.contains("WHERE __row_num BETWEEN 6 AND 10"));
        assert!(!sql.contains("FETCH NEXT"));
    }

    #[test]
    fn test_row_number_wrapper_with_offset() {
        let dialect = MssqlDialect::new();
        let sql = dialect.render_select(&parts(Some(LimitSpec::new(10, Some(20))), Some("name")));
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT *, ROW_NUMBER() OVER(ORDER BY name) AS __row_num \
             FROM users WHERE age = :age1) AS __paged \
             WHERE __row_num BETWEEN 21 AND 30 ORDER BY __row_num"
        );
    }

    #[test]
    fn test_row_number_wrapper_uses_fallback_order() {
        let dialect = MssqlDialect::new();
        let mut p = parts(Some(LimitSpec::new(5, Some(5))), None);
        assert!(dialect
            .render_select(&p)
            .contains("ROW_NUMBER() OVER(ORDER BY (SELECT NULL))"));

        p.fallback_order = Some("[id]".into());
        assert!(dialect
            .render_select(&p)
            .contains("ROW_NUMBER() OVER(ORDER BY [id])"));
    }

    #[test]
    fn test_identity_column_type() {
        let dialect = MssqlDialect::new();
        let mut column = Column::new("id", "users");
        column.data_type = Some(DataType::Int);
        column.is_auto_increment = true;
        assert_eq!(dialect.column_type(&column), "INT IDENTITY(1,1)");
    }

    #[test]
    fn test_identity_query_uses_columnproperty() {
        let sql = MssqlDialect::dblib().identity_column_query(false);
        assert!(sql.contains("'IsIdentity') = 1"));
        assert!(sql.contains("c.TABLE_SCHEMA = SCHEMA_NAME()"));
    }
}
