//! MySQL/MariaDB SQL dialect (Strategy pattern).
//!
//! Backtick quoting, `?` placeholders, trailing `LIMIT offset, count`
//! pagination and INFORMATION_SCHEMA introspection scoped to `DATABASE()`.

use crate::core::identifier::QuoteStyle;
use crate::core::traits::{Dialect, LimitPlacement, LimitSpec, DEFAULT_STRING_LENGTH};
use crate::schema::{Column, DataType};

/// MySQL/MariaDB dialect implementation.
///
/// Compatible with MySQL 5.7+, 8.0+, and MariaDB 10.2+.
#[derive(Debug, Clone, Default)]
pub struct MysqlDialect;

impl MysqlDialect {
    /// Create a new MySQL dialect instance.
    pub fn new() -> Self {
        Self
    }
}

impl Dialect for MysqlDialect {
    fn name(&self) -> &str {
        "mysql"
    }

    fn quote_style(&self) -> QuoteStyle {
        QuoteStyle::Backtick
    }

    fn param_placeholder(&self, _index: usize) -> String {
        "?".to_string()
    }

    fn limit_placement(&self, _limit: &LimitSpec) -> LimitPlacement {
        LimitPlacement::Trailing
    }

    fn render_limit(&self, limit: &LimitSpec) -> String {
        match limit.offset {
            Some(offset) => format!("LIMIT {}, {}", offset, limit.count),
            None => format!("LIMIT {}", limit.count),
        }
    }

    fn current_schema_expr(&self) -> &'static str {
        "DATABASE()"
    }

    fn tables_query(&self) -> String {
        "SELECT CAST(TABLE_NAME AS CHAR(255)) AS TABLE_NAME \
         FROM INFORMATION_SCHEMA.TABLES \
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE' \
         ORDER BY TABLE_NAME"
            .to_string()
    }

    fn columns_query(&self, qualified: bool) -> String {
        format!(
            "SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME, \
             CAST(DATA_TYPE AS CHAR(255)) AS DATA_TYPE, \
             CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS CHARACTER_MAXIMUM_LENGTH, \
             CAST(IS_NULLABLE AS CHAR(3)) AS IS_NULLABLE, \
             CASE WHEN EXTRA LIKE '%auto_increment%' THEN 1 ELSE 0 END AS IS_IDENTITY, \
             CAST(ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE {} AND TABLE_NAME = :table \
             ORDER BY ORDINAL_POSITION",
            self.schema_predicate("TABLE_SCHEMA", qualified)
        )
    }

    fn primary_keys_query(&self, qualified: bool) -> String {
        format!(
            "SELECT CAST(k.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME \
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
            "SELECT CAST(k.CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME, \
             CAST(k.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME, \
             CAST(k.REFERENCED_TABLE_NAME AS CHAR(255)) AS REFERENCED_TABLE_NAME, \
             CAST(k.REFERENCED_COLUMN_NAME AS CHAR(255)) AS REFERENCED_COLUMN_NAME, \
             CAST(r.UPDATE_RULE AS CHAR(64)) AS UPDATE_RULE, \
             CAST(r.DELETE_RULE AS CHAR(64)) AS DELETE_RULE \
             FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE k \
             JOIN INFORMATION_SCHEMA.REFERENTIAL_CONSTRAINTS r \
               ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA \
              AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME \
             WHERE {} AND k.TABLE_NAME = :table AND k.REFERENCED_TABLE_NAME IS NOT NULL \
             ORDER BY k.CONSTRAINT_NAME, k.ORDINAL_POSITION",
            self.schema_predicate("k.TABLE_SCHEMA", qualified)
        )
    }

    fn table_constraints_query(&self, qualified: bool) -> String {
        format!(
            "SELECT CAST(CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME, \
             CAST(CONSTRAINT_TYPE AS CHAR(64)) AS CONSTRAINT_TYPE \
             FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS \
             WHERE {} AND TABLE_NAME = :table \
             ORDER BY CONSTRAINT_NAME",
            self.schema_predicate("TABLE_SCHEMA", qualified)
        )
    }

    fn constraint_columns_query(&self, qualified: bool, named: bool) -> String {
        format!(
            "SELECT CAST(t.CONSTRAINT_NAME AS CHAR(255)) AS CONSTRAINT_NAME, \
             CAST(t.CONSTRAINT_TYPE AS CHAR(64)) AS CONSTRAINT_TYPE, \
             CAST(k.COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME, \
             CAST(k.ORDINAL_POSITION AS SIGNED) AS ORDINAL_POSITION \
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
            "SELECT CAST(COLUMN_NAME AS CHAR(255)) AS COLUMN_NAME \
             FROM INFORMATION_SCHEMA.COLUMNS \
             WHERE {} AND TABLE_NAME = :table AND EXTRA LIKE '%auto_increment%' \
             LIMIT 1",
            self.schema_predicate("TABLE_SCHEMA", qualified)
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
        match column.data_type_or_default() {
            DataType::String => format!(
                "VARCHAR({})",
                column.character_length.unwrap_or(DEFAULT_STRING_LENGTH)
            ),
            DataType::Text => "TEXT".to_string(),
            DataType::SmallInt => "SMALLINT".to_string(),
            DataType::Int => "INT".to_string(),
            DataType::BigInt => "BIGINT".to_string(),
            DataType::Decimal { precision, scale } => format!("DECIMAL({},{})", precision, scale),
            DataType::Float => "DOUBLE".to_string(),
            DataType::Bool => "TINYINT(1)".to_string(),
            DataType::Date => "DATE".to_string(),
            DataType::Timestamp => "DATETIME".to_string(),
            DataType::Uuid => "CHAR(36)".to_string(),
            DataType::Point => "POINT".to_string(),
            DataType::Other(name) => name.to_uppercase(),
        }
    }

    fn column_definition(&self, column: &Column) -> crate::error::Result<String> {
        let nullability = if column.is_nullable && !column.is_primary_key {
            "NULL"
        } else {
            "NOT NULL"
        };
        let mut def = format!(
            "{} {} {}",
            self.quote_ident(&column.name)?,
            self.column_type(column),
            nullability
        );
        if column.is_auto_increment {
            def.push_str(" AUTO_INCREMENT");
        }
        Ok(def)
    }

    fn begin_transaction_sql(&self) -> &'static str {
        "START TRANSACTION"
    }
}
