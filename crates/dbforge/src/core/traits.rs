//! Core traits for dialect-aware SQL generation and execution.
//!
//! - [`Dialect`]: SQL syntax strategy for one database engine
//! - [`DbConnection`]: a single live handle that executes parameterized SQL
//!
//! # Design Patterns
//!
//! - **Strategy**: `Dialect` implementations provide interchangeable SQL syntax
//! - **Template Method**: default trait methods (`render_select`,
//!   `column_definition`) define the algorithm skeleton that dialects refine

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{DbError, Result};
use crate::schema::Column;

use super::identifier::{quote_qualified, QuoteStyle};
use super::row::{ResultSet, Row};
use super::value::SqlValue;

/// Pagination request: at most `count` rows, optionally skipping `offset` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitSpec {
    pub count: u64,
    pub offset: Option<u64>,
}

impl LimitSpec {
    pub fn new(count: u64, offset: Option<u64>) -> Self {
        Self { count, offset }
    }

    /// Offset to skip, treating an explicit zero as "no offset".
    pub fn effective_offset(&self) -> Option<u64> {
        self.offset.filter(|o| *o > 0)
    }

    /// 1-based numbers of the first and last selected row, or `None` when
    /// they do not fit in a `u64`.
    pub fn row_window(&self) -> Option<(u64, u64)> {
        let offset = self.offset.unwrap_or(0);
        Some((offset.checked_add(1)?, offset.checked_add(self.count)?))
    }

    /// Reject a limit whose row window overflows.
    pub fn check(&self) -> Result<()> {
        match self.row_window() {
            Some(_) => Ok(()),
            None => Err(DbError::Config(format!(
                "limit {} with offset {} is out of range",
                self.count,
                self.offset.unwrap_or(0)
            ))),
        }
    }
}

/// Where a dialect places its pagination clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitPlacement {
    /// `... LIMIT n` after ORDER BY (MySQL, PostgreSQL).
    Trailing,
    /// `SELECT TOP(n) ...` (SQL Server without offset).
    Leading,
    /// `ROW_NUMBER() OVER(ORDER BY ...)` subquery wrapper (SQL Server with offset).
    Wrapped,
}

/// The clauses of one SELECT statement, already rendered as SQL fragments.
#[derive(Debug, Clone, Default)]
pub struct SelectParts {
    /// Column list (`*` when empty).
    pub columns: String,
    /// Table expression after FROM.
    pub from: String,
    /// Join fragments in call order.
    pub joins: Vec<String>,
    /// Predicate body without the WHERE keyword.
    pub where_clause: Option<String>,
    /// Ordering body without the ORDER BY keywords.
    pub order_by: Option<String>,
    pub limit: Option<LimitSpec>,
    /// Ordering used by a wrapped pagination when `order_by` is empty.
    pub fallback_order: Option<String>,
}

impl SelectParts {
    /// Column list, defaulting to `*`.
    pub fn column_list(&self) -> &str {
        if self.columns.trim().is_empty() {
            "*"
        } else {
            &self.columns
        }
    }

    /// `FROM ... [joins] [WHERE ...]` (no ordering, no pagination).
    pub fn render_source(&self) -> String {
        let mut sql = format!("FROM {}", self.from);
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if let Some(ref predicate) = self.where_clause {
            sql.push_str(" WHERE ");
            sql.push_str(predicate);
        }
        sql
    }

    /// Ordering for wrapped pagination: explicit ORDER BY, then the fallback,
    /// then a constant sort.
    pub fn wrapper_order(&self) -> &str {
        self.order_by
            .as_deref()
            .or(self.fallback_order.as_deref())
            .unwrap_or("(SELECT NULL)")
    }
}

/// SQL syntax strategy for different database engines.
///
/// Introspection queries return standardized column aliases so callers can
/// read rows the same way for every driver:
///
/// | query | columns |
/// |---|---|
/// | tables | `TABLE_NAME` |
/// | columns | `COLUMN_NAME, DATA_TYPE, CHARACTER_MAXIMUM_LENGTH, IS_NULLABLE, IS_IDENTITY, ORDINAL_POSITION` |
/// | primary keys / identity | `COLUMN_NAME` |
/// | foreign keys | `CONSTRAINT_NAME, COLUMN_NAME, REFERENCED_TABLE_NAME, REFERENCED_COLUMN_NAME, UPDATE_RULE, DELETE_RULE` |
/// | constraints | `CONSTRAINT_NAME, CONSTRAINT_TYPE` |
/// | constraint columns | `CONSTRAINT_NAME, CONSTRAINT_TYPE, COLUMN_NAME, ORDINAL_POSITION` |
/// | table exists | one count column |
///
/// Every query binds `:table`; when `qualified` is true it also binds
/// `:schema`, otherwise the connection's current schema is used.
pub trait Dialect: Send + Sync {
    /// Get the dialect identifier (e.g., "mysql", "postgres", "sqlserver", "dblib").
    fn name(&self) -> &str;

    /// Identifier quoting convention.
    fn quote_style(&self) -> QuoteStyle;

    /// Quote an identifier (dotted names are quoted part by part).
    fn quote_ident(&self, name: &str) -> Result<String> {
        quote_qualified(name, self.quote_style())
    }

    /// Get a positional parameter placeholder for the given 1-based index.
    ///
    /// - MySQL: `?`
    /// - PostgreSQL: `$1`, `$2`, etc.
    /// - SQL Server: `@P1`, `@P2`, etc.
    fn param_placeholder(&self, index: usize) -> String;

    /// Where pagination goes for this request.
    fn limit_placement(&self, limit: &LimitSpec) -> LimitPlacement;

    /// Trailing pagination fragment, `LIMIT n [OFFSET m]` unless overridden.
    fn render_limit(&self, limit: &LimitSpec) -> String {
        match limit.offset {
            Some(offset) => format!("LIMIT {} OFFSET {}", limit.count, offset),
            None => format!("LIMIT {}", limit.count),
        }
    }

    /// Assemble a full SELECT.
    ///
    /// The default handles trailing pagination; dialects with leading or
    /// wrapped pagination override it.
    fn render_select(&self, parts: &SelectParts) -> String {
        let mut sql = format!("SELECT {} {}", parts.column_list(), parts.render_source());
        if let Some(ref order) = parts.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order);
        }
        if let Some(ref limit) = parts.limit {
            sql.push(' ');
            sql.push_str(&self.render_limit(limit));
        }
        sql
    }

    /// Expression for the connection's current schema/database.
    fn current_schema_expr(&self) -> &'static str;

    /// `<column> = :schema` or `<column> = <current schema>`.
    fn schema_predicate(&self, column: &str, qualified: bool) -> String {
        if qualified {
            format!("{} = :schema", column)
        } else {
            format!("{} = {}", column, self.current_schema_expr())
        }
    }

    fn tables_query(&self) -> String;
    fn columns_query(&self, qualified: bool) -> String;
    fn primary_keys_query(&self, qualified: bool) -> String;
    fn foreign_keys_query(&self, qualified: bool) -> String;
    fn table_constraints_query(&self, qualified: bool) -> String;

    /// Constraint/column pairs; `named` adds a `:constraint` filter.
    fn constraint_columns_query(&self, qualified: bool, named: bool) -> String;

    fn identity_column_query(&self, qualified: bool) -> String;
    fn table_exists_query(&self, qualified: bool) -> String;

    /// DDL type for a column.
    fn column_type(&self, column: &Column) -> String;

    /// Full column definition for CREATE TABLE.
    fn column_definition(&self, column: &Column) -> Result<String> {
        let nullability = if column.is_nullable && !column.is_primary_key {
            "NULL"
        } else {
            "NOT NULL"
        };
        Ok(format!(
            "{} {} {}",
            self.quote_ident(&column.name)?,
            self.column_type(column),
            nullability
        ))
    }

    /// Statement that opens a transaction.
    fn begin_transaction_sql(&self) -> &'static str;

    fn commit_sql(&self) -> &'static str {
        "COMMIT"
    }

    fn rollback_sql(&self) -> &'static str {
        "ROLLBACK"
    }

    fn truncate_sql(&self, table: &str) -> Result<String> {
        Ok(format!("TRUNCATE TABLE {}", self.quote_ident(table)?))
    }
}

/// Default VARCHAR length when a string column has no explicit length.
pub const DEFAULT_STRING_LENGTH: u32 = 255;

/// A single live database handle.
///
/// Positional parameters are passed in the order their placeholders appear in
/// `sql`, which must already use the dialect's placeholder syntax.
#[async_trait]
pub trait DbConnection: Send {
    /// Run a statement that returns rows and materialize them.
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet>;

    /// Run a statement and return the number of affected rows.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64>;

    /// Run a statement and send rows into `tx` one at a time.
    ///
    /// Stops early without error when the receiver is dropped.
    async fn stream(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<()>;

    /// Run parameterless SQL (transaction control, DDL).
    async fn batch_execute(&mut self, sql: &str) -> Result<()>;

    /// Get the database type identifier.
    fn db_type(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limit_row_window() {
        assert_eq!(LimitSpec::new(10, Some(20)).row_window(), Some((21, 30)));
        assert_eq!(LimitSpec::new(5, None).row_window(), Some((1, 5)));
        assert!(LimitSpec::new(10, Some(u64::MAX)).row_window().is_none());
        assert!(LimitSpec::new(u64::MAX, Some(1)).check().is_err());
        assert!(LimitSpec::new(u64::MAX, None).check().is_ok());
    }

    #[test]
    fn test_limit_effective_offset() {
        assert_eq!(LimitSpec::new(10, None).effective_offset(), None);
        assert_eq!(LimitSpec::new(10, Some(0)).effective_offset(), None);
        assert_eq!(LimitSpec::new(10, Some(20)).effective_offset(), Some(20));
    }

    #[test]
    fn test_select_parts_source_order() {
        let parts = SelectParts {
            from: "users u".into(),
            joins: vec!["INNER JOIN roles r ON u.role_id = r.id".into()],
            where_clause: Some("u.age = :u_age1".into()),
            ..Default::default()
        };
        assert_eq!(parts.column_list(), "*");
        assert_eq!(
            parts.render_source(),
            "FROM users u INNER JOIN roles r ON u.role_id = r.id WHERE u.age = :u_age1"
        );
    }

    #[test]
    fn test_wrapper_order_fallbacks() {
        let mut parts = SelectParts::default();
        assert_eq!(parts.wrapper_order(), "(SELECT NULL)");
        parts.fallback_order = Some("id".into());
        assert_eq!(parts.wrapper_order(), "id");
        parts.order_by = Some("name DESC".into());
        assert_eq!(parts.wrapper_order(), "name DESC");
    }
}
