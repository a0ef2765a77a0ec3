//! Fluent clause setters and SELECT-based terminal operations.

use serde::de::DeserializeOwned;

use crate::core::row::{ResultSet, Row};
use crate::core::traits::{Dialect, LimitPlacement, LimitSpec, SelectParts};
use crate::core::value::{Params, SqlValue};
use crate::drivers::mssql::ROW_NUMBER_COLUMN;
use crate::error::{DbError, Result};

use super::state::{Conjunction, Order};
use super::Db;

impl Db {
    // ===== Clause setters =====

    /// Set the table for the next query.
    pub fn from(&mut self, table: &str) -> &mut Self {
        self.state.set_from(table);
        self
    }

    /// Add columns to the select list; repeated calls accumulate.
    pub fn select(&mut self, columns: &str) -> &mut Self {
        self.state.push_select(columns);
        self
    }

    /// `column = :param`, or `column IS NULL` for a NULL value.
    pub fn where_eq(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.push_equality(Conjunction::And, column, value.into());
        self
    }

    /// `OR column = :param`.
    pub fn or_where(&mut self, column: &str, value: impl Into<SqlValue>) -> &mut Self {
        self.push_equality(Conjunction::Or, column, value.into());
        self
    }

    /// Add a caller-authored boolean fragment, ANDed with the rest.
    pub fn where_raw(&mut self, fragment: &str) -> &mut Self {
        self.state
            .push_predicate(Conjunction::And, fragment.trim().to_string());
        self
    }

    /// One AND-equality per entry; NULL entries are skipped.
    pub fn where_map(&mut self, values: &Params) -> &mut Self {
        for (column, value) in values.iter() {
            if value.is_null() {
                continue;
            }
            self.push_equality(Conjunction::And, column, value.clone());
        }
        self
    }

    /// Case-insensitive `LIKE`; the pattern is bound as given.
    pub fn like(&mut self, column: &str, pattern: &str) -> &mut Self {
        self.push_like(Conjunction::And, column, pattern);
        self
    }

    pub fn or_like(&mut self, column: &str, pattern: &str) -> &mut Self {
        self.push_like(Conjunction::Or, column, pattern);
        self
    }

    /// `column BETWEEN :low AND :high`.
    pub fn where_between(
        &mut self,
        column: &str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> &mut Self {
        self.push_between(Conjunction::And, column, low.into(), high.into());
        self
    }

    pub fn or_where_between(
        &mut self,
        column: &str,
        low: impl Into<SqlValue>,
        high: impl Into<SqlValue>,
    ) -> &mut Self {
        self.push_between(Conjunction::Or, column, low.into(), high.into());
        self
    }

    fn push_equality(&mut self, conjunction: Conjunction, column: &str, value: SqlValue) {
        let fragment = if value.is_null() {
            format!("{} IS NULL", column)
        } else {
            let name = self.state.next_param(column, value);
            format!("{} = :{}", column, name)
        };
        self.state.push_predicate(conjunction, fragment);
    }

    fn push_like(&mut self, conjunction: Conjunction, column: &str, pattern: &str) {
        let name = self.state.next_param(column, SqlValue::from(pattern));
        self.state.push_predicate(
            conjunction,
            format!("UPPER({}) LIKE UPPER(:{})", column, name),
        );
    }

    fn push_between(&mut self, conjunction: Conjunction, column: &str, low: SqlValue, high: SqlValue) {
        let low = self.state.next_param(column, low);
        let high = self.state.next_param(column, high);
        self.state.push_predicate(
            conjunction,
            format!("{} BETWEEN :{} AND :{}", column, low, high),
        );
    }

    /// `INNER JOIN table ON left op right`.
    pub fn join(&mut self, table: &str, left: &str, op: &str, right: &str) -> &mut Self {
        self.state.push_join("INNER", table, left, op, right);
        self
    }

    pub fn left_join(&mut self, table: &str, left: &str, op: &str, right: &str) -> &mut Self {
        self.state.push_join("LEFT", table, left, op, right);
        self
    }

    pub fn right_join(&mut self, table: &str, left: &str, op: &str, right: &str) -> &mut Self {
        self.state.push_join("RIGHT", table, left, op, right);
        self
    }

    /// `CROSS JOIN table` (no ON clause).
    pub fn cross_join(&mut self, table: &str) -> &mut Self {
        self.state.push_cross_join(table);
        self
    }

    /// Add `AND left op right` to the most recent join.
    pub fn and_on(&mut self, left: &str, op: &str, right: &str) -> &mut Self {
        self.state.and_on(left, op, right);
        self
    }

    /// Ascending `ORDER BY column`.
    pub fn order_by(&mut self, column: &str) -> &mut Self {
        self.state.push_order(column.trim().to_string());
        self
    }

    pub fn order_by_with(&mut self, column: &str, order: Order) -> &mut Self {
        self.state
            .push_order(format!("{} {}", column.trim(), order.as_sql()));
        self
    }

    /// Return at most `count` rows, skipping `offset` rows first.
    pub fn top(&mut self, count: u64, offset: Option<u64>) -> &mut Self {
        self.state.set_limit(LimitSpec::new(count, offset));
        self
    }

    // ===== Rendering =====

    /// Render the SELECT built so far, with named placeholders.
    ///
    /// `table` overrides the table given to [`from`](Self::from).
    pub fn get_sql(&self, table: Option<&str>) -> Result<String> {
        let table = self.target_table(table)?;
        self.check_limit()?;
        Ok(self.dialect.render_select(&self.state.select_parts(&table)))
    }

    /// Bound parameters of the statement built so far.
    pub fn params(&self) -> &Params {
        self.state.params()
    }

    pub(crate) fn target_table(&self, table: Option<&str>) -> Result<String> {
        table
            .or(self.state.from_table())
            .map(str::to_string)
            .ok_or(DbError::MissingFrom)
    }

    fn check_limit(&self) -> Result<()> {
        self.state.limit().map_or(Ok(()), |limit| limit.check())
    }

    fn is_wrapped(&self, limit: Option<LimitSpec>) -> bool {
        limit.is_some_and(|l| self.dialect.limit_placement(&l) == LimitPlacement::Wrapped)
    }

    /// Order for wrapped pagination without ORDER BY: the identity column,
    /// else the first primary key column.
    async fn fallback_order(&mut self, table: &str) -> Result<Option<String>> {
        if self.state.has_order() || !self.is_wrapped(self.state.limit()) {
            return Ok(None);
        }
        if let Some(identity) = self.identity_column_inner(table).await? {
            return Ok(Some(identity));
        }
        Ok(self.primary_keys_inner(table).await?.into_iter().next())
    }

    /// `SELECT <expr> FROM ... [WHERE ...]` with no ordering or pagination.
    fn reduced_select(&self, table: &str, expr: &str) -> String {
        let parts = SelectParts {
            columns: expr.to_string(),
            order_by: None,
            limit: None,
            ..self.state.select_parts(table)
        };
        self.dialect.render_select(&parts)
    }

    // ===== SELECT terminals =====

    pub(crate) async fn get_inner(&mut self, table: Option<&str>) -> Result<ResultSet> {
        let table = self.target_table(table)?;
        self.check_limit()?;
        let mut parts = self.state.select_parts(&table);
        parts.fallback_order = self.fallback_order(&table).await?;
        let sql = self.dialect.render_select(&parts);
        let params = self.state.params().clone();
        let rows = self.run_query(&sql, &params).await?;
        Ok(if self.is_wrapped(parts.limit) {
            strip_row_number(rows)
        } else {
            rows
        })
    }

    /// Run the SELECT and return its rows.
    pub async fn get(&mut self, table: Option<&str>) -> Result<ResultSet> {
        let result = self.get_inner(table).await;
        self.finish(result).await
    }

    /// [`get`](Self::get) mapped onto `T`.
    pub async fn get_as<T: DeserializeOwned>(&mut self, table: Option<&str>) -> Result<Vec<T>> {
        self.get(table).await?.deserialize()
    }

    /// First row, or `None`. Limits the query to one row unless `top` was set.
    pub async fn first(&mut self, table: Option<&str>) -> Result<Option<Row>> {
        if self.state.limit().is_none() {
            self.state.set_limit(LimitSpec::new(1, None));
        }
        Ok(self.get(table).await?.into_iter().next())
    }

    pub async fn first_as<T: DeserializeOwned>(&mut self, table: Option<&str>) -> Result<Option<T>> {
        self.first(table).await?.map(|row| row.deserialize()).transpose()
    }

    pub(crate) async fn count_inner(&mut self, table: Option<&str>) -> Result<u64> {
        let table = self.target_table(table)?;
        let sql = self.reduced_select(&table, "COUNT(*)");
        let params = self.state.params().clone();
        let value = self.run_scalar(&sql, &params).await?;
        Ok(value.as_i64().and_then(|n| u64::try_from(n).ok()).unwrap_or(0))
    }

    /// Number of rows matching the current clauses.
    pub async fn count(&mut self, table: Option<&str>) -> Result<u64> {
        let result = self.count_inner(table).await;
        self.finish(result).await
    }

    /// `MAX(column)` over the rows matching the current clauses.
    pub async fn max(&mut self, column: &str, table: Option<&str>) -> Result<SqlValue> {
        let result = async {
            let table = self.target_table(table)?;
            let sql = self.reduced_select(&table, &format!("MAX({})", column));
            let params = self.state.params().clone();
            self.run_scalar(&sql, &params).await
        }
        .await;
        self.finish(result).await
    }

    /// Whether any row matches the current clauses.
    pub async fn exists(&mut self, table: Option<&str>) -> Result<bool> {
        Ok(self.count(table).await? > 0)
    }

    /// First column of the first row of the SELECT, or NULL.
    pub async fn get_scalar(&mut self, table: Option<&str>) -> Result<SqlValue> {
        let result = self.get_inner(table).await.map(|rows| {
            rows.into_iter()
                .next()
                .and_then(Row::into_first)
                .unwrap_or(SqlValue::Null)
        });
        self.finish(result).await
    }
}

/// Drop the helper column added by wrapped pagination.
pub(crate) fn strip_row_number(rows: ResultSet) -> ResultSet {
    rows.into_iter()
        .map(|row| {
            let mut stripped = Row::new();
            for (column, value) in row.iter() {
                if column != ROW_NUMBER_COLUMN {
                    stripped.push(column, value.clone());
                }
            }
            stripped
        })
        .collect::<Vec<_>>()
        .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Driver;
    use crate::query::tests::db;

    #[test]
    fn test_mysql_scenario() {
        let mut db = db(Driver::Mysql);
        db.from("users").where_eq("age", 30).order_by("name").top(10, Some(0));
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT * FROM users WHERE age = :age1 ORDER BY name LIMIT 0, 10"
        );
        assert_eq!(db.params().get("age1"), Some(&SqlValue::I32(30)));
    }

    #[test]
    fn test_postgres_limit_offset() {
        let mut db = db(Driver::Postgres);
        db.from("users").select("id").select("name").top(5, Some(10));
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT id, name FROM users LIMIT 5 OFFSET 10"
        );
    }

    #[test]
    fn test_sqlserver_leading_top() {
        let mut db = db(Driver::SqlServer);
        db.from("users").where_eq("active", true).top(10, Some(0));
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT TOP(10) * FROM users WHERE active = :active1"
        );
    }

    #[test]
    fn test_dblib_wrapped_pagination() {
        let mut db = db(Driver::Dblib);
        db.from("users").order_by("name").top(10, Some(20));
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT * FROM (SELECT *, ROW_NUMBER() OVER(ORDER BY name) AS __row_num \
             FROM users) AS __paged WHERE __row_num BETWEEN 21 AND 30 ORDER BY __row_num"
        );
    }

    #[test]
    fn test_missing_from() {
        let db = db(Driver::Mysql);
        assert!(matches!(db.get_sql(None), Err(DbError::MissingFrom)));
    }

    #[test]
    fn test_table_argument_overrides_from() {
        let mut db = db(Driver::Mysql);
        db.from("users");
        assert_eq!(db.get_sql(Some("admins")).unwrap(), "SELECT * FROM admins");
    }

    #[test]
    fn test_clause_order() {
        let mut db = db(Driver::Postgres);
        db.top(3, None)
            .order_by_with("u.name", Order::Desc)
            .where_eq("u.age", 30)
            .join("roles r", "u.role_id", "=", "r.id")
            .select("u.name, r.title")
            .from("users u");
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT u.name, r.title FROM users u INNER JOIN roles r ON u.role_id = r.id \
             WHERE u.age = :u_age1 ORDER BY u.name DESC LIMIT 3"
        );
    }

    #[test]
    fn test_repeated_column_gets_distinct_params() {
        let mut db = db(Driver::Mysql);
        db.from("t")
            .where_eq("age", 1)
            .or_where("age", 2)
            .like("age", "3%")
            .where_between("age", 4, 5);
        let sql = db.get_sql(None).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM t WHERE age = :age1 OR age = :age2 AND UPPER(age) LIKE UPPER(:age3) \
             AND age BETWEEN :age4 AND :age5"
        );
        let names: Vec<&str> = db.params().names().collect();
        assert_eq!(names, vec!["age1", "age2", "age3", "age4", "age5"]);
    }

    #[test]
    fn test_where_map_skips_nulls() {
        let mut db = db(Driver::Mysql);
        let filter = Params::new()
            .with("role", "admin")
            .with("deleted_at", SqlValue::Null)
            .with("level", 0);
        db.from("users").where_map(&filter);
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT * FROM users WHERE role = :role1 AND level = :level2"
        );
    }

    #[test]
    fn test_where_eq_null_renders_is_null() {
        let mut db = db(Driver::Mysql);
        db.from("users").where_eq("deleted_at", SqlValue::Null);
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT * FROM users WHERE deleted_at IS NULL"
        );
        assert!(db.params().is_empty());
    }

    #[test]
    fn test_where_raw_and_or_like() {
        let mut db = db(Driver::Mysql);
        db.from("users")
            .where_raw("active = 1")
            .like("name", "an%")
            .or_like("email", "%@example.com");
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT * FROM users WHERE active = 1 AND UPPER(name) LIKE UPPER(:name1) \
             OR UPPER(email) LIKE UPPER(:email2)"
        );
    }

    #[test]
    fn test_joins_and_cross_join() {
        let mut db = db(Driver::Mysql);
        db.from("a")
            .left_join("b", "a.id", "=", "b.a_id")
            .and_on("b.kind", "=", "'x'")
            .right_join("c", "c.id", "=", "b.c_id")
            .cross_join("d")
            .and_on("d.id", "=", "a.id");
        assert_eq!(
            db.get_sql(None).unwrap(),
            "SELECT * FROM a LEFT JOIN b ON a.id = b.a_id AND b.kind = 'x' \
             RIGHT JOIN c ON c.id = b.c_id CROSS JOIN d"
        );
    }

    #[test]
    fn test_reduced_select_drops_order_and_limit() {
        let mut db = db(Driver::SqlServer);
        db.from("users").where_eq("age", 30).order_by("name").top(10, Some(10));
        assert_eq!(
            db.reduced_select("users", "COUNT(*)"),
            "SELECT COUNT(*) FROM users WHERE age = :age1"
        );
    }

    #[tokio::test]
    async fn test_state_resets_after_failed_terminal() {
        let mut db = db(Driver::Mysql);
        db.select("name").where_eq("age", 30);
        let err = db.get(None).await.unwrap_err();
        assert!(matches!(err, DbError::MissingFrom));

        db.from("orders");
        assert_eq!(db.get_sql(None).unwrap(), "SELECT * FROM orders");
    }

    #[test]
    fn test_strip_row_number() {
        let rows = ResultSet::new(vec![Row::new()
            .with("id", 1)
            .with(ROW_NUMBER_COLUMN, 21i64)]);
        let stripped = strip_row_number(rows);
        assert_eq!(stripped.rows()[0].columns(), &["id".to_string()]);
    }
}
