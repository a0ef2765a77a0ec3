//! Page-at-a-time reads over the builder state or free-form SQL.

use serde::de::DeserializeOwned;

use crate::core::row::Row;
use crate::core::traits::{Dialect, LimitPlacement, LimitSpec, SelectParts};
use crate::core::value::Params;
use crate::error::{DbError, Result};

use super::builder::strip_row_number;
use super::Db;

/// One page of results.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T = Row> {
    pub results: Vec<T>,
    /// Page numbers `1..=N`.
    pub pages: Vec<u64>,
    pub current_page: u64,
    /// Total matching rows across all pages.
    pub total: u64,
}

impl<T> Page<T> {
    pub fn page_count(&self) -> u64 {
        self.pages.len() as u64
    }

    /// Map every result row.
    pub fn try_map<U, F>(self, f: F) -> Result<Page<U>>
    where
        F: FnMut(T) -> Result<U>,
    {
        Ok(Page {
            results: self.results.into_iter().map(f).collect::<Result<Vec<_>>>()?,
            pages: self.pages,
            current_page: self.current_page,
            total: self.total,
        })
    }
}

/// Number of pages for `total` rows at `page_items` rows per page.
pub(crate) fn page_count(total: u64, page_items: u64) -> u64 {
    total.div_ceil(page_items)
}

/// Limit selecting `current_page` (1-based).
pub(crate) fn page_limit(page_items: u64, current_page: u64) -> Result<LimitSpec> {
    if current_page == 0 {
        return Err(DbError::Config("pages are numbered from 1".into()));
    }
    let limit = (current_page - 1)
        .checked_mul(page_items)
        .map(|offset| LimitSpec::new(page_items, Some(offset)))
        .ok_or_else(|| {
            DbError::Config(format!(
                "page {} of {} rows is out of range",
                current_page, page_items
            ))
        })?;
    limit.check()?;
    Ok(limit)
}

fn check_page_items(page_items: u64) -> Result<()> {
    if page_items == 0 {
        return Err(DbError::Config("page_items must be greater than zero".into()));
    }
    Ok(())
}

/// `SELECT COUNT(*) FROM (<sql>) AS A`.
pub(crate) fn wrapped_count_sql(sql: &str) -> String {
    format!("SELECT COUNT(*) FROM ({}) AS A", strip_terminator(sql))
}

/// `SELECT A.* FROM (<sql>) AS A` with the dialect's pagination.
pub(crate) fn wrapped_page_sql(dialect: &dyn Dialect, sql: &str, limit: LimitSpec) -> String {
    let parts = SelectParts {
        columns: "A.*".to_string(),
        from: format!("({}) AS A", strip_terminator(sql)),
        limit: Some(limit),
        ..Default::default()
    };
    dialect.render_select(&parts)
}

fn strip_terminator(sql: &str) -> &str {
    sql.trim().trim_end_matches(';').trim_end()
}

fn pages(count: u64) -> Vec<u64> {
    (1..=count).collect()
}

impl Db {
    async fn paginate_inner(
        &mut self,
        page_items: u64,
        current_page: u64,
        table: Option<&str>,
    ) -> Result<Page> {
        check_page_items(page_items)?;
        let limit = page_limit(page_items, current_page)?;
        let table = self.target_table(table)?;
        let total = self.count_inner(Some(&table)).await?;

        self.state.set_limit(limit);
        let results = self.get_inner(Some(&table)).await?.into_rows();

        Ok(Page {
            results,
            pages: pages(page_count(total, page_items)),
            current_page,
            total,
        })
    }

    /// Run the built SELECT one page at a time.
    ///
    /// Counts the rows matching the current clauses, then fetches page
    /// `current_page` (1-based) of `page_items` rows.
    pub async fn paginate(
        &mut self,
        page_items: u64,
        current_page: u64,
        table: Option<&str>,
    ) -> Result<Page> {
        let result = self.paginate_inner(page_items, current_page, table).await;
        self.finish(result).await
    }

    pub async fn paginate_as<T: DeserializeOwned>(
        &mut self,
        page_items: u64,
        current_page: u64,
        table: Option<&str>,
    ) -> Result<Page<T>> {
        self.paginate(page_items, current_page, table)
            .await?
            .try_map(|row| row.deserialize())
    }

    pub(crate) async fn paginate_query_inner(
        &mut self,
        sql: &str,
        params: &Params,
        page_items: u64,
        current_page: u64,
    ) -> Result<Page> {
        check_page_items(page_items)?;
        let limit = page_limit(page_items, current_page)?;
        let total = self
            .run_scalar(&wrapped_count_sql(sql), params)
            .await?
            .as_i64()
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0);

        let page_sql = wrapped_page_sql(&self.dialect, sql, limit);
        let mut rows = self.run_query(&page_sql, params).await?;
        if self.dialect.limit_placement(&limit) == LimitPlacement::Wrapped {
            rows = strip_row_number(rows);
        }

        Ok(Page {
            results: rows.into_rows(),
            pages: pages(page_count(total, page_items)),
            current_page,
            total,
        })
    }

    /// Paginate a free-form query by wrapping it in a derived table.
    pub async fn paginate_query(
        &mut self,
        sql: &str,
        params: &Params,
        page_items: u64,
        current_page: u64,
    ) -> Result<Page> {
        let result = self
            .paginate_query_inner(sql, params, page_items, current_page)
            .await;
        self.finish(result).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Driver;
    use crate::query::tests::db;

    #[test]
    fn test_page_count() {
        assert_eq!(page_count(0, 10), 0);
        assert_eq!(page_count(1, 10), 1);
        assert_eq!(page_count(10, 10), 1);
        assert_eq!(page_count(11, 10), 2);
        assert_eq!(page_count(95, 10), 10);
    }

    #[test]
    fn test_page_limit() {
        assert_eq!(page_limit(10, 1).unwrap(), LimitSpec::new(10, Some(0)));
        assert_eq!(page_limit(10, 3).unwrap(), LimitSpec::new(10, Some(20)));
    }

    #[test]
    fn test_page_limit_rejects_page_zero_and_overflow() {
        assert!(matches!(page_limit(10, 0), Err(DbError::Config(_))));
        assert!(matches!(page_limit(10, u64::MAX), Err(DbError::Config(_))));
        assert!(matches!(page_limit(u64::MAX, 2), Err(DbError::Config(_))));
    }

    #[test]
    fn test_wrapped_query_sql() {
        let sql = "SELECT * FROM users WHERE role = :role;";
        assert_eq!(
            wrapped_count_sql(sql),
            "SELECT COUNT(*) FROM (SELECT * FROM users WHERE role = :role) AS A"
        );
        assert_eq!(
            wrapped_page_sql(&Driver::Mysql.dialect(), sql, page_limit(5, 2).unwrap()),
            "SELECT A.* FROM (SELECT * FROM users WHERE role = :role) AS A LIMIT 5, 5"
        );
        assert_eq!(
            wrapped_page_sql(&Driver::SqlServer.dialect(), sql, page_limit(5, 1).unwrap()),
            "SELECT TOP(5) A.* FROM (SELECT * FROM users WHERE role = :role) AS A"
        );
    }

    #[test]
    fn test_page_try_map() {
        let page = Page {
            results: vec![Row::new().with("id", 1)],
            pages: vec![1],
            current_page: 1,
            total: 1,
        };
        let mapped = page.try_map(|row| Ok(row.get_i64("id"))).unwrap();
        assert_eq!(mapped.results, vec![Some(1)]);
        assert_eq!(mapped.page_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_page_items_is_config_error() {
        let mut db = db(Driver::Mysql);
        let err = db.from("users").paginate(0, 1, None).await.unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
        assert!(db.get_sql(None).is_err());
    }

    #[tokio::test]
    async fn test_page_zero_is_config_error() {
        let mut db = db(Driver::Postgres);
        let err = db.from("users").paginate(10, 0, None).await.unwrap_err();
        assert!(matches!(err, DbError::Config(_)));
    }

    #[test]
    fn test_overflowing_top_is_rejected() {
        let mut db = db(Driver::SqlServer);
        db.from("users").order_by("id").top(10, Some(u64::MAX));
        assert!(matches!(db.get_sql(None), Err(DbError::Config(_))));
    }
}
