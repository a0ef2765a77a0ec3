//! INSERT, UPDATE, upsert, DELETE and TRUNCATE.
//!
//! Table and column names are quoted for the connection's dialect; values are
//! always bound as parameters.

use tracing::{debug, warn};

use crate::core::identifier::param_base;
use crate::core::traits::Dialect;
use crate::core::value::{Params, SqlValue};
use crate::error::{DbError, Result};

use super::Db;

/// Which statement [`Db::upsert`] ran, with its affected-row count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(u64),
    Updated(u64),
}

impl UpsertOutcome {
    pub fn rows_affected(&self) -> u64 {
        match self {
            UpsertOutcome::Inserted(n) | UpsertOutcome::Updated(n) => *n,
        }
    }
}

/// Named parameters for one statement, numbered across all its clauses.
#[derive(Default)]
struct StatementParams {
    params: Params,
    counter: usize,
}

impl StatementParams {
    fn bind(&mut self, column: &str, value: &SqlValue) -> String {
        self.counter += 1;
        let name = format!("{}{}", param_base(column), self.counter);
        self.params.set(name.clone(), value.clone());
        name
    }

    /// `col = :p AND ...`; NULL values render `IS NULL`.
    fn predicate(&mut self, dialect: &dyn Dialect, key: &Params) -> Result<String> {
        let mut parts = Vec::with_capacity(key.len());
        for (column, value) in key.iter() {
            let quoted = dialect.quote_ident(column)?;
            if value.is_null() {
                parts.push(format!("{} IS NULL", quoted));
            } else {
                let name = self.bind(column, value);
                parts.push(format!("{} = :{}", quoted, name));
            }
        }
        Ok(parts.join(" AND "))
    }
}

fn require_values(table: &str, values: &Params) -> Result<()> {
    if values.is_empty() {
        return Err(DbError::Config(format!(
            "no column values given for table {}",
            table
        )));
    }
    Ok(())
}

pub(crate) fn insert_sql(dialect: &dyn Dialect, table: &str, values: &Params) -> Result<(String, Params)> {
    require_values(table, values)?;
    let mut bound = StatementParams::default();
    let mut columns = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (column, value) in values.iter() {
        columns.push(dialect.quote_ident(column)?);
        placeholders.push(format!(":{}", bound.bind(column, value)));
    }
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        dialect.quote_ident(table)?,
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok((sql, bound.params))
}

pub(crate) fn update_sql(
    dialect: &dyn Dialect,
    table: &str,
    values: &Params,
    key: &Params,
) -> Result<(String, Params)> {
    require_values(table, values)?;
    let mut bound = StatementParams::default();
    let mut assignments = Vec::with_capacity(values.len());
    for (column, value) in values.iter() {
        let name = bound.bind(column, value);
        assignments.push(format!("{} = :{}", dialect.quote_ident(column)?, name));
    }
    let mut sql = format!(
        "UPDATE {} SET {}",
        dialect.quote_ident(table)?,
        assignments.join(", ")
    );
    if !key.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&bound.predicate(dialect, key)?);
    }
    Ok((sql, bound.params))
}

pub(crate) fn delete_sql(dialect: &dyn Dialect, table: &str, key: &Params) -> Result<(String, Params)> {
    let mut bound = StatementParams::default();
    let mut sql = format!("DELETE FROM {}", dialect.quote_ident(table)?);
    if !key.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&bound.predicate(dialect, key)?);
    }
    Ok((sql, bound.params))
}

pub(crate) fn count_sql(dialect: &dyn Dialect, table: &str, key: &Params) -> Result<(String, Params)> {
    let mut bound = StatementParams::default();
    let predicate = bound.predicate(dialect, key)?;
    let sql = format!(
        "SELECT COUNT(*) FROM {} WHERE {}",
        dialect.quote_ident(table)?,
        predicate
    );
    Ok((sql, bound.params))
}

/// Insert values for an upsert that found no row: `values` first, then the
/// key entries that `values` does not already set.
pub(crate) fn merge_for_insert(values: &Params, key: &Params) -> Params {
    let mut merged = values.clone();
    for (column, value) in key.iter() {
        if !merged.contains(column) {
            merged.set(column, value.clone());
        }
    }
    merged
}

impl Db {
    async fn insert_inner(&mut self, table: &str, values: &Params) -> Result<u64> {
        let (sql, params) = insert_sql(&self.dialect, table, values)?;
        self.run_execute(&sql, &params).await
    }

    async fn update_inner(&mut self, table: &str, values: &Params, key: &Params) -> Result<u64> {
        if key.is_empty() {
            warn!("UPDATE {} without a key map affects every row", table);
        }
        let (sql, params) = update_sql(&self.dialect, table, values, key)?;
        self.run_execute(&sql, &params).await
    }

    async fn upsert_inner(&mut self, table: &str, values: &Params, key: &Params) -> Result<UpsertOutcome> {
        if key.is_empty() {
            return self.insert_inner(table, values).await.map(UpsertOutcome::Inserted);
        }

        let (check, check_params) = count_sql(&self.dialect, table, key)?;
        let existing = self
            .run_scalar(&check, &check_params)
            .await?
            .as_i64()
            .unwrap_or(0);
        debug!("Upsert existence check on {} matched {} row(s)", table, existing);

        if existing == 0 {
            let merged = merge_for_insert(values, key);
            self.insert_inner(table, &merged).await.map(UpsertOutcome::Inserted)
        } else {
            self.update_inner(table, values, key).await.map(UpsertOutcome::Updated)
        }
    }

    /// Insert one row and return the affected-row count.
    pub async fn insert(&mut self, table: &str, values: &Params) -> Result<u64> {
        let result = self.insert_inner(table, values).await;
        self.finish(result).await
    }

    /// Update the rows matching every `key` entry.
    pub async fn update(&mut self, table: &str, values: &Params, key: &Params) -> Result<u64> {
        let result = self.update_inner(table, values, key).await;
        self.finish(result).await
    }

    /// Update the rows matching `key`, or insert `values` merged with `key`
    /// when none exist.
    pub async fn upsert(
        &mut self,
        table: &str,
        values: &Params,
        key: &Params,
    ) -> Result<UpsertOutcome> {
        let result = self.upsert_inner(table, values, key).await;
        self.finish(result).await
    }

    /// Delete the rows matching every `key` entry.
    pub async fn delete(&mut self, table: &str, key: &Params) -> Result<u64> {
        let result = async {
            if key.is_empty() {
                warn!("DELETE FROM {} without a key map removes every row", table);
            }
            let (sql, params) = delete_sql(&self.dialect, table, key)?;
            self.run_execute(&sql, &params).await
        }
        .await;
        self.finish(result).await
    }

    pub async fn truncate(&mut self, table: &str) -> Result<()> {
        let result = async {
            let sql = self.dialect.truncate_sql(table)?;
            self.run_batch(&sql).await
        }
        .await;
        self.finish(result).await
    }
}
