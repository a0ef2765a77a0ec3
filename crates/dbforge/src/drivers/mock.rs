//! Scripted in-memory connection for exercising the builder without a server.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::core::row::{ResultSet, Row};
use crate::core::traits::DbConnection;
use crate::core::value::SqlValue;
use crate::error::{DbError, Result};

#[derive(Default)]
struct Script {
    results: VecDeque<Result<ResultSet>>,
    affected: VecDeque<u64>,
    statements: Vec<String>,
    values: Vec<Vec<SqlValue>>,
    opened: usize,
    closed: usize,
}

/// Shared script and statement log behind every [`MockConnection`] it opens.
#[derive(Clone, Default)]
pub struct MockDatabase {
    script: Arc<Mutex<Script>>,
}

impl MockDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Rows for the next `query` or `stream`. Unscripted queries return no rows.
    pub fn push_rows(&self, rows: Vec<Row>) -> &Self {
        self.script().results.push_back(Ok(ResultSet::new(rows)));
        self
    }

    /// Single-value result, as returned by `COUNT(*)`.
    pub fn push_scalar(&self, value: impl Into<SqlValue>) -> &Self {
        self.push_rows(vec![Row::new().with("value", value)])
    }

    /// Make the next `query` or `stream` fail.
    pub fn push_error(&self, message: &str) -> &Self {
        self.script().results.push_back(Err(DbError::Driver {
            message: message.to_string(),
            context: "mock".to_string(),
        }));
        self
    }

    /// Affected-row count for the next `execute`. Unscripted executes report 1.
    pub fn push_affected(&self, rows: u64) -> &Self {
        self.script().affected.push_back(rows);
        self
    }

    pub fn connect(&self) -> MockConnection {
        self.script().opened += 1;
        MockConnection { db: self.clone() }
    }

    /// Every statement run so far, in order.
    pub fn statements(&self) -> Vec<String> {
        self.script().statements.clone()
    }

    /// Bound values of every statement run so far.
    pub fn values(&self) -> Vec<Vec<SqlValue>> {
        self.script().values.clone()
    }

    pub fn opened(&self) -> usize {
        self.script().opened
    }

    pub fn closed(&self) -> usize {
        self.script().closed
    }

    fn record(&self, sql: &str, params: &[SqlValue]) {
        let mut script = self.script();
        script.statements.push(sql.to_string());
        script.values.push(params.to_vec());
    }

    fn next_result(&self) -> Result<ResultSet> {
        self.script()
            .results
            .pop_front()
            .unwrap_or_else(|| Ok(ResultSet::default()))
    }
}

/// One handle opened from a [`MockDatabase`].
pub struct MockConnection {
    db: MockDatabase,
}

impl MockConnection {
    pub async fn close(self) -> Result<()> {
        self.db.script().closed += 1;
        Ok(())
    }
}

#[async_trait]
impl DbConnection for MockConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        self.db.record(sql, params);
        self.db.next_result()
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.db.record(sql, params);
        Ok(self.db.script().affected.pop_front().unwrap_or(1))
    }

    async fn stream(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<()> {
        self.db.record(sql, params);
        for row in self.db.next_result()?.into_rows() {
            if tx.send(Ok(row)).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.db.record(sql, &[]);
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mock"
    }
}
