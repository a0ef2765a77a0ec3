//! The fluent query builder and execution engine.
//!
//! A [`Db`] accumulates clauses through `&mut self` setters and runs them with
//! async terminal operations. It owns at most one live [`Connection`], opened
//! lazily by the first statement and closed again after every terminal
//! operation unless a transaction is open.
//!
//! ```rust,no_run
//! use dbforge::{Db, Registry};
//!
//! # async fn run(registry: &Registry) -> dbforge::Result<()> {
//! let mut db = Db::from_registry(registry, "default")?;
//! let adults = db
//!     .from("users")
//!     .where_eq("active", true)
//!     .order_by("name")
//!     .top(10, None)
//!     .get(None)
//!     .await?;
//! println!("{} users", adults.len());
//! # Ok(())
//! # }
//! ```
//!
//! Clause state is cleared after every terminal operation, whether it
//! succeeded or not, so each query starts again from `from()`.

mod binding;
mod builder;
mod dml;
mod introspection;
mod pagination;
mod state;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{debug, info};

pub use binding::{bind_named, BoundStatement};
pub use dml::UpsertOutcome;
pub use pagination::Page;
pub(crate) use pagination::{page_count, page_limit};
pub use state::{Order, QueryState};

use crate::config::{ConnectionDescriptor, Settings};
use crate::core::row::ResultSet;
use crate::core::traits::{DbConnection, Dialect};
use crate::core::value::{Params, SqlValue};
use crate::drivers::{Connection, DialectImpl, Driver};
use crate::error::{DbError, Result};
use crate::registry::{Registry, SqlLogger, TracingSqlLogger};

/// Fluent SQL builder bound to one connection descriptor.
pub struct Db {
    descriptor: Arc<ConnectionDescriptor>,
    dialect: DialectImpl,
    settings: Settings,
    logger: Arc<dyn SqlLogger>,
    connection: Option<Connection>,
    in_transaction: bool,
    state: QueryState,
    #[cfg(test)]
    mock: Option<crate::drivers::mock::MockDatabase>,
}

impl Db {
    /// Create a builder for `descriptor`. No connection is opened yet.
    pub fn new(descriptor: Arc<ConnectionDescriptor>, settings: Settings) -> Self {
        let dialect = descriptor.driver().dialect();
        Self {
            descriptor,
            dialect,
            settings,
            logger: Arc::new(TracingSqlLogger),
            connection: None,
            in_transaction: false,
            state: QueryState::new(),
            #[cfg(test)]
            mock: None,
        }
    }

    /// Create a builder for a registered connection, sharing the registry's
    /// settings and SQL logger.
    pub fn from_registry(registry: &Registry, name: &str) -> Result<Self> {
        let descriptor = registry.require_connection(name)?;
        Ok(Self::new(descriptor, registry.settings().clone()).with_logger(registry.logger()))
    }

    /// Replace the SQL logger.
    #[must_use]
    pub fn with_logger(mut self, logger: Arc<dyn SqlLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }

    pub fn driver(&self) -> Driver {
        self.descriptor.driver()
    }

    pub fn dialect(&self) -> &DialectImpl {
        &self.dialect
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_some()
    }

    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    // ===== Connection lifecycle =====

    /// Open the connection if it is not open yet.
    pub async fn connect(&mut self) -> Result<()> {
        if self.connection.is_some() {
            return Ok(());
        }
        #[cfg(test)]
        if let Some(ref mock) = self.mock {
            self.connection = Some(Connection::Mock(mock.connect()));
            return Ok(());
        }
        let timeout = self.settings.statement_timeout_secs;
        let connection = with_deadline(timeout, Connection::open(&self.descriptor)).await?;
        self.connection = Some(connection);
        Ok(())
    }

    /// Close the connection. Does nothing while a transaction is open.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.in_transaction {
            debug!("Transaction open, keeping connection");
            return Ok(());
        }
        if let Some(connection) = self.connection.take() {
            connection.close().await?;
            debug!("Disconnected from {}", self.descriptor.driver());
        }
        Ok(())
    }

    /// Start a transaction; later terminal operations keep the connection open
    /// until [`commit`](Self::commit) or [`rollback`](Self::rollback).
    pub async fn begin_transaction(&mut self) -> Result<()> {
        if self.in_transaction {
            return Ok(());
        }
        let sql = self.dialect.begin_transaction_sql();
        self.run_batch(sql).await?;
        self.in_transaction = true;
        info!("Transaction started on {}", self.descriptor.driver());
        Ok(())
    }

    /// Commit the open transaction and release the connection.
    ///
    /// On failure the transaction stays open so the caller can roll back.
    pub async fn commit(&mut self) -> Result<()> {
        self.end_transaction(self.dialect.commit_sql()).await
    }

    /// Roll back the open transaction and release the connection.
    pub async fn rollback(&mut self) -> Result<()> {
        self.end_transaction(self.dialect.rollback_sql()).await
    }

    async fn end_transaction(&mut self, sql: &'static str) -> Result<()> {
        if !self.in_transaction {
            debug!("No open transaction, {} skipped", sql);
            return Ok(());
        }
        self.run_batch(sql).await?;
        self.in_transaction = false;
        info!("Transaction finished with {}", sql);
        self.disconnect().await
    }

    // ===== Raw SQL =====

    /// Run `sql` with `:name` placeholders bound from `params` and return its rows.
    pub async fn query(&mut self, sql: &str, params: &Params) -> Result<ResultSet> {
        let result = self.run_query(sql, params).await;
        self.finish(result).await
    }

    /// [`query`](Self::query) mapped onto `T`.
    pub async fn query_as<T: DeserializeOwned>(
        &mut self,
        sql: &str,
        params: &Params,
    ) -> Result<Vec<T>> {
        self.query(sql, params).await?.deserialize()
    }

    /// First column of the first row, or NULL when there are no rows.
    pub async fn scalar(&mut self, sql: &str, params: &Params) -> Result<SqlValue> {
        let result = self.run_scalar(sql, params).await;
        self.finish(result).await
    }

    /// Run a statement and return the number of affected rows.
    pub async fn non_query(&mut self, sql: &str, params: &Params) -> Result<u64> {
        let result = self.run_execute(sql, params).await;
        self.finish(result).await
    }

    /// Run parameterless SQL as a simple batch, without preparing it.
    ///
    /// DDL such as `CREATE PROCEDURE` goes through here.
    pub async fn batch(&mut self, sql: &str) -> Result<()> {
        let result = self.run_batch(sql).await;
        self.finish(result).await
    }

    // ===== Execution internals =====

    fn log_statement(&self, sql: &str, params: &Params) {
        debug!("SQL: {}", sql);
        if self.settings.log_sql {
            self.logger.log_sql(sql);
            self.logger.log_sql(&params.to_json().to_string());
        }
    }

    /// Log `sql`, bind its placeholders and make sure a connection is open.
    pub(crate) async fn prepare(&mut self, sql: &str, params: &Params) -> Result<BoundStatement> {
        self.log_statement(sql, params);
        let bound = bind_named(sql, params, &self.dialect)?;
        self.connect().await?;
        Ok(bound)
    }

    pub(crate) async fn run_query(&mut self, sql: &str, params: &Params) -> Result<ResultSet> {
        let bound = self.prepare(sql, params).await?;
        let timeout = self.settings.statement_timeout_secs;
        let connection = self.connection.as_mut().ok_or(DbError::NotConnected)?;
        with_deadline(timeout, connection.query(&bound.sql, &bound.values)).await
    }

    pub(crate) async fn run_execute(&mut self, sql: &str, params: &Params) -> Result<u64> {
        let bound = self.prepare(sql, params).await?;
        let timeout = self.settings.statement_timeout_secs;
        let connection = self.connection.as_mut().ok_or(DbError::NotConnected)?;
        with_deadline(timeout, connection.execute(&bound.sql, &bound.values)).await
    }

    pub(crate) async fn run_scalar(&mut self, sql: &str, params: &Params) -> Result<SqlValue> {
        let rows = self.run_query(sql, params).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_first())
            .unwrap_or(SqlValue::Null))
    }

    /// Run parameterless SQL (transaction control, DDL).
    pub(crate) async fn run_batch(&mut self, sql: &str) -> Result<()> {
        self.log_statement(sql, &Params::new());
        self.connect().await?;
        let timeout = self.settings.statement_timeout_secs;
        let connection = self.connection.as_mut().ok_or(DbError::NotConnected)?;
        with_deadline(timeout, connection.batch_execute(sql)).await
    }

    /// Reset clause state and release the connection after a terminal
    /// operation. The operation's own error wins over a disconnect error.
    pub(crate) async fn finish<T>(&mut self, result: Result<T>) -> Result<T> {
        self.state.reset();
        let closed = self.disconnect().await;
        let value = result?;
        closed?;
        Ok(value)
    }

    pub(crate) fn reset_state(&mut self) {
        self.state.reset();
    }

    /// Open connections from `mock` instead of a server.
    #[cfg(test)]
    pub(crate) fn with_mock(mut self, mock: crate::drivers::mock::MockDatabase) -> Self {
        self.mock = Some(mock);
        self
    }

    pub(crate) fn take_connection(&mut self) -> Option<Connection> {
        self.connection.take()
    }

    pub(crate) fn restore_connection(&mut self, connection: Connection) {
        self.connection = Some(connection);
    }
}

/// Await `fut`, failing with [`DbError::Timeout`] after `secs` seconds.
pub(crate) async fn with_deadline<T, F>(secs: Option<u64>, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match secs {
        Some(secs) => tokio::time::timeout(Duration::from_secs(secs), fut)
            .await
            .map_err(|_| DbError::Timeout(secs))?,
        None => fut.await,
    }
}
