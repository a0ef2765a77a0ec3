//! Database driver implementations.
//!
//! - [`mysql`]: MySQL/MariaDB driver (SQLx)
//! - [`postgres`]: PostgreSQL driver (tokio-postgres)
//! - [`mssql`]: SQL Server driver (Tiberius), also used for `dblib`
//! - [`common`]: Shared utilities (TLS)
//!
//! # Architecture
//!
//! Each driver module implements:
//! - `Dialect`: SQL syntax strategy for the database engine
//! - `DbConnection`: one live handle that runs positional-parameter SQL
//!
//! [`DialectImpl`] and [`Connection`] wrap the per-driver types in enums so
//! the query builder can hold either without boxing.
//!
//! # Adding New Databases
//!
//! 1. Create a new module under `drivers/` with a dialect and a connection
//! 2. Add a [`Driver`] variant and its aliases in [`Driver::parse`]
//! 3. Add enum variants to `DialectImpl` and `Connection`

pub mod common;
#[cfg(test)]
pub(crate) mod mock;
pub mod mssql;
pub mod mysql;
pub mod postgres;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

pub use common::SslMode;
pub use mssql::{MssqlConnection, MssqlDialect};
pub use mysql::{MysqlConnection, MysqlDialect};
pub use postgres::{PostgresConnection, PostgresDialect};

use crate::config::ConnectionDescriptor;
use crate::core::identifier::QuoteStyle;
use crate::core::row::{ResultSet, Row};
use crate::core::traits::{DbConnection, Dialect, LimitPlacement, LimitSpec, SelectParts};
use crate::core::value::SqlValue;
use crate::error::{DbError, Result};
use crate::schema::Column;

/// Supported database drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Driver {
    Mysql,
    Postgres,
    SqlServer,
    /// FreeTDS/dblib: TDS client sharing the SQL Server dialect.
    Dblib,
}

impl Driver {
    /// Parse a driver name, accepting the usual aliases.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Driver::Mysql),
            "postgres" | "postgresql" | "pgsql" | "pg" => Ok(Driver::Postgres),
            "sqlserver" | "sqlsrv" | "mssql" => Ok(Driver::SqlServer),
            "dblib" => Ok(Driver::Dblib),
            _ => Err(DbError::UnsupportedDriver(name.to_string())),
        }
    }

    /// Canonical driver name.
    pub fn name(&self) -> &'static str {
        match self {
            Driver::Mysql => "mysql",
            Driver::Postgres => "postgres",
            Driver::SqlServer => "sqlserver",
            Driver::Dblib => "dblib",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Driver::Mysql => 3306,
            Driver::Postgres => 5432,
            Driver::SqlServer | Driver::Dblib => 1433,
        }
    }

    /// SQL dialect spoken by this driver.
    pub fn dialect(&self) -> DialectImpl {
        match self {
            Driver::Mysql => DialectImpl::Mysql(MysqlDialect::new()),
            Driver::Postgres => DialectImpl::Postgres(PostgresDialect::new()),
            Driver::SqlServer => DialectImpl::Mssql(MssqlDialect::new()),
            Driver::Dblib => DialectImpl::Mssql(MssqlDialect::dblib()),
        }
    }
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Driver {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self> {
        Driver::parse(s)
    }
}

/// Enum-based static dispatch for dialects.
#[derive(Debug, Clone)]
pub enum DialectImpl {
    Mysql(MysqlDialect),
    Postgres(PostgresDialect),
    Mssql(MssqlDialect),
}

impl DialectImpl {
    /// Create a dialect from a driver name (aliases accepted).
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedDriver` if the name is not recognized.
    pub fn from_driver_name(name: &str) -> Result<Self> {
        Ok(Driver::parse(name)?.dialect())
    }

    fn inner(&self) -> &dyn Dialect {
        match self {
            DialectImpl::Mysql(d) => d,
            DialectImpl::Postgres(d) => d,
            DialectImpl::Mssql(d) => d,
        }
    }
}

impl Dialect for DialectImpl {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn quote_style(&self) -> QuoteStyle {
        self.inner().quote_style()
    }

    fn quote_ident(&self, name: &str) -> Result<String> {
        self.inner().quote_ident(name)
    }

    fn param_placeholder(&self, index: usize) -> String {
        self.inner().param_placeholder(index)
    }

    fn limit_placement(&self, limit: &LimitSpec) -> LimitPlacement {
        self.inner().limit_placement(limit)
    }

    fn render_limit(&self, limit: &LimitSpec) -> String {
        self.inner().render_limit(limit)
    }

    fn render_select(&self, parts: &SelectParts) -> String {
        self.inner().render_select(parts)
    }

    fn current_schema_expr(&self) -> &'static str {
        self.inner().current_schema_expr()
    }

    fn schema_predicate(&self, column: &str, qualified: bool) -> String {
        self.inner().schema_predicate(column, qualified)
    }

    fn tables_query(&self) -> String {
        self.inner().tables_query()
    }

    fn columns_query(&self, qualified: bool) -> String {
        self.inner().columns_query(qualified)
    }

    fn primary_keys_query(&self, qualified: bool) -> String {
        self.inner().primary_keys_query(qualified)
    }

    fn foreign_keys_query(&self, qualified: bool) -> String {
        self.inner().foreign_keys_query(qualified)
    }

    fn table_constraints_query(&self, qualified: bool) -> String {
        self.inner().table_constraints_query(qualified)
    }

    fn constraint_columns_query(&self, qualified: bool, named: bool) -> String {
        self.inner().constraint_columns_query(qualified, named)
    }

    fn identity_column_query(&self, qualified: bool) -> String {
        self.inner().identity_column_query(qualified)
    }

    fn table_exists_query(&self, qualified: bool) -> String {
        self.inner().table_exists_query(qualified)
    }

    fn column_type(&self, column: &Column) -> String {
        self.inner().column_type(column)
    }

    fn column_definition(&self, column: &Column) -> Result<String> {
        self.inner().column_definition(column)
    }

    fn begin_transaction_sql(&self) -> &'static str {
        self.inner().begin_transaction_sql()
    }

    fn commit_sql(&self) -> &'static str {
        self.inner().commit_sql()
    }

    fn rollback_sql(&self) -> &'static str {
        self.inner().rollback_sql()
    }

    fn truncate_sql(&self, table: &str) -> Result<String> {
        self.inner().truncate_sql(table)
    }
}

/// Enum dispatch over the per-driver connections.
pub enum Connection {
    Mysql(MysqlConnection),
    Postgres(PostgresConnection),
    Mssql(MssqlConnection),
    #[cfg(test)]
    Mock(mock::MockConnection),
}

impl Connection {
    /// Open one handle for the descriptor's driver.
    pub async fn open(descriptor: &ConnectionDescriptor) -> Result<Self> {
        debug!("Opening {} connection", descriptor.driver());
        match descriptor.driver() {
            Driver::Mysql => MysqlConnection::connect(descriptor)
                .await
                .map(Connection::Mysql),
            Driver::Postgres => PostgresConnection::connect(descriptor)
                .await
                .map(Connection::Postgres),
            Driver::SqlServer | Driver::Dblib => {
                MssqlConnection::connect(descriptor, descriptor.driver().name())
                    .await
                    .map(Connection::Mssql)
            }
        }
    }

    /// Close the handle.
    pub async fn close(self) -> Result<()> {
        match self {
            Connection::Mysql(c) => c.close().await,
            Connection::Postgres(c) => c.close().await,
            Connection::Mssql(c) => c.close().await,
            #[cfg(test)]
            Connection::Mock(c) => c.close().await,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn DbConnection {
        match self {
            Connection::Mysql(c) => c,
            Connection::Postgres(c) => c,
            Connection::Mssql(c) => c,
            #[cfg(test)]
            Connection::Mock(c) => c,
        }
    }
}

#[async_trait]
impl DbConnection for Connection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        self.inner_mut().query(sql, params).await
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        self.inner_mut().execute(sql, params).await
    }

    async fn stream(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<()> {
        self.inner_mut().stream(sql, params, tx).await
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.inner_mut().batch_execute(sql).await
    }

    fn db_type(&self) -> &str {
        match self {
            Connection::Mysql(c) => c.db_type(),
            Connection::Postgres(c) => c.db_type(),
            Connection::Mssql(c) => c.db_type(),
            #[cfg(test)]
            Connection::Mock(c) => c.db_type(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_driver_parse_aliases() {
        assert_eq!(Driver::parse("mysql").unwrap(), Driver::Mysql);
        assert_eq!(Driver::parse("pgsql").unwrap(), Driver::Postgres);
        assert_eq!(Driver::parse("PostgreSQL").unwrap(), Driver::Postgres);
        assert_eq!(Driver::parse("sqlsrv").unwrap(), Driver::SqlServer);
        assert_eq!(Driver::parse("mssql").unwrap(), Driver::SqlServer);
        assert_eq!(Driver::parse("dblib").unwrap(), Driver::Dblib);
        assert!(matches!(
            Driver::parse("oracle"),
            Err(DbError::UnsupportedDriver(_))
        ));
    }

    #[test]
    fn test_driver_default_ports() {
        assert_eq!(Driver::Mysql.default_port(), 3306);
        assert_eq!(Driver::Postgres.default_port(), 5432);
        assert_eq!(Driver::Dblib.default_port(), 1433);
    }

    #[test]
    fn test_dialect_impl_from_driver_name() {
        assert_eq!(DialectImpl::from_driver_name("mysql").unwrap().name(), "mysql");
        assert_eq!(
            DialectImpl::from_driver_name("postgres").unwrap().name(),
            "postgres"
        );
        assert_eq!(
            DialectImpl::from_driver_name("sqlsrv").unwrap().name(),
            "sqlserver"
        );
        assert_eq!(DialectImpl::from_driver_name("dblib").unwrap().name(), "dblib");
        assert!(DialectImpl::from_driver_name("unknown").is_err());
    }

    #[test]
    fn test_dialect_impl_dispatch() {
        let dialect = Driver::Postgres.dialect();
        assert_eq!(dialect.quote_ident("table").unwrap(), "\"table\"");
        assert_eq!(dialect.param_placeholder(1), "$1");

        let dialect = Driver::Dblib.dialect();
        assert_eq!(dialect.quote_ident("table").unwrap(), "[table]");
        assert_eq!(dialect.param_placeholder(1), "@P1");
        assert_eq!(dialect.begin_transaction_sql(), "BEGIN TRANSACTION");
    }
}
