//! PostgreSQL database driver.
//!
//! - [`PostgresDialect`]: SQL syntax strategy
//! - [`PostgresConnection`]: single live handle on tokio-postgres, TLS per `sslMode`

mod connection;
mod dialect;

pub use connection::PostgresConnection;
pub use dialect::PostgresDialect;
