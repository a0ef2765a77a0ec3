//! Microsoft SQL Server database driver (also serves `dblib`).
//!
//! - [`MssqlDialect`]: SQL syntax strategy
//! - [`MssqlConnection`]: single live handle on Tiberius

mod connection;
mod dialect;

pub use connection::MssqlConnection;
pub use dialect::{MssqlDialect, ROW_NUMBER_COLUMN};
