//! # dbforge
//!
//! Fluent, multi-dialect SQL building and execution over MySQL, PostgreSQL,
//! SQL Server and dblib connections.
//!
//! - **Query builder** ([`Db`]) with dialect-correct pagination and named
//!   parameters bound at execution
//! - **Schema introspection** and [`Table`] descriptors rebuilt from
//!   `INFORMATION_SCHEMA`
//! - **Schema definitions** in YAML, applied additively by a [`Migrator`]
//! - **Streaming reads** through [`StreamingReader`]
//! - **Stored-procedure generation** for MySQL and PostgreSQL ([`DbGen`])
//! - **Data sources** over JSON files or SQL text ([`DataSource`])
//!
//! ## Example
//!
//! ```rust,no_run
//! use dbforge::{Config, Db, Params, Registry};
//!
//! #[tokio::main]
//! async fn main() -> dbforge::Result<()> {
//!     let config = Config::load("dbforge.yaml")?;
//!     let registry = Registry::from_config(&config)?;
//!     let mut db = Db::from_registry(&registry, "default")?;
//!
//!     let page = db
//!         .from("users")
//!         .where_eq("active", true)
//!         .order_by("name")
//!         .paginate(20, 1, None)
//!         .await?;
//!     println!("{} of {} users", page.results.len(), page.total);
//!
//!     let total = db.scalar("SELECT COUNT(*) FROM users", &Params::new()).await?;
//!     println!("{:?}", total);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod datasource;
pub mod dbgen;
pub mod drivers;
pub mod error;
pub mod query;
pub mod reader;
pub mod registry;
pub mod schema;

// Re-exports for convenient access
pub use config::{Config, ConnectionDescriptor, Settings};
pub use core::{Params, ResultSet, Row, SqlValue};
pub use datasource::{DataSet, DataSource, Paging};
pub use dbgen::{DbGen, ProcedureGenerator};
pub use drivers::Driver;
pub use error::{DbError, Result};
pub use query::{Db, Order, Page, UpsertOutcome};
pub use reader::StreamingReader;
pub use registry::{Registry, SqlLogger};
pub use schema::{MigrationReport, Migrator, SchemaDefinition, Table};
