//! Utilities shared across database drivers.

pub mod tls;

pub use tls::{client_config, postgres_connector, SslMode};
