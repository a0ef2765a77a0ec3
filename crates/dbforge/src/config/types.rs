//! Configuration type definitions and connection descriptors.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::drivers::{Driver, SslMode};
use crate::error::{DbError, Result};

/// Prefix that marks a value as an environment variable reference.
pub const ENV_PREFIX: &str = "env:";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Application-wide settings.
    #[serde(default)]
    pub settings: Settings,

    /// Named connections; `default` is used when no name is given.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,

    /// Named data sources.
    #[serde(default)]
    pub datasources: BTreeMap<String, DataSourceConfig>,
}

/// Application-wide settings read by every builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Send rendered SQL and its parameters to the SQL logger.
    #[serde(default)]
    pub log_sql: bool,

    /// Per-statement deadline in seconds.
    #[serde(default)]
    pub statement_timeout_secs: Option<u64>,
}

/// One connection entry as written in the configuration file.
///
/// String values may use `env:NAME` indirection; it is resolved when the
/// entry is turned into a [`ConnectionDescriptor`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    #[serde(default)]
    pub driver: Option<String>,

    #[serde(default)]
    pub host_name: Option<String>,

    #[serde(default)]
    pub database_name: Option<String>,

    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    /// Port (default: per driver).
    #[serde(default)]
    pub port: Option<u16>,

    /// TLS mode for PostgreSQL and MySQL (default: "disable").
    #[serde(default)]
    pub ssl_mode: Option<String>,

    /// Encrypt the TDS session (SQL Server / dblib).
    #[serde(default)]
    pub encrypt: bool,

    /// Accept the server certificate without validation (SQL Server / dblib).
    #[serde(default)]
    pub trust_server_certificate: bool,
}

/// Kind of data source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSourceKind {
    /// JSON array of objects read from a file.
    Json,
    /// SQL text read from a file and run on a connection.
    Sql,
}

/// One data source entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataSourceConfig {
    pub kind: DataSourceKind,

    pub path: PathBuf,

    /// Connection used by SQL sources (default: "default").
    #[serde(default)]
    pub connection: Option<String>,
}

/// Resolved connection parameters for one named database.
///
/// Immutable once built; shared through `Arc` by the registry.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionDescriptor {
    driver: Driver,
    host: String,
    database: String,
    user: String,
    password: String,
    port: Option<u16>,
    ssl_mode: SslMode,
    encrypt: bool,
    trust_server_certificate: bool,
}

impl ConnectionDescriptor {
    pub fn new(
        driver: Driver,
        host: impl Into<String>,
        database: impl Into<String>,
        user: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            host: host.into(),
            database: database.into(),
            user: user.into(),
            password: password.into(),
            port: None,
            ssl_mode: SslMode::Disable,
            encrypt: false,
            trust_server_certificate: false,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_ssl_mode(mut self, ssl_mode: SslMode) -> Self {
        self.ssl_mode = ssl_mode;
        self
    }

    pub fn with_encryption(mut self, encrypt: bool, trust_server_certificate: bool) -> Self {
        self.encrypt = encrypt;
        self.trust_server_certificate = trust_server_certificate;
        self
    }

    /// Build a descriptor from a config entry, resolving `env:` references
    /// from the process environment.
    pub fn from_config(config: &ConnectionConfig) -> Result<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Build a descriptor using `lookup` to resolve `env:` references.
    pub fn from_config_with<F>(config: &ConnectionConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |field: &Option<String>, key: &str| -> Result<String> {
            match field.as_deref() {
                Some(value) if !value.trim().is_empty() => resolve_env_with(value, &lookup),
                _ => Err(DbError::Config(format!(
                    "connection is missing required key '{}'",
                    key
                ))),
            }
        };

        let driver = Driver::parse(&required(&config.driver, "driver")?)?;
        let host = required(&config.host_name, "hostName")?;
        let database = required(&config.database_name, "databaseName")?;
        let user = required(&config.user_name, "userName")?;
        let password = match config.password.as_deref() {
            Some(value) => resolve_env_with(value, &lookup)?,
            None => String::new(),
        };
        let ssl_mode = match config.ssl_mode.as_deref() {
            Some(value) => SslMode::parse(&resolve_env_with(value, &lookup)?)?,
            None => SslMode::Disable,
        };

        let mut descriptor = Self::new(driver, host, database, user, password)
            .with_ssl_mode(ssl_mode)
            .with_encryption(config.encrypt, config.trust_server_certificate);
        if let Some(port) = config.port {
            descriptor = descriptor.with_port(port);
        }
        Ok(descriptor)
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    /// Configured port, or the driver's default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.driver.default_port())
    }

    pub fn ssl_mode(&self) -> SslMode {
        self.ssl_mode
    }

    pub fn encrypt(&self) -> bool {
        self.encrypt
    }

    pub fn trust_server_certificate(&self) -> bool {
        self.trust_server_certificate
    }
}

impl fmt::Debug for ConnectionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDescriptor")
            .field("driver", &self.driver)
            .field("host", &self.host)
            .field("port", &self.port())
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("ssl_mode", &self.ssl_mode)
            .finish()
    }
}

/// Replace an `env:NAME` value with the named environment variable.
pub fn resolve_env(value: &str) -> Result<String> {
    resolve_env_with(value, |name| std::env::var(name).ok())
}

/// Replace an `env:NAME` value using `lookup`; other values pass through.
pub fn resolve_env_with<F>(value: &str, lookup: F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    match value.strip_prefix(ENV_PREFIX) {
        Some(name) => {
            let name = name.trim();
            lookup(name).ok_or_else(|| {
                DbError::Config(format!("environment variable '{}' is not set", name))
            })
        }
        None => Ok(value.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(name: &str) -> Option<String> {
        match name {
            "APP_DB_PASSWORD" => Some("s3cret".to_string()),
            "APP_DB_HOST" => Some("db.internal".to_string()),
            _ => None,
        }
    }

    fn entry() -> ConnectionConfig {
        ConnectionConfig {
            driver: Some("pgsql".into()),
            host_name: Some("env:APP_DB_HOST".into()),
            database_name: Some("app".into()),
            user_name: Some("app".into()),
            password: Some("env:APP_DB_PASSWORD".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_resolve_env_passthrough() {
        assert_eq!(resolve_env_with("plain", lookup).unwrap(), "plain");
        assert_eq!(resolve_env_with("env:APP_DB_PASSWORD", lookup).unwrap(), "s3cret");
        assert!(resolve_env_with("env:MISSING", lookup).is_err());
    }

    #[test]
    fn test_descriptor_resolves_env_and_defaults() {
        let descriptor = ConnectionDescriptor::from_config_with(&entry(), lookup).unwrap();
        assert_eq!(descriptor.driver(), Driver::Postgres);
        assert_eq!(descriptor.host(), "db.internal");
        assert_eq!(descriptor.password(), "s3cret");
        assert_eq!(descriptor.port(), 5432);
        assert_eq!(descriptor.ssl_mode(), SslMode::Disable);
    }

    #[test]
    fn test_descriptor_missing_required_key() {
        let mut config = entry();
        config.user_name = None;
        let err = ConnectionDescriptor::from_config_with(&config, lookup).unwrap_err();
        assert!(err.to_string().contains("userName"));
    }

    #[test]
    fn test_descriptor_password_defaults_empty() {
        let mut config = entry();
        config.password = None;
        config.port = Some(6543);
        let descriptor = ConnectionDescriptor::from_config_with(&config, lookup).unwrap();
        assert_eq!(descriptor.password(), "");
        assert_eq!(descriptor.port(), 6543);
    }

    #[test]
    fn test_debug_redacts_password() {
        let descriptor = ConnectionDescriptor::from_config_with(&entry(), lookup).unwrap();
        let debug = format!("{:?}", descriptor);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("s3cret"));
    }

    #[test]
    fn test_connection_config_camel_case_keys() {
        let yaml = r#"
driver: sqlsrv
hostName: localhost
databaseName: app
userName: sa
trustServerCertificate: true
"#;
        let config: ConnectionConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.host_name.as_deref(), Some("localhost"));
        assert!(config.trust_server_certificate);
        assert!(config.password.is_none());
    }
}
