//! Named connections, data sources and settings shared by builders.
//!
//! A [`Registry`] is built once (usually from a [`Config`]) and passed by
//! reference or `Arc` to whatever creates [`Db`](crate::Db) builders.
//! Lookups take a read lock; registering a name takes the write lock.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::config::{Config, ConnectionDescriptor, Settings};
use crate::datasource::DataSource;
use crate::error::{DbError, Result};

/// Name used when no connection name is given.
pub const DEFAULT_CONNECTION: &str = "default";

/// Sink for executed SQL text.
pub trait SqlLogger: Send + Sync {
    fn log_sql(&self, text: &str);
}

/// Writes SQL to `tracing` under the `dbforge::sql` target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSqlLogger;

impl SqlLogger for TracingSqlLogger {
    fn log_sql(&self, text: &str) {
        info!(target: "dbforge::sql", "{}", text);
    }
}

/// Registry of named connections and data sources.
pub struct Registry {
    settings: Settings,
    connections: RwLock<HashMap<String, Arc<ConnectionDescriptor>>>,
    datasources: RwLock<HashMap<String, Arc<DataSource>>>,
    logger: Arc<dyn SqlLogger>,
}

impl Registry {
    /// Empty registry with the given settings.
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            connections: RwLock::new(HashMap::new()),
            datasources: RwLock::new(HashMap::new()),
            logger: Arc::new(TracingSqlLogger),
        }
    }

    /// Build a registry from configuration, resolving `env:` references.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::from_config_with(config, |name| std::env::var(name).ok())
    }

    /// Build a registry from configuration using `lookup` for `env:` references.
    pub fn from_config_with<F>(config: &Config, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        config.validate()?;
        let registry = Self::new(config.settings.clone());

        for (name, entry) in &config.connections {
            let descriptor = ConnectionDescriptor::from_config_with(entry, &lookup)
                .map_err(|e| DbError::Config(format!("connection '{}': {}", name, e)))?;
            registry.register_connection(name, descriptor);
        }
        for (name, entry) in &config.datasources {
            registry.register_datasource(DataSource::from_config(name, entry));
        }

        info!(
            "Registry loaded: {} connection(s), {} data source(s)",
            config.connections.len(),
            config.datasources.len()
        );
        Ok(registry)
    }

    /// Replace the SQL logger.
    pub fn with_logger(mut self, logger: Arc<dyn SqlLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn logger(&self) -> Arc<dyn SqlLogger> {
        Arc::clone(&self.logger)
    }

    /// Register (or replace) a named connection.
    pub fn register_connection(&self, name: &str, descriptor: ConnectionDescriptor) {
        debug!("Registering connection '{}' ({})", name, descriptor.driver());
        self.connections
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(name.to_string(), Arc::new(descriptor));
    }

    /// Look up a named connection.
    pub fn connection(&self, name: &str) -> Option<Arc<ConnectionDescriptor>> {
        self.connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }

    /// Look up a named connection, failing when it is not registered.
    pub fn require_connection(&self, name: &str) -> Result<Arc<ConnectionDescriptor>> {
        self.connection(name).ok_or_else(|| {
            if name == DEFAULT_CONNECTION {
                DbError::Config("no default connection registered".into())
            } else {
                DbError::Config(format!("connection '{}' is not registered", name))
            }
        })
    }

    /// The `default` connection.
    pub fn default_connection(&self) -> Result<Arc<ConnectionDescriptor>> {
        self.require_connection(DEFAULT_CONNECTION)
    }

    /// Registered connection names, sorted.
    pub fn connection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .connections
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Register (or replace) a data source under its own name.
    pub fn register_datasource(&self, source: DataSource) {
        self.datasources
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(source.name().to_string(), Arc::new(source));
    }

    /// Look up a named data source.
    pub fn datasource(&self, name: &str) -> Option<Arc<DataSource>> {
        self.datasources
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Driver;
    use std::sync::Mutex;

    #[derive(Default)]
    struct CaptureLogger(Mutex<Vec<String>>);

    impl SqlLogger for CaptureLogger {
        fn log_sql(&self, text: &str) {
            self.0.lock().unwrap().push(text.to_string());
        }
    }

    fn config() -> Config {
        Config::from_yaml(
            r#"
settings:
  log_sql: true
connections:
  default:
    driver: mysql
    hostName: localhost
    databaseName: app
    userName: app
    password: env:REGISTRY_TEST_PASSWORD
datasources:
  countries:
    kind: json
    path: data/countries.json
"#,
        )
        .unwrap()
    }

    fn lookup(name: &str) -> Option<String> {
        (name == "REGISTRY_TEST_PASSWORD").then(|| "pw".to_string())
    }

    #[test]
    fn test_from_config_resolves_connections() {
        let registry = Registry::from_config_with(&config(), lookup).unwrap();
        let default = registry.default_connection().unwrap();
        assert_eq!(default.driver(), Driver::Mysql);
        assert_eq!(default.password(), "pw");
        assert!(registry.settings().log_sql);
        assert!(registry.datasource("countries").is_some());
        assert_eq!(registry.connection_names(), vec!["default".to_string()]);
    }

    #[test]
    fn test_from_config_unset_env_is_config_error() {
        let err = Registry::from_config_with(&config(), |_| None)
            .err()
            .unwrap();
        assert!(matches!(err, DbError::Config(_)));
        assert!(err.to_string().contains("REGISTRY_TEST_PASSWORD"));
    }

    #[test]
    fn test_missing_connections() {
        let registry = Registry::default();
        assert!(registry.connection("reporting").is_none());
        let err = registry.default_connection().unwrap_err();
        assert!(err.to_string().contains("no default connection"));
    }

    #[test]
    fn test_register_replaces_descriptor() {
        let registry = Registry::default();
        registry.register_connection(
            "default",
            ConnectionDescriptor::new(Driver::Mysql, "a", "db", "u", ""),
        );
        registry.register_connection(
            "default",
            ConnectionDescriptor::new(Driver::Postgres, "b", "db", "u", ""),
        );
        assert_eq!(
            registry.default_connection().unwrap().driver(),
            Driver::Postgres
        );
    }

    #[test]
    fn test_custom_logger() {
        let capture = Arc::new(CaptureLogger::default());
        let registry = Registry::default().with_logger(capture.clone());
        registry.logger().log_sql("SELECT 1");
        assert_eq!(capture.0.lock().unwrap().as_slice(), ["SELECT 1"]);
    }
}
