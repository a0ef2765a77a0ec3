//! Configuration validation.

use super::Config;
use crate::drivers::{Driver, SslMode};
use crate::error::{DbError, Result};

/// Validate the configuration.
///
/// Checks shape only; `env:` references are resolved later, when the
/// registry builds descriptors.
pub fn validate(config: &Config) -> Result<()> {
    for (name, connection) in &config.connections {
        let present = |field: &Option<String>| {
            field
                .as_deref()
                .map(|v| !v.trim().is_empty())
                .unwrap_or(false)
        };

        for (field, key) in [
            (&connection.driver, "driver"),
            (&connection.host_name, "hostName"),
            (&connection.database_name, "databaseName"),
            (&connection.user_name, "userName"),
        ] {
            if !present(field) {
                return Err(DbError::Config(format!(
                    "connections.{}.{} is required",
                    name, key
                )));
            }
        }

        if let Some(driver) = connection.driver.as_deref() {
            if !driver.starts_with(super::ENV_PREFIX) {
                Driver::parse(driver)?;
            }
        }
        if let Some(ssl_mode) = connection.ssl_mode.as_deref() {
            if !ssl_mode.starts_with(super::ENV_PREFIX) {
                SslMode::parse(ssl_mode)?;
            }
        }
        if let Some(0) = connection.port {
            return Err(DbError::Config(format!(
                "connections.{}.port must be greater than 0",
                name
            )));
        }
    }

    for (name, source) in &config.datasources {
        if source.path.as_os_str().is_empty() {
            return Err(DbError::Config(format!(
                "datasources.{}.path is required",
                name
            )));
        }
        if let Some(ref connection) = source.connection {
            if !config.connections.contains_key(connection) {
                return Err(DbError::Config(format!(
                    "datasources.{} refers to unknown connection '{}'",
                    name, connection
                )));
            }
        }
    }

    if let Some(0) = config.settings.statement_timeout_secs {
        return Err(DbError::Config(
            "settings.statement_timeout_secs must be at least 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionConfig, DataSourceConfig, DataSourceKind};

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.connections.insert(
            "default".into(),
            ConnectionConfig {
                driver: Some("mysql".into()),
                host_name: Some("localhost".into()),
                database_name: Some("app".into()),
                user_name: Some("root".into()),
                ..Default::default()
            },
        );
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_missing_host() {
        let mut config = valid_config();
        if let Some(c) = config.connections.get_mut("default") {
            c.host_name = None;
        }
        let err = validate(&config).unwrap_err();
        assert!(err.to_string().contains("connections.default.hostName"));
    }

    #[test]
    fn test_unknown_driver() {
        let mut config = valid_config();
        if let Some(c) = config.connections.get_mut("default") {
            c.driver = Some("oracle".into());
        }
        assert!(matches!(
            validate(&config),
            Err(DbError::UnsupportedDriver(_))
        ));
    }

    #[test]
    fn test_env_driver_is_deferred() {
        let mut config = valid_config();
        if let Some(c) = config.connections.get_mut("default") {
            c.driver = Some("env:APP_DRIVER".into());
        }
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_datasource_unknown_connection() {
        let mut config = valid_config();
        config.datasources.insert(
            "users".into(),
            DataSourceConfig {
                kind: DataSourceKind::Sql,
                path: "users.sql".into(),
                connection: Some("reporting".into()),
            },
        );
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = valid_config();
        config.settings.statement_timeout_secs = Some(0);
        assert!(validate(&config).is_err());
    }
}
