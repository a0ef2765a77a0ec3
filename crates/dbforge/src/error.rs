//! Error types for the query builder, schema engine and drivers.

use thiserror::Error;

/// Main error type for dbforge operations.
#[derive(Error, Debug)]
pub enum DbError {
    /// Configuration error (missing connection fields, unknown connection, bad YAML values)
    #[error("Configuration error: {0}")]
    Config(String),

    /// SQL assembly was requested without a table context
    #[error("No table specified: call from() or pass a table before building the query")]
    MissingFrom,

    /// Driver outside mysql, postgres, sqlserver, dblib (or not supported for an operation)
    #[error("Unsupported driver '{0}'")]
    UnsupportedDriver(String),

    /// A local column is mapped twice within the same foreign key constraint
    #[error("Duplicate foreign key: {table}.{column} is already mapped in {constraint}")]
    DuplicateForeignKey {
        table: String,
        column: String,
        constraint: String,
    },

    /// A bare `fk` token matched more than one candidate table
    #[error("Ambiguous foreign key for {table}.{column}: candidates {candidates:?}")]
    AmbiguousForeignKey {
        table: String,
        column: String,
        candidates: Vec<String>,
    },

    /// A foreign key references a table that does not exist or has no usable key
    #[error("No referenced table for {table}.{column}: {reason}")]
    NoSuchReferencedTable {
        table: String,
        column: String,
        reason: String,
    },

    /// A foreign key targets a table whose primary key has more than one column
    #[error("Table {0} has a composite primary key - foreign key resolution requires a single key column")]
    CompositeKeyUnsupported(String),

    /// Any other schema-definition parse failure (unknown token, malformed line)
    #[error("Schema definition error: {0}")]
    SchemaDefinition(String),

    /// Seed row does not line up with the table's columns
    #[error("Seed row for table {table} has {got} values, expected {expected}")]
    SeedRow {
        table: String,
        got: usize,
        expected: usize,
    },

    /// A named placeholder in the SQL text had no bound value
    #[error("No value bound for parameter :{0}")]
    UnboundParameter(String),

    /// Operation needs an open connection but none is available
    #[error("Not connected")]
    NotConnected,

    /// Statement exceeded the configured deadline
    #[error("Statement timed out after {0}s")]
    Timeout(u64),

    /// Data source lookup or evaluation failed
    #[error("Data source error: {0}")]
    DataSource(String),

    /// MySQL driver error
    #[error("MySQL error: {0}")]
    Mysql(#[from] sqlx::Error),

    /// PostgreSQL driver error
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    /// SQL Server / dblib (TDS) driver error
    #[error("SQL Server error: {0}")]
    Mssql(#[from] tiberius::error::Error),

    /// Driver error with context about where it occurred
    #[error("Driver error: {message}\n  Context: {context}")]
    Driver { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DbError {
    /// Create a Driver error with context about where it occurred
    pub fn driver(message: impl ToString, context: impl Into<String>) -> Self {
        DbError::Driver {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Whether this error came out of a database driver.
    pub fn is_driver_error(&self) -> bool {
        matches!(
            self,
            DbError::Mysql(_) | DbError::Postgres(_) | DbError::Mssql(_) | DbError::Driver { .. }
        )
    }

    /// Whether this error was raised while parsing a schema definition.
    pub fn is_schema_error(&self) -> bool {
        matches!(
            self,
            DbError::DuplicateForeignKey { .. }
                | DbError::AmbiguousForeignKey { .. }
                | DbError::NoSuchReferencedTable { .. }
                | DbError::CompositeKeyUnsupported(_)
                | DbError::SchemaDefinition(_)
                | DbError::SeedRow { .. }
        )
    }

    /// Process exit code for the CLI.
    pub fn exit_code(&self) -> u8 {
        if self.is_driver_error() || matches!(self, DbError::Timeout(_)) {
            4
        } else if self.is_schema_error() {
            3
        } else if matches!(
            self,
            DbError::Config(_) | DbError::UnsupportedDriver(_) | DbError::Yaml(_)
        ) {
            2
        } else {
            1
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for dbforge operations.
pub type Result<T> = std::result::Result<T, DbError>;
