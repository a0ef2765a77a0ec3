//! Single MySQL/MariaDB connection on SQLx.

use async_trait::async_trait;
use futures::TryStreamExt;
use rust_decimal::Decimal;
use sqlx::mysql::{MySqlArguments, MySqlConnectOptions, MySqlRow, MySqlSslMode};
use sqlx::query::Query;
use sqlx::{
    Column as _, Connection as _, Executor, MySql, Row as _, TypeInfo as _, ValueRef as _,
};
use tokio::sync::mpsc;
use tracing::info;

use crate::config::ConnectionDescriptor;
use crate::core::row::{ResultSet, Row};
use crate::core::traits::DbConnection;
use crate::core::value::SqlValue;
use crate::drivers::SslMode;
use crate::error::Result;

/// One live MySQL handle.
pub struct MysqlConnection {
    conn: sqlx::MySqlConnection,
}

impl MysqlConnection {
    /// Open a connection for the descriptor.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let ssl_mode = match descriptor.ssl_mode() {
            SslMode::Disable => MySqlSslMode::Disabled,
            SslMode::Require => MySqlSslMode::Required,
            SslMode::VerifyCa => MySqlSslMode::VerifyCa,
            SslMode::VerifyFull => MySqlSslMode::VerifyIdentity,
        };

        let options = MySqlConnectOptions::new()
            .host(descriptor.host())
            .port(descriptor.port())
            .database(descriptor.database())
            .username(descriptor.user())
            .password(descriptor.password())
            .ssl_mode(ssl_mode);

        let conn = sqlx::MySqlConnection::connect_with(&options).await?;

        info!(
            "Connected to MySQL: {}:{}/{}",
            descriptor.host(),
            descriptor.port(),
            descriptor.database()
        );

        Ok(Self { conn })
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.conn.close().await?;
        Ok(())
    }
}

#[async_trait]
impl DbConnection for MysqlConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        let rows = bind_all(sqlx::query(sql), params)
            .fetch_all(&mut self.conn)
            .await?;
        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()
            .map(ResultSet::new)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let result = bind_all(sqlx::query(sql), params)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stream(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<()> {
        let mut rows = bind_all(sqlx::query(sql), params).fetch(&mut self.conn);
        while let Some(row) = rows.try_next().await? {
            if tx.send(decode_row(&row)).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    /// Unprepared text protocol, so procedure bodies with inner `;` go
    /// through as one statement.
    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        let conn: &mut sqlx::MySqlConnection = &mut self.conn;
        Executor::execute(conn, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "mysql"
    }
}

fn bind_all<'q>(
    mut query: Query<'q, MySql, MySqlArguments>,
    params: &'q [SqlValue],
) -> Query<'q, MySql, MySqlArguments> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::I16(v) => query.bind(*v),
            SqlValue::I32(v) => query.bind(*v),
            SqlValue::I64(v) => query.bind(*v),
            SqlValue::F32(v) => query.bind(*v),
            SqlValue::F64(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Bytes(v) => query.bind(v.as_slice()),
            // UUIDs are stored as CHAR(36)
            SqlValue::Uuid(v) => query.bind(v.to_string()),
            SqlValue::Decimal(v) => query.bind(*v),
            SqlValue::DateTime(v) => query.bind(*v),
            SqlValue::DateTimeOffset(v) => query.bind(v.naive_utc()),
            SqlValue::Date(v) => query.bind(*v),
            SqlValue::Time(v) => query.bind(*v),
        };
    }
    query
}

fn decode_row(row: &MySqlRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_value(row, idx, column.type_info().name())?);
    }
    Ok(Row::from_parts(columns, values))
}

/// Convert one column of a MySQL row, keyed on the server type name.
fn decode_value(row: &MySqlRow, idx: usize, type_name: &str) -> Result<SqlValue> {
    if row.try_get_raw(idx)?.is_null() {
        return Ok(SqlValue::Null);
    }

    let ty = type_name.to_uppercase();
    let value = match ty.as_str() {
        "BOOLEAN" => SqlValue::Bool(row.try_get::<bool, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            SqlValue::I64(row.try_get::<i64, _>(idx)?)
        }
        t if t.ends_with("UNSIGNED") => {
            let v = row.try_get::<u64, _>(idx)?;
            i64::try_from(v)
                .map(SqlValue::I64)
                .unwrap_or_else(|_| SqlValue::Decimal(Decimal::from(v)))
        }
        "FLOAT" => SqlValue::F32(row.try_get::<f32, _>(idx)?),
        "DOUBLE" => SqlValue::F64(row.try_get::<f64, _>(idx)?),
        "DECIMAL" => SqlValue::Decimal(row.try_get::<Decimal, _>(idx)?),
        "DATE" => SqlValue::Date(row.try_get::<chrono::NaiveDate, _>(idx)?),
        "TIME" => SqlValue::Time(row.try_get::<chrono::NaiveTime, _>(idx)?),
        "DATETIME" => SqlValue::DateTime(row.try_get::<chrono::NaiveDateTime, _>(idx)?),
        "TIMESTAMP" => {
            let v = row.try_get::<chrono::DateTime<chrono::Utc>, _>(idx)?;
            SqlValue::DateTimeOffset(v.into())
        }
        "BINARY" | "VARBINARY" | "BLOB" | "TINYBLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        _ => match row.try_get::<String, _>(idx) {
            Ok(s) => SqlValue::Text(s),
            Err(_) => SqlValue::Bytes(row.try_get::<Vec<u8>, _>(idx)?),
        },
    };
    Ok(value)
}
