//! Single PostgreSQL connection on tokio-postgres.
//!
//! Parameters are encoded against the type the server inferred for each
//! placeholder, so an integer bound to a `numeric` column or a string bound
//! to a `uuid` column is converted instead of rejected.

use std::error::Error as StdError;

use async_trait::async_trait;
use bytes::BytesMut;
use futures::{pin_mut, TryStreamExt};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use tokio_postgres::{Client, NoTls};
use tracing::{error, info};

use crate::config::ConnectionDescriptor;
use crate::core::row::{ResultSet, Row};
use crate::core::traits::DbConnection;
use crate::core::value::SqlValue;
use crate::drivers::common::postgres_connector;
use crate::error::Result;

type BoxError = Box<dyn StdError + Sync + Send>;

/// One live PostgreSQL handle.
pub struct PostgresConnection {
    client: Client,
    driver_task: JoinHandle<()>,
}

impl PostgresConnection {
    /// Open a connection for the descriptor.
    pub async fn connect(descriptor: &ConnectionDescriptor) -> Result<Self> {
        let mut config = tokio_postgres::Config::new();
        config
            .host(descriptor.host())
            .port(descriptor.port())
            .dbname(descriptor.database())
            .user(descriptor.user())
            .password(descriptor.password());

        let (client, driver_task) = match postgres_connector(descriptor.ssl_mode())? {
            Some(tls) => {
                let (client, connection) = config.connect(tls).await?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                (client, task)
            }
            None => {
                let (client, connection) = config.connect(NoTls).await?;
                let task = tokio::spawn(async move {
                    if let Err(e) = connection.await {
                        error!("PostgreSQL connection error: {}", e);
                    }
                });
                (client, task)
            }
        };

        info!(
            "Connected to PostgreSQL: {}:{}/{}",
            descriptor.host(),
            descriptor.port(),
            descriptor.database()
        );

        Ok(Self {
            client,
            driver_task,
        })
    }

    /// Close the connection; dropping the client ends the driver task.
    pub async fn close(self) -> Result<()> {
        drop(self.client);
        let _ = self.driver_task.await;
        Ok(())
    }
}

fn param_refs(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl DbConnection for PostgresConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        let rows = self.client.query(sql, &param_refs(params)).await?;
        rows.iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()
            .map(ResultSet::new)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        Ok(self.client.execute(sql, &param_refs(params)).await?)
    }

    async fn stream(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<()> {
        let rows = self.client.query_raw(sql, param_refs(params)).await?;
        pin_mut!(rows);
        while let Some(row) = rows.try_next().await? {
            if tx.send(decode_row(&row)).await.is_err() {
                break;
            }
        }
        Ok(())
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.client.batch_execute(sql).await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        "postgres"
    }
}

fn mismatch(value: &SqlValue, ty: &Type) -> BoxError {
    format!("cannot encode {:?} as PostgreSQL type {}", value, ty.name()).into()
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> std::result::Result<IsNull, BoxError> {
        if self.is_null() {
            return Ok(IsNull::Yes);
        }

        match ty.name() {
            "bool" => match self {
                SqlValue::Bool(v) => v.to_sql(ty, out),
                SqlValue::Text(s) => matches!(s.as_str(), "t" | "true" | "1").to_sql(ty, out),
                other => (other.as_i64().ok_or_else(|| mismatch(self, ty))? != 0).to_sql(ty, out),
            },
            "int2" => {
                let v = self.as_i64().ok_or_else(|| mismatch(self, ty))?;
                i16::try_from(v)?.to_sql(ty, out)
            }
            "int4" => {
                let v = self.as_i64().ok_or_else(|| mismatch(self, ty))?;
                i32::try_from(v)?.to_sql(ty, out)
            }
            "int8" => self
                .as_i64()
                .ok_or_else(|| mismatch(self, ty))?
                .to_sql(ty, out),
            "float4" => (self.as_f64().ok_or_else(|| mismatch(self, ty))? as f32).to_sql(ty, out),
            "float8" => self
                .as_f64()
                .ok_or_else(|| mismatch(self, ty))?
                .to_sql(ty, out),
            "numeric" => {
                let d = match self {
                    SqlValue::Decimal(d) => *d,
                    SqlValue::Text(s) => s.trim().parse::<Decimal>()?,
                    SqlValue::F32(_) | SqlValue::F64(_) => self
                        .as_f64()
                        .and_then(Decimal::from_f64)
                        .ok_or_else(|| mismatch(self, ty))?,
                    other => Decimal::from(other.as_i64().ok_or_else(|| mismatch(self, ty))?),
                };
                d.to_sql(ty, out)
            }
            "uuid" => match self {
                SqlValue::Uuid(u) => u.to_sql(ty, out),
                SqlValue::Text(s) => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            "timestamp" => match self {
                SqlValue::DateTime(v) => v.to_sql(ty, out),
                SqlValue::DateTimeOffset(v) => v.naive_utc().to_sql(ty, out),
                SqlValue::Date(v) => v.and_time(chrono::NaiveTime::MIN).to_sql(ty, out),
                SqlValue::Text(s) => parse_naive_datetime(s)
                    .ok_or_else(|| mismatch(self, ty))?
                    .to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            "timestamptz" => match self {
                SqlValue::DateTimeOffset(v) => v.to_sql(ty, out),
                SqlValue::DateTime(v) => v.and_utc().to_sql(ty, out),
                SqlValue::Text(s) => chrono::DateTime::parse_from_rfc3339(s.trim())?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            "date" => match self {
                SqlValue::Date(v) => v.to_sql(ty, out),
                SqlValue::DateTime(v) => v.date().to_sql(ty, out),
                SqlValue::Text(s) => s.trim().parse::<chrono::NaiveDate>()?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            "time" => match self {
                SqlValue::Time(v) => v.to_sql(ty, out),
                SqlValue::Text(s) => s.trim().parse::<chrono::NaiveTime>()?.to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            "bytea" => match self {
                SqlValue::Bytes(b) => b.as_slice().to_sql(ty, out),
                SqlValue::Text(s) => s.as_bytes().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            "json" | "jsonb" => match self {
                SqlValue::Text(s) => serde_json::from_str::<serde_json::Value>(s)?.to_sql(ty, out),
                other => other.to_json().to_sql(ty, out),
            },
            // text, varchar, bpchar, name, unknown and anything else sent as text
            _ => self.to_string().as_str().to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}

fn parse_naive_datetime(s: &str) -> Option<chrono::NaiveDateTime> {
    let s = s.trim();
    ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
}

/// Raw column bytes for types without a native mapping.
struct RawValue(Vec<u8>);

impl<'a> FromSql<'a> for RawValue {
    fn from_sql(_ty: &Type, raw: &'a [u8]) -> std::result::Result<Self, BoxError> {
        Ok(RawValue(raw.to_vec()))
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn decode_row(row: &tokio_postgres::Row) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());
    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());
        values.push(decode_value(row, idx, column.type_())?);
    }
    Ok(Row::from_parts(columns, values))
}

/// Convert one column of a PostgreSQL row, keyed on the column type.
fn decode_value(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<SqlValue> {
    let value = match ty.name() {
        "bool" => row.try_get::<_, Option<bool>>(idx)?.map(SqlValue::Bool),
        "int2" => row.try_get::<_, Option<i16>>(idx)?.map(SqlValue::I16),
        "int4" => row.try_get::<_, Option<i32>>(idx)?.map(SqlValue::I32),
        "int8" => row.try_get::<_, Option<i64>>(idx)?.map(SqlValue::I64),
        "oid" => row
            .try_get::<_, Option<u32>>(idx)?
            .map(|v| SqlValue::I64(i64::from(v))),
        "float4" => row.try_get::<_, Option<f32>>(idx)?.map(SqlValue::F32),
        "float8" => row.try_get::<_, Option<f64>>(idx)?.map(SqlValue::F64),
        "numeric" => row.try_get::<_, Option<Decimal>>(idx)?.map(SqlValue::Decimal),
        "uuid" => row.try_get::<_, Option<uuid::Uuid>>(idx)?.map(SqlValue::Uuid),
        "timestamp" => row
            .try_get::<_, Option<chrono::NaiveDateTime>>(idx)?
            .map(SqlValue::DateTime),
        "timestamptz" => row
            .try_get::<_, Option<chrono::DateTime<chrono::FixedOffset>>>(idx)?
            .map(SqlValue::DateTimeOffset),
        "date" => row.try_get::<_, Option<chrono::NaiveDate>>(idx)?.map(SqlValue::Date),
        "time" => row.try_get::<_, Option<chrono::NaiveTime>>(idx)?.map(SqlValue::Time),
        "bytea" => row.try_get::<_, Option<Vec<u8>>>(idx)?.map(SqlValue::Bytes),
        "json" | "jsonb" => row
            .try_get::<_, Option<serde_json::Value>>(idx)?
            .map(|v| SqlValue::Text(v.to_string())),
        "text" | "varchar" | "bpchar" | "name" | "unknown" => {
            row.try_get::<_, Option<String>>(idx)?.map(SqlValue::Text)
        }
        _ => match row.try_get::<_, Option<String>>(idx) {
            Ok(v) => v.map(SqlValue::Text),
            Err(_) => row
                .try_get::<_, Option<RawValue>>(idx)?
                .map(|raw| SqlValue::Bytes(raw.0)),
        },
    };
    Ok(value.unwrap_or(SqlValue::Null))
}
