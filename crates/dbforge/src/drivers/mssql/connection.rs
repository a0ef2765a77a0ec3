//! Single SQL Server connection on Tiberius (TDS 7.3).
//!
//! Also used for the `dblib` driver: FreeTDS speaks the same protocol.

use std::borrow::Cow;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use futures::TryStreamExt;
use rust_decimal::Decimal;
use tiberius::{
    AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, QueryItem, ToSql,
};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, info};

use crate::config::ConnectionDescriptor;
use crate::core::row::{ResultSet, Row};
use crate::core::traits::DbConnection;
use crate::core::value::SqlValue;
use crate::error::Result;

/// One live TDS handle.
pub struct MssqlConnection {
    client: Client<Compat<TcpStream>>,
    driver_name: &'static str,
}

impl MssqlConnection {
    /// Open a connection for the descriptor.
    ///
    /// `driver_name` is reported by [`DbConnection::db_type`] ("sqlserver" or "dblib").
    pub async fn connect(
        descriptor: &ConnectionDescriptor,
        driver_name: &'static str,
    ) -> Result<Self> {
        let config = build_config(descriptor);

        let tcp = TcpStream::connect(config.get_addr()).await?;
        tcp.set_nodelay(true)?;
        let client = Client::connect(config, tcp.compat_write()).await?;

        info!(
            "Connected to SQL Server ({}): {}:{}/{}",
            driver_name,
            descriptor.host(),
            descriptor.port(),
            descriptor.database()
        );

        Ok(Self {
            client,
            driver_name,
        })
    }

    /// Close the connection gracefully.
    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        Ok(())
    }
}

fn build_config(descriptor: &ConnectionDescriptor) -> Config {
    let mut config = Config::new();
    config.host(descriptor.host());
    config.port(descriptor.port());
    config.database(descriptor.database());
    config.authentication(AuthMethod::sql_server(
        descriptor.user(),
        descriptor.password(),
    ));

    if descriptor.encrypt() {
        if descriptor.trust_server_certificate() {
            config.trust_cert();
        }
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::NotSupported);
    }

    config
}

fn param_refs(params: &[SqlValue]) -> Vec<&dyn ToSql> {
    params.iter().map(|p| p as &dyn ToSql).collect()
}

#[async_trait]
impl DbConnection for MssqlConnection {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> Result<ResultSet> {
        let refs = param_refs(params);
        let rows = self
            .client
            .query(sql, &refs)
            .await?
            .into_first_result()
            .await?;
        rows.into_iter()
            .map(decode_row)
            .collect::<Result<Vec<_>>>()
            .map(ResultSet::new)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        let refs = param_refs(params);
        let result = self.client.execute(sql, &refs).await?;
        Ok(result.rows_affected().iter().sum())
    }

    async fn stream(
        &mut self,
        sql: &str,
        params: &[SqlValue],
        tx: &mpsc::Sender<Result<Row>>,
    ) -> Result<()> {
        let refs = param_refs(params);
        let mut stream = self.client.query(sql, &refs).await?;
        while let Some(item) = stream.try_next().await? {
            if let QueryItem::Row(row) = item {
                if tx.send(decode_row(row)).await.is_err() {
                    break;
                }
            }
        }
        Ok(())
    }

    async fn batch_execute(&mut self, sql: &str) -> Result<()> {
        self.client.simple_query(sql).await?.into_results().await?;
        Ok(())
    }

    fn db_type(&self) -> &str {
        self.driver_name
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> ColumnData<'_> {
        match self {
            SqlValue::Null => ColumnData::String(None),
            SqlValue::Bool(v) => ColumnData::Bit(Some(*v)),
            SqlValue::I16(v) => ColumnData::I16(Some(*v)),
            SqlValue::I32(v) => ColumnData::I32(Some(*v)),
            SqlValue::I64(v) => ColumnData::I64(Some(*v)),
            SqlValue::F32(v) => ColumnData::F32(Some(*v)),
            SqlValue::F64(v) => ColumnData::F64(Some(*v)),
            SqlValue::Text(v) => ColumnData::String(Some(Cow::Borrowed(v.as_str()))),
            SqlValue::Bytes(v) => ColumnData::Binary(Some(Cow::Borrowed(v.as_slice()))),
            SqlValue::Uuid(v) => ColumnData::Guid(Some(*v)),
            SqlValue::Decimal(v) => v.to_sql(),
            SqlValue::DateTime(v) => v.to_sql(),
            SqlValue::DateTimeOffset(v) => v.to_sql(),
            SqlValue::Date(v) => v.to_sql(),
            SqlValue::Time(v) => v.to_sql(),
        }
    }
}

fn decode_row(row: tiberius::Row) -> Result<Row> {
    let columns: Vec<String> = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    let values = row
        .into_iter()
        .map(decode_value)
        .collect::<Result<Vec<_>>>()?;
    Ok(Row::from_parts(columns, values))
}

/// Convert one TDS column value.
fn decode_value(data: ColumnData<'static>) -> Result<SqlValue> {
    let value = match data {
        ColumnData::U8(v) => v.map(|v| SqlValue::I16(i16::from(v))),
        ColumnData::I16(v) => v.map(SqlValue::I16),
        ColumnData::I32(v) => v.map(SqlValue::I32),
        ColumnData::I64(v) => v.map(SqlValue::I64),
        ColumnData::F32(v) => v.map(SqlValue::F32),
        ColumnData::F64(v) => v.map(SqlValue::F64),
        ColumnData::Bit(v) => v.map(SqlValue::Bool),
        ColumnData::String(v) => v.map(|s| SqlValue::Text(s.into_owned())),
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::Binary(v) => v.map(|b| SqlValue::Bytes(b.into_owned())),
        ColumnData::Numeric(v) => v.map(|n| {
            SqlValue::Decimal(Decimal::from_i128_with_scale(n.value(), u32::from(n.scale())))
        }),
        ColumnData::Xml(v) => v.map(|x| SqlValue::Text(x.into_owned().into_string())),
        data @ (ColumnData::DateTime(_)
        | ColumnData::SmallDateTime(_)
        | ColumnData::DateTime2(_)) => NaiveDateTime::from_sql(&data)?.map(SqlValue::DateTime),
        data @ ColumnData::Date(_) => NaiveDate::from_sql(&data)?.map(SqlValue::Date),
        data @ ColumnData::Time(_) => NaiveTime::from_sql(&data)?.map(SqlValue::Time),
        data @ ColumnData::DateTimeOffset(_) => {
            DateTime::<FixedOffset>::from_sql(&data)?.map(SqlValue::DateTimeOffset)
        }
        #[allow(unreachable_patterns)]
        other => {
            debug!("Unmapped TDS value {:?}, returning NULL", other);
            None
        }
    };
    Ok(value.unwrap_or(SqlValue::Null))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::Driver;

    #[test]
    fn test_build_config_from_descriptor() {
        let descriptor =
            ConnectionDescriptor::new(Driver::SqlServer, "db.internal", "app", "sa", "secret")
                .with_port(1533);
        let config = build_config(&descriptor);
        assert_eq!(config.get_addr(), "db.internal:1533");
    }

    #[test]
    fn test_to_sql_variants() {
        assert!(matches!(SqlValue::Null.to_sql(), ColumnData::String(None)));
        assert!(matches!(
            SqlValue::Bool(true).to_sql(),
            ColumnData::Bit(Some(true))
        ));
        match SqlValue::Text("Ana".into()).to_sql() {
            ColumnData::String(Some(s)) => assert_eq!(s, "Ana"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_decode_scalars() {
        assert_eq!(
            decode_value(ColumnData::I32(Some(7))).unwrap(),
            SqlValue::I32(7)
        );
        assert_eq!(
            decode_value(ColumnData::U8(Some(3))).unwrap(),
            SqlValue::I16(3)
        );
        assert_eq!(decode_value(ColumnData::I64(None)).unwrap(), SqlValue::Null);
        assert_eq!(
            decode_value(ColumnData::String(Some(Cow::Owned("x".into())))).unwrap(),
            SqlValue::Text("x".into())
        );
    }
}
