//! Forward-only row cursor over one statement.
//!
//! The statement runs on a spawned task that owns the builder's connection and
//! feeds rows through a bounded channel. Once the cursor is exhausted the
//! connection goes back to the builder, which then disconnects (unless a
//! transaction is open) and clears its clause state.

use serde::de::DeserializeOwned;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::core::row::Row;
use crate::core::traits::DbConnection;
use crate::core::value::Params;
use crate::drivers::Connection;
use crate::error::{DbError, Result};
use crate::query::Db;

/// Rows buffered between the driver task and the reader.
const READ_BUFFER: usize = 16;

type StreamTask = JoinHandle<(Connection, Result<()>)>;

/// One-directional cursor borrowed from a [`Db`].
///
/// Dropping the reader before it is exhausted stops the statement and drops
/// the connection; an open transaction on it is lost.
pub struct StreamingReader<'a> {
    db: &'a mut Db,
    rx: mpsc::Receiver<Result<Row>>,
    task: Option<StreamTask>,
    done: bool,
}

impl<'a> StreamingReader<'a> {
    /// Execute `sql` and position the cursor before the first row.
    pub async fn open(db: &'a mut Db, sql: &str, params: &Params) -> Result<Self> {
        let bound = match db.prepare(sql, params).await {
            Ok(bound) => bound,
            Err(e) => return db.finish(Err(e)).await,
        };
        let Some(mut connection) = db.take_connection() else {
            return db.finish(Err(DbError::NotConnected)).await;
        };

        let (tx, rx) = mpsc::channel(READ_BUFFER);
        let task = tokio::spawn(async move {
            let result = connection.stream(&bound.sql, &bound.values, &tx).await;
            (connection, result)
        });
        debug!("Streaming reader opened");

        Ok(Self {
            db,
            rx,
            task: Some(task),
            done: false,
        })
    }

    /// Next row, or `None` once the statement is exhausted.
    ///
    /// The first `None` (or error) releases the connection; later calls keep
    /// returning `None`.
    pub async fn read(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        match self.rx.recv().await {
            Some(Ok(row)) => Ok(Some(row)),
            Some(Err(e)) => self.close(Err(e)).await,
            None => self.close(Ok(None)).await,
        }
    }

    /// [`read`](Self::read) mapped onto `T`.
    pub async fn read_as<T: DeserializeOwned>(&mut self) -> Result<Option<T>> {
        self.read().await?.map(|row| row.deserialize()).transpose()
    }

    pub fn is_exhausted(&self) -> bool {
        self.done
    }

    async fn close(&mut self, outcome: Result<Option<Row>>) -> Result<Option<Row>> {
        self.done = true;
        self.rx.close();

        let streamed = match self.task.take() {
            Some(task) => match task.await {
                Ok((connection, result)) => {
                    self.db.restore_connection(connection);
                    result
                }
                Err(e) => Err(DbError::driver(e, "streaming reader task")),
            },
            None => Ok(()),
        };
        debug!("Streaming reader exhausted");

        let outcome = outcome.and_then(|row| streamed.map(|_| row));
        self.db.finish(outcome).await
    }
}

impl Drop for StreamingReader<'_> {
    fn drop(&mut self) {
        if !self.done {
            warn!("Streaming reader dropped before exhaustion, connection closed");
            self.db.reset_state();
        }
    }
}

impl Db {
    /// Open a [`StreamingReader`] over `sql`.
    pub async fn reader(&mut self, sql: &str, params: &Params) -> Result<StreamingReader<'_>> {
        StreamingReader::open(self, sql, params).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConnectionDescriptor, Settings};
    use crate::core::value::SqlValue;
    use crate::drivers::Driver;
    use crate::query::tests::mocked;
    use serde::Deserialize;
    use std::sync::Arc;

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        id: i64,
        name: String,
    }

    fn user(id: i64, name: &str) -> Row {
        Row::new().with("id", id).with("name", name)
    }

    fn db() -> Db {
        let descriptor = ConnectionDescriptor::new(Driver::Postgres, "localhost", "app", "app", "");
        Db::new(Arc::new(descriptor), Settings::default())
    }

    #[tokio::test]
    async fn test_open_with_unbound_parameter_resets_builder() {
        let mut db = db();
        db.from("users").where_eq("id", 1);
        let err = db
            .reader("SELECT * FROM users WHERE id = :id", &Params::new())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::UnboundParameter(_)));
        assert!(matches!(db.get_sql(None), Err(DbError::MissingFrom)));
        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_reads_rows_until_exhausted() {
        let (mut db, mock) = mocked(Driver::Postgres);
        mock.push_rows(vec![user(1, "Ana"), user(2, "Ben")]);

        let params = Params::new().with("role", "admin");
        let mut reader = db
            .reader("SELECT id, name FROM users WHERE role = :role", &params)
            .await
            .unwrap();

        let first = reader.read().await.unwrap().unwrap();
        assert_eq!(first.get_i64("id"), Some(1));
        let second: User = reader.read_as().await.unwrap().unwrap();
        assert_eq!(second, User { id: 2, name: "Ben".into() });
        assert!(!reader.is_exhausted());

        assert!(reader.read().await.unwrap().is_none());
        assert!(reader.is_exhausted());
        assert!(reader.read_as::<User>().await.unwrap().is_none());
        drop(reader);

        assert!(!db.is_connected());
        assert_eq!((mock.opened(), mock.closed()), (1, 1));
        assert_eq!(
            mock.statements(),
            vec!["SELECT id, name FROM users WHERE role = $1"]
        );
        assert_eq!(mock.values(), vec![vec![SqlValue::Text("admin".into())]]);
    }

    #[tokio::test]
    async fn test_stream_error_releases_connection() {
        let (mut db, mock) = mocked(Driver::Mysql);
        mock.push_error("lost connection");

        let mut reader = db.reader("SELECT * FROM users", &Params::new()).await.unwrap();
        let err = reader.read().await.unwrap_err();
        assert!(matches!(err, DbError::Driver { .. }));
        assert!(reader.is_exhausted());
        assert!(reader.read().await.unwrap().is_none());
        drop(reader);

        assert!(!db.is_connected());
        assert_eq!(mock.closed(), 1);
    }

    #[tokio::test]
    async fn test_drop_before_exhaustion_resets_builder() {
        let (mut db, mock) = mocked(Driver::Mysql);
        mock.push_rows(vec![user(1, "Ana"), user(2, "Ben"), user(3, "Cy")]);

        db.from("users").where_eq("id", 1);
        let mut reader = db.reader("SELECT * FROM users", &Params::new()).await.unwrap();
        assert!(reader.read().await.unwrap().is_some());
        drop(reader);

        assert!(!db.is_connected());
        assert_eq!(mock.closed(), 0);
        assert!(matches!(db.get_sql(None), Err(DbError::MissingFrom)));
    }
}
