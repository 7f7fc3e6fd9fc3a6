//! PostgreSQL backend over `tokio-postgres`

use async_trait::async_trait;
use bytes::Bytes;
use futures::SinkExt;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};
use tracing::{Instrument, Span, error, info, info_span};

use super::{ConnectionConfig, Database, DatabaseError, Row};

/// A single PostgreSQL connection.
///
/// The connection driver runs on a spawned task; it ends when the client is
/// dropped or [`close`](Database::close) is called.
pub struct PostgresDatabase {
    client: Option<Client>,
    driver: Option<JoinHandle<()>>,
    span: Span,
}

impl std::fmt::Debug for PostgresDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresDatabase")
            .field("open", &self.client.is_some())
            .finish()
    }
}

impl PostgresDatabase {
    /// Connect with the given settings
    pub async fn connect(config: &ConnectionConfig) -> Result<Self, DatabaseError> {
        let span = info_span!("postgres", host = %config.host, database = %config.database);
        Self::connect_with(config.to_pg_config(), span).await
    }

    /// Connect with a prepared `tokio_postgres` configuration
    pub async fn connect_with(config: tokio_postgres::Config, span: Span) -> Result<Self, DatabaseError> {
        let (client, connection) = match config.connect(NoTls).instrument(span.clone()).await {
            Ok(pair) => pair,
            Err(e) => {
                span.in_scope(|| error!("PostgreSQL connection failed: {}", e));
                return Err(DatabaseError::Connection(e.to_string()));
            }
        };

        let driver = tokio::spawn(
            async move {
                if let Err(e) = connection.await {
                    error!("PostgreSQL connection error: {}", e);
                }
            }
            .instrument(span.clone()),
        );

        span.in_scope(|| info!("Connected to PostgreSQL"));
        Ok(Self {
            client: Some(client),
            driver: Some(driver),
            span,
        })
    }

    fn client(&self) -> Result<&Client, DatabaseError> {
        self.client.as_ref().ok_or(DatabaseError::Closed)
    }
}

fn query_error(e: tokio_postgres::Error) -> DatabaseError {
    match e.as_db_error() {
        Some(db) => DatabaseError::Query(db.message().to_string()),
        None if e.is_closed() => DatabaseError::Connection(e.to_string()),
        None => DatabaseError::Query(e.to_string()),
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn execute(&mut self, sql: &str) -> Result<u64, DatabaseError> {
        self.client()?.execute(sql, &[]).await.map_err(query_error)
    }

    async fn execute_with_text_array(&mut self, sql: &str, values: &[String]) -> Result<u64, DatabaseError> {
        let values: Vec<&str> = values.iter().map(String::as_str).collect();
        self.client()?.execute(sql, &[&values]).await.map_err(query_error)
    }

    async fn query(&mut self, sql: &str) -> Result<Vec<Row>, DatabaseError> {
        let messages = self.client()?.simple_query(sql).await.map_err(query_error)?;
        Ok(messages
            .into_iter()
            .filter_map(|message| match message {
                SimpleQueryMessage::Row(row) => {
                    Some((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect())
                }
                _ => None,
            })
            .collect())
    }

    async fn copy_in(&mut self, sql: &str, data: Vec<u8>) -> Result<u64, DatabaseError> {
        let copy_error = |e: tokio_postgres::Error| match e.as_db_error() {
            Some(db) => DatabaseError::Copy(db.message().to_string()),
            None => DatabaseError::Copy(e.to_string()),
        };

        let sink = self.client()?.copy_in::<_, Bytes>(sql).await.map_err(copy_error)?;
        futures::pin_mut!(sink);
        sink.send(Bytes::from(data)).await.map_err(copy_error)?;
        sink.finish().await.map_err(copy_error)
    }

    async fn begin(&mut self) -> Result<(), DatabaseError> {
        self.client()?.batch_execute("BEGIN").await.map_err(query_error)
    }

    async fn commit(&mut self) -> Result<(), DatabaseError> {
        self.client()?.batch_execute("COMMIT").await.map_err(query_error)
    }

    async fn rollback(&mut self) -> Result<(), DatabaseError> {
        self.client()?.batch_execute("ROLLBACK").await.map_err(query_error)
    }

    async fn close(&mut self) -> Result<(), DatabaseError> {
        // Dropping the client ends the driver task.
        drop(self.client.take());
        if let Some(driver) = self.driver.take() {
            driver
                .await
                .map_err(|e| DatabaseError::Connection(e.to_string()))?;
            self.span.in_scope(|| info!("PostgreSQL connection closed"));
        }
        Ok(())
    }
}
