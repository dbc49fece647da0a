//! Traced database client.
//!
//! Wraps a tokio-postgres client and logs every statement via tracing.

use crate::error::Error;
use tokio_postgres::types::ToSql;
use tokio_postgres::{NoTls, Row};
use tracing::Instrument;

/// A connection that logs every statement it runs.
///
/// # Example
///
/// ```ignore
/// let client = TracedClient::connect("postgres://localhost/estate").await?;
/// let rows = client
///     .query("SELECT tablename FROM pg_catalog.pg_tables", &[])
///     .await?;
/// ```
pub struct TracedClient {
    inner: tokio_postgres::Client,
}

impl TracedClient {
    /// Connect to the backend and drive the connection on a background task.
    pub async fn connect(url: &str) -> Result<Self, Error> {
        let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "postgres connection error");
            }
        });
        Ok(Self { inner: client })
    }

    /// Wrap an already-established client.
    pub fn new(client: tokio_postgres::Client) -> Self {
        Self { inner: client }
    }

    /// Execute a query, returning all rows.
    pub async fn query(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<Row>, tokio_postgres::Error> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            rows = tracing::field::Empty,
        );
        let rows = self.inner.query(sql, params).instrument(span.clone()).await?;
        span.record("rows", rows.len());
        Ok(rows)
    }

    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<u64, tokio_postgres::Error> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            affected = tracing::field::Empty,
        );
        let affected = self
            .inner
            .execute(sql, params)
            .instrument(span.clone())
            .await?;
        span.record("affected", affected);
        Ok(affected)
    }

    /// Run a statement over the simple query protocol.
    ///
    /// DDL goes through here: it takes no parameters and some statements
    /// cannot be prepared.
    pub async fn batch_execute(&self, sql: &str) -> Result<(), tokio_postgres::Error> {
        let span = tracing::debug_span!("db.batch_execute", sql = %sql);
        self.inner.batch_execute(sql).instrument(span).await
    }
}
