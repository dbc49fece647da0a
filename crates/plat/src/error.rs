use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("introspection timed out after {}s", timeout.as_secs())]
    IntrospectionTimeout { timeout: Duration },

    #[error("applying '{target}' failed: {source}")]
    Apply {
        target: String,
        #[source]
        source: tokio_postgres::Error,
    },
}
