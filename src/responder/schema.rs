//! Backend schema sources for the `check_schema` tool.

use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::debug;

use crate::{AppError, Result};

/// Boxed future returned by [`SchemaSource`] methods.
pub type SchemaFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Something that can list the relations of a backend database.
///
/// The responder calls [`SchemaSource::reconnect`] before every tool call so a
/// long-lived responder never queries through a stale connection.
pub trait SchemaSource: Send {
    /// Drop any existing connection and open a fresh one.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` when the backend cannot be reached.
    fn reconnect(&mut self) -> SchemaFuture<'_, ()>;

    /// Relation names in backend order. No filtering or pagination.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Db` when the query fails or no connection is open.
    fn table_names(&mut self) -> SchemaFuture<'_, Vec<String>>;
}

/// `SQLite` backend reading `sqlite_master`.
#[derive(Debug)]
pub struct SqliteSchema {
    url: String,
    pool: Option<SqlitePool>,
}

impl SqliteSchema {
    /// Create a source for `url` without connecting yet.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            pool: None,
        }
    }

    /// Database URL this source connects to.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl SchemaSource for SqliteSchema {
    fn reconnect(&mut self) -> SchemaFuture<'_, ()> {
        Box::pin(async move {
            if let Some(pool) = self.pool.take() {
                pool.close().await;
            }

            // Never create the database: a missing file is a tool failure.
            let options = SqliteConnectOptions::from_str(&self.url)?.create_if_missing(false);
            let pool = SqlitePoolOptions::new()
                .max_connections(1)
                .connect_with(options)
                .await?;

            debug!(url = %self.url, "schema backend connected");
            self.pool = Some(pool);
            Ok(())
        })
    }

    fn table_names(&mut self) -> SchemaFuture<'_, Vec<String>> {
        Box::pin(async move {
            let pool = self
                .pool
                .as_ref()
                .ok_or_else(|| AppError::Db("schema backend not connected".into()))?;

            let names: Vec<String> = sqlx::query_scalar(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' \
                 ORDER BY rowid",
            )
            .fetch_all(pool)
            .await?;

            Ok(names)
        })
    }
}
