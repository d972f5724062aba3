//! Connection traits.
//!
//! A [`ConnectionProvider`] hands out [`Connection`]s; a connection is released
//! when the last `Arc` to it is dropped (deadpool returns the object to its
//! pool on drop). Both traits are object safe so a connection can be stored in
//! the task-local transaction slot.

use crate::error::{OrmError, OrmResult};
use crate::qb::CompiledStatement;
use crate::row::{Record, to_records};
use async_trait::async_trait;
use std::sync::Arc;

/// A live database connection.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Run a compiled statement and decode every returned row.
    async fn query(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>>;

    /// Run parameterless SQL such as `BEGIN`, `COMMIT` or `ROLLBACK`.
    async fn batch_execute(&self, sql: &str) -> OrmResult<()>;
}

/// Source of connections, typically a pool.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// Check out a connection. It is released when dropped.
    async fn acquire(&self) -> OrmResult<Arc<dyn Connection>>;
}

#[async_trait]
impl Connection for tokio_postgres::Client {
    async fn query(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
        let params = statement.params_ref();
        let rows = tokio_postgres::Client::query(self, statement.text.as_str(), &params)
            .await
            .map_err(OrmError::from_db_error)?;
        to_records(&rows)
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(OrmError::from_db_error)
    }
}

/// Most prepared statements a pooled connection keeps before its cache is reset.
#[cfg(feature = "pool")]
pub const STATEMENT_CACHE_CAPACITY: usize = 256;

/// Pooled connections reuse deadpool's per-connection prepared statement cache,
/// cleared once it grows past [`STATEMENT_CACHE_CAPACITY`].
#[cfg(feature = "pool")]
#[async_trait]
impl Connection for deadpool_postgres::Object {
    async fn query(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
        let prepared = deadpool_postgres::ClientWrapper::prepare_cached(self, &statement.text)
            .await
            .map_err(OrmError::from_db_error)?;
        let cached = self.statement_cache.size();
        if cached > STATEMENT_CACHE_CAPACITY {
            tracing::debug!(
                target: "pgmapper.sql",
                cached,
                capacity = STATEMENT_CACHE_CAPACITY,
                "clearing prepared statement cache"
            );
            self.statement_cache.clear();
        }
        let params = statement.params_ref();
        let rows = tokio_postgres::Client::query(self, &prepared, &params)
            .await
            .map_err(OrmError::from_db_error)?;
        to_records(&rows)
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        tokio_postgres::Client::batch_execute(self, sql)
            .await
            .map_err(OrmError::from_db_error)
    }
}

#[cfg(feature = "pool")]
#[async_trait]
impl ConnectionProvider for deadpool_postgres::Pool {
    async fn acquire(&self) -> OrmResult<Arc<dyn Connection>> {
        let object = self.get().await?;
        Ok(Arc::new(object))
    }
}
