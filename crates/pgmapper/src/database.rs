//! The [`Database`] handle.

use crate::client::{Connection, ConnectionProvider};
use crate::error::OrmResult;
use crate::exec::Executor;
use crate::qb::{CompiledStatement, Query};
use crate::row::Record;
use crate::transaction::current_connection;
use crate::value::SqlValue;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;

/// Cloneable handle to a connection source.
///
/// Statements executed through a `Database` run on the ambient transaction's
/// connection when one is bound to the current task, and on a freshly acquired
/// connection otherwise. See [`Database::transaction`].
#[derive(Clone)]
pub struct Database {
    provider: Arc<dyn ConnectionProvider>,
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllCount {
    all_cnt: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TotalCount {
    total_cnt: i64,
}

impl Database {
    pub fn new(provider: impl ConnectionProvider + 'static) -> Self {
        Self {
            provider: Arc::new(provider),
        }
    }

    pub fn from_provider(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self { provider }
    }

    #[cfg(feature = "pool")]
    pub fn from_pool(pool: deadpool_postgres::Pool) -> Self {
        Self::new(pool)
    }

    /// Build a pool from `config` and wrap it.
    ///
    /// Connections are opened lazily, so this does not touch the network.
    #[cfg(feature = "pool")]
    pub fn connect(config: &crate::config::DatabaseConfig) -> OrmResult<Self> {
        let pool = crate::pool::create_pool_from_config(config)?;
        tracing::debug!(max_size = config.max_size, "database pool created");
        Ok(Self::from_pool(pool))
    }

    pub(crate) fn provider(&self) -> &dyn ConnectionProvider {
        self.provider.as_ref()
    }

    /// The ambient connection if a transaction is bound, else a fresh one.
    ///
    /// A fresh connection is released when the returned `Arc` is dropped.
    pub async fn connection(&self) -> OrmResult<Arc<dyn Connection>> {
        match current_connection() {
            Some(connection) => Ok(connection),
            None => self.provider.acquire().await,
        }
    }

    /// Row count of `table`, or `None` if the count query returned no row.
    pub async fn all_count(&self, table: &str) -> OrmResult<Option<i64>> {
        let row: Option<AllCount> = Query::new(format!("{table}.allCount"))
            .select(&["CAST(COUNT(*) AS BIGINT) AS all_cnt"])
            .from(table)
            .find_one(self)
            .await?;
        Ok(row.map(|r| r.all_cnt))
    }

    /// Row count of `table` under `where_clause`, whose `:name` placeholders
    /// are bound from `params`.
    pub async fn total_count<K, V>(
        &self,
        table: &str,
        where_clause: &str,
        params: impl IntoIterator<Item = (K, V)>,
    ) -> OrmResult<Option<i64>>
    where
        K: Into<String>,
        V: Into<SqlValue>,
    {
        let mut query = Query::new(format!("{table}.totalCount"))
            .select(&["CAST(COUNT(*) AS BIGINT) AS total_cnt"])
            .from(table)
            .set_params(params);
        if !where_clause.trim().is_empty() {
            query = query.where_(where_clause);
        }
        let row: Option<TotalCount> = query.find_one(self).await?;
        Ok(row.map(|r| r.total_cnt))
    }
}

impl Executor for Database {
    async fn fetch(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
        let connection = self.connection().await?;
        connection.query(statement).await
    }
}
