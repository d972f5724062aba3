//! Ambient transactions.
//!
//! A transaction is bound to the current tokio task through a task-local slot.
//! Every statement executed through [`Database`] while the slot is bound uses
//! that connection, so nested service calls share one transaction without
//! passing a connection around.
//!
//! Frames come in two flavours:
//!
//! - **owner**: the slot was empty. The frame acquires a connection, issues
//!   `BEGIN`, binds the slot for the duration of its body, then issues
//!   `COMMIT` (on `Ok`) or `ROLLBACK` (on `Err`) and releases the connection.
//! - **reuser**: the slot was already bound. The body runs on the bound
//!   connection; commit/rollback stays with the owner.
//!
//! Errors from the body are returned unchanged. Task-locals do not cross
//! `tokio::spawn`; wrap spawned futures with [`in_current_transaction`].
//!
//! # Example
//!
//! ```ignore
//! db.transaction(|| async {
//!     Query::new("debit").update("accounts").set_raw("balance", "balance - :amt")
//!         .where_("id = :from").set_param("amt", 100).set_param("from", 1)
//!         .exec::<Value, _>(&db).await?;
//!     Query::new("credit").update("accounts").set_raw("balance", "balance + :amt")
//!         .where_("id = :to").set_param("amt", 100).set_param("to", 2)
//!         .exec::<Value, _>(&db).await?;
//!     Ok::<_, OrmError>(())
//! })
//! .await?;
//! ```

use crate::client::Connection;
use crate::database::Database;
use crate::error::OrmError;
use std::future::Future;
use std::sync::Arc;

tokio::task_local! {
    static CURRENT: Arc<dyn Connection>;
}

/// The connection bound to the current task's transaction, if any.
///
/// Holding on to the returned `Arc` past the transaction delays releasing the
/// connection.
pub fn current_connection() -> Option<Arc<dyn Connection>> {
    CURRENT.try_with(Arc::clone).ok()
}

/// Whether the current task runs inside an ambient transaction.
pub fn in_transaction() -> bool {
    CURRENT.try_with(|_| ()).is_ok()
}

/// Carry the current transaction binding into `future`.
///
/// Use this for futures handed to `tokio::spawn`, which would otherwise start
/// unbound. The spawned work must finish before the owning frame commits.
pub fn in_current_transaction<F: Future>(future: F) -> impl Future<Output = F::Output> {
    let bound = current_connection();
    async move {
        match bound {
            Some(connection) => CURRENT.scope(connection, future).await,
            None => future.await,
        }
    }
}

/// Types whose public async methods run in ambient transactions.
///
/// Implement this and annotate the `impl` block with
/// [`#[transactional]`](crate::transactional) to wrap every eligible method.
pub trait Transactional {
    fn database(&self) -> &Database;
}

impl Database {
    /// Run `body` in a transaction, joining the ambient one if bound.
    ///
    /// As owner: `COMMIT` on `Ok`, `ROLLBACK` on `Err`, connection released on
    /// every exit path including cancellation. As reuser: `body` runs as is.
    /// Failures to acquire, `BEGIN` or `COMMIT` are converted with
    /// `E::from(OrmError)`; errors from `body` are returned unchanged.
    pub async fn transaction<F, Fut, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: From<OrmError>,
    {
        if in_transaction() {
            tracing::trace!(target: "pgmapper.tx", "joining ambient transaction");
            return body().await;
        }

        let connection = self.provider().acquire().await?;
        connection.batch_execute("BEGIN").await?;
        tracing::debug!(target: "pgmapper.tx", "BEGIN");

        let mut guard = OwnerGuard::new(Arc::clone(&connection));
        let result = CURRENT
            .scope(Arc::clone(&connection), async move { body().await })
            .await;

        match result {
            Ok(value) => {
                let committed = connection.batch_execute("COMMIT").await;
                guard.disarm();
                committed?;
                tracing::debug!(target: "pgmapper.tx", "COMMIT");
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_err) = connection.batch_execute("ROLLBACK").await {
                    tracing::error!(
                        target: "pgmapper.tx",
                        error = %rollback_err,
                        "ROLLBACK failed"
                    );
                } else {
                    tracing::debug!(target: "pgmapper.tx", "ROLLBACK");
                }
                guard.disarm();
                Err(error)
            }
        }
    }
}

/// Rolls back an owner frame that was dropped mid-flight.
struct OwnerGuard {
    connection: Option<Arc<dyn Connection>>,
}

impl OwnerGuard {
    fn new(connection: Arc<dyn Connection>) -> Self {
        Self {
            connection: Some(connection),
        }
    }

    fn disarm(&mut self) {
        self.connection = None;
    }
}

impl Drop for OwnerGuard {
    fn drop(&mut self) {
        let Some(connection) = self.connection.take() else {
            return;
        };
        tracing::warn!(
            target: "pgmapper.tx",
            "transaction dropped before completion; rolling back"
        );
        match tokio::runtime::Handle::try_current() {
            // the connection goes back to the pool once the rollback finishes
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(error) = connection.batch_execute("ROLLBACK").await {
                        tracing::error!(target: "pgmapper.tx", %error, "ROLLBACK failed");
                    }
                });
            }
            Err(_) => {
                tracing::error!(
                    target: "pgmapper.tx",
                    "no tokio runtime to roll back a cancelled transaction"
                );
            }
        }
    }
}
