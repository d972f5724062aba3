//! In-memory connection provider for integration tests.
//!
//! Every statement is logged with the id of the connection it ran on. Each
//! acquired connection counts as released when its last handle is dropped.

#![allow(dead_code)]

use async_trait::async_trait;
use pgmapper::{
    CompiledStatement, Connection, ConnectionProvider, Database, OrmError, OrmResult, Record,
    SqlValue,
};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub conn: usize,
    pub sql: String,
    pub values: Vec<SqlValue>,
}

#[derive(Default)]
struct State {
    acquired: AtomicUsize,
    released: AtomicUsize,
    fail_acquire: AtomicBool,
    log: Mutex<Vec<Entry>>,
    rows: Mutex<Vec<Record>>,
    fail_on: Mutex<Vec<String>>,
}

impl State {
    fn record(&self, conn: usize, sql: &str, values: &[SqlValue]) -> OrmResult<()> {
        self.log.lock().unwrap().push(Entry {
            conn,
            sql: sql.to_string(),
            values: values.to_vec(),
        });
        let failing = self
            .fail_on
            .lock()
            .unwrap()
            .iter()
            .any(|needle| sql.contains(needle.as_str()));
        if failing {
            return Err(OrmError::Other(format!("mock failure: {sql}")));
        }
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct MockProvider {
    state: Arc<State>,
}

impl MockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database(&self) -> Database {
        Database::new(self.clone())
    }

    /// Rows returned by every subsequent query.
    pub fn set_rows(&self, rows: Vec<Value>) {
        *self.state.rows.lock().unwrap() = rows
            .into_iter()
            .map(|v| v.as_object().cloned().unwrap_or_default())
            .collect();
    }

    /// Fail every statement whose text contains `needle`.
    pub fn fail_on(&self, needle: &str) {
        self.state.fail_on.lock().unwrap().push(needle.to_string());
    }

    pub fn fail_acquire(&self, fail: bool) {
        self.state.fail_acquire.store(fail, Ordering::SeqCst);
    }

    pub fn acquired(&self) -> usize {
        self.state.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.state.released.load(Ordering::SeqCst)
    }

    pub fn log(&self) -> Vec<Entry> {
        self.state.log.lock().unwrap().clone()
    }

    /// Statement texts run on connection `conn`, in order.
    pub fn statements(&self, conn: usize) -> Vec<String> {
        self.log()
            .into_iter()
            .filter(|e| e.conn == conn)
            .map(|e| e.sql)
            .collect()
    }

    pub fn count(&self, sql: &str) -> usize {
        self.log().iter().filter(|e| e.sql == sql).count()
    }
}

#[async_trait]
impl ConnectionProvider for MockProvider {
    async fn acquire(&self) -> OrmResult<Arc<dyn Connection>> {
        if self.state.fail_acquire.load(Ordering::SeqCst) {
            return Err(OrmError::Pool("mock pool exhausted".into()));
        }
        let id = self.state.acquired.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Arc::new(MockConnection {
            id,
            state: Arc::clone(&self.state),
        }))
    }
}

pub struct MockConnection {
    id: usize,
    state: Arc<State>,
}

#[async_trait]
impl Connection for MockConnection {
    async fn query(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
        // let concurrent chains interleave
        tokio::task::yield_now().await;
        self.state
            .record(self.id, &statement.text, &statement.values)?;
        Ok(self.state.rows.lock().unwrap().clone())
    }

    async fn batch_execute(&self, sql: &str) -> OrmResult<()> {
        tokio::task::yield_now().await;
        self.state.record(self.id, sql, &[])
    }
}

impl Drop for MockConnection {
    fn drop(&mut self) {
        self.state.released.fetch_add(1, Ordering::SeqCst);
    }
}

/// Route `tracing` output through the test harness (`RUST_LOG=pgmapper=debug`).
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Error type of the services under test.
#[derive(Debug)]
pub enum AppError {
    Db(OrmError),
    Domain(&'static str),
}

impl From<OrmError> for AppError {
    fn from(err: OrmError) -> Self {
        AppError::Db(err)
    }
}
