//! Statement execution and result shaping.
//!
//! Every retrieval mode compiles the query, runs it through an [`Executor`],
//! converts row keys from snake_case to camelCase, and deserializes rows into
//! the caller's type.
//!
//! "No rows" is never an error. It is reported through a sentinel (`None` or
//! [`ExecResult::Empty`]) so callers can tell "matched nothing" apart from a
//! failure and raise their own domain error if a row was required.

use crate::case::record_to_camel;
use crate::client::Connection;
use crate::error::OrmResult;
use crate::qb::{CompiledStatement, Query};
use crate::row::Record;
use serde::de::DeserializeOwned;
use std::future::Future;
use std::sync::Arc;

/// Anything that can run a compiled statement.
///
/// Implemented by connections and by [`Database`](crate::Database), which
/// routes through the ambient transaction when one is bound.
pub trait Executor: Send + Sync {
    fn fetch(
        &self,
        statement: &CompiledStatement,
    ) -> impl Future<Output = OrmResult<Vec<Record>>> + Send;
}

impl Executor for dyn Connection {
    async fn fetch(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
        self.query(statement).await
    }
}

impl Executor for Arc<dyn Connection> {
    async fn fetch(&self, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
        self.query(statement).await
    }
}

/// Result of [`Query::exec`] / [`Query::raw_exec`], shaped by row count.
///
/// # Caller contract
///
/// The shape depends on how many rows the statement produced, not on the
/// statement itself:
///
/// - 0 rows → [`ExecResult::Empty`]
/// - 1 row → [`ExecResult::One`], the row itself (not a one-element list)
/// - 2+ rows → [`ExecResult::Many`]
///
/// A statement whose cardinality varies by input (e.g. `INSERT ... RETURNING`
/// for one row vs. a batch) yields different variants across calls. Match on
/// all three, or use [`ExecResult::into_vec`] when a uniform list is wanted.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecResult<T> {
    Empty,
    One(T),
    Many(Vec<T>),
}

impl<T> ExecResult<T> {
    pub fn is_empty(&self) -> bool {
        matches!(self, ExecResult::Empty)
    }

    /// Number of rows represented.
    pub fn len(&self) -> usize {
        match self {
            ExecResult::Empty => 0,
            ExecResult::One(_) => 1,
            ExecResult::Many(rows) => rows.len(),
        }
    }

    /// Flatten into a list regardless of shape.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ExecResult::Empty => Vec::new(),
            ExecResult::One(row) => vec![row],
            ExecResult::Many(rows) => rows,
        }
    }

    /// The single row, or the first of many.
    pub fn into_first(self) -> Option<T> {
        match self {
            ExecResult::Empty => None,
            ExecResult::One(row) => Some(row),
            ExecResult::Many(rows) => rows.into_iter().next(),
        }
    }
}

impl Query {
    /// Execute and return every row (camelCased) without deserializing.
    pub async fn fetch_records<E: Executor + ?Sized>(self, executor: &E) -> OrmResult<Vec<Record>> {
        let statement = self.build()?;
        run(executor, &statement).await
    }

    /// Execute; `None` when no rows matched, otherwise every row.
    pub async fn find_many<T, E>(self, executor: &E) -> OrmResult<Option<Vec<T>>>
    where
        T: DeserializeOwned,
        E: Executor + ?Sized,
    {
        let statement = self.build()?;
        many(run(executor, &statement).await?)
    }

    /// Execute; `None` when no rows matched, otherwise the first row.
    pub async fn find_one<T, E>(self, executor: &E) -> OrmResult<Option<T>>
    where
        T: DeserializeOwned,
        E: Executor + ?Sized,
    {
        let statement = self.build()?;
        first(run(executor, &statement).await?)
    }

    /// Execute and shape the result by row count. See [`ExecResult`].
    pub async fn exec<T, E>(self, executor: &E) -> OrmResult<ExecResult<T>>
    where
        T: DeserializeOwned,
        E: Executor + ?Sized,
    {
        let statement = self.build()?;
        classify(run(executor, &statement).await?)
    }

    /// [`find_many`](Self::find_many) over the raw SQL fragments.
    pub async fn raw_find_many<T, E>(self, executor: &E) -> OrmResult<Option<Vec<T>>>
    where
        T: DeserializeOwned,
        E: Executor + ?Sized,
    {
        let statement = self.build_raw()?;
        many(run(executor, &statement).await?)
    }

    /// [`find_one`](Self::find_one) over the raw SQL fragments.
    pub async fn raw_find_one<T, E>(self, executor: &E) -> OrmResult<Option<T>>
    where
        T: DeserializeOwned,
        E: Executor + ?Sized,
    {
        let statement = self.build_raw()?;
        first(run(executor, &statement).await?)
    }

    /// [`exec`](Self::exec) over the raw SQL fragments.
    pub async fn raw_exec<T, E>(self, executor: &E) -> OrmResult<ExecResult<T>>
    where
        T: DeserializeOwned,
        E: Executor + ?Sized,
    {
        let statement = self.build_raw()?;
        classify(run(executor, &statement).await?)
    }
}

async fn run<E: Executor + ?Sized>(executor: &E, statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
    let rows = executor.fetch(statement).await?;
    Ok(rows.into_iter().map(record_to_camel).collect())
}

fn decode<T: DeserializeOwned>(record: Record) -> OrmResult<T> {
    Ok(serde_json::from_value(serde_json::Value::Object(record))?)
}

fn many<T: DeserializeOwned>(rows: Vec<Record>) -> OrmResult<Option<Vec<T>>> {
    if rows.is_empty() {
        return Ok(None);
    }
    rows.into_iter().map(decode).collect::<OrmResult<Vec<T>>>().map(Some)
}

fn first<T: DeserializeOwned>(rows: Vec<Record>) -> OrmResult<Option<T>> {
    rows.into_iter().next().map(decode).transpose()
}

fn classify<T: DeserializeOwned>(rows: Vec<Record>) -> OrmResult<ExecResult<T>> {
    match rows.len() {
        0 => Ok(ExecResult::Empty),
        1 => first(rows).map(|row| row.map_or(ExecResult::Empty, ExecResult::One)),
        _ => rows
            .into_iter()
            .map(decode)
            .collect::<OrmResult<Vec<T>>>()
            .map(ExecResult::Many),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::OrmError;
    use serde::Deserialize;
    use serde_json::{Value, json};

    /// Returns a fixed set of rows for every statement.
    struct Fixed(Vec<Value>);

    impl Executor for Fixed {
        async fn fetch(&self, _statement: &CompiledStatement) -> OrmResult<Vec<Record>> {
            Ok(self
                .0
                .iter()
                .map(|v| v.as_object().cloned().unwrap_or_default())
                .collect())
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    #[serde(rename_all = "camelCase")]
    struct User {
        user_id: i64,
        user_name: String,
    }

    fn select() -> Query {
        Query::new("users").select(&[]).from("users")
    }

    #[tokio::test]
    async fn find_many_zero_rows_is_sentinel() {
        let rows: Option<Vec<User>> = select().find_many(&Fixed(vec![])).await.unwrap();
        assert!(rows.is_none());
    }

    #[tokio::test]
    async fn find_many_one_row_is_one_element_list() {
        let exec = Fixed(vec![json!({ "user_id": 1, "user_name": "a" })]);
        let rows: Option<Vec<User>> = select().find_many(&exec).await.unwrap();
        assert_eq!(
            rows,
            Some(vec![User {
                user_id: 1,
                user_name: "a".into()
            }])
        );
    }

    #[tokio::test]
    async fn find_one_returns_first_row() {
        let exec = Fixed(vec![
            json!({ "user_id": 1, "user_name": "a" }),
            json!({ "user_id": 2, "user_name": "b" }),
        ]);
        let user: Option<User> = select().find_one(&exec).await.unwrap();
        assert_eq!(user.map(|u| u.user_id), Some(1));
    }

    #[tokio::test]
    async fn exec_shapes_by_row_count() {
        let none: ExecResult<User> = select().exec(&Fixed(vec![])).await.unwrap();
        assert_eq!(none, ExecResult::Empty);

        let one: ExecResult<User> = select()
            .exec(&Fixed(vec![json!({ "user_id": 1, "user_name": "a" })]))
            .await
            .unwrap();
        assert!(matches!(one, ExecResult::One(User { user_id: 1, .. })));

        let two: ExecResult<User> = select()
            .exec(&Fixed(vec![
                json!({ "user_id": 1, "user_name": "a" }),
                json!({ "user_id": 2, "user_name": "b" }),
            ]))
            .await
            .unwrap();
        assert_eq!(two.len(), 2);
        assert!(matches!(two, ExecResult::Many(_)));
    }

    #[tokio::test]
    async fn records_are_camel_cased() {
        let exec = Fixed(vec![json!({ "created_at": "2024-01-01 00:00:00", "meta_data": { "a_b": 1 } })]);
        let rows = select().fetch_records(&exec).await.unwrap();
        assert_eq!(
            Value::Object(rows[0].clone()),
            json!({ "createdAt": "2024-01-01 00:00:00", "metaData": { "aB": 1 } })
        );
    }

    #[tokio::test]
    async fn config_errors_surface_before_execution() {
        let err = Query::new("broken")
            .find_many::<Value, _>(&Fixed(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, OrmError::Config(_)));
    }

    #[tokio::test]
    async fn raw_exec_uses_raw_fragments() {
        let exec = Fixed(vec![json!({ "exists": true })]);
        let result: ExecResult<Value> = Query::new("checkEmailExist")
            .raw("SELECT exists(SELECT 1 FROM users WHERE email = :email)")
            .set_param("email", "a@b.c")
            .raw_exec(&exec)
            .await
            .unwrap();
        assert_eq!(result, ExecResult::One(json!({ "exists": true })));
    }

    #[tokio::test]
    async fn decode_failure_is_serialization_error() {
        let exec = Fixed(vec![json!({ "user_id": "not a number", "user_name": "a" })]);
        let err = select().find_one::<User, _>(&exec).await.unwrap_err();
        assert!(matches!(err, OrmError::Serialization(_)));
    }
}
