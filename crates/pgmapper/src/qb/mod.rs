//! Fluent query builder.
//!
//! A [`Query`] owns a [`QueryDescriptor`] and fills it through chained
//! setters. SQL fragments reference parameters by name (`:email`); compiling
//! rewrites them to Postgres `$n` placeholders and collects the bound values.
//!
//! # Usage
//!
//! ```ignore
//! use pgmapper::qb::{Direction, Query};
//!
//! // SELECT
//! let users: Option<Vec<User>> = Query::new("findActiveUsers")
//!     .select(&["um.index", "um.name", "um.email"])
//!     .from("public.user_mst um")
//!     .where_("um.status = :status")
//!     .order_by("um.created_at", Direction::Desc)
//!     .limit(20)
//!     .set_param("status", "active")
//!     .find_many(&db)
//!     .await?;
//!
//! // INSERT ... RETURNING
//! let created: ExecResult<User> = Query::new("createUser")
//!     .insert("public.user_mst")
//!     .insert_fields(&["name", "email"])
//!     .insert_values(["alice", "alice@example.com"])
//!     .returning(&[])
//!     .exec(&db)
//!     .await?;
//!
//! // Raw SQL for shapes the builder cannot express
//! let exists: Option<Exists> = Query::new("checkEmailExist")
//!     .raw("SELECT exists(SELECT 1 FROM public.user_mst WHERE email = :email)")
//!     .set_param("email", email)
//!     .raw_find_one(&db)
//!     .await?;
//! ```

mod compile;
mod descriptor;
mod params;

pub use compile::CompiledStatement;
pub use descriptor::{
    Direction, InsertValues, Join, JoinType, OrderBy, QueryDescriptor, QueryKind, SetValue,
};

use crate::case::camel_to_snake_key;
use crate::error::{OrmError, OrmResult};
use crate::value::SqlValue;

/// Fluent builder over a single [`QueryDescriptor`].
///
/// Terminal methods (`find_many`, `exec`, ...) consume the builder, so a
/// descriptor is compiled for exactly one execution.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct Query {
    descriptor: QueryDescriptor,
    raw: Vec<String>,
}

impl Query {
    /// Create a builder labelled `name` (shown in logs).
    pub fn new(name: impl Into<String>) -> Self {
        let mut query = Self::default();
        query.descriptor.name = name.into();
        query
    }

    /// Set the diagnostic name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.descriptor.name = name.into();
        self
    }

    /// The descriptor populated so far.
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    // ==================== SELECT ====================

    /// Start a SELECT. An empty field list selects `*`.
    pub fn select(mut self, fields: &[&str]) -> Self {
        self.descriptor.set_kind(QueryKind::Select);
        self.descriptor.select_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the target relation (FROM clause, with optional alias).
    pub fn from(mut self, table: &str) -> Self {
        self.descriptor.table = table.to_string();
        self
    }

    /// Append a JOIN. `on` may be empty for CROSS / NATURAL joins.
    pub fn join(mut self, kind: JoinType, table: &str, on: &str) -> Self {
        self.descriptor.joins.push(Join {
            kind,
            table: table.to_string(),
            on: on.to_string(),
        });
        self
    }

    /// Append an INNER JOIN.
    pub fn inner_join(self, table: &str, on: &str) -> Self {
        self.join(JoinType::Inner, table, on)
    }

    /// Append a LEFT JOIN.
    pub fn left_join(self, table: &str, on: &str) -> Self {
        self.join(JoinType::Left, table, on)
    }

    // ==================== WHERE ====================

    /// Set the WHERE predicate, replacing any previous one.
    pub fn where_(mut self, predicate: &str) -> Self {
        self.descriptor.where_clauses = vec![predicate.to_string()];
        self
    }

    /// Append `AND (predicate)`.
    ///
    /// Without a preceding [`where_`](Self::where_) the predicate becomes the
    /// initial WHERE.
    pub fn and(mut self, predicate: &str) -> Self {
        if self.descriptor.where_clauses.is_empty() {
            return self.where_(predicate);
        }
        self.descriptor.where_clauses.push(format!("AND ({predicate})"));
        self
    }

    /// Append `OR predicate`.
    ///
    /// Without a preceding [`where_`](Self::where_) the predicate becomes the
    /// initial WHERE.
    pub fn or(mut self, predicate: &str) -> Self {
        if self.descriptor.where_clauses.is_empty() {
            return self.where_(predicate);
        }
        self.descriptor.where_clauses.push(format!("OR {predicate}"));
        self
    }

    // ==================== GROUP / ORDER / PAGE ====================

    /// Set GROUP BY fields.
    pub fn group_by(mut self, fields: &[&str]) -> Self {
        self.descriptor.group_by = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Set the HAVING predicate.
    pub fn having(mut self, predicate: &str) -> Self {
        self.descriptor.having = vec![predicate.to_string()];
        self
    }

    /// Append an ORDER BY entry.
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.descriptor.order_by.push(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.descriptor.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.descriptor.offset = Some(offset);
        self
    }

    // ==================== INSERT ====================

    /// Start an INSERT into `table`.
    pub fn insert(mut self, table: &str) -> Self {
        self.descriptor.set_kind(QueryKind::Insert);
        self.descriptor.table = table.to_string();
        self
    }

    /// Set the inserted columns.
    pub fn insert_fields(mut self, fields: &[&str]) -> Self {
        self.descriptor.insert_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Insert a single row.
    pub fn insert_values<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.descriptor.values = InsertValues::Row(values.into_iter().map(Into::into).collect());
        self
    }

    /// Insert a batch of rows in one statement.
    pub fn insert_rows<R, I, V>(mut self, rows: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = V>,
        V: Into<SqlValue>,
    {
        self.descriptor.values = InsertValues::Rows(
            rows.into_iter()
                .map(|row| row.into_iter().map(Into::into).collect())
                .collect(),
        );
        self
    }

    // ==================== UPDATE ====================

    /// Start an UPDATE of `table`.
    pub fn update(mut self, table: &str) -> Self {
        self.descriptor.set_kind(QueryKind::Update);
        self.descriptor.table = table.to_string();
        self
    }

    /// Replace all SET entries with bound values.
    pub fn update_fields<I, K, V>(mut self, sets: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        self.descriptor.update_sets = sets
            .into_iter()
            .map(|(k, v)| (k.into(), SetValue::Value(v.into())))
            .collect();
        self
    }

    /// Set one column to a bound value.
    pub fn set(mut self, field: &str, value: impl Into<SqlValue>) -> Self {
        self.descriptor
            .set_update(field.to_string(), SetValue::Value(value.into()));
        self
    }

    /// Set one column to a literal SQL expression.
    pub fn set_raw(mut self, field: &str, expr: &str) -> Self {
        self.descriptor
            .set_update(field.to_string(), SetValue::Raw(expr.to_string()));
        self
    }

    /// Replace all SET entries with the fields of a serializable struct.
    ///
    /// camelCase field names are converted to snake_case columns. Every
    /// serialized field is bound, including `null`s; use
    /// `#[serde(skip_serializing_if = "Option::is_none")]` for partial updates.
    pub fn update_from<T: serde::Serialize>(mut self, value: &T) -> OrmResult<Self> {
        let serde_json::Value::Object(map) = serde_json::to_value(value)? else {
            return Err(OrmError::config(format!(
                "{}: update_from expects a struct or map",
                self.descriptor.name
            )));
        };
        self.descriptor.update_sets = map
            .into_iter()
            .map(|(k, v)| (camel_to_snake_key(&k), SetValue::Value(SqlValue::from(v))))
            .collect();
        Ok(self)
    }

    // ==================== DELETE ====================

    /// Start a DELETE from `table`.
    pub fn delete(mut self, table: &str) -> Self {
        self.descriptor.set_kind(QueryKind::Delete);
        self.descriptor.table = table.to_string();
        self
    }

    // ==================== RETURNING ====================

    /// Add RETURNING. An empty field list returns `*`.
    pub fn returning(mut self, fields: &[&str]) -> Self {
        self.descriptor.returning = true;
        self.descriptor.returning_fields = fields.iter().map(|f| f.to_string()).collect();
        self
    }

    // ==================== Parameters ====================

    /// Bind a named parameter referenced as `:key`.
    pub fn set_param(mut self, key: &str, value: impl Into<SqlValue>) -> Self {
        self.descriptor.set_param(key.to_string(), value.into());
        self
    }

    /// Replace all named parameters.
    pub fn set_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SqlValue>,
    {
        self.descriptor.params.clear();
        for (k, v) in params {
            self.descriptor.set_param(k.into(), v.into());
        }
        self
    }

    // ==================== Raw SQL ====================

    /// Append a raw SQL fragment for [`build_raw`](Self::build_raw).
    pub fn raw(mut self, fragment: &str) -> Self {
        self.raw.push(fragment.to_string());
        self
    }

    // ==================== Build ====================

    /// Compile the structured descriptor.
    pub fn build(&self) -> OrmResult<CompiledStatement> {
        self.descriptor.compile()
    }

    /// Compile the accumulated raw fragments.
    pub fn build_raw(&self) -> OrmResult<CompiledStatement> {
        self.descriptor.compile_raw(&self.raw)
    }
}

#[cfg(test)]
mod tests;
