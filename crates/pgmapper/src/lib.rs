//! # pgmapper
//!
//! A Postgres data-access layer built around three pieces:
//!
//! - **Query builder** ([`qb::Query`]): fluent SELECT/INSERT/UPDATE/DELETE
//!   construction, or raw SQL, with `:name` parameters compiled to `$n`.
//! - **Executor** ([`exec`]): runs compiled statements, camelCases row keys and
//!   reports "no rows" as a sentinel instead of an error.
//! - **Ambient transactions** ([`transaction`]): a task-scoped connection slot so
//!   nested service calls share one transaction, plus `#[transactional]`.
//!
//! ```ignore
//! use pgmapper::{Database, DatabaseConfig, OrmError, Query};
//!
//! let db = Database::connect(&DatabaseConfig::from_env()?)?;
//!
//! db.transaction(|| async {
//!     let user: Option<User> = Query::new("findUser")
//!         .select(&["index", "name", "email"])
//!         .from("public.user_mst")
//!         .where_("email = :email")
//!         .set_param("email", "alice@example.com")
//!         .find_one(&db)
//!         .await?;
//!     Ok::<_, OrmError>(user)
//! })
//! .await?;
//! ```

pub mod case;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod exec;
pub mod fragments;
pub mod qb;
pub mod row;
pub mod transaction;
pub mod value;

pub use client::{Connection, ConnectionProvider};
pub use config::DatabaseConfig;
pub use database::Database;
pub use error::{OrmError, OrmResult};
pub use exec::{ExecResult, Executor};
pub use fragments::Pagination;
pub use qb::{CompiledStatement, Direction, JoinType, Query};
pub use row::Record;
pub use transaction::{
    Transactional, current_connection, in_current_transaction, in_transaction,
};
pub use value::SqlValue;

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_from_config};

#[cfg(feature = "macros")]
pub use pgmapper_macros::transactional;
