//! Attribute macros for pgmapper
//!
//! Provides `#[transactional]`.

use proc_macro::TokenStream;
use syn::{ItemImpl, parse_macro_input};

mod transactional;

/// Run every eligible method of an `impl` block in an ambient transaction.
///
/// A method is wrapped when it is `async`, takes `&self`, its name does not
/// start with `_`, and it is not one of `new`, `database`, `transaction`,
/// `with_transaction`, `client` or `connection`. Wrapped methods must return
/// `Result<_, E>` where `E: From<pgmapper::OrmError>`, and the type must
/// implement `pgmapper::Transactional`.
///
/// The first wrapped call on a task opens the transaction and commits or
/// rolls it back when it returns; nested calls join it.
///
/// # Example
///
/// ```ignore
/// use pgmapper::{Database, Transactional, transactional};
///
/// struct AccountService {
///     db: Database,
/// }
///
/// impl Transactional for AccountService {
///     fn database(&self) -> &Database {
///         &self.db
///     }
/// }
///
/// #[transactional]
/// impl AccountService {
///     pub async fn transfer(&self, from: i64, to: i64, amount: i64) -> Result<(), AppError> {
///         self.withdraw(from, amount).await?;
///         self.deposit(to, amount).await
///     }
///
///     pub async fn withdraw(&self, id: i64, amount: i64) -> Result<(), AppError> { ... }
///     pub async fn deposit(&self, id: i64, amount: i64) -> Result<(), AppError> { ... }
/// }
/// ```
///
/// Arguments must be bound to plain identifiers (no destructuring patterns).
/// Only inherent `impl` blocks are accepted.
///
/// Attributes on a wrapped method apply to the public wrapper. Only `cfg` and
/// lint attributes (`allow`, `expect`, `warn`, `deny`, `forbid`) are repeated
/// on the hidden `__tx_<name>` method.
#[proc_macro_attribute]
pub fn transactional(attr: TokenStream, item: TokenStream) -> TokenStream {
    let item = parse_macro_input!(item as ItemImpl);
    transactional::expand(attr.into(), item)
        .unwrap_or_else(|e| e.to_compile_error())
        .into()
}
