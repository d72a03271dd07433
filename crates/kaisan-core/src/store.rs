//! The `RecordStore` trait and supporting query types.
//!
//! Rows travel as JSON objects so the trait stays independent of the tables
//! behind it; [`fetch_all`] and [`fetch_one`] decode them into the typed
//! entities of [`crate::entity`]. Every call carries the caller's
//! [`Session`] so the backend can enforce row-level access.

use std::future::Future;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{error::StoreError, session::Session};

// ─── Tables ──────────────────────────────────────────────────────────────────

pub const PROFILES: &str = "profiles";
pub const KNOWLEDGE_BASE: &str = "kaisan_kbase";
pub const SYSTEM_PROMPT: &str = "kaisan_systemprompt";

/// Rejection code of a single-row read that did not match exactly one row.
pub const NOT_SINGULAR: &str = "PGRST116";

// ─── Query types ─────────────────────────────────────────────────────────────

/// An equality filter on a single column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
  pub column: String,
  /// Compared against the column's textual form.
  pub value:  String,
}

impl Filter {
  pub fn eq(column: impl Into<String>, value: impl ToString) -> Self {
    Self {
      column: column.into(),
      value:  value.to_string(),
    }
  }

  /// Whether `row` satisfies the filter. Numbers compare by their decimal
  /// rendering, nulls and missing columns never match.
  pub fn matches(&self, row: &Value) -> bool {
    match row.get(&self.column) {
      Some(Value::String(s)) => *s == self.value,
      Some(Value::Null) | None => false,
      Some(other) => other.to_string() == self.value,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
  pub column:    String,
  pub ascending: bool,
}

/// Parameters for [`RecordStore::select`] and
/// [`RecordStore::select_single`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Query {
  pub table:   String,
  pub filters: Vec<Filter>,
  pub order:   Option<Order>,
}

impl Query {
  pub fn from(table: impl Into<String>) -> Self {
    Self {
      table:   table.into(),
      filters: Vec::new(),
      order:   None,
    }
  }

  pub fn eq(mut self, column: impl Into<String>, value: impl ToString) -> Self {
    self.filters.push(Filter::eq(column, value));
    self
  }

  pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
    self.order = Some(Order {
      column: column.into(),
      ascending,
    });
    self
  }

  pub fn matches(&self, row: &Value) -> bool { self.filters.iter().all(|f| f.matches(row)) }
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over the relational store behind the console.
///
/// All methods return `Send` futures so implementations can be driven from
/// spawned tokio tasks.
pub trait RecordStore: Send + Sync {
  /// All rows matching `query`, in the order it requests.
  fn select<'a>(
    &'a self,
    session: &'a Session,
    query: &'a Query,
  ) -> impl Future<Output = Result<Vec<Value>, StoreError>> + Send + 'a;

  /// Exactly one row. Zero matching rows is [`StoreError::NotFound`], which
  /// callers treat as an expected outcome rather than a failure.
  fn select_single<'a>(
    &'a self,
    session: &'a Session,
    query: &'a Query,
  ) -> impl Future<Output = Result<Value, StoreError>> + Send + 'a;

  /// Insert one row. Columns the row omits take the table's defaults.
  fn insert<'a>(
    &'a self,
    session: &'a Session,
    table: &'a str,
    row: Value,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

  /// Merge `patch` into every row matching `filter`. Returns
  /// [`StoreError::NotFound`] when nothing matched.
  fn update<'a>(
    &'a self,
    session: &'a Session,
    table: &'a str,
    patch: Value,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;

  /// Delete every row matching `filter`. Returns [`StoreError::NotFound`]
  /// when nothing matched.
  fn delete<'a>(
    &'a self,
    session: &'a Session,
    table: &'a str,
    filter: &'a Filter,
  ) -> impl Future<Output = Result<(), StoreError>> + Send + 'a;
}

// ─── Typed helpers ───────────────────────────────────────────────────────────

pub async fn fetch_all<S, T>(
  store: &S,
  session: &Session,
  query: &Query,
) -> Result<Vec<T>, StoreError>
where
  S: RecordStore,
  T: DeserializeOwned,
{
  store
    .select(session, query)
    .await?
    .into_iter()
    .map(|row| serde_json::from_value(row).map_err(StoreError::from))
    .collect()
}

pub async fn fetch_one<S, T>(store: &S, session: &Session, query: &Query) -> Result<T, StoreError>
where
  S: RecordStore,
  T: DeserializeOwned,
{
  let row = store.select_single(session, query).await?;
  Ok(serde_json::from_value(row)?)
}
