//! PostgREST-backed [`RecordStore`].
//!
//! Every call is made with the caller's access token so row-level security
//! applies. Filters become `column=eq.value` query parameters.

use kaisan_core::{
  Session, StoreError,
  store::{Filter, NOT_SINGULAR, Query, RecordStore},
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{Result, SupabaseConfig, http_client};

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";

/// A PostgREST error body.
#[derive(Debug, Default, Deserialize)]
struct ApiError {
  #[serde(default)]
  code:    Option<String>,
  #[serde(default)]
  message: Option<String>,
  #[serde(default)]
  details: Option<String>,
}

impl ApiError {
  fn into_store_error(self, status: StatusCode) -> StoreError {
    let no_rows = self
      .details
      .as_deref()
      .is_some_and(|d| d.contains("contains 0 rows"));
    if self.code.as_deref() == Some(NOT_SINGULAR) && no_rows {
      return StoreError::NotFound;
    }
    StoreError::Rejected {
      code:    self.code,
      message: self
        .message
        .unwrap_or_else(|| format!("request failed with status {status}")),
    }
  }
}

fn filter_param(filter: &Filter) -> (String, String) {
  (filter.column.clone(), format!("eq.{}", filter.value))
}

fn transport(e: reqwest::Error) -> StoreError { StoreError::Transport(e.to_string()) }

/// Record store over the Supabase REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct SupabaseStore {
  http:   Client,
  config: SupabaseConfig,
}

impl SupabaseStore {
  pub fn new(config: SupabaseConfig) -> Result<Self> {
    Ok(Self::with_client(http_client()?, config))
  }

  pub fn with_client(http: Client, config: SupabaseConfig) -> Self { Self { http, config } }

  fn request(&self, method: Method, table: &str, session: Option<&Session>) -> RequestBuilder {
    let url = self.config.endpoint(&format!("/rest/v1/{table}"));
    let req = self
      .http
      .request(method, url)
      .header("apikey", &self.config.anon_key);
    match session {
      Some(session) => req.bearer_auth(&session.access_token),
      None => req.bearer_auth(&self.config.anon_key),
    }
  }

  fn query(&self, method: Method, session: &Session, query: &Query) -> RequestBuilder {
    let mut params: Vec<(String, String)> = vec![("select".into(), "*".into())];
    params.extend(query.filters.iter().map(filter_param));
    if let Some(order) = &query.order {
      let direction = if order.ascending { "asc" } else { "desc" };
      params.push(("order".into(), format!("{}.{direction}", order.column)));
    }
    self
      .request(method, &query.table, Some(session))
      .query(&params)
  }

  async fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
    let resp = req.send().await.map_err(transport)?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!(%status, %body, "store request rejected");
    let error: ApiError = serde_json::from_str(&body).unwrap_or_default();
    Err(error.into_store_error(status))
  }

  /// Send a write that returns the affected rows; none is `NotFound`.
  async fn send_returning(&self, req: RequestBuilder) -> Result<(), StoreError> {
    let rows: Vec<Value> = self
      .send(req.header("Prefer", "return=representation"))
      .await?
      .json()
      .await
      .map_err(|e| StoreError::Decode(e.to_string()))?;
    if rows.is_empty() { Err(StoreError::NotFound) } else { Ok(()) }
  }

  /// `GET /rest/v1/` with the anon key. Used as a startup probe.
  #[instrument(skip(self))]
  pub async fn check_connection(&self) -> Result<(), StoreError> {
    self.send(self.request(Method::GET, "", None)).await?;
    Ok(())
  }
}

impl RecordStore for SupabaseStore {
  #[instrument(skip_all, fields(table = %query.table))]
  async fn select(&self, session: &Session, query: &Query) -> Result<Vec<Value>, StoreError> {
    self
      .send(self.query(Method::GET, session, query))
      .await?
      .json()
      .await
      .map_err(|e| StoreError::Decode(e.to_string()))
  }

  #[instrument(skip_all, fields(table = %query.table))]
  async fn select_single(&self, session: &Session, query: &Query) -> Result<Value, StoreError> {
    let req = self
      .query(Method::GET, session, query)
      .header("Accept", SINGLE_OBJECT);
    self
      .send(req)
      .await?
      .json()
      .await
      .map_err(|e| StoreError::Decode(e.to_string()))
  }

  #[instrument(skip(self, session, row))]
  async fn insert(&self, session: &Session, table: &str, row: Value) -> Result<(), StoreError> {
    let req = self
      .request(Method::POST, table, Some(session))
      .header("Prefer", "return=minimal")
      .json(&row);
    self.send(req).await?;
    Ok(())
  }

  #[instrument(skip(self, session, patch))]
  async fn update(
    &self,
    session: &Session,
    table: &str,
    patch: Value,
    filter: &Filter,
  ) -> Result<(), StoreError> {
    let req = self
      .request(Method::PATCH, table, Some(session))
      .query(&[filter_param(filter)])
      .json(&patch);
    self.send_returning(req).await
  }

  #[instrument(skip(self, session))]
  async fn delete(&self, session: &Session, table: &str, filter: &Filter) -> Result<(), StoreError> {
    let req = self
      .request(Method::DELETE, table, Some(session))
      .query(&[filter_param(filter)]);
    self.send_returning(req).await
  }
}
