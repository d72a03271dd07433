//! Error types for `kaisan-core`.
//!
//! One enum per remote collaborator. The `Display` form of a rejection is the
//! backend's own message, which pages surface to the user unchanged.

use thiserror::Error;

use crate::notify::Webhook;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
  /// The auth service refused the request (bad credentials, weak password…).
  #[error("{0}")]
  Rejected(String),

  #[error("auth request failed: {0}")]
  Transport(String),

  #[error("Auth session missing!")]
  SessionMissing,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
  /// The query or filter matched no row.
  #[error("Nenhum registro encontrado.")]
  NotFound,

  #[error("{message}")]
  Rejected {
    code:    Option<String>,
    message: String,
  },

  #[error("store request failed: {0}")]
  Transport(String),

  #[error("unexpected row shape: {0}")]
  Decode(String),
}

impl StoreError {
  /// A single-row read matched more than one row.
  pub fn is_not_singular(&self) -> bool {
    matches!(self, Self::Rejected { code: Some(code), .. } if code == crate::store::NOT_SINGULAR)
  }
}

impl From<serde_json::Error> for StoreError {
  fn from(e: serde_json::Error) -> Self { Self::Decode(e.to_string()) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
  #[error("webhook responded with status {0}")]
  Status(u16),

  #[error("webhook request failed: {0}")]
  Transport(String),

  #[error("webhook `{0}` has no endpoint configured")]
  NotConfigured(Webhook),

  #[error("webhook payload could not be encoded: {0}")]
  Encode(String),
}
