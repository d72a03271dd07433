//! Outbound webhooks.
//!
//! Two receivers exist: the knowledge-base sync hook and the clean-memory
//! hook. The first is always best-effort, fired only after the primary write
//! has committed; the second is the primary action of the reset-memory page.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::WebhookError;

// ─── Endpoints ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Webhook {
  KnowledgeBase,
  CleanMemory,
}

pub trait WebhookNotifier: Send + Sync {
  /// POST `body` as JSON. Any non-2xx response is an error.
  fn post<'a>(
    &'a self,
    hook: Webhook,
    body: &'a Value,
  ) -> impl Future<Output = Result<(), WebhookError>> + Send + 'a;
}

// ─── Payloads ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnowledgeAction {
  Create,
  Update,
  Delete,
}

/// Body of the knowledge-base hook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KnowledgeNotification {
  pub question: String,
  pub answer:   String,
  pub action:   KnowledgeAction,
  /// The entry id, or `"new"` for an entry just created.
  pub entry_id: String,
}

impl KnowledgeNotification {
  pub fn created(question: impl Into<String>, answer: impl Into<String>) -> Self {
    Self {
      question: question.into(),
      answer:   answer.into(),
      action:   KnowledgeAction::Create,
      entry_id: "new".into(),
    }
  }

  pub fn updated(
    id: impl Into<String>,
    question: impl Into<String>,
    answer: impl Into<String>,
  ) -> Self {
    Self {
      question: question.into(),
      answer:   answer.into(),
      action:   KnowledgeAction::Update,
      entry_id: id.into(),
    }
  }

  pub fn deleted(
    id: impl Into<String>,
    question: impl Into<String>,
    answer: impl Into<String>,
  ) -> Self {
    Self {
      question: question.into(),
      answer:   answer.into(),
      action:   KnowledgeAction::Delete,
      entry_id: id.into(),
    }
  }
}

/// Body of the clean-memory hook: the full number, country code included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanMemoryRequest {
  pub phone: String,
}

// ─── Delivery ────────────────────────────────────────────────────────────────

pub async fn send<N, T>(notifier: &N, hook: Webhook, payload: &T) -> Result<(), WebhookError>
where
  N: WebhookNotifier,
  T: Serialize,
{
  let body = serde_json::to_value(payload).map_err(|e| WebhookError::Encode(e.to_string()))?;
  notifier.post(hook, &body).await
}

/// Deliver `payload` and log, rather than return, any failure.
///
/// Call this only after the write it reports on has committed: nothing it
/// does can roll that write back.
pub async fn notify_best_effort<N, T>(notifier: &N, hook: Webhook, payload: &T)
where
  N: WebhookNotifier,
  T: Serialize,
{
  match send(notifier, hook, payload).await {
    Ok(()) => tracing::info!(%hook, "webhook notification delivered"),
    Err(error) => tracing::warn!(%hook, %error, "webhook notification failed"),
  }
}
