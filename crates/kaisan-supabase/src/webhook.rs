//! HTTP [`WebhookNotifier`].

use kaisan_core::{
  WebhookError,
  notify::{Webhook, WebhookNotifier},
};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::{Result, http_client};

/// Receiver URLs. A hook without one fails with
/// [`WebhookError::NotConfigured`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookUrls {
  #[serde(default)]
  pub knowledge_base: Option<String>,
  #[serde(default)]
  pub clean_memory:   Option<String>,
}

impl WebhookUrls {
  pub fn get(&self, hook: Webhook) -> Option<&str> {
    match hook {
      Webhook::KnowledgeBase => self.knowledge_base.as_deref(),
      Webhook::CleanMemory => self.clean_memory.as_deref(),
    }
    .filter(|url| !url.is_empty())
  }
}

#[derive(Clone)]
pub struct HttpNotifier {
  http: Client,
  urls: WebhookUrls,
}

impl HttpNotifier {
  pub fn new(urls: WebhookUrls) -> Result<Self> { Ok(Self::with_client(http_client()?, urls)) }

  pub fn with_client(http: Client, urls: WebhookUrls) -> Self { Self { http, urls } }
}

impl WebhookNotifier for HttpNotifier {
  #[instrument(skip(self, body))]
  async fn post(&self, hook: Webhook, body: &Value) -> Result<(), WebhookError> {
    let url = self.urls.get(hook).ok_or(WebhookError::NotConfigured(hook))?;
    let resp = self
      .http
      .post(url)
      .json(body)
      .send()
      .await
      .map_err(|e| WebhookError::Transport(e.to_string()))?;
    let status = resp.status();
    debug!(%status, "webhook answered");
    if !status.is_success() {
      return Err(WebhookError::Status(status.as_u16()));
    }
    Ok(())
  }
}
