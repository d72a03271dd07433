//! Supabase implementations of the `kaisan-core` collaborator traits.
//!
//! [`SupabaseAuth`] speaks to GoTrue (`/auth/v1`), [`SupabaseStore`] to
//! PostgREST (`/rest/v1`) and [`HttpNotifier`] posts the outbound webhooks.
//! All three share one [`reqwest::Client`].
//!
//! ```rust,ignore
//! let backend = kaisan_supabase::connect(config, webhooks)?;
//! let (console, effects) = Console::start(Arc::new(backend), route, mode).await;
//! ```

pub mod auth;
pub mod error;
pub mod rest;
pub mod webhook;

use std::{path::PathBuf, time::Duration};

use kaisan_core::Services;
use reqwest::{Client, StatusCode};
use serde_json::Value;

pub use auth::SupabaseAuth;
pub use error::{Error, Result};
pub use rest::SupabaseStore;
pub use webhook::{HttpNotifier, WebhookUrls};

pub type SupabaseBackend = Services<SupabaseAuth, SupabaseStore, HttpNotifier>;

/// Connection settings for a Supabase project.
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
  /// Project URL, e.g. `https://xyz.supabase.co`.
  pub url:          String,
  /// The public anon key, sent as `apikey` on every request.
  pub anon_key:     String,
  /// Where the console's recovery links lead back to.
  pub site_url:     String,
  /// Where the session is kept between runs. `None` keeps it in memory only.
  pub session_file: Option<PathBuf>,
}

impl SupabaseConfig {
  fn endpoint(&self, path: &str) -> String {
    format!("{}{}", self.url.trim_end_matches('/'), path)
  }
}

/// Build all three collaborators over a shared HTTP client.
pub fn connect(config: SupabaseConfig, webhooks: WebhookUrls) -> Result<SupabaseBackend> {
  let http = http_client()?;
  Ok(Services {
    auth:     SupabaseAuth::with_client(http.clone(), config.clone())?,
    store:    SupabaseStore::with_client(http.clone(), config),
    notifier: HttpNotifier::with_client(http, webhooks),
  })
}

pub(crate) fn http_client() -> Result<Client> {
  Client::builder()
    .timeout(Duration::from_secs(30))
    .build()
    .map_err(Error::Client)
}

/// The human-readable part of a Supabase error body.
///
/// GoTrue and PostgREST disagree on the field name, so the first of `msg`,
/// `message`, `error_description` and `error` that holds a string wins.
pub(crate) fn error_message(status: StatusCode, body: &str) -> String {
  serde_json::from_str::<Value>(body)
    .ok()
    .and_then(|v| {
      ["msg", "message", "error_description", "error"]
        .into_iter()
        .find_map(|key| v.get(key).and_then(Value::as_str).map(str::to_string))
    })
    .unwrap_or_else(|| format!("request failed with status {status}"))
}

#[cfg(test)]
mod tests;
