//! Layered settings: an optional TOML file, then `KAISAN_*` environment
//! variables. Nested keys use `__`, e.g. `KAISAN_WEBHOOKS__CLEAN_MEMORY`.

use std::path::{Path, PathBuf};

use anyhow::{Context as _, ensure};
use kaisan_core::pages::NotifyMode;
use kaisan_supabase::{SupabaseConfig, WebhookUrls};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
  #[serde(default)]
  pub supabase_url:      String,
  #[serde(default)]
  pub supabase_anon_key: String,
  /// Base of the links in password-recovery emails.
  #[serde(default = "default_site_url")]
  pub site_url:          String,
  /// Keeps the session between runs when set.
  #[serde(default)]
  pub session_file:      Option<PathBuf>,
  #[serde(default = "default_log_file")]
  pub log_file:          PathBuf,
  #[serde(default)]
  pub knowledge_notify:  NotifyMode,
  #[serde(default)]
  pub webhooks:          WebhookUrls,
}

fn default_site_url() -> String { "http://localhost:3000".to_string() }

fn default_log_file() -> PathBuf { PathBuf::from("kaisan.log") }

impl Settings {
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("KAISAN")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()
      .with_context(|| format!("failed to read settings from {}", path.display()))?
      .try_deserialize()
      .context("failed to deserialise settings")
  }

  pub fn supabase(&self) -> anyhow::Result<SupabaseConfig> {
    ensure!(
      !self.supabase_url.is_empty(),
      "supabase_url is not set (pass --offline to run without a backend)"
    );
    ensure!(!self.supabase_anon_key.is_empty(), "supabase_anon_key is not set");
    Ok(SupabaseConfig {
      url:          self.supabase_url.clone(),
      anon_key:     self.supabase_anon_key.clone(),
      site_url:     self.site_url.clone(),
      session_file: self.session_file.clone(),
    })
  }
}
