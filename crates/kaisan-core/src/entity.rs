//! Records owned by the remote store.
//!
//! The console only ever holds transient copies of these. Column names match
//! the store's tables, so the types deserialize straight from fetched rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, de::Error as _};
use serde_json::Value;
use uuid::Uuid;

// ─── Profile ─────────────────────────────────────────────────────────────────

/// One row of `profiles`; `id` is the owning user's id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
  pub id:         Uuid,
  #[serde(default)]
  pub full_name:  Option<String>,
  #[serde(default)]
  pub birth_date: Option<NaiveDate>,
  #[serde(default)]
  pub phone:      Option<String>,
  #[serde(default)]
  pub address:    Option<String>,
  /// Stored as text by the console, but older rows carry a number.
  #[serde(default, deserialize_with = "text_or_number")]
  pub wa_number:  Option<String>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
  pub fn empty(id: Uuid) -> Self {
    Self {
      id,
      ..Self::default()
    }
  }
}

// ─── Knowledge base ──────────────────────────────────────────────────────────

/// One question/answer pair of `kaisan_kbase`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KnowledgeEntry {
  #[serde(deserialize_with = "id_text")]
  pub id:         String,
  pub question:   String,
  pub answer:     String,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub created_by: Option<Uuid>,
}

// ─── System prompt ───────────────────────────────────────────────────────────

/// The agent's system prompt. The table is expected to hold a single row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemPrompt {
  #[serde(deserialize_with = "id_text")]
  pub id:         String,
  pub prompt:     String,
  #[serde(default)]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub updated_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub created_by: Option<Uuid>,
}

// ─── Column decoders ─────────────────────────────────────────────────────────

fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
  D: Deserializer<'de>,
{
  match Option::<Value>::deserialize(deserializer)? {
    None | Some(Value::Null) => Ok(None),
    Some(Value::String(s)) => Ok(Some(s)),
    Some(Value::Number(n)) => Ok(Some(n.to_string())),
    Some(other) => Err(D::Error::custom(format!(
      "expected text or number, found {other}"
    ))),
  }
}

/// Row ids may be uuids, text or serial integers depending on the table.
fn id_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  text_or_number(deserializer)?.ok_or_else(|| D::Error::custom("row id is null"))
}
