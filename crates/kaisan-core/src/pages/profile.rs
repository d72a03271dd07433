//! `/profile`: the signed-in user's personal details.
//!
//! The profile row is created on first visit when it does not exist yet.

use chrono::{NaiveDate, Utc};
use serde_json::json;
use tracing::{error, info};

use crate::{
  entity::Profile,
  error::StoreError,
  form::{FieldKind, FieldView, Form, PageStatus, is_blank},
  session::Session,
  store::{self, Filter, PROFILES, Query, RecordStore},
};

use super::Next;

pub const PROFILE_SAVED: &str = "Perfil atualizado com sucesso!";
pub const BIRTH_DATE_INVALID: &str = "Data de nascimento inválida. Use o formato AAAA-MM-DD.";

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The editable columns. Empty optional fields are written as `null`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileUpdate {
  pub full_name:  String,
  pub birth_date: Option<NaiveDate>,
  pub phone:      Option<String>,
  pub address:    Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Load,
  Save(ProfileUpdate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Loaded(Result<Profile, StoreError>),
  Saved(Result<(), StoreError>),
}

#[derive(Debug, Clone, Default)]
pub struct ProfilePage {
  /// From the session; shown but not editable.
  pub email:      String,
  pub full_name:  String,
  pub birth_date: String,
  pub phone:      String,
  pub address:    String,
  pub status:     PageStatus,
}

fn non_empty(value: &str) -> Option<String> { (!value.is_empty()).then(|| value.to_string()) }

impl ProfilePage {
  pub fn new(session: Option<&Session>) -> Self {
    Self {
      email: session
        .and_then(|s| s.user.email.clone())
        .unwrap_or_default(),
      ..Self::default()
    }
  }

  pub fn load(&mut self) -> Next<Command> {
    self.status.loading = true;
    Next::Run(Command::Load)
  }

  pub fn submit(&mut self) -> Next<Command> {
    let birth_date = if is_blank(&self.birth_date) {
      None
    } else {
      match NaiveDate::parse_from_str(self.birth_date.trim(), DATE_FORMAT) {
        Ok(date) => Some(date),
        Err(_) => {
          self.status.reject(BIRTH_DATE_INVALID);
          return Next::Idle;
        }
      }
    };
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Save(ProfileUpdate {
      full_name: self.full_name.clone(),
      birth_date,
      phone: non_empty(&self.phone),
      address: non_empty(&self.address),
    }))
  }

  pub fn on_session_change(&mut self, session: Option<&Session>) {
    if let Some(email) = session.and_then(|s| s.user.email.as_ref()) {
      self.email = email.clone();
    }
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::Loaded(Ok(profile)) => {
        self.full_name = profile.full_name.unwrap_or_default();
        self.birth_date = profile
          .birth_date
          .map(|d| d.format(DATE_FORMAT).to_string())
          .unwrap_or_default();
        self.phone = profile.phone.unwrap_or_default();
        self.address = profile.address.unwrap_or_default();
        self.status.finish();
      }
      Outcome::Loaded(Err(e)) => {
        error!(error = %e, "failed to fetch profile");
        self.status.fail(format!("Erro ao buscar perfil: {e}"));
      }
      Outcome::Saved(Ok(())) => {
        self.status.succeed(PROFILE_SAVED);
        return self.load();
      }
      Outcome::Saved(Err(e)) => self.status.fail(e.to_string()),
    }
    Next::Idle
  }

  pub fn submit_label(&self) -> &'static str {
    if self.status.loading { "Salvando..." } else { "Salvar Alterações" }
  }
}

impl Form for ProfilePage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    vec![
      FieldView::new("Email", &self.email, FieldKind::ReadOnly),
      FieldView::new("Nome Completo", &self.full_name, FieldKind::Text),
      FieldView::new("Data de Nascimento", &self.birth_date, FieldKind::Text)
        .placeholder("AAAA-MM-DD"),
      FieldView::new("Telefone", &self.phone, FieldKind::Text),
      FieldView::new("Endereço", &self.address, FieldKind::Multiline),
    ]
  }

  fn set_field(&mut self, index: usize, value: String) {
    match index {
      1 => self.full_name = value,
      2 => self.birth_date = value,
      3 => self.phone = value,
      4 => self.address = value,
      _ => {}
    }
  }
}

pub async fn run<S: RecordStore>(store: &S, session: &Session, command: Command) -> Outcome {
  let user_id = session.user_id();
  match command {
    Command::Load => {
      let query = Query::from(PROFILES).eq("id", user_id);
      let result = match store::fetch_one::<_, Profile>(store, session, &query).await {
        Err(StoreError::NotFound) => {
          info!(%user_id, "creating missing profile row");
          store
            .insert(session, PROFILES, json!({ "id": user_id }))
            .await
            .map(|()| Profile::empty(user_id))
        }
        other => other,
      };
      Outcome::Loaded(result)
    }
    Command::Save(update) => {
      let patch = json!({
        "full_name": update.full_name,
        "birth_date": update.birth_date,
        "phone": update.phone,
        "address": update.address,
        "updated_at": Utc::now(),
      });
      let result = store
        .update(session, PROFILES, patch, &Filter::eq("id", user_id))
        .await;
      Outcome::Saved(result)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_optionals_become_none() {
    let mut page = ProfilePage::new(None);
    page.set_field(1, "Ana Souza".into());
    page.set_field(2, "1990-05-17".into());
    assert_eq!(
      page.submit(),
      Next::Run(Command::Save(ProfileUpdate {
        full_name:  "Ana Souza".into(),
        birth_date: NaiveDate::from_ymd_opt(1990, 5, 17),
        phone:      None,
        address:    None,
      }))
    );
  }

  #[test]
  fn malformed_birth_date_is_rejected() {
    let mut page = ProfilePage::new(None);
    page.set_field(2, "17/05/1990".into());
    assert_eq!(page.submit(), Next::Idle);
    assert_eq!(page.status.flash.as_ref().map(|f| f.text.as_str()), Some(BIRTH_DATE_INVALID));
  }

  #[test]
  fn email_field_is_read_only() {
    let mut page = ProfilePage::new(None);
    page.set_field(0, "outro@example.com".into());
    assert!(page.email.is_empty());
    assert_eq!(page.fields()[0].kind, FieldKind::ReadOnly);
  }
}
