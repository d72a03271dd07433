//! `/whatsapp`: the contact number stored on the user's profile.

use chrono::Utc;
use serde_json::json;

use crate::{
  entity::Profile,
  error::StoreError,
  form::{FieldKind, FieldView, Form, PageStatus},
  phone::{WhatsappNumber, format_local_number, sanitize_city_code},
  session::Session,
  store::{self, Filter, PROFILES, Query, RecordStore},
};

use super::Next;

pub const PROFILE_MISSING: &str =
  "Perfil de usuário não encontrado. Por favor, entre em contato com o suporte.";
pub const FIELDS_REQUIRED: &str = "Por favor, preencha todos os campos";
pub const NUMBER_SAVED: &str = "Número de WhatsApp cadastrado com sucesso!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Load,
  Save { wa_number: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Loaded(Result<Profile, StoreError>),
  Saved(Result<(), StoreError>),
}

#[derive(Debug, Clone, Default)]
pub struct WhatsappPage {
  pub number:  WhatsappNumber,
  /// `None` until loaded, or when the profile is missing.
  pub profile: Option<Profile>,
  pub status:  PageStatus,
}

impl WhatsappPage {
  pub fn new() -> Self { Self::default() }

  pub fn load(&mut self) -> Next<Command> {
    self.status.loading = true;
    Next::Run(Command::Load)
  }

  pub fn submit(&mut self) -> Next<Command> {
    if !self.number.is_complete() {
      self.status.reject(FIELDS_REQUIRED);
      return Next::Idle;
    }
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Save {
      wa_number: self.number.to_stored(),
    })
  }

  /// Any change that leaves the user signed in reloads the number.
  pub fn on_session_change(&mut self, session: Option<&Session>) -> Next<Command> {
    match session {
      Some(_) => self.load(),
      None => Next::Idle,
    }
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::Loaded(Ok(profile)) => {
        if let Some(stored) = profile.wa_number.as_deref().filter(|s| !s.is_empty()) {
          self.number = WhatsappNumber::parse_stored(stored);
        }
        self.profile = Some(profile);
        self.status.finish();
      }
      Outcome::Loaded(Err(StoreError::NotFound)) => {
        self.profile = None;
        self.status.fail(PROFILE_MISSING);
      }
      Outcome::Loaded(Err(e)) => {
        tracing::error!(error = %e, "failed to fetch profile");
        self.profile = None;
        self.status.fail(format!("Erro ao buscar perfil: {e}"));
      }
      Outcome::Saved(Ok(())) => {
        self.status.succeed(NUMBER_SAVED);
        return self.load();
      }
      Outcome::Saved(Err(e)) => self.status.fail(e.to_string()),
    }
    Next::Idle
  }

  pub fn submit_label(&self) -> &'static str {
    if self.status.loading { "Salvando..." } else { "Salvar" }
  }
}

impl Form for WhatsappPage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    vec![
      FieldView::new("País", &self.number.country_code, FieldKind::ReadOnly),
      FieldView::new("DDD", &self.number.city_code, FieldKind::Text),
      FieldView::new("Número de WhatsApp", &self.number.local, FieldKind::Text)
        .placeholder("98765-4321"),
    ]
  }

  fn set_field(&mut self, index: usize, value: String) {
    match index {
      1 => self.number.city_code = sanitize_city_code(&value),
      2 => self.number.local = format_local_number(&value),
      _ => {}
    }
  }
}

pub async fn run<S: RecordStore>(store: &S, session: &Session, command: Command) -> Outcome {
  let own_row = Filter::eq("id", session.user_id());
  match command {
    Command::Load => {
      let query = Query::from(PROFILES).eq("id", session.user_id());
      Outcome::Loaded(store::fetch_one(store, session, &query).await)
    }
    Command::Save { wa_number } => {
      let patch = json!({ "wa_number": wa_number, "updated_at": Utc::now() });
      Outcome::Saved(store.update(session, PROFILES, patch, &own_row).await)
    }
  }
}
