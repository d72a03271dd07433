//! `/prompt`: the agent's system prompt.
//!
//! The table holds at most one row. With no row the form starts empty and
//! the first save inserts; afterwards saves update that row in place.

use chrono::Utc;
use serde_json::json;
use tracing::{error, warn};

use crate::{
  entity::SystemPrompt,
  error::StoreError,
  form::{FieldKind, FieldView, Form, PageStatus, is_blank},
  session::Session,
  store::{self, Filter, Query, RecordStore, SYSTEM_PROMPT},
};

use super::Next;

pub const PROMPT_REQUIRED: &str = "Por favor, preencha o prompt do sistema";
pub const PROMPT_CREATED: &str = "Prompt do sistema adicionado com sucesso!";
pub const PROMPT_UPDATED: &str = "Prompt do sistema atualizado com sucesso!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Load,
  Save { id: Option<String>, prompt: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  /// `Ok(None)` when no prompt has been saved yet.
  Loaded(Result<Option<SystemPrompt>, StoreError>),
  Saved {
    created: bool,
    result:  Result<(), StoreError>,
  },
}

#[derive(Debug, Clone, Default)]
pub struct PromptPage {
  pub prompt:     String,
  pub current_id: Option<String>,
  pub status:     PageStatus,
}

impl PromptPage {
  pub fn new() -> Self { Self::default() }

  pub fn load(&mut self) -> Next<Command> {
    self.status.loading = true;
    Next::Run(Command::Load)
  }

  pub fn submit(&mut self) -> Next<Command> {
    if is_blank(&self.prompt) {
      self.status.reject(PROMPT_REQUIRED);
      return Next::Idle;
    }
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Save {
      id:     self.current_id.clone(),
      prompt: self.prompt.clone(),
    })
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::Loaded(Ok(Some(row))) => {
        self.prompt = row.prompt;
        self.current_id = Some(row.id);
        self.status.finish();
      }
      Outcome::Loaded(Ok(None)) => {
        self.current_id = None;
        self.status.finish();
      }
      Outcome::Loaded(Err(e)) => {
        error!(error = %e, "failed to fetch system prompt");
        self.status.fail(format!("Erro ao buscar dados: {e}"));
      }
      Outcome::Saved { created, result: Ok(()) } => {
        self.status.succeed(if created { PROMPT_CREATED } else { PROMPT_UPDATED });
        return self.load();
      }
      Outcome::Saved { result: Err(e), .. } => self.status.fail(e.to_string()),
    }
    Next::Idle
  }

  pub fn submit_label(&self) -> &'static str {
    if self.status.loading { "Salvando..." } else { "Salvar" }
  }
}

impl Form for PromptPage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    vec![
      FieldView::new("Prompt do Sistema", &self.prompt, FieldKind::Multiline)
        .placeholder("Digite o prompt do sistema para o agente IA"),
    ]
  }

  fn set_field(&mut self, index: usize, value: String) {
    if index == 0 {
      self.prompt = value;
    }
  }
}

pub async fn run<S: RecordStore>(store: &S, session: &Session, command: Command) -> Outcome {
  match command {
    Command::Load => {
      let query = Query::from(SYSTEM_PROMPT);
      let result = match store::fetch_one::<_, SystemPrompt>(store, session, &query).await {
        Ok(row) => Ok(Some(row)),
        Err(StoreError::NotFound) => Ok(None),
        Err(e) if e.is_not_singular() => {
          warn!(error = %e, "more than one system prompt row, starting empty");
          Ok(None)
        }
        Err(e) => Err(e),
      };
      Outcome::Loaded(result)
    }
    Command::Save { id: Some(id), prompt } => {
      let patch = json!({ "prompt": prompt, "updated_at": Utc::now() });
      let result = store
        .update(session, SYSTEM_PROMPT, patch, &Filter::eq("id", id))
        .await;
      Outcome::Saved {
        created: false,
        result,
      }
    }
    Command::Save { id: None, prompt } => {
      let row = json!({ "prompt": prompt, "created_by": session.user_id() });
      Outcome::Saved {
        created: true,
        result:  store.insert(session, SYSTEM_PROMPT, row).await,
      }
    }
  }
}
