//! `/reset-memory`: ask the agent to forget a conversation.
//!
//! The whole request is one webhook call carrying the contact's full number.

use tracing::error;

use crate::{
  error::WebhookError,
  form::{FieldKind, FieldView, Form, PageStatus, is_blank},
  notify::{self, CleanMemoryRequest, Webhook, WebhookNotifier},
  phone::{DEFAULT_COUNTRY_CODE, accept_digits},
};

use super::Next;

pub const FIELDS_REQUIRED: &str = "Por favor, preencha todos os campos do telefone";
pub const REQUEST_SENT: &str = "Solicitação enviada com sucesso!";
pub const REQUEST_FAILED: &str = "Erro ao enviar solicitação. Por favor, tente novamente.";

const AREA_CODE_MAX: usize = 2;
const NUMBER_MAX: usize = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Send { phone: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Sent(Result<(), WebhookError>),
}

#[derive(Debug, Clone)]
pub struct ResetMemoryPage {
  /// Displayed in a disabled input; never edited through the form.
  pub country_code: String,
  pub area_code:    String,
  pub number:       String,
  pub status:       PageStatus,
}

impl ResetMemoryPage {
  pub fn new() -> Self {
    Self {
      country_code: DEFAULT_COUNTRY_CODE.into(),
      area_code:    String::new(),
      number:       String::new(),
      status:       PageStatus::default(),
    }
  }

  pub fn submit(&mut self) -> Next<Command> {
    if is_blank(&self.area_code) || is_blank(&self.number) {
      self.status.reject(FIELDS_REQUIRED);
      return Next::Idle;
    }
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Send {
      phone: format!("{}{}{}", self.country_code, self.area_code, self.number),
    })
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::Sent(Ok(())) => {
        self.status.succeed(REQUEST_SENT);
        self.area_code.clear();
        self.number.clear();
      }
      Outcome::Sent(Err(e)) => {
        error!(error = %e, "clean-memory request failed");
        self.status.fail(REQUEST_FAILED);
      }
    }
    Next::Idle
  }

  pub fn submit_label(&self) -> &'static str {
    if self.status.loading { "Enviando..." } else { "Limpar Memória" }
  }
}

impl Default for ResetMemoryPage {
  fn default() -> Self { Self::new() }
}

impl Form for ResetMemoryPage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    vec![
      FieldView::new("País", &self.country_code, FieldKind::Disabled).placeholder("55"),
      FieldView::new("DDD", &self.area_code, FieldKind::Text).placeholder("21"),
      FieldView::new("Número", &self.number, FieldKind::Text).placeholder("982280802"),
    ]
  }

  fn set_field(&mut self, index: usize, value: String) {
    match index {
      1 => {
        if let Some(digits) = accept_digits(&value, AREA_CODE_MAX) {
          self.area_code = digits;
        }
      }
      2 => {
        if let Some(digits) = accept_digits(&value, NUMBER_MAX) {
          self.number = digits;
        }
      }
      _ => {}
    }
  }
}

pub async fn run<N: WebhookNotifier>(notifier: &N, command: Command) -> Outcome {
  let Command::Send { phone } = command;
  let request = CleanMemoryRequest { phone };
  Outcome::Sent(notify::send(notifier, Webhook::CleanMemory, &request).await)
}
