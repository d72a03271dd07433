//! `/reset-password`: landing page of the recovery email.

use std::time::Duration;

use crate::{
  auth::AuthService,
  error::AuthError,
  form::{FieldKind, FieldView, Form, PageStatus},
  route::Route,
};

use super::Next;

pub const PASSWORDS_DIFFER: &str = "As senhas não coincidem";
pub const PASSWORD_TOO_SHORT: &str = "A senha deve ter pelo menos 6 caracteres";
pub const PASSWORD_UPDATED: &str = "Senha atualizada com sucesso!";

pub const MIN_PASSWORD_LEN: usize = 6;
pub const REDIRECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Update { password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Updated(Result<(), AuthError>),
}

#[derive(Debug, Clone, Default)]
pub struct ResetPasswordPage {
  pub password: String,
  pub confirm:  String,
  pub status:   PageStatus,
}

impl ResetPasswordPage {
  pub fn new() -> Self { Self::default() }

  pub fn submit(&mut self) -> Next<Command> {
    if self.password != self.confirm {
      self.status.reject(PASSWORDS_DIFFER);
      return Next::Idle;
    }
    if self.password.chars().count() < MIN_PASSWORD_LEN {
      self.status.reject(PASSWORD_TOO_SHORT);
      return Next::Idle;
    }
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Update {
      password: self.password.clone(),
    })
  }

  pub fn back_to_login(&self) -> Next<Command> { Next::Navigate(Route::Home) }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::Updated(Ok(())) => {
        self.status.succeed(PASSWORD_UPDATED);
        Next::NavigateAfter(Route::Home, REDIRECT_DELAY)
      }
      Outcome::Updated(Err(e)) => {
        self.status.fail(e.to_string());
        Next::Idle
      }
    }
  }

  pub fn submit_label(&self) -> &'static str {
    if self.status.loading { "Atualizando..." } else { "Atualizar Senha" }
  }
}

impl Form for ResetPasswordPage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    vec![
      FieldView::new("Nova Senha", &self.password, FieldKind::Secret).placeholder("********"),
      FieldView::new("Confirmar Nova Senha", &self.confirm, FieldKind::Secret)
        .placeholder("********"),
    ]
  }

  fn set_field(&mut self, index: usize, value: String) {
    match index {
      0 => self.password = value,
      1 => self.confirm = value,
      _ => {}
    }
  }
}

pub async fn run<A: AuthService>(auth: &A, command: Command) -> Outcome {
  let Command::Update { password } = command;
  Outcome::Updated(auth.update_user_password(&password).await.map(|_| ()))
}
