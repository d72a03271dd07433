//! `/`: sign in, sign up and password recovery.
//!
//! A successful sign-in is not handled here: the auth service publishes the
//! new session and the gate redirects to `/prompt`.

use crate::{
  auth::{AuthService, SignUpOutcome},
  error::AuthError,
  form::{FieldKind, FieldView, Form, PageStatus},
};

use super::Next;

pub const SIGN_UP_SENT: &str = "Verifique seu email para o link de confirmação!";
pub const RECOVERY_SENT: &str = "Email de recuperação de senha enviado!";
pub const EMAIL_REQUIRED: &str = "Por favor, insira seu email";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
  SignIn,
  Recovery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  SignIn { email: String, password: String },
  SignUp { email: String, password: String },
  Recover { email: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  SignedIn(Result<(), AuthError>),
  SignedUp(Result<SignUpOutcome, AuthError>),
  RecoverySent(Result<(), AuthError>),
}

#[derive(Debug, Clone)]
pub struct LoginPage {
  pub email:    String,
  pub password: String,
  pub view:     View,
  pub status:   PageStatus,
}

impl LoginPage {
  pub fn new() -> Self {
    Self {
      email:    String::new(),
      password: String::new(),
      view:     View::SignIn,
      status:   PageStatus::default(),
    }
  }

  /// Enter: sign in, or send the recovery link in the recovery view.
  pub fn submit(&mut self) -> Next<Command> {
    match self.view {
      View::SignIn => self.sign_in(),
      View::Recovery => self.recover(),
    }
  }

  pub fn sign_in(&mut self) -> Next<Command> {
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::SignIn {
      email:    self.email.clone(),
      password: self.password.clone(),
    })
  }

  pub fn sign_up(&mut self) -> Next<Command> {
    if self.view != View::SignIn || !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::SignUp {
      email:    self.email.clone(),
      password: self.password.clone(),
    })
  }

  fn recover(&mut self) -> Next<Command> {
    if self.email.is_empty() {
      self.status.reject(EMAIL_REQUIRED);
      return Next::Idle;
    }
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Recover {
      email: self.email.clone(),
    })
  }

  /// Switch between the sign-in and the recovery view.
  pub fn toggle_recovery(&mut self) {
    self.view = match self.view {
      View::SignIn => View::Recovery,
      View::Recovery => View::SignIn,
    };
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::SignedIn(Ok(())) => self.status.finish(),
      Outcome::SignedUp(Ok(_)) => self.status.succeed(SIGN_UP_SENT),
      Outcome::RecoverySent(Ok(())) => {
        self.status.succeed(RECOVERY_SENT);
        self.view = View::SignIn;
      }
      Outcome::SignedIn(Err(e)) | Outcome::SignedUp(Err(e)) | Outcome::RecoverySent(Err(e)) => {
        self.status.fail(e.to_string());
      }
    }
    Next::Idle
  }

  pub fn submit_label(&self) -> &'static str {
    match (self.view, self.status.loading) {
      (View::SignIn, false) => "Entrar",
      (View::SignIn, true) => "Carregando...",
      (View::Recovery, false) => "Enviar link de recuperação",
      (View::Recovery, true) => "Enviando...",
    }
  }
}

impl Default for LoginPage {
  fn default() -> Self { Self::new() }
}

impl Form for LoginPage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    let email = FieldView::new("Email", &self.email, FieldKind::Text).placeholder("seu@email.com");
    match self.view {
      View::SignIn => vec![
        email,
        FieldView::new("Senha", &self.password, FieldKind::Secret).placeholder("********"),
      ],
      View::Recovery => vec![email],
    }
  }

  fn set_field(&mut self, index: usize, value: String) {
    match index {
      0 => self.email = value,
      1 if self.view == View::SignIn => self.password = value,
      _ => {}
    }
  }
}

pub async fn run<A: AuthService>(auth: &A, command: Command) -> Outcome {
  match command {
    Command::SignIn { email, password } => {
      let result = auth.sign_in_with_password(&email, &password).await;
      if let Err(error) = &result {
        tracing::info!(%error, "sign-in rejected");
      }
      Outcome::SignedIn(result.map(|_| ()))
    }
    Command::SignUp { email, password } => Outcome::SignedUp(auth.sign_up(&email, &password).await),
    Command::Recover { email } => Outcome::RecoverySent(auth.reset_password_for_email(&email).await),
  }
}
