//! Page controllers.
//!
//! Each page is a plain state machine: user actions return a [`Next`] telling
//! the console what to do, remote work is described by a `Command` and run by
//! [`execute`], and its `Outcome` is fed back through [`Page::apply`]. Nothing
//! in here touches the network or the terminal directly.

pub mod knowledge;
pub mod login;
pub mod profile;
pub mod prompt;
pub mod reset_memory;
pub mod reset_password;
pub mod whatsapp;

use std::time::Duration;

pub use knowledge::{KnowledgePage, NotifyMode};
pub use login::LoginPage;
pub use profile::ProfilePage;
pub use prompt::PromptPage;
pub use reset_memory::ResetMemoryPage;
pub use reset_password::ResetPasswordPage;
pub use whatsapp::WhatsappPage;

use crate::{
  backend::Backend,
  form::{Flash, Form, PageStatus},
  guard::DirtyFlag,
  route::Route,
  session::{AuthEvent, Session},
};

pub const NOT_AUTHENTICATED: &str = "Usuário não autenticado.";

// ─── Next step ───────────────────────────────────────────────────────────────

/// What a page wants done after handling an action or an outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Next<C> {
  Idle,
  Run(C),
  Navigate(Route),
  NavigateAfter(Route, Duration),
}

impl<C> Next<C> {
  pub fn map<D>(self, f: impl FnOnce(C) -> D) -> Next<D> {
    match self {
      Next::Idle => Next::Idle,
      Next::Run(c) => Next::Run(f(c)),
      Next::Navigate(r) => Next::Navigate(r),
      Next::NavigateAfter(r, d) => Next::NavigateAfter(r, d),
    }
  }
}

// ─── Commands / outcomes ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Login(login::Command),
  Prompt(prompt::Command),
  Knowledge(knowledge::Command),
  Whatsapp(whatsapp::Command),
  ResetMemory(reset_memory::Command),
  ResetPassword(reset_password::Command),
  Profile(profile::Command),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Login(login::Outcome),
  Prompt(prompt::Outcome),
  Knowledge(knowledge::Outcome),
  Whatsapp(whatsapp::Outcome),
  ResetMemory(reset_memory::Outcome),
  ResetPassword(reset_password::Outcome),
  Profile(profile::Outcome),
  /// A store command was issued while signed out.
  SessionMissing,
}

/// Run `command` against the backend. Store commands need `session`.
pub async fn execute<B: Backend>(backend: &B, session: Option<&Session>, command: Command) -> Outcome {
  match (command, session) {
    (Command::Login(c), _) => Outcome::Login(login::run(backend.auth(), c).await),
    (Command::ResetPassword(c), _) => {
      Outcome::ResetPassword(reset_password::run(backend.auth(), c).await)
    }
    (Command::ResetMemory(c), _) => {
      Outcome::ResetMemory(reset_memory::run(backend.notifier(), c).await)
    }
    (Command::Prompt(c), Some(s)) => Outcome::Prompt(prompt::run(backend.store(), s, c).await),
    (Command::Knowledge(c), Some(s)) => Outcome::Knowledge(knowledge::run(backend, s, c).await),
    (Command::Whatsapp(c), Some(s)) => {
      Outcome::Whatsapp(whatsapp::run(backend.store(), s, c).await)
    }
    (Command::Profile(c), Some(s)) => Outcome::Profile(profile::run(backend.store(), s, c).await),
    (command, None) => {
      tracing::warn!(?command, "store command issued without a session");
      Outcome::SessionMissing
    }
  }
}

// ─── Page ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Page {
  Login(LoginPage),
  Prompt(PromptPage),
  Knowledge(KnowledgePage),
  Whatsapp(WhatsappPage),
  ResetMemory(ResetMemoryPage),
  ResetPassword(ResetPasswordPage),
  Profile(ProfilePage),
}

impl Page {
  pub fn mount(route: Route, session: Option<&Session>, mode: NotifyMode) -> Self {
    match route {
      Route::Home => Page::Login(LoginPage::new()),
      Route::Whatsapp => Page::Whatsapp(WhatsappPage::new()),
      Route::Prompt => Page::Prompt(PromptPage::new()),
      Route::KnowledgeBase => Page::Knowledge(KnowledgePage::new(mode)),
      Route::ResetMemory => Page::ResetMemory(ResetMemoryPage::new()),
      Route::ResetPassword => Page::ResetPassword(ResetPasswordPage::new()),
      Route::Profile => Page::Profile(ProfilePage::new(session)),
    }
  }

  pub fn route(&self) -> Route {
    match self {
      Page::Login(_) => Route::Home,
      Page::Prompt(_) => Route::Prompt,
      Page::Knowledge(_) => Route::KnowledgeBase,
      Page::Whatsapp(_) => Route::Whatsapp,
      Page::ResetMemory(_) => Route::ResetMemory,
      Page::ResetPassword(_) => Route::ResetPassword,
      Page::Profile(_) => Route::Profile,
    }
  }

  /// The fetch a page issues when it mounts, if any.
  pub fn initial_command(&mut self) -> Next<Command> {
    match self {
      Page::Prompt(p) => p.load().map(Command::Prompt),
      Page::Knowledge(p) => p.load().map(Command::Knowledge),
      Page::Whatsapp(p) => p.load().map(Command::Whatsapp),
      Page::Profile(p) => p.load().map(Command::Profile),
      Page::Login(_) | Page::ResetMemory(_) | Page::ResetPassword(_) => Next::Idle,
    }
  }

  /// The primary action: Enter / the form's submit button.
  pub fn submit(&mut self) -> Next<Command> {
    match self {
      Page::Login(p) => p.submit().map(Command::Login),
      Page::Prompt(p) => p.submit().map(Command::Prompt),
      Page::Knowledge(p) => p.submit().map(Command::Knowledge),
      Page::Whatsapp(p) => p.submit().map(Command::Whatsapp),
      Page::ResetMemory(p) => p.submit().map(Command::ResetMemory),
      Page::ResetPassword(p) => p.submit().map(Command::ResetPassword),
      Page::Profile(p) => p.submit().map(Command::Profile),
    }
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match (self, outcome) {
      (page, Outcome::SessionMissing) => {
        page.status_mut().fail(NOT_AUTHENTICATED);
        Next::Idle
      }
      (Page::Login(p), Outcome::Login(o)) => p.apply(o).map(Command::Login),
      (Page::Prompt(p), Outcome::Prompt(o)) => p.apply(o).map(Command::Prompt),
      (Page::Knowledge(p), Outcome::Knowledge(o)) => p.apply(o).map(Command::Knowledge),
      (Page::Whatsapp(p), Outcome::Whatsapp(o)) => p.apply(o).map(Command::Whatsapp),
      (Page::ResetMemory(p), Outcome::ResetMemory(o)) => p.apply(o).map(Command::ResetMemory),
      (Page::ResetPassword(p), Outcome::ResetPassword(o)) => {
        p.apply(o).map(Command::ResetPassword)
      }
      (Page::Profile(p), Outcome::Profile(o)) => p.apply(o).map(Command::Profile),
      (page, outcome) => {
        tracing::debug!(route = %page.route(), ?outcome, "outcome does not belong to this page");
        Next::Idle
      }
    }
  }

  /// A session change that did not redirect away from the page.
  pub fn on_session_change(&mut self, event: AuthEvent, session: Option<&Session>) -> Next<Command> {
    tracing::debug!(route = %self.route(), %event, "session changed");
    match self {
      Page::Whatsapp(p) => p.on_session_change(session).map(Command::Whatsapp),
      Page::Profile(p) => {
        p.on_session_change(session);
        Next::Idle
      }
      _ => Next::Idle,
    }
  }

  /// The unsaved-change guard, for pages that have one.
  pub fn dirty_flag(&self) -> Option<DirtyFlag> {
    match self {
      Page::Knowledge(p) if p.mode == NotifyMode::Deferred => Some(p.dirty_flag()),
      _ => None,
    }
  }

  pub fn status(&self) -> &PageStatus {
    match self {
      Page::Login(p) => &p.status,
      Page::Prompt(p) => &p.status,
      Page::Knowledge(p) => &p.status,
      Page::Whatsapp(p) => &p.status,
      Page::ResetMemory(p) => &p.status,
      Page::ResetPassword(p) => &p.status,
      Page::Profile(p) => &p.status,
    }
  }

  pub fn status_mut(&mut self) -> &mut PageStatus {
    match self {
      Page::Login(p) => &mut p.status,
      Page::Prompt(p) => &mut p.status,
      Page::Knowledge(p) => &mut p.status,
      Page::Whatsapp(p) => &mut p.status,
      Page::ResetMemory(p) => &mut p.status,
      Page::ResetPassword(p) => &mut p.status,
      Page::Profile(p) => &mut p.status,
    }
  }

  pub fn flash(&self) -> Option<&Flash> { self.status().flash.as_ref() }

  pub fn is_loading(&self) -> bool { self.status().loading }

  pub fn form(&self) -> &dyn Form {
    match self {
      Page::Login(p) => p,
      Page::Prompt(p) => p,
      Page::Knowledge(p) => p,
      Page::Whatsapp(p) => p,
      Page::ResetMemory(p) => p,
      Page::ResetPassword(p) => p,
      Page::Profile(p) => p,
    }
  }

  pub fn form_mut(&mut self) -> &mut dyn Form {
    match self {
      Page::Login(p) => p,
      Page::Prompt(p) => p,
      Page::Knowledge(p) => p,
      Page::Whatsapp(p) => p,
      Page::ResetMemory(p) => p,
      Page::ResetPassword(p) => p,
      Page::Profile(p) => p,
    }
  }

  pub fn submit_label(&self) -> &'static str {
    match self {
      Page::Login(p) => p.submit_label(),
      Page::Prompt(p) => p.submit_label(),
      Page::Knowledge(p) => p.submit_label(),
      Page::Whatsapp(p) => p.submit_label(),
      Page::ResetMemory(p) => p.submit_label(),
      Page::ResetPassword(p) => p.submit_label(),
      Page::Profile(p) => p.submit_label(),
    }
  }
}
