//! Application state and key dispatch on top of the [`Console`].

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use fuzzy_matcher::{FuzzyMatcher, skim::SkimMatcherV2};
use kaisan_core::{
  Backend, Route,
  console::{Completion, Console, Effect, Navigation},
  entity::KnowledgeEntry,
  form::FieldKind,
  lifetime::MountToken,
  navigation::UnloadDecision,
  pages::{Command, Next, Page, knowledge},
};

pub const UNSAVED_CHANGES: &str = "Existem alterações não salvas. Deseja sair mesmo assim?";

// ─── Focus / modal ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
  /// A form field, by its index in the page's field list.
  Field(usize),
  /// The knowledge-base entry list.
  List,
}

/// A yes/no question covering the whole screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modal {
  /// Leaving the page would discard unsaved changes.
  ConfirmNavigation,
  ConfirmDelete,
  /// Quitting would discard unsaved changes.
  ConfirmExit,
}

impl Modal {
  pub fn message(self) -> &'static str {
    match self {
      Modal::ConfirmNavigation | Modal::ConfirmExit => UNSAVED_CHANGES,
      Modal::ConfirmDelete => knowledge::CONFIRM_DELETE,
    }
  }
}

// ─── App ──────────────────────────────────────────────────────────────────────

pub struct App<B: Backend> {
  pub console: Console<B>,

  /// Keyboard focus within the mounted page.
  pub focus: Focus,

  pub modal: Option<Modal>,

  /// Current fuzzy-filter string for the entry list.
  pub filter: String,

  /// Whether the user is typing a filter query.
  pub filter_active: bool,

  /// Cursor position within the *filtered* entry list.
  pub list_cursor: usize,

  /// One-line status message shown in the status bar.
  pub status_msg: String,

  /// Effects not yet handed to the event loop.
  effects: Vec<Effect>,
}

impl<B: Backend> App<B> {
  pub fn new(console: Console<B>, effects: Vec<Effect>) -> Self {
    let mut app = Self {
      console,
      focus: Focus::Field(0),
      modal: None,
      filter: String::new(),
      filter_active: false,
      list_cursor: 0,
      status_msg: String::new(),
      effects,
    };
    app.reset_view();
    app
  }

  pub fn take_effects(&mut self) -> Vec<Effect> { std::mem::take(&mut self.effects) }

  fn dispatch(&mut self, next: Next<Command>) {
    let effects = self.console.dispatch(next);
    self.effects.extend(effects);
  }

  /// A fresh page was mounted.
  fn opened(&mut self, effects: Vec<Effect>) {
    self.effects.extend(effects);
    self.reset_view();
  }

  fn reset_view(&mut self) {
    self.modal = None;
    self.filter.clear();
    self.filter_active = false;
    self.list_cursor = 0;
    self.focus_first_field();
  }

  fn focus_first_field(&mut self) {
    self.focus = self.focus_order().first().copied().unwrap_or(Focus::Field(0));
  }

  // ── Console events ────────────────────────────────────────────────────────

  pub fn complete(&mut self, completion: Completion) {
    let effects = self.console.complete(completion);
    self.effects.extend(effects);
    self.clamp_cursor();
  }

  pub async fn navigate(&mut self, route: Route) {
    match self.console.navigate(route).await {
      Navigation::Opened(effects) => self.opened(effects),
      Navigation::Blocked => self.modal = Some(Modal::ConfirmNavigation),
      Navigation::Aborted => {}
    }
  }

  async fn sign_out(&mut self) {
    match self.console.sign_out().await {
      Navigation::Opened(effects) => self.opened(effects),
      Navigation::Blocked => self.modal = Some(Modal::ConfirmNavigation),
      Navigation::Aborted => {}
    }
  }

  /// A delayed navigation came due.
  pub async fn on_timer(&mut self, route: Route, token: MountToken) {
    if token.is_current() {
      self.navigate(route).await;
    }
  }

  pub async fn poll_session(&mut self) {
    let before = self.console.route();
    let effects = self.console.poll_session().await;
    if self.console.route() == before {
      self.effects.extend(effects);
    } else {
      self.opened(effects);
    }
  }

  // ── Knowledge list ────────────────────────────────────────────────────────

  /// Entries that match the current filter query.
  pub fn filtered_entries(&self) -> Vec<&KnowledgeEntry> {
    let Page::Knowledge(page) = self.console.page() else {
      return Vec::new();
    };
    if self.filter.is_empty() {
      return page.entries.iter().collect();
    }
    let matcher = SkimMatcherV2::default();
    page
      .entries
      .iter()
      .filter(|e| {
        matcher.fuzzy_match(&e.question, &self.filter).is_some()
          || matcher.fuzzy_match(&e.answer, &self.filter).is_some()
      })
      .collect()
  }

  fn cursor_entry_id(&self) -> Option<String> {
    self
      .filtered_entries()
      .get(self.list_cursor)
      .map(|e| e.id.clone())
  }

  fn clamp_cursor(&mut self) {
    let len = self.filtered_entries().len();
    if self.list_cursor >= len {
      self.list_cursor = len.saturating_sub(1);
    }
  }

  // ── Focus ─────────────────────────────────────────────────────────────────

  fn focus_order(&self) -> Vec<Focus> {
    let page = self.console.page();
    let mut order: Vec<Focus> = page
      .form()
      .fields()
      .iter()
      .enumerate()
      .filter(|(_, field)| field.kind.is_editable())
      .map(|(i, _)| Focus::Field(i))
      .collect();
    if matches!(page, Page::Knowledge(_)) {
      order.push(Focus::List);
    }
    order
  }

  fn cycle_focus(&mut self, forward: bool) {
    let order = self.focus_order();
    if order.is_empty() {
      return;
    }
    let pos = order.iter().position(|f| *f == self.focus).unwrap_or(0);
    let next = if forward {
      (pos + 1) % order.len()
    } else {
      (pos + order.len() - 1) % order.len()
    };
    self.focus = order[next];
  }

  // ── Key handling ──────────────────────────────────────────────────────────

  /// Process a key event. Returns `true` to continue, `false` to quit.
  pub async fn handle_key(&mut self, key: KeyEvent) -> anyhow::Result<bool> {
    if let Some(modal) = self.modal {
      return Ok(self.handle_modal_key(modal, key.code).await);
    }

    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && key.code == KeyCode::Char('c') {
      return Ok(self.request_exit());
    }

    // Filter input mode: all printable keys go into the filter string.
    if self.filter_active {
      self.handle_filter_key(key.code);
      return Ok(true);
    }

    let signed_in = self.console.session().is_some();
    match key.code {
      KeyCode::Esc => return Ok(self.request_exit()),
      KeyCode::F(n @ 1..=5) if signed_in => {
        self.status_msg.clear();
        self.navigate(Route::NAV[usize::from(n) - 1]).await;
      }
      KeyCode::Char('l') if ctrl && signed_in => self.sign_out().await,
      KeyCode::Char('s') if ctrl => self.submit(),
      KeyCode::Char(c) if ctrl => self.handle_shortcut(c),
      KeyCode::Tab => self.cycle_focus(true),
      KeyCode::BackTab => self.cycle_focus(false),
      code => match self.focus {
        Focus::List => self.handle_list_key(code),
        Focus::Field(index) => self.handle_field_key(index, code),
      },
    }
    Ok(true)
  }

  /// `false` when the app may quit right away.
  fn request_exit(&mut self) -> bool {
    match self.console.request_exit() {
      UnloadDecision::Proceed => false,
      UnloadDecision::Confirm => {
        self.modal = Some(Modal::ConfirmExit);
        true
      }
    }
  }

  async fn handle_modal_key(&mut self, modal: Modal, code: KeyCode) -> bool {
    let confirmed = match code {
      KeyCode::Char('y' | 'Y' | 's' | 'S') | KeyCode::Enter => true,
      KeyCode::Char('n' | 'N') | KeyCode::Esc => false,
      _ => return true,
    };
    self.modal = None;
    match modal {
      Modal::ConfirmExit => return !confirmed,
      Modal::ConfirmNavigation => match self.console.resolve_navigation(confirmed).await {
        Navigation::Opened(effects) => self.opened(effects),
        Navigation::Blocked => self.modal = Some(Modal::ConfirmNavigation),
        Navigation::Aborted => {}
      },
      Modal::ConfirmDelete => {
        if let Page::Knowledge(page) = self.console.page_mut() {
          let next = if confirmed {
            page.confirm_delete()
          } else {
            page.cancel_delete();
            Next::Idle
          };
          self.dispatch(next.map(Command::Knowledge));
        }
      }
    }
    true
  }

  fn handle_filter_key(&mut self, code: KeyCode) {
    match code {
      KeyCode::Esc => {
        self.filter_active = false;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter => {
        self.filter_active = false;
        self.list_cursor = 0;
      }
      KeyCode::Backspace => {
        self.filter.pop();
        self.list_cursor = 0;
      }
      KeyCode::Char(c) => {
        self.filter.push(c);
        self.list_cursor = 0;
      }
      _ => {}
    }
  }

  /// Ctrl-key actions that belong to one page.
  fn handle_shortcut(&mut self, c: char) {
    let mut refocus = false;
    let next = match self.console.page_mut() {
      Page::Login(page) => match c {
        'u' => page.sign_up().map(Command::Login),
        'r' => {
          page.toggle_recovery();
          refocus = true;
          Next::Idle
        }
        _ => Next::Idle,
      },
      Page::ResetPassword(page) if c == 'b' => page.back_to_login().map(Command::ResetPassword),
      Page::Knowledge(page) => match c {
        'x' => {
          page.cancel_edit();
          Next::Idle
        }
        'p' => page.save_changes().map(Command::Knowledge),
        _ => Next::Idle,
      },
      _ => Next::Idle,
    };
    if refocus {
      self.focus_first_field();
    }
    self.dispatch(next);
  }

  fn submit(&mut self) {
    let next = self.console.page_mut().submit();
    self.dispatch(next);
  }

  fn handle_field_key(&mut self, index: usize, code: KeyCode) {
    let Some((mut value, kind)) = self
      .console
      .page()
      .form()
      .fields()
      .get(index)
      .map(|f| (f.value.to_string(), f.kind))
    else {
      return;
    };
    match code {
      KeyCode::Enter if kind == FieldKind::Multiline => value.push('\n'),
      KeyCode::Enter => return self.submit(),
      KeyCode::Backspace if kind.is_editable() => {
        value.pop();
      }
      KeyCode::Char(c) if kind.is_editable() => value.push(c),
      _ => return,
    }
    self.console.page_mut().form_mut().set_field(index, value);
  }

  fn handle_list_key(&mut self, code: KeyCode) {
    match code {
      KeyCode::Down | KeyCode::Char('j') => {
        let len = self.filtered_entries().len();
        if len > 0 && self.list_cursor + 1 < len {
          self.list_cursor += 1;
        }
      }
      KeyCode::Up | KeyCode::Char('k') => {
        self.list_cursor = self.list_cursor.saturating_sub(1);
      }
      KeyCode::Char('/') => {
        self.filter_active = true;
        self.filter.clear();
        self.list_cursor = 0;
      }
      KeyCode::Enter | KeyCode::Char('e') => {
        let Some(id) = self.cursor_entry_id() else {
          return;
        };
        if let Page::Knowledge(page) = self.console.page_mut() {
          page.edit(&id);
        }
        self.focus = Focus::Field(0);
      }
      KeyCode::Delete | KeyCode::Char('d') => {
        let Some(id) = self.cursor_entry_id() else {
          return;
        };
        if let Page::Knowledge(page) = self.console.page_mut() {
          page.request_delete(&id);
          if page.pending_delete.is_some() {
            self.modal = Some(Modal::ConfirmDelete);
          }
        }
      }
      _ => {}
    }
  }
}
