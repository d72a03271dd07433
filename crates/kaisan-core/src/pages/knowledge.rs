//! `/base-de-conhecimento`: question/answer pairs the agent draws on.
//!
//! Two notification policies exist for the sync webhook:
//!
//! - [`NotifyMode::OnSubmit`]: every successful create or update posts the
//!   change right away. Deletes are not reported.
//! - [`NotifyMode::Deferred`]: successful writes queue their notification and
//!   mark the page dirty; [`KnowledgePage::save_changes`] posts the queue.
//!   While dirty, leaving the page asks for confirmation.
//!
//! In both modes the webhook is best-effort and the store write stands on its
//! own.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::error;

use crate::{
  backend::Backend,
  entity::KnowledgeEntry,
  error::StoreError,
  form::{FieldKind, FieldView, Form, PageStatus, is_blank},
  guard::DirtyFlag,
  notify::{self, KnowledgeAction, KnowledgeNotification, Webhook},
  session::Session,
  store::{self, Filter, KNOWLEDGE_BASE, Query, RecordStore},
};

use super::Next;

pub const FIELDS_REQUIRED: &str = "Por favor, preencha todos os campos";
pub const ENTRY_CREATED: &str = "Entrada adicionada com sucesso!";
pub const ENTRY_UPDATED: &str = "Entrada atualizada com sucesso!";
pub const ENTRY_DELETED: &str = "Entrada excluída com sucesso!";
pub const CHANGES_SAVED: &str = "Alterações salvas com sucesso!";
pub const CONFIRM_DELETE: &str = "Tem certeza que deseja excluir esta entrada?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyMode {
  #[default]
  OnSubmit,
  Deferred,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
  Load,
  Create {
    question: String,
    answer:   String,
    notify:   bool,
  },
  Update {
    id:       String,
    question: String,
    answer:   String,
    notify:   bool,
  },
  Delete(KnowledgeEntry),
  Publish(Vec<KnowledgeNotification>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
  Loaded(Result<Vec<KnowledgeEntry>, StoreError>),
  /// A create, update or delete finished. `change` describes it in the shape
  /// the webhook expects.
  Written {
    change: KnowledgeNotification,
    result: Result<(), StoreError>,
  },
  Published(usize),
}

#[derive(Debug, Clone)]
pub struct KnowledgePage {
  pub mode:           NotifyMode,
  /// Newest first.
  pub entries:        Vec<KnowledgeEntry>,
  pub question:       String,
  pub answer:         String,
  /// Id of the entry loaded into the form, if editing.
  pub editing:        Option<String>,
  /// Id awaiting delete confirmation.
  pub pending_delete: Option<String>,
  pub status:         PageStatus,
  queued:             Vec<KnowledgeNotification>,
  dirty:              DirtyFlag,
}

impl KnowledgePage {
  pub fn new(mode: NotifyMode) -> Self {
    Self {
      mode,
      entries: Vec::new(),
      question: String::new(),
      answer: String::new(),
      editing: None,
      pending_delete: None,
      status: PageStatus::default(),
      queued: Vec::new(),
      dirty: DirtyFlag::new(),
    }
  }

  /// The guard cell. Only deferred mode ever sets it.
  pub fn dirty_flag(&self) -> DirtyFlag { self.dirty.clone() }

  pub fn is_dirty(&self) -> bool { self.dirty.is_dirty() }

  /// Notifications waiting for [`Self::save_changes`].
  pub fn queued(&self) -> &[KnowledgeNotification] { &self.queued }

  pub fn entry(&self, id: &str) -> Option<&KnowledgeEntry> { self.entries.iter().find(|e| e.id == id) }

  fn deferred(&self) -> bool { self.mode == NotifyMode::Deferred }

  pub fn load(&mut self) -> Next<Command> {
    self.status.loading = true;
    Next::Run(Command::Load)
  }

  pub fn submit(&mut self) -> Next<Command> {
    if is_blank(&self.question) || is_blank(&self.answer) {
      self.status.reject(FIELDS_REQUIRED);
      return Next::Idle;
    }
    if !self.status.begin() {
      return Next::Idle;
    }
    let notify = !self.deferred();
    let command = match &self.editing {
      Some(id) => Command::Update {
        id: id.clone(),
        question: self.question.clone(),
        answer: self.answer.clone(),
        notify,
      },
      None => Command::Create {
        question: self.question.clone(),
        answer: self.answer.clone(),
        notify,
      },
    };
    Next::Run(command)
  }

  /// Load entry `id` into the form.
  pub fn edit(&mut self, id: &str) {
    let Some(entry) = self.entry(id).cloned() else {
      return;
    };
    self.question = entry.question;
    self.answer = entry.answer;
    self.editing = Some(entry.id);
    if self.deferred() {
      self.dirty.mark_dirty();
    }
  }

  /// Leave edit mode and clear the form. In deferred mode this also drops
  /// every queued notification.
  pub fn cancel_edit(&mut self) {
    self.editing = None;
    self.question.clear();
    self.answer.clear();
    if self.deferred() {
      self.queued.clear();
      self.dirty.mark_clean();
    }
  }

  pub fn request_delete(&mut self, id: &str) {
    if self.entry(id).is_some() {
      self.pending_delete = Some(id.to_string());
    }
  }

  pub fn cancel_delete(&mut self) { self.pending_delete = None; }

  pub fn confirm_delete(&mut self) -> Next<Command> {
    let Some(id) = self.pending_delete.take() else {
      return Next::Idle;
    };
    let Some(entry) = self.entry(&id).cloned() else {
      return Next::Idle;
    };
    if !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Delete(entry))
  }

  /// Publish the queued notifications (deferred mode only).
  pub fn save_changes(&mut self) -> Next<Command> {
    if !self.deferred() || !self.status.begin() {
      return Next::Idle;
    }
    Next::Run(Command::Publish(std::mem::take(&mut self.queued)))
  }

  pub fn apply(&mut self, outcome: Outcome) -> Next<Command> {
    match outcome {
      Outcome::Loaded(Ok(entries)) => {
        self.entries = entries;
        self.status.finish();
        Next::Idle
      }
      Outcome::Loaded(Err(e)) => {
        error!(error = %e, "failed to fetch knowledge base");
        self.status.fail(format!("Erro ao buscar dados: {e}"));
        Next::Idle
      }
      Outcome::Written { change, result: Ok(()) } => {
        match change.action {
          KnowledgeAction::Create => {
            self.status.succeed(ENTRY_CREATED);
            self.question.clear();
            self.answer.clear();
          }
          KnowledgeAction::Update => {
            self.status.succeed(ENTRY_UPDATED);
            self.editing = None;
            self.question.clear();
            self.answer.clear();
          }
          KnowledgeAction::Delete => self.status.succeed(ENTRY_DELETED),
        }
        if self.deferred() {
          self.queued.push(change);
          self.dirty.mark_dirty();
        }
        self.load()
      }
      Outcome::Written { result: Err(e), .. } => {
        error!(error = %e, "knowledge base write failed");
        self.status.fail(e.to_string());
        Next::Idle
      }
      Outcome::Published(_) => {
        self.dirty.mark_clean();
        self.status.succeed(CHANGES_SAVED);
        Next::Idle
      }
    }
  }

  pub fn heading(&self) -> &'static str {
    if self.editing.is_some() { "Editar Entrada" } else { "Adicionar Nova Entrada" }
  }

  pub fn submit_label(&self) -> &'static str {
    if self.status.loading { "Salvando..." } else { "Salvar" }
  }
}

impl Form for KnowledgePage {
  fn fields(&self) -> Vec<FieldView<'_>> {
    vec![
      FieldView::new("Pergunta", &self.question, FieldKind::Text).placeholder("Digite a pergunta"),
      FieldView::new("Resposta", &self.answer, FieldKind::Multiline)
        .placeholder("Digite a resposta"),
    ]
  }

  fn set_field(&mut self, index: usize, value: String) {
    match index {
      0 => self.question = value,
      1 => self.answer = value,
      _ => {}
    }
  }
}

pub async fn run<B: Backend>(backend: &B, session: &Session, command: Command) -> Outcome {
  let store = backend.store();
  match command {
    Command::Load => {
      let query = Query::from(KNOWLEDGE_BASE).order("created_at", false);
      Outcome::Loaded(store::fetch_all(store, session, &query).await)
    }
    Command::Create {
      question,
      answer,
      notify,
    } => {
      let row = json!({
        "question": question,
        "answer": answer,
        "created_by": session.user_id(),
      });
      let result = store.insert(session, KNOWLEDGE_BASE, row).await;
      let change = KnowledgeNotification::created(question, answer);
      finish_write(backend, change, result, notify).await
    }
    Command::Update {
      id,
      question,
      answer,
      notify,
    } => {
      let patch = json!({
        "question": question,
        "answer": answer,
        "updated_at": Utc::now(),
      });
      let result = store
        .update(session, KNOWLEDGE_BASE, patch, &Filter::eq("id", &id))
        .await;
      let change = KnowledgeNotification::updated(id, question, answer);
      finish_write(backend, change, result, notify).await
    }
    Command::Delete(entry) => {
      let result = store
        .delete(session, KNOWLEDGE_BASE, &Filter::eq("id", &entry.id))
        .await;
      let change = KnowledgeNotification::deleted(entry.id, entry.question, entry.answer);
      finish_write(backend, change, result, false).await
    }
    Command::Publish(changes) => {
      for change in &changes {
        notify::notify_best_effort(backend.notifier(), Webhook::KnowledgeBase, change).await;
      }
      Outcome::Published(changes.len())
    }
  }
}

async fn finish_write<B: Backend>(
  backend: &B,
  change: KnowledgeNotification,
  result: Result<(), StoreError>,
  notify: bool,
) -> Outcome {
  if notify && result.is_ok() {
    notify::notify_best_effort(backend.notifier(), Webhook::KnowledgeBase, &change).await;
  }
  Outcome::Written { change, result }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;

  use super::*;

  fn entry(id: &str) -> KnowledgeEntry {
    KnowledgeEntry {
      id:         id.into(),
      question:   format!("Pergunta {id}"),
      answer:     format!("Resposta {id}"),
      created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
      updated_at: None,
      created_by: None,
    }
  }

  #[test]
  fn empty_fields_are_rejected_locally() {
    let mut page = KnowledgePage::new(NotifyMode::OnSubmit);
    page.set_field(0, "Horário?".into());
    assert_eq!(page.submit(), Next::Idle);
    assert_eq!(page.status.flash.as_ref().map(|f| f.text.as_str()), Some(FIELDS_REQUIRED));
    assert!(!page.status.loading);
  }

  #[test]
  fn editing_submits_an_update() {
    let mut page = KnowledgePage::new(NotifyMode::OnSubmit);
    page.entries = vec![entry("1"), entry("2")];
    page.edit("2");
    assert_eq!(page.heading(), "Editar Entrada");
    assert!(!page.is_dirty());
    assert_eq!(
      page.submit(),
      Next::Run(Command::Update {
        id:       "2".into(),
        question: "Pergunta 2".into(),
        answer:   "Resposta 2".into(),
        notify:   true,
      })
    );
  }

  #[test]
  fn editing_an_unknown_entry_leaves_the_form_alone() {
    let mut page = KnowledgePage::new(NotifyMode::OnSubmit);
    page.entries = vec![entry("1")];
    page.set_field(0, "rascunho".into());
    page.edit("missing");
    assert!(page.editing.is_none());
    assert_eq!(page.question, "rascunho");
  }

  #[test]
  fn invalid_submit_while_saving_does_not_allow_a_second_write() {
    let mut page = KnowledgePage::new(NotifyMode::OnSubmit);
    page.set_field(0, "Q".into());
    page.set_field(1, "A".into());
    assert!(matches!(page.submit(), Next::Run(Command::Create { .. })));

    page.set_field(1, String::new());
    assert_eq!(page.submit(), Next::Idle);
    assert!(page.status.loading);
    assert_eq!(page.status.flash.as_ref().map(|f| f.text.as_str()), Some(FIELDS_REQUIRED));

    page.set_field(1, "A".into());
    assert_eq!(page.submit(), Next::Idle);
  }

  #[test]
  fn deferred_mode_queues_and_publishes() {
    let mut page = KnowledgePage::new(NotifyMode::Deferred);
    page.entries = vec![entry("1")];

    page.request_delete("1");
    let Next::Run(Command::Delete(deleted)) = page.confirm_delete() else {
      panic!("expected delete");
    };
    assert_eq!(deleted.id, "1");

    let next = page.apply(Outcome::Written {
      change: KnowledgeNotification::deleted("1", "Pergunta 1", "Resposta 1"),
      result: Ok(()),
    });
    assert_eq!(next, Next::Run(Command::Load));
    assert!(page.is_dirty());
    assert_eq!(page.queued().len(), 1);

    page.status.finish();
    let Next::Run(Command::Publish(changes)) = page.save_changes() else {
      panic!("expected publish");
    };
    assert_eq!(changes.len(), 1);
    assert!(page.queued().is_empty());

    page.apply(Outcome::Published(1));
    assert!(!page.is_dirty());
    assert_eq!(page.status.flash.as_ref().map(|f| f.text.as_str()), Some(CHANGES_SAVED));
  }

  #[test]
  fn deferred_edit_marks_dirty_and_cancel_discards() {
    let mut page = KnowledgePage::new(NotifyMode::Deferred);
    page.entries = vec![entry("1")];
    page.edit("1");
    assert!(page.is_dirty());
    page.cancel_edit();
    assert!(!page.is_dirty());
    assert!(page.editing.is_none());
    assert!(page.question.is_empty());
  }

  #[test]
  fn cancelled_delete_issues_nothing() {
    let mut page = KnowledgePage::new(NotifyMode::OnSubmit);
    page.entries = vec![entry("1")];
    page.request_delete("1");
    page.cancel_delete();
    assert_eq!(page.confirm_delete(), Next::Idle);
    page.request_delete("missing");
    assert!(page.pending_delete.is_none());
  }

  #[test]
  fn save_changes_is_a_no_op_on_submit_mode() {
    let mut page = KnowledgePage::new(NotifyMode::OnSubmit);
    assert_eq!(page.save_changes(), Next::Idle);
    assert!(!page.status.loading);
  }
}
