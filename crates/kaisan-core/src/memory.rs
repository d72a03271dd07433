//! In-process implementations of the collaborator traits.
//!
//! Used by the test suites and by `kaisan --offline`. Sign-ups are confirmed
//! immediately, the store has no row-level security, and any of the three can
//! be told to fail.

use std::{
  cmp::Ordering as CmpOrdering,
  collections::HashMap,
  sync::{
    Mutex, MutexGuard, PoisonError,
    atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering},
  },
};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{
  auth::{AuthService, SignUpOutcome},
  backend::Services,
  error::{AuthError, StoreError, WebhookError},
  notify::{Webhook, WebhookNotifier},
  session::{AuthEvent, Session, SessionPublisher, SessionSubscription, User},
  store::{Filter, NOT_SINGULAR, Query, RecordStore},
};

pub type MemoryBackend = Services<MemoryAuth, MemoryStore, MemoryNotifier>;

pub fn backend() -> MemoryBackend {
  Services {
    auth:     MemoryAuth::new(),
    store:    MemoryStore::new(),
    notifier: MemoryNotifier::new(),
  }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> { mutex.lock().unwrap_or_else(PoisonError::into_inner) }

// ─── Auth ────────────────────────────────────────────────────────────────────

const MIN_PASSWORD_LEN: usize = 6;

struct Account {
  user:     User,
  password: String,
}

pub struct MemoryAuth {
  accounts:      Mutex<HashMap<String, Account>>,
  publisher:     SessionPublisher,
  recoveries:    Mutex<Vec<String>>,
  session_fault: Mutex<Option<AuthError>>,
  unreadable:    AtomicBool,
}

impl Default for MemoryAuth {
  fn default() -> Self { Self::new() }
}

impl MemoryAuth {
  pub fn new() -> Self {
    Self {
      accounts:      Mutex::new(HashMap::new()),
      publisher:     SessionPublisher::new(None),
      recoveries:    Mutex::new(Vec::new()),
      session_fault: Mutex::new(None),
      unreadable:    AtomicBool::new(false),
    }
  }

  /// Register a confirmed account.
  pub fn add_user(&self, email: &str, password: &str) -> User {
    let user = User {
      id:    Uuid::new_v4(),
      email: Some(email.to_string()),
    };
    lock(&self.accounts).insert(email.to_string(), Account {
      user:     user.clone(),
      password: password.to_string(),
    });
    user
  }

  /// Publish a session for `email` without checking a password.
  pub fn force_sign_in(&self, email: &str) -> Option<Session> {
    let user = lock(&self.accounts).get(email)?.user.clone();
    let session = issue(user);
    self.publisher.publish(AuthEvent::SignedIn, Some(session.clone()));
    Some(session)
  }

  /// Drop the session as an expired token would.
  pub fn expire_session(&self) { self.publisher.publish(AuthEvent::SignedOut, None); }

  /// Make the next [`AuthService::get_session`] call fail.
  pub fn fail_next_get_session(&self, error: AuthError) { *lock(&self.session_fault) = Some(error); }

  /// Make every [`AuthService::get_session`] call fail until switched off.
  pub fn set_session_unreadable(&self, unreadable: bool) {
    self.unreadable.store(unreadable, Ordering::SeqCst);
  }

  /// Emails a recovery link was requested for, oldest first.
  pub fn recovery_requests(&self) -> Vec<String> { lock(&self.recoveries).clone() }

  pub fn password_of(&self, email: &str) -> Option<String> {
    lock(&self.accounts).get(email).map(|a| a.password.clone())
  }
}

fn issue(user: User) -> Session {
  Session {
    user,
    access_token: Uuid::new_v4().to_string(),
    refresh_token: Uuid::new_v4().to_string(),
    expires_at: Some(Utc::now() + Duration::hours(1)),
  }
}

impl AuthService for MemoryAuth {
  async fn get_session(&self) -> Result<Option<Session>, AuthError> {
    if let Some(error) = lock(&self.session_fault).take() {
      return Err(error);
    }
    if self.unreadable.load(Ordering::SeqCst) {
      return Err(AuthError::Transport("session storage unavailable".into()));
    }
    Ok(self.publisher.current())
  }

  fn subscribe(&self) -> SessionSubscription { self.publisher.subscribe() }

  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
    let user = {
      let accounts = lock(&self.accounts);
      match accounts.get(email) {
        Some(account) if account.password == password => account.user.clone(),
        _ => return Err(AuthError::Rejected("Invalid login credentials".into())),
      }
    };
    let session = issue(user);
    self.publisher.publish(AuthEvent::SignedIn, Some(session.clone()));
    Ok(session)
  }

  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
      return Err(AuthError::Rejected(
        "Password should be at least 6 characters.".into(),
      ));
    }
    if lock(&self.accounts).contains_key(email) {
      return Err(AuthError::Rejected("User already registered".into()));
    }
    self.add_user(email, password);
    Ok(SignUpOutcome::ConfirmationRequired)
  }

  async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
    lock(&self.recoveries).push(email.to_string());
    Ok(())
  }

  async fn update_user_password(&self, password: &str) -> Result<User, AuthError> {
    let session = self.publisher.current().ok_or(AuthError::SessionMissing)?;
    if password.chars().count() < MIN_PASSWORD_LEN {
      return Err(AuthError::Rejected(
        "Password should be at least 6 characters.".into(),
      ));
    }
    {
      let mut accounts = lock(&self.accounts);
      let account = accounts
        .values_mut()
        .find(|a| a.user.id == session.user.id)
        .ok_or_else(|| AuthError::Rejected("User not found".into()))?;
      account.password = password.to_string();
    }
    let user = session.user.clone();
    self.publisher.publish(AuthEvent::UserUpdated, Some(session));
    Ok(user)
  }

  async fn sign_out(&self) -> Result<(), AuthError> {
    self.publisher.publish(AuthEvent::SignedOut, None);
    Ok(())
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

pub struct MemoryStore {
  tables: Mutex<HashMap<String, Vec<Value>>>,
  faults: Mutex<HashMap<String, StoreError>>,
  calls:  AtomicUsize,
  epoch:  DateTime<Utc>,
  clock:  AtomicI64,
}

impl Default for MemoryStore {
  fn default() -> Self { Self::new() }
}

impl MemoryStore {
  pub fn new() -> Self {
    Self {
      tables: Mutex::new(HashMap::new()),
      faults: Mutex::new(HashMap::new()),
      calls:  AtomicUsize::new(0),
      epoch:  Utc::now(),
      clock:  AtomicI64::new(0),
    }
  }

  /// Add rows directly, bypassing call counting and id assignment.
  pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Value>) {
    lock(&self.tables)
      .entry(table.to_string())
      .or_default()
      .extend(rows);
  }

  pub fn rows(&self, table: &str) -> Vec<Value> {
    lock(&self.tables).get(table).cloned().unwrap_or_default()
  }

  /// Number of trait calls served so far.
  pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }

  /// Fail the next call that touches `table`.
  pub fn fail_next(&self, table: &str, error: StoreError) {
    lock(&self.faults).insert(table.to_string(), error);
  }

  fn enter(&self, table: &str) -> Result<(), StoreError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    match lock(&self.faults).remove(table) {
      Some(error) => Err(error),
      None => Ok(()),
    }
  }

  /// Strictly increasing, so `created_at` ordering is deterministic.
  fn next_timestamp(&self) -> DateTime<Utc> {
    let tick = self.clock.fetch_add(1, Ordering::SeqCst);
    self.epoch + Duration::milliseconds(tick)
  }

  fn matching(&self, query: &Query) -> Vec<Value> {
    let tables = lock(&self.tables);
    let mut rows: Vec<Value> = tables
      .get(&query.table)
      .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
      .unwrap_or_default();
    if let Some(order) = &query.order {
      rows.sort_by(|a, b| {
        let ord = compare(a.get(&order.column), b.get(&order.column));
        if order.ascending { ord } else { ord.reverse() }
      });
    }
    rows
  }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> CmpOrdering {
  match (a, b) {
    (Some(Value::Number(x)), Some(Value::Number(y))) => x
      .as_f64()
      .partial_cmp(&y.as_f64())
      .unwrap_or(CmpOrdering::Equal),
    (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
    (None | Some(Value::Null), None | Some(Value::Null)) => CmpOrdering::Equal,
    (None | Some(Value::Null), _) => CmpOrdering::Less,
    (_, None | Some(Value::Null)) => CmpOrdering::Greater,
    (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
  }
}

fn object(row: Value) -> Result<serde_json::Map<String, Value>, StoreError> {
  match row {
    Value::Object(map) => Ok(map),
    other => Err(StoreError::Decode(format!("expected a JSON object, found {other}"))),
  }
}

impl RecordStore for MemoryStore {
  async fn select(&self, _session: &Session, query: &Query) -> Result<Vec<Value>, StoreError> {
    self.enter(&query.table)?;
    Ok(self.matching(query))
  }

  async fn select_single(&self, _session: &Session, query: &Query) -> Result<Value, StoreError> {
    self.enter(&query.table)?;
    let mut rows = self.matching(query);
    match rows.len() {
      0 => Err(StoreError::NotFound),
      1 => Ok(rows.remove(0)),
      n => Err(StoreError::Rejected {
        code:    Some(NOT_SINGULAR.into()),
        message: format!("JSON object requested, multiple ({n}) rows returned"),
      }),
    }
  }

  async fn insert(&self, _session: &Session, table: &str, row: Value) -> Result<(), StoreError> {
    self.enter(table)?;
    let mut row = object(row)?;
    row
      .entry("id")
      .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    if !row.contains_key("created_at") {
      row.insert("created_at".into(), Value::String(
        self
          .next_timestamp()
          .to_rfc3339_opts(SecondsFormat::Micros, true),
      ));
    }
    lock(&self.tables)
      .entry(table.to_string())
      .or_default()
      .push(Value::Object(row));
    Ok(())
  }

  async fn update(
    &self,
    _session: &Session,
    table: &str,
    patch: Value,
    filter: &Filter,
  ) -> Result<(), StoreError> {
    self.enter(table)?;
    let patch = object(patch)?;
    let mut tables = lock(&self.tables);
    let mut matched = 0;
    for row in tables.get_mut(table).into_iter().flatten() {
      if !filter.matches(row) {
        continue;
      }
      if let Value::Object(fields) = row {
        fields.extend(patch.clone());
        matched += 1;
      }
    }
    if matched == 0 { Err(StoreError::NotFound) } else { Ok(()) }
  }

  async fn delete(&self, _session: &Session, table: &str, filter: &Filter) -> Result<(), StoreError> {
    self.enter(table)?;
    let mut tables = lock(&self.tables);
    let Some(rows) = tables.get_mut(table) else {
      return Err(StoreError::NotFound);
    };
    let before = rows.len();
    rows.retain(|row| !filter.matches(row));
    if rows.len() == before { Err(StoreError::NotFound) } else { Ok(()) }
  }
}

// ─── Notifier ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryNotifier {
  delivered: Mutex<Vec<(Webhook, Value)>>,
  attempts:  AtomicUsize,
  failing:   AtomicBool,
}

impl MemoryNotifier {
  pub fn new() -> Self { Self::default() }

  /// While set, every post fails with a 500.
  pub fn set_failing(&self, failing: bool) { self.failing.store(failing, Ordering::SeqCst); }

  pub fn delivered(&self) -> Vec<(Webhook, Value)> { lock(&self.delivered).clone() }

  /// Posts attempted, delivered or not.
  pub fn attempts(&self) -> usize { self.attempts.load(Ordering::SeqCst) }
}

impl WebhookNotifier for MemoryNotifier {
  async fn post(&self, hook: Webhook, body: &Value) -> Result<(), WebhookError> {
    self.attempts.fetch_add(1, Ordering::SeqCst);
    if self.failing.load(Ordering::SeqCst) {
      return Err(WebhookError::Status(500));
    }
    lock(&self.delivered).push((hook, body.clone()));
    Ok(())
  }
}
