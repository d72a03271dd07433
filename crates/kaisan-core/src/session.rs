//! The authenticated session and its change stream.
//!
//! The session is process-wide state with exactly one writer, the auth
//! collaborator, which owns the [`SessionPublisher`]. Pages only ever hold a
//! [`SessionSubscription`] and read-only clones of [`Session`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

// ─── Session ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
  pub id:    Uuid,
  #[serde(default)]
  pub email: Option<String>,
}

/// An authenticated session as issued by the auth service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
  pub user:          User,
  pub access_token:  String,
  pub refresh_token: String,
  /// `None` when the service did not report an expiry.
  #[serde(default)]
  pub expires_at:    Option<DateTime<Utc>>,
}

impl Session {
  pub fn user_id(&self) -> Uuid { self.user.id }

  /// Whether the access token expires within `window` of `now`.
  pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| at - now <= window)
  }
}

// ─── Change events ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthEvent {
  InitialSession,
  SignedIn,
  SignedOut,
  TokenRefreshed,
  UserUpdated,
  PasswordRecovery,
}

/// One notification on the session stream: what happened and the session
/// that resulted from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChange {
  pub event:   AuthEvent,
  pub session: Option<Session>,
}

// ─── Publisher / subscription ────────────────────────────────────────────────

/// The single writer of the process-wide session.
///
/// Not `Clone`: whoever owns it is the auth collaborator.
#[derive(Debug)]
pub struct SessionPublisher {
  tx: watch::Sender<SessionChange>,
}

impl SessionPublisher {
  pub fn new(initial: Option<Session>) -> Self {
    let (tx, _) = watch::channel(SessionChange {
      event:   AuthEvent::InitialSession,
      session: initial,
    });
    Self { tx }
  }

  /// Replace the current session and wake every subscriber.
  pub fn publish(&self, event: AuthEvent, session: Option<Session>) {
    tracing::debug!(%event, signed_in = session.is_some(), "session change");
    self.tx.send_replace(SessionChange { event, session });
  }

  pub fn current(&self) -> Option<Session> { self.tx.borrow().session.clone() }

  /// A new subscription. The value current at subscription time counts as
  /// already seen; only later changes are reported.
  pub fn subscribe(&self) -> SessionSubscription {
    SessionSubscription {
      rx: self.tx.subscribe(),
    }
  }
}

/// A read-only handle on the session stream. Dropping it unsubscribes.
///
/// Changes published in quick succession may coalesce; a subscriber always
/// sees the latest value.
#[derive(Debug)]
pub struct SessionSubscription {
  rx: watch::Receiver<SessionChange>,
}

impl SessionSubscription {
  /// The next unseen change, if one has been published.
  pub fn try_next(&mut self) -> Option<SessionChange> {
    match self.rx.has_changed() {
      Ok(true) => Some(self.rx.borrow_and_update().clone()),
      _ => None,
    }
  }

  /// Wait for the next change. Returns `None` once the publisher is gone.
  pub async fn changed(&mut self) -> Option<SessionChange> {
    self.rx.changed().await.ok()?;
    Some(self.rx.borrow_and_update().clone())
  }

  pub fn unsubscribe(self) {}
}
