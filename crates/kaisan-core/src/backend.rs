//! Bundles the three remote collaborators behind one type parameter.

use crate::{auth::AuthService, notify::WebhookNotifier, store::RecordStore};

pub trait Backend: Send + Sync + 'static {
  type Auth: AuthService;
  type Store: RecordStore;
  type Notifier: WebhookNotifier;

  fn auth(&self) -> &Self::Auth;
  fn store(&self) -> &Self::Store;
  fn notifier(&self) -> &Self::Notifier;
}

/// The plain composition of an auth service, a store and a notifier.
#[derive(Debug, Clone)]
pub struct Services<A, S, N> {
  pub auth:     A,
  pub store:    S,
  pub notifier: N,
}

impl<A, S, N> Backend for Services<A, S, N>
where
  A: AuthService + 'static,
  S: RecordStore + 'static,
  N: WebhookNotifier + 'static,
{
  type Auth = A;
  type Notifier = N;
  type Store = S;

  fn auth(&self) -> &A { &self.auth }

  fn store(&self) -> &S { &self.store }

  fn notifier(&self) -> &N { &self.notifier }
}
