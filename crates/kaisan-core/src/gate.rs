//! Session gating for a mounted page.

use tracing::warn;

use crate::{
  auth::AuthService,
  route::Route,
  session::{AuthEvent, Session, SessionSubscription},
};

/// What a route may do given the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
  Granted(Session),
  Anonymous,
  Redirect(Route),
}

pub fn decide(route: Route, session: Option<&Session>) -> Access {
  match (route, session) {
    (Route::Home, Some(_)) => Access::Redirect(Route::Prompt),
    (route, None) if route.requires_session() => Access::Redirect(Route::Home),
    (_, None) => Access::Anonymous,
    (_, Some(session)) => Access::Granted(session.clone()),
  }
}

/// Watches the session on behalf of one mounted page.
#[derive(Debug)]
pub struct SessionGate {
  route:        Route,
  subscription: SessionSubscription,
  session:      Option<Session>,
}

impl SessionGate {
  /// Subscribe, then read the current session, so no change published in
  /// between is missed. A session that cannot be read counts as absent.
  pub async fn mount<A: AuthService>(auth: &A, route: Route) -> (Self, Access) {
    let subscription = auth.subscribe();
    let session = match auth.get_session().await {
      Ok(session) => session,
      Err(error) => {
        warn!(%route, %error, "could not read session, continuing signed out");
        None
      }
    };
    let access = decide(route, session.as_ref());
    let gate = Self {
      route,
      subscription,
      session,
    };
    (gate, access)
  }

  pub fn route(&self) -> Route { self.route }

  pub fn session(&self) -> Option<&Session> { self.session.as_ref() }

  /// The next unseen session change and what it means for this route.
  pub fn poll(&mut self) -> Option<(AuthEvent, Access)> {
    let change = self.subscription.try_next()?;
    self.session = change.session;
    Some((change.event, decide(self.route, self.session.as_ref())))
  }

  pub fn unmount(self) { self.subscription.unsubscribe(); }
}
