//! In-app navigation with an unsaved-change guard.
//!
//! A page with a [`DirtyFlag`] attaches it once when it mounts. Every
//! navigation or exit request reads the flag at that moment; while it is set
//! the request is parked until the user confirms or declines.

use crate::{guard::DirtyFlag, route::Route};

/// What the user asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
  Open(Route),
  SignOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
  Proceed(Intent),
  /// Parked; call [`Navigator::resolve`] with the user's answer.
  NeedsConfirmation,
}

/// Answer to a request to leave the console altogether.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnloadDecision {
  Proceed,
  Confirm,
}

#[derive(Debug)]
pub struct Navigator {
  current: Route,
  guard:   Option<DirtyFlag>,
  pending: Option<Intent>,
}

impl Navigator {
  pub fn new(start: Route) -> Self {
    Self {
      current: start,
      guard:   None,
      pending: None,
    }
  }

  pub fn current(&self) -> Route { self.current }

  pub fn pending(&self) -> Option<Intent> { self.pending }

  /// Record that `route` is now mounted.
  pub fn arrive(&mut self, route: Route) {
    self.current = route;
    self.pending = None;
  }

  pub fn attach(&mut self, flag: DirtyFlag) { self.guard = Some(flag); }

  pub fn detach(&mut self) { self.guard = None; }

  fn is_dirty(&self) -> bool { self.guard.as_ref().is_some_and(DirtyFlag::is_dirty) }

  pub fn request(&mut self, intent: Intent) -> Request {
    if self.is_dirty() {
      self.pending = Some(intent);
      Request::NeedsConfirmation
    } else {
      Request::Proceed(intent)
    }
  }

  /// Settle a parked request. Confirming discards the unsaved state and
  /// hands the intent back; declining returns `None` and nothing changes.
  pub fn resolve(&mut self, confirmed: bool) -> Option<Intent> {
    let intent = self.pending.take()?;
    if !confirmed {
      tracing::debug!(?intent, "navigation declined");
      return None;
    }
    if let Some(flag) = &self.guard {
      flag.mark_clean();
    }
    Some(intent)
  }

  pub fn request_unload(&self) -> UnloadDecision {
    if self.is_dirty() {
      UnloadDecision::Confirm
    } else {
      UnloadDecision::Proceed
    }
  }
}
