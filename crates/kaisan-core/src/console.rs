//! The console: one mounted page at a time, gated on the session.
//!
//! [`Console`] owns the navigator, the session gate and the mounted page. It
//! never performs remote calls for a page itself. Instead every page action
//! turns into [`Effect`]s, and the driver (the terminal loop, or
//! [`Console::run_to_idle`] in tests) runs each [`Task`] wherever it likes
//! and hands the [`Completion`] back through [`Console::complete`]. Results
//! that belong to a page that has since been unmounted are dropped there.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use tracing::{debug, error, info, warn};

use crate::{
  auth::AuthService,
  backend::Backend,
  gate::{Access, SessionGate},
  lifetime::{MountScope, MountToken},
  navigation::{Intent, Navigator, Request, UnloadDecision},
  pages::{self, Command, Next, NotifyMode, Outcome, Page},
  route::Route,
  session::Session,
};

/// Redirect chains longer than this are cut short.
const MAX_REDIRECTS: usize = 4;

// ─── Effects ─────────────────────────────────────────────────────────────────

/// Remote work issued by the mounted page.
#[derive(Debug, Clone)]
pub struct Task {
  token:   MountToken,
  session: Option<Session>,
  command: Command,
}

impl Task {
  pub fn command(&self) -> &Command { &self.command }

  pub async fn run<B: Backend>(self, backend: &B) -> Completion {
    let outcome = pages::execute(backend, self.session.as_ref(), self.command).await;
    Completion {
      token: self.token,
      outcome,
    }
  }
}

/// A finished [`Task`], tagged with the mount that issued it.
#[derive(Debug, Clone)]
pub struct Completion {
  token:   MountToken,
  outcome: Outcome,
}

impl Completion {
  pub fn outcome(&self) -> &Outcome { &self.outcome }
}

#[derive(Debug, Clone)]
pub enum Effect {
  Spawn(Task),
  Navigate(Route),
  /// Navigate once `delay` has passed, unless the issuing page is gone.
  NavigateAfter {
    route: Route,
    delay: Duration,
    token: MountToken,
  },
}

/// Result of a guarded navigation request.
#[derive(Debug)]
pub enum Navigation {
  Opened(Vec<Effect>),
  /// Unsaved changes; waiting for [`Console::resolve_navigation`].
  Blocked,
  /// The user declined to discard unsaved changes.
  Aborted,
}

// ─── Console ─────────────────────────────────────────────────────────────────

pub struct Console<B: Backend> {
  backend:        Arc<B>,
  navigator:      Navigator,
  scope:          MountScope,
  gate:           Option<SessionGate>,
  page:           Page,
  knowledge_mode: NotifyMode,
}

impl<B: Backend> Console<B> {
  /// Mount `route`, following any redirect the session calls for.
  pub async fn start(
    backend: Arc<B>,
    route: Route,
    knowledge_mode: NotifyMode,
  ) -> (Self, Vec<Effect>) {
    let mut console = Self {
      backend,
      navigator: Navigator::new(Route::Home),
      scope: MountScope::new(),
      gate: None,
      page: Page::mount(Route::Home, None, knowledge_mode),
      knowledge_mode,
    };
    let effects = console.open(route).await;
    (console, effects)
  }

  pub fn backend(&self) -> &Arc<B> { &self.backend }

  pub fn route(&self) -> Route { self.navigator.current() }

  pub fn page(&self) -> &Page { &self.page }

  pub fn page_mut(&mut self) -> &mut Page { &mut self.page }

  pub fn session(&self) -> Option<&Session> { self.gate.as_ref().and_then(SessionGate::session) }

  /// The navigation parked behind the unsaved-change prompt, if any.
  pub fn pending_intent(&self) -> Option<Intent> { self.navigator.pending() }

  /// Unmount the current page and mount `route`, bypassing the unsaved-change
  /// guard.
  pub async fn open(&mut self, route: Route) -> Vec<Effect> {
    let mut target = route;
    for _ in 0..MAX_REDIRECTS {
      self.unmount();
      let (gate, access) = SessionGate::mount(self.backend.auth(), target).await;
      match access {
        Access::Redirect(next) => {
          info!(from = %target, to = %next, "redirecting");
          gate.unmount();
          target = next;
        }
        Access::Granted(_) | Access::Anonymous => {
          self.gate = Some(gate);
          return self.mount(target);
        }
      }
    }
    warn!(route = %target, "redirect limit reached, mounting without a session check");
    self.mount(target)
  }

  fn unmount(&mut self) {
    self.scope.invalidate();
    self.navigator.detach();
    if let Some(gate) = self.gate.take() {
      gate.unmount();
    }
  }

  fn mount(&mut self, route: Route) -> Vec<Effect> {
    info!(%route, "mounting page");
    self.page = Page::mount(route, self.session(), self.knowledge_mode);
    self.navigator.arrive(route);
    if let Some(flag) = self.page.dirty_flag() {
      self.navigator.attach(flag);
    }
    let next = self.page.initial_command();
    self.dispatch(next)
  }

  /// Navigate to `route` through the unsaved-change guard.
  pub async fn navigate(&mut self, route: Route) -> Navigation {
    self.request(Intent::Open(route)).await
  }

  /// Sign out through the unsaved-change guard, then open the login page.
  pub async fn sign_out(&mut self) -> Navigation { self.request(Intent::SignOut).await }

  async fn request(&mut self, intent: Intent) -> Navigation {
    match self.navigator.request(intent) {
      Request::Proceed(intent) => Navigation::Opened(self.perform(intent).await),
      Request::NeedsConfirmation => Navigation::Blocked,
    }
  }

  /// Answer the unsaved-change prompt for the parked navigation.
  pub async fn resolve_navigation(&mut self, confirmed: bool) -> Navigation {
    match self.navigator.resolve(confirmed) {
      Some(intent) => Navigation::Opened(self.perform(intent).await),
      None => Navigation::Aborted,
    }
  }

  async fn perform(&mut self, intent: Intent) -> Vec<Effect> {
    match intent {
      Intent::Open(route) => self.open(route).await,
      Intent::SignOut => {
        if let Err(e) = self.backend.auth().sign_out().await {
          error!(error = %e, "sign-out failed");
        }
        self.open(Route::Home).await
      }
    }
  }

  /// Whether leaving the console outright needs confirmation.
  pub fn request_exit(&self) -> UnloadDecision { self.navigator.request_unload() }

  /// Apply pending session changes. A change that revokes access to the
  /// current route redirects immediately, unsaved changes or not.
  pub async fn poll_session(&mut self) -> Vec<Effect> {
    let Some(gate) = self.gate.as_mut() else {
      return Vec::new();
    };
    let changes: Vec<_> = std::iter::from_fn(|| gate.poll()).collect();

    let mut effects = Vec::new();
    for (event, access) in changes {
      match access {
        Access::Redirect(route) => {
          info!(%event, to = %route, "session change forces navigation");
          return self.open(route).await;
        }
        Access::Granted(session) => {
          let next = self.page.on_session_change(event, Some(&session));
          effects.extend(self.dispatch(next));
        }
        Access::Anonymous => {
          let next = self.page.on_session_change(event, None);
          effects.extend(self.dispatch(next));
        }
      }
    }
    effects
  }

  /// Turn a page's [`Next`] into effects bound to the current mount.
  pub fn dispatch(&mut self, next: Next<Command>) -> Vec<Effect> {
    match next {
      Next::Idle => Vec::new(),
      Next::Run(command) => vec![Effect::Spawn(Task {
        token: self.scope.token(),
        session: self.session().cloned(),
        command,
      })],
      Next::Navigate(route) => vec![Effect::Navigate(route)],
      Next::NavigateAfter(route, delay) => vec![Effect::NavigateAfter {
        route,
        delay,
        token: self.scope.token(),
      }],
    }
  }

  /// Feed a finished task back to the page that issued it.
  pub fn complete(&mut self, completion: Completion) -> Vec<Effect> {
    if !completion.token.is_current() {
      debug!(outcome = ?completion.outcome, "discarding result for an unmounted page");
      return Vec::new();
    }
    let next = self.page.apply(completion.outcome);
    self.dispatch(next)
  }

  /// Drive `effects` to completion inline: tasks are awaited one at a time
  /// and delayed navigations fire without waiting. Blocked navigations stay
  /// parked.
  pub async fn run_to_idle(&mut self, effects: Vec<Effect>) {
    let backend = Arc::clone(&self.backend);
    let mut queue = VecDeque::from(effects);
    while let Some(effect) = queue.pop_front() {
      match effect {
        Effect::Spawn(task) => {
          let completion = task.run(backend.as_ref()).await;
          queue.extend(self.complete(completion));
        }
        Effect::Navigate(route) => {
          if let Navigation::Opened(more) = self.navigate(route).await {
            queue.extend(more);
          }
        }
        Effect::NavigateAfter { route, token, .. } => {
          if token.is_current()
            && let Navigation::Opened(more) = self.navigate(route).await
          {
            queue.extend(more);
          }
        }
      }
    }
  }
}
