//! Page lifetimes.
//!
//! Every remote call is tagged with the [`MountToken`] of the page that
//! issued it. Unmounting bumps the generation, so results that arrive for a
//! page that is gone can be recognised and dropped.

use std::sync::{
  Arc,
  atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Clone, Default)]
pub struct MountScope(Arc<AtomicU64>);

/// Identifies one mount of one page.
#[derive(Debug, Clone)]
pub struct MountToken {
  scope:      MountScope,
  generation: u64,
}

impl MountScope {
  pub fn new() -> Self { Self::default() }

  /// A token for the page currently mounted.
  pub fn token(&self) -> MountToken {
    MountToken {
      scope:      self.clone(),
      generation: self.0.load(Ordering::SeqCst),
    }
  }

  /// End the current mount. Every token issued so far goes stale.
  pub fn invalidate(&self) { self.0.fetch_add(1, Ordering::SeqCst); }
}

impl MountToken {
  pub fn is_current(&self) -> bool { self.scope.0.load(Ordering::SeqCst) == self.generation }
}
