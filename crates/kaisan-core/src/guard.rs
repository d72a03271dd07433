//! Unsaved-change tracking.
//!
//! A page owns a [`DirtyFlag`] for its whole lifetime and hands clones of it
//! to whoever needs to consult it at event time (the navigator, the exit
//! prompt). Clones share one cell, so nothing has to re-subscribe when the
//! value flips.

use std::sync::{
  Arc,
  atomic::{AtomicBool, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirtyState {
  Clean,
  Dirty,
}

#[derive(Debug, Clone, Default)]
pub struct DirtyFlag(Arc<AtomicBool>);

impl DirtyFlag {
  pub fn new() -> Self { Self::default() }

  pub fn mark_dirty(&self) { self.0.store(true, Ordering::SeqCst); }

  pub fn mark_clean(&self) { self.0.store(false, Ordering::SeqCst); }

  pub fn is_dirty(&self) -> bool { self.0.load(Ordering::SeqCst) }

  pub fn state(&self) -> DirtyState {
    if self.is_dirty() {
      DirtyState::Dirty
    } else {
      DirtyState::Clean
    }
  }
}
