//! Setup errors for the Supabase collaborators.
//!
//! Request failures are reported through the `kaisan-core` error enums; this
//! type only covers building the clients and restoring state.

use std::path::PathBuf;

use kaisan_core::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("failed to build HTTP client: {0}")]
  Client(#[source] reqwest::Error),

  #[error("session file {}: {source}", path.display())]
  SessionFile {
    path:   PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("malformed recovery link: {0}")]
  RecoveryLink(String),

  #[error(transparent)]
  Auth(#[from] AuthError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
