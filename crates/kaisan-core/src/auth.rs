//! The `AuthService` trait.
//!
//! Implemented by `kaisan-supabase` over HTTP and by [`crate::memory`] for
//! tests and offline use. The implementation owns the session publisher; every
//! successful sign-in, sign-out or password change is published on it.

use std::future::Future;

use crate::{
  error::AuthError,
  session::{Session, SessionSubscription, User},
};

/// Result of a sign-up request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
  /// The account was confirmed immediately and a session issued.
  SignedIn(Session),
  /// The service sent a confirmation email; no session yet.
  ConfirmationRequired,
}

pub trait AuthService: Send + Sync {
  /// The current session, refreshing it first if it is about to expire.
  fn get_session(
    &self,
  ) -> impl Future<Output = Result<Option<Session>, AuthError>> + Send + '_;

  fn subscribe(&self) -> SessionSubscription;

  fn sign_in_with_password<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<Session, AuthError>> + Send + 'a;

  fn sign_up<'a>(
    &'a self,
    email: &'a str,
    password: &'a str,
  ) -> impl Future<Output = Result<SignUpOutcome, AuthError>> + Send + 'a;

  /// Send a recovery email whose link leads back to `/reset-password`.
  fn reset_password_for_email<'a>(
    &'a self,
    email: &'a str,
  ) -> impl Future<Output = Result<(), AuthError>> + Send + 'a;

  /// Change the password of the signed-in user. Fails with
  /// [`AuthError::SessionMissing`] when nobody is signed in.
  fn update_user_password<'a>(
    &'a self,
    password: &'a str,
  ) -> impl Future<Output = Result<User, AuthError>> + Send + 'a;

  fn sign_out(&self) -> impl Future<Output = Result<(), AuthError>> + Send + '_;
}
