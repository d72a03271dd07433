//! Core types, collaborator traits and page controllers for the Kaisan
//! agent console.
//!
//! This crate has no HTTP or terminal dependencies. The
//! remote backend lives behind the [`auth::AuthService`],
//! [`store::RecordStore`] and [`notify::WebhookNotifier`] traits; the
//! `kaisan-supabase` crate implements them over HTTP and [`memory`] provides
//! an in-process implementation.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod auth;
pub mod backend;
pub mod console;
pub mod entity;
pub mod error;
pub mod form;
pub mod gate;
pub mod guard;
pub mod lifetime;
pub mod memory;
pub mod navigation;
pub mod notify;
pub mod pages;
pub mod phone;
pub mod route;
pub mod session;
pub mod store;

pub use backend::{Backend, Services};
pub use error::{AuthError, StoreError, WebhookError};
pub use route::Route;
pub use session::{Session, User};

#[cfg(test)]
mod tests;
