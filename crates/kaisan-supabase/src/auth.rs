//! GoTrue-backed [`AuthService`].
//!
//! The session lives in a [`SessionPublisher`] owned by [`SupabaseAuth`].
//! Every change is mirrored to the optional session file so a restart picks
//! up where the last run left off.

use std::{io::ErrorKind, path::Path, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use kaisan_core::{
  AuthError, Session, User,
  auth::{AuthService, SignUpOutcome},
  session::{AuthEvent, SessionPublisher, SessionSubscription},
};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::{Value, json};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::{Error, Result, SupabaseConfig, error_message, http_client};

/// Refresh this many seconds before the access token expires.
const REFRESH_MARGIN_SECS: i64 = 60;

/// Back-off after a refresh that failed in transit.
const RETRY_DELAY: StdDuration = StdDuration::from_secs(10);

// ─── Wire types ──────────────────────────────────────────────────────────────

/// Body of a successful `/token` exchange (and of an auto-confirmed sign-up).
#[derive(Debug, Deserialize)]
struct TokenResponse {
  access_token:  String,
  refresh_token: String,
  #[serde(default)]
  expires_in:    Option<i64>,
  #[serde(default)]
  expires_at:    Option<i64>,
  user:          User,
}

impl TokenResponse {
  fn into_session(self) -> Session {
    Session {
      expires_at:    expiry(self.expires_at, self.expires_in),
      user:          self.user,
      access_token:  self.access_token,
      refresh_token: self.refresh_token,
    }
  }
}

/// Prefer the absolute expiry; fall back to the relative one.
fn expiry(expires_at: Option<i64>, expires_in: Option<i64>) -> Option<DateTime<Utc>> {
  expires_at
    .and_then(|secs| DateTime::from_timestamp(secs, 0))
    .or_else(|| expires_in.map(|secs| Utc::now() + Duration::seconds(secs)))
}

fn decode_error(e: reqwest::Error) -> AuthError {
  AuthError::Transport(format!("unexpected response: {e}"))
}

// ─── Client ──────────────────────────────────────────────────────────────────

/// Auth collaborator over the GoTrue REST API.
///
/// Cheap to clone; clones share the session.
#[derive(Clone)]
pub struct SupabaseAuth {
  inner: Arc<Inner>,
}

struct Inner {
  http:      Client,
  config:    SupabaseConfig,
  publisher: SessionPublisher,
}

impl SupabaseAuth {
  pub fn new(config: SupabaseConfig) -> Result<Self> { Self::with_client(http_client()?, config) }

  /// Build over an existing client, restoring the saved session if there is
  /// one.
  pub fn with_client(http: Client, config: SupabaseConfig) -> Result<Self> {
    let restored = match &config.session_file {
      Some(path) => load_session(path)?,
      None => None,
    };
    if let Some(session) = &restored {
      info!(user_id = %session.user.id, "restored saved session");
    }
    Ok(Self {
      inner: Arc::new(Inner {
        http,
        config,
        publisher: SessionPublisher::new(restored),
      }),
    })
  }

  fn request(&self, method: Method, path: &str) -> RequestBuilder {
    let url = self.inner.config.endpoint(&format!("/auth/v1{path}"));
    self
      .inner
      .http
      .request(method, url)
      .header("apikey", &self.inner.config.anon_key)
  }

  async fn send(&self, req: RequestBuilder) -> Result<Response, AuthError> {
    let resp = req
      .send()
      .await
      .map_err(|e| AuthError::Transport(e.to_string()))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    debug!(%status, "auth request rejected");
    Err(AuthError::Rejected(error_message(status, &body)))
  }

  async fn json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, AuthError> {
    self.send(req).await?.json().await.map_err(decode_error)
  }

  async fn publish(&self, event: AuthEvent, session: Option<Session>) {
    self.persist(session.as_ref()).await;
    self.inner.publisher.publish(event, session);
  }

  async fn persist(&self, session: Option<&Session>) {
    let Some(path) = &self.inner.config.session_file else {
      return;
    };
    let result = match session {
      Some(session) => match serde_json::to_vec_pretty(session) {
        Ok(bytes) => tokio::fs::write(path, bytes).await,
        Err(e) => Err(std::io::Error::other(e)),
      },
      None => match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
      },
    };
    if let Err(e) = result {
      warn!(path = %path.display(), error = %e, "failed to persist session");
    }
  }

  /// `POST /auth/v1/token?grant_type=refresh_token`
  #[instrument(skip_all)]
  async fn refresh(&self, refresh_token: &str) -> Result<Session, AuthError> {
    let req = self
      .request(Method::POST, "/token")
      .query(&[("grant_type", "refresh_token")])
      .json(&json!({ "refresh_token": refresh_token }));
    Ok(self.json::<TokenResponse>(req).await?.into_session())
  }

  /// Swap `session` for a fresh one. A rejected refresh token signs the user
  /// out and yields `None`.
  async fn refresh_session(&self, session: Session) -> Result<Option<Session>, AuthError> {
    match self.refresh(&session.refresh_token).await {
      Ok(fresh) => {
        debug!(user_id = %fresh.user.id, "access token refreshed");
        self.publish(AuthEvent::TokenRefreshed, Some(fresh.clone())).await;
        Ok(Some(fresh))
      }
      Err(AuthError::Rejected(message)) => {
        warn!(%message, "refresh token rejected, signing out");
        self.publish(AuthEvent::SignedOut, None).await;
        Ok(None)
      }
      Err(e) => Err(e),
    }
  }

  /// Keep the session fresh in the background until the runtime shuts down.
  pub fn spawn_refresh(&self) -> JoinHandle<()> {
    let auth = self.clone();
    tokio::spawn(async move {
      let mut changes = auth.subscribe();
      loop {
        let due = auth
          .inner
          .publisher
          .current()
          .and_then(|s| s.expires_at.map(|at| (s, at)));
        let Some((session, expires_at)) = due else {
          if changes.changed().await.is_none() {
            return;
          }
          continue;
        };
        let wait = (expires_at - Duration::seconds(REFRESH_MARGIN_SECS) - Utc::now())
          .to_std()
          .unwrap_or_default();
        tokio::select! {
          _ = tokio::time::sleep(wait) => {
            if let Err(e) = auth.refresh_session(session).await {
              warn!(error = %e, "token refresh failed, retrying");
              tokio::time::sleep(RETRY_DELAY).await;
            }
          }
          change = changes.changed() => {
            if change.is_none() {
              return;
            }
          }
        }
      }
    })
  }

  /// Exchange the tokens carried in a password-recovery link's fragment for
  /// a session, published as [`AuthEvent::PasswordRecovery`].
  #[instrument(skip_all)]
  pub async fn exchange_recovery_link(&self, link: &str) -> Result<Session> {
    let mut url = Url::parse(link).map_err(|e| Error::RecoveryLink(e.to_string()))?;
    let fragment = url.fragment().map(str::to_owned);
    url.set_query(fragment.as_deref());

    let mut access_token = None;
    let mut refresh_token = None;
    let mut expires_at = None;
    let mut expires_in = None;
    for (key, value) in url.query_pairs() {
      match key.as_ref() {
        "access_token" => access_token = Some(value.into_owned()),
        "refresh_token" => refresh_token = Some(value.into_owned()),
        "expires_at" => expires_at = value.parse().ok(),
        "expires_in" => expires_in = value.parse().ok(),
        "error_description" => return Err(Error::RecoveryLink(value.into_owned())),
        _ => {}
      }
    }
    let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
      return Err(Error::RecoveryLink("the link carries no session tokens".into()));
    };

    let user: User = self
      .json(self.request(Method::GET, "/user").bearer_auth(&access_token))
      .await?;
    let session = Session {
      user,
      access_token,
      refresh_token,
      expires_at: expiry(expires_at, expires_in),
    };
    info!(user_id = %session.user.id, "recovery session established");
    self
      .publish(AuthEvent::PasswordRecovery, Some(session.clone()))
      .await;
    Ok(session)
  }
}

fn load_session(path: &Path) -> Result<Option<Session>> {
  let text = match std::fs::read_to_string(path) {
    Ok(text) => text,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(source) => {
      return Err(Error::SessionFile {
        path: path.to_path_buf(),
        source,
      });
    }
  };
  match serde_json::from_str(&text) {
    Ok(session) => Ok(Some(session)),
    Err(e) => {
      warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
      Ok(None)
    }
  }
}

// ─── AuthService ─────────────────────────────────────────────────────────────

impl AuthService for SupabaseAuth {
  async fn get_session(&self) -> Result<Option<Session>, AuthError> {
    let Some(session) = self.inner.publisher.current() else {
      return Ok(None);
    };
    if session.expires_within(Duration::seconds(REFRESH_MARGIN_SECS), Utc::now()) {
      return self.refresh_session(session).await;
    }
    Ok(Some(session))
  }

  fn subscribe(&self) -> SessionSubscription { self.inner.publisher.subscribe() }

  /// `POST /auth/v1/token?grant_type=password`
  #[instrument(skip(self, password))]
  async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, AuthError> {
    let req = self
      .request(Method::POST, "/token")
      .query(&[("grant_type", "password")])
      .json(&json!({ "email": email, "password": password }));
    let session = self.json::<TokenResponse>(req).await?.into_session();
    info!(user_id = %session.user.id, "signed in");
    self.publish(AuthEvent::SignedIn, Some(session.clone())).await;
    Ok(session)
  }

  /// `POST /auth/v1/signup`
  #[instrument(skip(self, password))]
  async fn sign_up(&self, email: &str, password: &str) -> Result<SignUpOutcome, AuthError> {
    let req = self
      .request(Method::POST, "/signup")
      .json(&json!({ "email": email, "password": password }));
    let body: Value = self.json(req).await?;
    if body.get("access_token").is_none() {
      info!("sign-up awaiting email confirmation");
      return Ok(SignUpOutcome::ConfirmationRequired);
    }
    let session = serde_json::from_value::<TokenResponse>(body)
      .map_err(|e| AuthError::Transport(format!("unexpected response: {e}")))?
      .into_session();
    self.publish(AuthEvent::SignedIn, Some(session.clone())).await;
    Ok(SignUpOutcome::SignedIn(session))
  }

  /// `POST /auth/v1/recover?redirect_to=<site>/reset-password`
  #[instrument(skip(self))]
  async fn reset_password_for_email(&self, email: &str) -> Result<(), AuthError> {
    let redirect = format!(
      "{}/reset-password",
      self.inner.config.site_url.trim_end_matches('/')
    );
    let req = self
      .request(Method::POST, "/recover")
      .query(&[("redirect_to", redirect.as_str())])
      .json(&json!({ "email": email }));
    self.send(req).await?;
    Ok(())
  }

  /// `PUT /auth/v1/user`
  #[instrument(skip_all)]
  async fn update_user_password(&self, password: &str) -> Result<User, AuthError> {
    let session = self.get_session().await?.ok_or(AuthError::SessionMissing)?;
    let req = self
      .request(Method::PUT, "/user")
      .bearer_auth(&session.access_token)
      .json(&json!({ "password": password }));
    let user: User = self.json(req).await?;
    info!(user_id = %user.id, "password updated");
    let session = Session {
      user: user.clone(),
      ..session
    };
    self.publish(AuthEvent::UserUpdated, Some(session)).await;
    Ok(user)
  }

  /// `POST /auth/v1/logout`. The local session is dropped even when the
  /// remote call fails.
  #[instrument(skip(self))]
  async fn sign_out(&self) -> Result<(), AuthError> {
    let Some(session) = self.inner.publisher.current() else {
      return Ok(());
    };
    let result = self
      .send(
        self
          .request(Method::POST, "/logout")
          .bearer_auth(&session.access_token),
      )
      .await
      .map(|_| ());
    self.publish(AuthEvent::SignedOut, None).await;
    result
  }
}
