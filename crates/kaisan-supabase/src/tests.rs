//! Round trips against a throwaway axum server standing in for Supabase.

use std::{
  collections::HashMap,
  path::PathBuf,
  sync::{Arc, Mutex},
};

use axum::{
  Json, Router,
  extract::{Path, RawQuery, State},
  http::{HeaderMap, StatusCode},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use chrono::{Duration, Utc};
use kaisan_core::{
  AuthError, Session, StoreError, User, WebhookError,
  auth::{AuthService, SignUpOutcome},
  notify::{Webhook, WebhookNotifier},
  session::AuthEvent,
  store::{Filter, KNOWLEDGE_BASE, PROFILES, Query, RecordStore},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{Error, HttpNotifier, SupabaseAuth, SupabaseConfig, SupabaseStore, WebhookUrls};

const ANON_KEY: &str = "anon-key";
const EMAIL: &str = "ana@kaisan.dev";
const PASSWORD: &str = "segredo1";
const USER_ID: &str = "7d1e3c2a-3f7b-4b8e-9a51-0c6f2d9e8b14";

// ─── Fake server ─────────────────────────────────────────────────────────────

#[derive(Clone, Default)]
struct Fake {
  log:    Arc<Mutex<Vec<String>>>,
  tables: Arc<Mutex<HashMap<String, Vec<Value>>>>,
  hooks:  Arc<Mutex<Vec<Value>>>,
}

impl Fake {
  fn record(&self, line: String) { self.log.lock().unwrap().push(line); }

  fn logged(&self, needle: &str) -> bool { self.log.lock().unwrap().iter().any(|l| l.contains(needle)) }

  fn seed(&self, table: &str, rows: Vec<Value>) {
    self.tables.lock().unwrap().insert(table.to_string(), rows);
  }

  fn rows(&self, table: &str) -> Vec<Value> {
    self.tables.lock().unwrap().get(table).cloned().unwrap_or_default()
  }
}

fn user_body() -> Value { json!({ "id": USER_ID, "email": EMAIL, "aud": "authenticated" }) }

fn token_body(access: &str, refresh: &str) -> Value {
  json!({
    "access_token": access,
    "token_type": "bearer",
    "expires_in": 3600,
    "expires_at": Utc::now().timestamp() + 3600,
    "refresh_token": refresh,
    "user": user_body(),
  })
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
  headers
    .get("authorization")?
    .to_str()
    .ok()?
    .strip_prefix("Bearer ")
}

fn unauthorized() -> Response {
  (StatusCode::UNAUTHORIZED, Json(json!({ "code": 401, "msg": "invalid JWT" }))).into_response()
}

async fn token(
  State(fake): State<Fake>,
  RawQuery(query): RawQuery,
  Json(body): Json<Value>,
) -> Response {
  let query = query.unwrap_or_default();
  fake.record(format!("POST token?{query}"));
  if query.contains("grant_type=refresh_token") {
    if body["refresh_token"] == "refresh-1" {
      return Json(token_body("access-2", "refresh-2")).into_response();
    }
    let error = json!({ "error": "invalid_grant", "error_description": "Invalid Refresh Token" });
    return (StatusCode::BAD_REQUEST, Json(error)).into_response();
  }
  if body["email"] == EMAIL && body["password"] == PASSWORD {
    Json(token_body("access-1", "refresh-1")).into_response()
  } else {
    let error = json!({ "code": 400, "error_code": "invalid_credentials", "msg": "Invalid login credentials" });
    (StatusCode::BAD_REQUEST, Json(error)).into_response()
  }
}

async fn signup(State(fake): State<Fake>, Json(body): Json<Value>) -> Json<Value> {
  fake.record(format!("POST signup {}", body["email"]));
  Json(json!({ "id": Uuid::new_v4(), "email": body["email"], "confirmation_sent_at": Utc::now() }))
}

async fn recover(State(fake): State<Fake>, RawQuery(query): RawQuery) -> Json<Value> {
  fake.record(format!("POST recover?{}", query.unwrap_or_default()));
  Json(json!({}))
}

async fn get_user(headers: HeaderMap) -> Response {
  match bearer(&headers) {
    Some(_) => Json(user_body()).into_response(),
    None => unauthorized(),
  }
}

async fn put_user(State(fake): State<Fake>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
  let Some(token) = bearer(&headers) else {
    return unauthorized();
  };
  fake.record(format!("PUT user {token} {}", body["password"]));
  Json(user_body()).into_response()
}

async fn logout(State(fake): State<Fake>) -> StatusCode {
  fake.record("POST logout".into());
  StatusCode::NO_CONTENT
}

async fn rest_root(headers: HeaderMap) -> StatusCode {
  if headers.get("apikey").is_some_and(|v| v == ANON_KEY) {
    StatusCode::OK
  } else {
    StatusCode::UNAUTHORIZED
  }
}

async fn rest_get(
  State(fake): State<Fake>,
  Path(table): Path<String>,
  headers: HeaderMap,
  RawQuery(query): RawQuery,
) -> Response {
  let apikey = headers.get("apikey").and_then(|v| v.to_str().ok()).unwrap_or("");
  fake.record(format!(
    "GET {table}?{} apikey={apikey} bearer={}",
    query.unwrap_or_default(),
    bearer(&headers).unwrap_or("-"),
  ));
  let rows = fake.rows(&table);
  let single = headers
    .get("accept")
    .is_some_and(|v| v == "application/vnd.pgrst.object+json");
  if !single {
    return Json(rows).into_response();
  }
  match rows.as_slice() {
    [row] => Json(row.clone()).into_response(),
    rows => {
      let error = json!({
        "code": "PGRST116",
        "message": "JSON object requested, multiple (or no) rows returned",
        "details": format!("The result contains {} rows", rows.len()),
        "hint": null,
      });
      (StatusCode::NOT_ACCEPTABLE, Json(error)).into_response()
    }
  }
}

/// Rows whose `id` appears as an `id=eq.<id>` filter.
fn targeted(fake: &Fake, table: &str, query: &str) -> Vec<Value> {
  fake
    .rows(table)
    .into_iter()
    .filter(|row| {
      row["id"]
        .as_str()
        .is_some_and(|id| query.contains(&format!("id=eq.{id}")))
    })
    .collect()
}

async fn rest_patch(
  State(fake): State<Fake>,
  Path(table): Path<String>,
  headers: HeaderMap,
  RawQuery(query): RawQuery,
  Json(patch): Json<Value>,
) -> Json<Vec<Value>> {
  let query = query.unwrap_or_default();
  let prefer = headers.get("prefer").and_then(|v| v.to_str().ok()).unwrap_or("");
  fake.record(format!("PATCH {table}?{query} prefer={prefer} {patch}"));
  Json(targeted(&fake, &table, &query))
}

async fn rest_delete(
  State(fake): State<Fake>,
  Path(table): Path<String>,
  RawQuery(query): RawQuery,
) -> Json<Vec<Value>> {
  let query = query.unwrap_or_default();
  fake.record(format!("DELETE {table}?{query}"));
  Json(targeted(&fake, &table, &query))
}

async fn rest_post(
  State(fake): State<Fake>,
  Path(table): Path<String>,
  Json(row): Json<Value>,
) -> StatusCode {
  fake.record(format!("POST {table} {row}"));
  StatusCode::CREATED
}

async fn hook(State(fake): State<Fake>, Json(body): Json<Value>) -> StatusCode {
  fake.hooks.lock().unwrap().push(body);
  StatusCode::OK
}

async fn serve(fake: Fake) -> String {
  let app = Router::new()
    .route("/auth/v1/token", post(token))
    .route("/auth/v1/signup", post(signup))
    .route("/auth/v1/recover", post(recover))
    .route("/auth/v1/user", get(get_user).put(put_user))
    .route("/auth/v1/logout", post(logout))
    .route("/rest/v1/", get(rest_root))
    .route(
      "/rest/v1/{table}",
      get(rest_get)
        .patch(rest_patch)
        .delete(rest_delete)
        .post(rest_post),
    )
    .route("/hooks/ok", post(hook))
    .route("/hooks/broken", post(|| async { StatusCode::INTERNAL_SERVER_ERROR }))
    .with_state(fake);
  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  format!("http://{addr}")
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn config(url: &str, session_file: Option<PathBuf>) -> SupabaseConfig {
  SupabaseConfig {
    url: url.to_string(),
    anon_key: ANON_KEY.into(),
    site_url: "http://localhost:3000/".into(),
    session_file,
  }
}

fn scratch_file() -> PathBuf {
  std::env::temp_dir().join(format!("kaisan-session-{}.json", Uuid::new_v4()))
}

fn session(refresh_token: &str, expires_in: Duration) -> Session {
  Session {
    user:          User {
      id:    USER_ID.parse().unwrap(),
      email: Some(EMAIL.into()),
    },
    access_token:  "access-1".into(),
    refresh_token: refresh_token.into(),
    expires_at:    Some(Utc::now() + expires_in),
  }
}

fn write_session(path: &PathBuf, session: &Session) {
  std::fs::write(path, serde_json::to_vec(session).unwrap()).unwrap();
}

// ─── Auth ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn sign_in_publishes_and_persists() {
  let url = serve(Fake::default()).await;
  let path = scratch_file();
  let auth = SupabaseAuth::new(config(&url, Some(path.clone()))).unwrap();
  let mut changes = auth.subscribe();

  let session = auth.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  assert_eq!(session.access_token, "access-1");
  assert_eq!(session.user.email.as_deref(), Some(EMAIL));
  assert_eq!(changes.try_next().map(|c| c.event), Some(AuthEvent::SignedIn));

  let restored = SupabaseAuth::new(config(&url, Some(path.clone()))).unwrap();
  assert_eq!(restored.get_session().await.unwrap(), Some(session));
  std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn rejected_sign_in_carries_the_service_message() {
  let url = serve(Fake::default()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  let err = auth.sign_in_with_password(EMAIL, "errada").await.unwrap_err();
  assert_eq!(err, AuthError::Rejected("Invalid login credentials".into()));
  assert!(auth.get_session().await.unwrap().is_none());
}

#[tokio::test]
async fn unconfirmed_sign_up_needs_email_confirmation() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  let outcome = auth.sign_up("novo@kaisan.dev", PASSWORD).await.unwrap();
  assert_eq!(outcome, SignUpOutcome::ConfirmationRequired);
  assert!(fake.logged("POST signup \"novo@kaisan.dev\""));
}

#[tokio::test]
async fn recovery_email_points_at_reset_page() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  auth.reset_password_for_email(EMAIL).await.unwrap();
  assert!(fake.logged("redirect_to=http%3A%2F%2Flocalhost%3A3000%2Freset-password"));
}

#[tokio::test]
async fn expiring_session_is_refreshed_on_read() {
  let url = serve(Fake::default()).await;
  let path = scratch_file();
  write_session(&path, &session("refresh-1", Duration::seconds(10)));
  let auth = SupabaseAuth::new(config(&url, Some(path.clone()))).unwrap();
  let mut changes = auth.subscribe();

  let fresh = auth.get_session().await.unwrap().expect("refreshed session");
  assert_eq!(fresh.access_token, "access-2");
  assert_eq!(changes.try_next().map(|c| c.event), Some(AuthEvent::TokenRefreshed));

  let saved: Session = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
  assert_eq!(saved.refresh_token, "refresh-2");
  std::fs::remove_file(path).unwrap();
}

#[tokio::test]
async fn rejected_refresh_signs_out() {
  let url = serve(Fake::default()).await;
  let path = scratch_file();
  write_session(&path, &session("stale", Duration::seconds(-5)));
  let auth = SupabaseAuth::new(config(&url, Some(path.clone()))).unwrap();
  let mut changes = auth.subscribe();

  assert!(auth.get_session().await.unwrap().is_none());
  assert_eq!(changes.try_next().map(|c| c.event), Some(AuthEvent::SignedOut));
  assert!(!path.exists());
}

#[tokio::test]
async fn recovery_link_opens_a_recovery_session() {
  let url = serve(Fake::default()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  let mut changes = auth.subscribe();

  let link = "http://localhost:3000/reset-password#access_token=access-recovery\
              &expires_in=3600&refresh_token=refresh-r&token_type=bearer&type=recovery";
  let session = auth.exchange_recovery_link(link).await.unwrap();
  assert_eq!(session.access_token, "access-recovery");
  assert_eq!(session.user.id.to_string(), USER_ID);
  assert_eq!(changes.try_next().map(|c| c.event), Some(AuthEvent::PasswordRecovery));
}

#[tokio::test]
async fn expired_recovery_link_reports_the_reason() {
  let url = serve(Fake::default()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  let link = "http://localhost:3000/#error=access_denied&error_code=otp_expired\
              &error_description=Email+link+is+invalid+or+has+expired";
  let err = auth.exchange_recovery_link(link).await.unwrap_err();
  assert!(matches!(err, Error::RecoveryLink(m) if m == "Email link is invalid or has expired"));
}

#[tokio::test]
async fn password_update_needs_a_session() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  assert_eq!(
    auth.update_user_password("novasenha").await.unwrap_err(),
    AuthError::SessionMissing
  );

  auth.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  let mut changes = auth.subscribe();
  let user = auth.update_user_password("novasenha").await.unwrap();
  assert_eq!(user.email.as_deref(), Some(EMAIL));
  assert!(fake.logged("PUT user access-1 \"novasenha\""));
  assert_eq!(changes.try_next().map(|c| c.event), Some(AuthEvent::UserUpdated));
}

#[tokio::test]
async fn sign_out_clears_the_session() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let auth = SupabaseAuth::new(config(&url, None)).unwrap();
  auth.sign_in_with_password(EMAIL, PASSWORD).await.unwrap();
  auth.sign_out().await.unwrap();
  assert!(fake.logged("POST logout"));
  assert!(auth.get_session().await.unwrap().is_none());
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn select_sends_filters_order_and_credentials() {
  let fake = Fake::default();
  fake.seed(KNOWLEDGE_BASE, vec![json!({ "id": "k-2" }), json!({ "id": "k-1" })]);
  let url = serve(fake.clone()).await;
  let store = SupabaseStore::new(config(&url, None)).unwrap();

  let query = Query::from(KNOWLEDGE_BASE).order("created_at", false);
  let rows = store.select(&session("refresh-1", Duration::hours(1)), &query).await.unwrap();
  assert_eq!(rows.len(), 2);
  assert!(fake.logged("GET kaisan_kbase?select=*&order=created_at.desc apikey=anon-key bearer=access-1"));
}

#[tokio::test]
async fn single_row_reads_map_zero_rows_to_not_found() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let store = SupabaseStore::new(config(&url, None)).unwrap();
  let session = session("refresh-1", Duration::hours(1));

  let query = Query::from(PROFILES).eq("id", USER_ID);
  let err = store.select_single(&session, &query).await.unwrap_err();
  assert_eq!(err, StoreError::NotFound);
  assert!(fake.logged(&format!("id=eq.{USER_ID}")));

  fake.seed(PROFILES, vec![json!({ "id": "a" }), json!({ "id": "b" })]);
  let err = store.select_single(&session, &query).await.unwrap_err();
  assert!(matches!(err, StoreError::Rejected { code: Some(ref c), .. } if c == "PGRST116"));
  assert!(err.is_not_singular());

  fake.seed(PROFILES, vec![json!({ "id": USER_ID, "full_name": "Ana" })]);
  let row = store.select_single(&session, &query).await.unwrap();
  assert_eq!(row["full_name"], "Ana");
}

#[tokio::test]
async fn writes_that_match_nothing_are_not_found() {
  let fake = Fake::default();
  fake.seed(KNOWLEDGE_BASE, vec![json!({ "id": "k-1" })]);
  let url = serve(fake.clone()).await;
  let store = SupabaseStore::new(config(&url, None)).unwrap();
  let session = session("refresh-1", Duration::hours(1));

  let patch = json!({ "answer": "Sim." });
  store
    .update(&session, KNOWLEDGE_BASE, patch.clone(), &Filter::eq("id", "k-1"))
    .await
    .unwrap();
  assert!(fake.logged("prefer=return=representation"));
  assert_eq!(
    store
      .update(&session, KNOWLEDGE_BASE, patch, &Filter::eq("id", "k-9"))
      .await
      .unwrap_err(),
    StoreError::NotFound
  );
  assert_eq!(
    store
      .delete(&session, KNOWLEDGE_BASE, &Filter::eq("id", "k-9"))
      .await
      .unwrap_err(),
    StoreError::NotFound
  );
  store
    .delete(&session, KNOWLEDGE_BASE, &Filter::eq("id", "k-1"))
    .await
    .unwrap();
}

#[tokio::test]
async fn insert_posts_the_row() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let store = SupabaseStore::new(config(&url, None)).unwrap();
  store
    .insert(
      &session("refresh-1", Duration::hours(1)),
      PROFILES,
      json!({ "id": USER_ID }),
    )
    .await
    .unwrap();
  assert!(fake.logged(&format!("POST profiles {{\"id\":\"{USER_ID}\"}}")));
}

#[tokio::test]
async fn connection_probe_uses_the_anon_key() {
  let url = serve(Fake::default()).await;
  let store = SupabaseStore::new(config(&url, None)).unwrap();
  store.check_connection().await.unwrap();

  let wrong = SupabaseStore::new(SupabaseConfig {
    anon_key: "wrong".into(),
    ..config(&url, None)
  })
  .unwrap();
  assert!(wrong.check_connection().await.is_err());
}

// ─── Webhooks ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn webhook_posts_json_and_reports_status() {
  let fake = Fake::default();
  let url = serve(fake.clone()).await;
  let notifier = HttpNotifier::new(WebhookUrls {
    knowledge_base: Some(format!("{url}/hooks/ok")),
    clean_memory:   Some(format!("{url}/hooks/broken")),
  })
  .unwrap();

  let body = json!({ "phone": "5521982280802" });
  notifier.post(Webhook::KnowledgeBase, &body).await.unwrap();
  assert_eq!(*fake.hooks.lock().unwrap(), vec![body.clone()]);
  assert_eq!(
    notifier.post(Webhook::CleanMemory, &body).await.unwrap_err(),
    WebhookError::Status(500)
  );
}

#[tokio::test]
async fn unconfigured_webhook_is_an_error() {
  let notifier = HttpNotifier::new(WebhookUrls {
    knowledge_base: Some(String::new()),
    clean_memory:   None,
  })
  .unwrap();
  let body = json!({});
  assert_eq!(
    notifier.post(Webhook::KnowledgeBase, &body).await.unwrap_err(),
    WebhookError::NotConfigured(Webhook::KnowledgeBase)
  );
  assert_eq!(
    notifier.post(Webhook::CleanMemory, &body).await.unwrap_err(),
    WebhookError::NotConfigured(Webhook::CleanMemory)
  );
}
