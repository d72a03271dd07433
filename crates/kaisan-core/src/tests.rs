//! Console scenarios against the in-memory backend.

use std::sync::Arc;

use serde_json::json;

use crate::{
  console::{Console, Effect, Navigation},
  error::StoreError,
  form::Form,
  memory::{self, MemoryBackend},
  navigation::UnloadDecision,
  notify::Webhook,
  pages::{
    self, Command, NOT_AUTHENTICATED, NotifyMode, Outcome, Page, knowledge, profile,
    prompt, reset_memory, whatsapp,
  },
  route::Route,
  store::{KNOWLEDGE_BASE, PROFILES, RecordStore, SYSTEM_PROMPT},
};

const EMAIL: &str = "ana@kaisan.dev";
const PASSWORD: &str = "segredo1";

fn backend() -> Arc<MemoryBackend> {
  let backend = memory::backend();
  backend.auth.add_user(EMAIL, PASSWORD);
  Arc::new(backend)
}

fn signed_in() -> Arc<MemoryBackend> {
  let backend = backend();
  backend.auth.force_sign_in(EMAIL).expect("known user");
  backend
}

async fn console_at(
  backend: &Arc<MemoryBackend>,
  route: Route,
  mode: NotifyMode,
) -> Console<MemoryBackend> {
  let (mut console, effects) = Console::start(Arc::clone(backend), route, mode).await;
  console.run_to_idle(effects).await;
  console
}

fn flash_text(console: &Console<MemoryBackend>) -> Option<&str> {
  console.page().flash().map(|f| f.text.as_str())
}

fn knowledge_page(console: &mut Console<MemoryBackend>) -> &mut pages::KnowledgePage {
  match console.page_mut() {
    Page::Knowledge(p) => p,
    other => panic!("expected knowledge page, got {:?}", other.route()),
  }
}

async fn add_entry(console: &mut Console<MemoryBackend>, question: &str, answer: &str) {
  let page = knowledge_page(console);
  page.set_field(0, question.into());
  page.set_field(1, answer.into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;
}

// ─── Session gating ──────────────────────────────────────────────────────────

#[tokio::test]
async fn guarded_routes_redirect_home_without_fetching() {
  for route in Route::NAV {
    let backend = backend();
    let (console, effects) = Console::start(Arc::clone(&backend), route, NotifyMode::OnSubmit).await;
    assert_eq!(console.route(), Route::Home, "{route}");
    assert!(matches!(console.page(), Page::Login(_)));
    assert!(effects.is_empty());
    assert_eq!(backend.store.calls(), 0);
  }
}

#[tokio::test]
async fn unreadable_session_counts_as_signed_out() {
  let backend = signed_in();
  backend.auth.set_session_unreadable(true);
  let console = console_at(&backend, Route::Prompt, NotifyMode::OnSubmit).await;
  assert_eq!(console.route(), Route::Home);
  assert!(matches!(console.page(), Page::Login(_)));
  assert_eq!(backend.store.calls(), 0);
}

#[tokio::test]
async fn one_failed_session_read_bounces_through_login() {
  // `/` reads the session again and sends the user straight back.
  let backend = signed_in();
  backend
    .auth
    .fail_next_get_session(crate::AuthError::Transport("offline".into()));
  let console = console_at(&backend, Route::Prompt, NotifyMode::OnSubmit).await;
  assert_eq!(console.route(), Route::Prompt);
}

#[tokio::test]
async fn signed_in_home_visit_lands_on_prompt() {
  let backend = signed_in();
  let console = console_at(&backend, Route::Home, NotifyMode::OnSubmit).await;
  assert_eq!(console.route(), Route::Prompt);
}

#[tokio::test]
async fn signing_in_redirects_to_prompt() {
  let backend = backend();
  let mut console = console_at(&backend, Route::Home, NotifyMode::OnSubmit).await;

  let form = console.page_mut().form_mut();
  form.set_field(0, EMAIL.into());
  form.set_field(1, PASSWORD.into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;
  assert_eq!(console.route(), Route::Home);

  let effects = console.poll_session().await;
  console.run_to_idle(effects).await;
  assert_eq!(console.route(), Route::Prompt);
  assert!(!console.page().is_loading());
}

#[tokio::test]
async fn wrong_password_shows_service_message() {
  let backend = backend();
  let mut console = console_at(&backend, Route::Home, NotifyMode::OnSubmit).await;
  let form = console.page_mut().form_mut();
  form.set_field(0, EMAIL.into());
  form.set_field(1, "errada".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some("Invalid login credentials"));
  assert!(console.poll_session().await.is_empty());
  assert_eq!(console.route(), Route::Home);
}

#[tokio::test]
async fn sign_out_returns_to_login() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::Prompt, NotifyMode::OnSubmit).await;
  let Navigation::Opened(effects) = console.sign_out().await else {
    panic!("sign-out should not be blocked");
  };
  console.run_to_idle(effects).await;
  assert_eq!(console.route(), Route::Home);
  assert!(console.session().is_none());
}

#[tokio::test]
async fn expired_session_redirects_immediately() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::Deferred).await;
  add_entry(&mut console, "Horário?", "Das 9h às 18h.").await;
  assert_eq!(console.request_exit(), UnloadDecision::Confirm);

  backend.auth.expire_session();
  let effects = console.poll_session().await;
  console.run_to_idle(effects).await;
  assert_eq!(console.route(), Route::Home);
}

#[tokio::test]
async fn store_commands_need_a_session() {
  let backend = backend();
  let outcome = pages::execute(
    backend.as_ref(),
    None,
    Command::Prompt(prompt::Command::Load),
  )
  .await;
  assert_eq!(outcome, Outcome::SessionMissing);

  let mut page = Page::mount(Route::Whatsapp, None, NotifyMode::OnSubmit);
  page.apply(outcome);
  assert_eq!(page.flash().map(|f| f.text.as_str()), Some(NOT_AUTHENTICATED));
}

// ─── System prompt ───────────────────────────────────────────────────────────

#[tokio::test]
async fn prompt_is_inserted_once_then_updated_in_place() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::Prompt, NotifyMode::OnSubmit).await;
  assert!(console.page().flash().is_none());

  console.page_mut().form_mut().set_field(0, "Seja cordial.".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;
  assert_eq!(flash_text(&console), Some(prompt::PROMPT_CREATED));

  let Page::Prompt(page) = console.page() else {
    panic!("expected prompt page");
  };
  let first_id = page.current_id.clone().expect("id after insert");

  console.page_mut().form_mut().set_field(0, "Seja breve.".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;
  assert_eq!(flash_text(&console), Some(prompt::PROMPT_UPDATED));

  let Page::Prompt(page) = console.page() else {
    panic!("expected prompt page");
  };
  assert_eq!(page.current_id.as_deref(), Some(first_id.as_str()));
  assert_eq!(page.prompt, "Seja breve.");
  assert_eq!(backend.store.rows(SYSTEM_PROMPT).len(), 1);
}

#[tokio::test]
async fn prompt_fetch_failure_is_reported() {
  let backend = signed_in();
  backend
    .store
    .fail_next(SYSTEM_PROMPT, StoreError::Transport("timeout".into()));
  let console = console_at(&backend, Route::Prompt, NotifyMode::OnSubmit).await;
  assert_eq!(
    flash_text(&console),
    Some("Erro ao buscar dados: store request failed: timeout")
  );
}

#[tokio::test]
async fn duplicate_prompt_rows_start_an_empty_form() {
  let backend = signed_in();
  backend.store.seed(SYSTEM_PROMPT, [
    json!({ "id": "p-1", "prompt": "Seja cordial." }),
    json!({ "id": "p-2", "prompt": "Seja breve." }),
  ]);
  let console = console_at(&backend, Route::Prompt, NotifyMode::OnSubmit).await;
  let Page::Prompt(page) = console.page() else {
    panic!("expected prompt page");
  };
  assert!(page.prompt.is_empty());
  assert!(page.current_id.is_none());
  assert_eq!(flash_text(&console), None);
}

// ─── Knowledge base ──────────────────────────────────────────────────────────

#[tokio::test]
async fn empty_entry_makes_no_store_call() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::OnSubmit).await;
  let calls = backend.store.calls();

  add_entry(&mut console, "Horário?", "   ").await;
  assert_eq!(backend.store.calls(), calls);
  assert_eq!(flash_text(&console), Some(knowledge::FIELDS_REQUIRED));
}

#[tokio::test]
async fn entries_list_newest_first_and_notify_on_submit() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::OnSubmit).await;
  add_entry(&mut console, "Primeira?", "Sim.").await;
  add_entry(&mut console, "Segunda?", "Também.").await;
  assert_eq!(flash_text(&console), Some(knowledge::ENTRY_CREATED));

  let page = knowledge_page(&mut console);
  let questions: Vec<_> = page.entries.iter().map(|e| e.question.as_str()).collect();
  assert_eq!(questions, ["Segunda?", "Primeira?"]);
  assert!(page.question.is_empty());

  let delivered = backend.notifier.delivered();
  assert_eq!(delivered.len(), 2);
  assert_eq!(delivered[0].0, Webhook::KnowledgeBase);
  assert_eq!(
    delivered[0].1,
    json!({ "question": "Primeira?", "answer": "Sim.", "action": "create", "entryId": "new" })
  );
}

#[tokio::test]
async fn editing_updates_the_entry_and_reports_its_id() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::OnSubmit).await;
  add_entry(&mut console, "Horário?", "Das 9h às 18h.").await;

  let page = knowledge_page(&mut console);
  let id = page.entries[0].id.clone();
  page.edit(&id);
  add_entry(&mut console, "Horário?", "Das 8h às 17h.").await;

  assert_eq!(flash_text(&console), Some(knowledge::ENTRY_UPDATED));
  let page = knowledge_page(&mut console);
  assert!(page.editing.is_none());
  assert_eq!(page.entries.len(), 1);
  assert_eq!(page.entries[0].answer, "Das 8h às 17h.");

  let last = backend.notifier.delivered().pop().expect("update notification");
  assert_eq!(last.1["action"], "update");
  assert_eq!(last.1["entryId"], json!(id));
}

#[tokio::test]
async fn webhook_failure_leaves_the_write_standing() {
  let backend = signed_in();
  backend.notifier.set_failing(true);
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::OnSubmit).await;
  add_entry(&mut console, "Horário?", "Das 9h às 18h.").await;

  assert_eq!(flash_text(&console), Some(knowledge::ENTRY_CREATED));
  assert_eq!(backend.store.rows(KNOWLEDGE_BASE).len(), 1);
  assert_eq!(backend.notifier.attempts(), 1);
  assert!(backend.notifier.delivered().is_empty());
  assert_eq!(knowledge_page(&mut console).entries.len(), 1);
}

#[tokio::test]
async fn delete_removes_the_entry() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::OnSubmit).await;
  add_entry(&mut console, "Horário?", "Das 9h às 18h.").await;

  let page = knowledge_page(&mut console);
  let id = page.entries[0].id.clone();
  page.request_delete(&id);
  let next = page.confirm_delete().map(Command::Knowledge);
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some(knowledge::ENTRY_DELETED));
  assert!(knowledge_page(&mut console).entries.is_empty());
  assert!(backend.store.rows(KNOWLEDGE_BASE).is_empty());
  // deletes are not reported in on-submit mode
  assert_eq!(backend.notifier.attempts(), 1);
}

#[tokio::test]
async fn deleting_a_vanished_entry_reports_the_store_error() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::OnSubmit).await;
  add_entry(&mut console, "Horário?", "Das 9h às 18h.").await;

  let session = console.session().cloned().expect("session");
  let id = knowledge_page(&mut console).entries[0].id.clone();
  backend
    .store
    .delete(&session, KNOWLEDGE_BASE, &crate::store::Filter::eq("id", &id))
    .await
    .unwrap();

  let page = knowledge_page(&mut console);
  page.request_delete(&id);
  let next = page.confirm_delete().map(Command::Knowledge);
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  let flash = console.page().flash().expect("flash");
  assert!(flash.is_error());
  assert_eq!(flash.text, "Nenhum registro encontrado.");
  assert!(!console.page().is_loading());
  assert_eq!(console.route(), Route::KnowledgeBase);
}

// ─── Unsaved-change guard ────────────────────────────────────────────────────

#[tokio::test]
async fn dirty_page_blocks_navigation_until_confirmed() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::Deferred).await;
  add_entry(&mut console, "Horário?", "Das 9h às 18h.").await;
  assert!(backend.notifier.delivered().is_empty());

  assert!(matches!(console.navigate(Route::Prompt).await, Navigation::Blocked));
  assert!(matches!(console.resolve_navigation(false).await, Navigation::Aborted));
  assert_eq!(console.route(), Route::KnowledgeBase);
  assert!(knowledge_page(&mut console).is_dirty());

  assert!(matches!(console.sign_out().await, Navigation::Blocked));
  assert!(matches!(console.resolve_navigation(false).await, Navigation::Aborted));
  assert!(console.session().is_some());

  assert!(matches!(console.navigate(Route::Prompt).await, Navigation::Blocked));
  let Navigation::Opened(effects) = console.resolve_navigation(true).await else {
    panic!("confirmed navigation should open");
  };
  console.run_to_idle(effects).await;
  assert_eq!(console.route(), Route::Prompt);
  assert_eq!(console.request_exit(), UnloadDecision::Proceed);
}

#[tokio::test]
async fn saving_deferred_changes_publishes_and_cleans() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::KnowledgeBase, NotifyMode::Deferred).await;
  add_entry(&mut console, "Primeira?", "Sim.").await;
  add_entry(&mut console, "Segunda?", "Também.").await;
  assert_eq!(knowledge_page(&mut console).queued().len(), 2);

  let next = knowledge_page(&mut console).save_changes().map(Command::Knowledge);
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some(knowledge::CHANGES_SAVED));
  assert_eq!(backend.notifier.delivered().len(), 2);
  assert_eq!(console.request_exit(), UnloadDecision::Proceed);
  assert!(matches!(console.navigate(Route::Profile).await, Navigation::Opened(_)));
}

// ─── Mount lifetimes ─────────────────────────────────────────────────────────

#[tokio::test]
async fn results_for_an_unmounted_page_are_dropped() {
  let backend = signed_in();
  backend.store.seed(SYSTEM_PROMPT, [json!({ "id": "p-1", "prompt": "Seja cordial." })]);

  let (mut console, stale) = Console::start(Arc::clone(&backend), Route::Prompt, NotifyMode::OnSubmit).await;
  let fresh = console.open(Route::Prompt).await;

  for effect in stale {
    let Effect::Spawn(task) = effect else {
      panic!("expected a fetch");
    };
    let completion = task.run(backend.as_ref()).await;
    assert!(console.complete(completion).is_empty());
  }
  let Page::Prompt(page) = console.page() else {
    panic!("expected prompt page");
  };
  assert!(page.prompt.is_empty());
  assert!(page.status.loading);

  console.run_to_idle(fresh).await;
  let Page::Prompt(page) = console.page() else {
    panic!("expected prompt page");
  };
  assert_eq!(page.prompt, "Seja cordial.");
}

// ─── WhatsApp ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn whatsapp_number_loads_and_saves() {
  let backend = signed_in();
  let user_id = backend.auth.force_sign_in(EMAIL).expect("user").user.id;
  backend.store.seed(PROFILES, [json!({ "id": user_id, "wa_number": 5511987654321u64 })]);

  let mut console = console_at(&backend, Route::Whatsapp, NotifyMode::OnSubmit).await;
  let Page::Whatsapp(page) = console.page() else {
    panic!("expected whatsapp page");
  };
  assert_eq!(page.number.city_code, "11");
  assert_eq!(page.number.local, "98765-4321");

  let form = console.page_mut().form_mut();
  form.set_field(1, "21".into());
  form.set_field(2, "982280802".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some(whatsapp::NUMBER_SAVED));
  assert_eq!(backend.store.rows(PROFILES)[0]["wa_number"], "5521982280802");
}

#[tokio::test]
async fn whatsapp_without_profile_shows_support_message() {
  let backend = signed_in();
  let console = console_at(&backend, Route::Whatsapp, NotifyMode::OnSubmit).await;
  assert_eq!(flash_text(&console), Some(whatsapp::PROFILE_MISSING));
  assert!(backend.store.rows(PROFILES).is_empty());
}

#[tokio::test]
async fn whatsapp_reloads_on_session_change() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::Whatsapp, NotifyMode::OnSubmit).await;
  backend.auth.force_sign_in(EMAIL);
  let effects = console.poll_session().await;
  assert!(matches!(
    effects.as_slice(),
    [Effect::Spawn(task)] if *task.command() == Command::Whatsapp(whatsapp::Command::Load)
  ));
}

// ─── Profile ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn profile_row_is_created_on_first_visit() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::Profile, NotifyMode::OnSubmit).await;
  let user_id = console.session().expect("session").user_id();

  let rows = backend.store.rows(PROFILES);
  assert_eq!(rows.len(), 1);
  assert_eq!(rows[0]["id"], json!(user_id));
  assert_eq!(console.page().form().fields()[0].value, EMAIL);

  let form = console.page_mut().form_mut();
  form.set_field(1, "Ana Souza".into());
  form.set_field(3, "".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some(profile::PROFILE_SAVED));
  let row = &backend.store.rows(PROFILES)[0];
  assert_eq!(row["full_name"], "Ana Souza");
  assert!(row["phone"].is_null());
  assert!(row["birth_date"].is_null());
}

// ─── Reset memory / password ─────────────────────────────────────────────────

#[tokio::test]
async fn reset_memory_posts_the_full_number() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::ResetMemory, NotifyMode::OnSubmit).await;
  let form = console.page_mut().form_mut();
  form.set_field(1, "21".into());
  form.set_field(2, "982280802".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some(reset_memory::REQUEST_SENT));
  assert_eq!(backend.notifier.delivered(), vec![(
    Webhook::CleanMemory,
    json!({ "phone": "5521982280802" })
  )]);
  let Page::ResetMemory(page) = console.page() else {
    panic!("expected reset-memory page");
  };
  assert!(page.area_code.is_empty() && page.number.is_empty());
}

#[tokio::test]
async fn reset_memory_failure_is_generic() {
  let backend = signed_in();
  backend.notifier.set_failing(true);
  let mut console = console_at(&backend, Route::ResetMemory, NotifyMode::OnSubmit).await;
  let form = console.page_mut().form_mut();
  form.set_field(1, "21".into());
  form.set_field(2, "982280802".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;
  assert_eq!(flash_text(&console), Some(reset_memory::REQUEST_FAILED));
}

#[tokio::test]
async fn password_reset_updates_and_leaves_the_page() {
  let backend = signed_in();
  let mut console = console_at(&backend, Route::ResetPassword, NotifyMode::OnSubmit).await;
  assert_eq!(console.route(), Route::ResetPassword);

  let form = console.page_mut().form_mut();
  form.set_field(0, "novasenha".into());
  form.set_field(1, "novasenha".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(backend.auth.password_of(EMAIL).as_deref(), Some("novasenha"));
  // `/` with a live session forwards to the prompt page
  assert_eq!(console.route(), Route::Prompt);
}

#[tokio::test]
async fn password_reset_without_session_reports_it() {
  let backend = backend();
  let mut console = console_at(&backend, Route::ResetPassword, NotifyMode::OnSubmit).await;
  let form = console.page_mut().form_mut();
  form.set_field(0, "novasenha".into());
  form.set_field(1, "novasenha".into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(flash_text(&console), Some("Auth session missing!"));
  assert_eq!(console.route(), Route::ResetPassword);
}

#[tokio::test]
async fn recovery_request_is_recorded() {
  let backend = backend();
  let mut console = console_at(&backend, Route::Home, NotifyMode::OnSubmit).await;
  let Page::Login(page) = console.page_mut() else {
    panic!("expected login page");
  };
  page.toggle_recovery();
  page.set_field(0, EMAIL.into());
  let next = console.page_mut().submit();
  let effects = console.dispatch(next);
  console.run_to_idle(effects).await;

  assert_eq!(backend.auth.recovery_requests(), vec![EMAIL.to_string()]);
  assert_eq!(flash_text(&console), Some(pages::login::RECOVERY_SENT));
}
