//! `kaisan`: terminal admin console for the Kaisan WhatsApp agent.
//!
//! # Usage
//!
//! ```text
//! kaisan --config kaisan.toml
//! kaisan --route /base-de-conhecimento
//! kaisan --recovery-link 'http://localhost:3000/reset-password#access_token=…'
//! kaisan --offline
//! ```
//!
//! Logs go to the file named by `log_file` (default `kaisan.log`); the
//! terminal belongs to the UI.

mod app;
mod settings;
mod ui;

use std::{
  fs::OpenOptions,
  io,
  path::{Path, PathBuf},
  sync::{Arc, Mutex},
  time::Duration,
};

use anyhow::{Context, Result};
use app::App;
use clap::Parser;
use crossterm::{
  event::{self, Event, KeyEventKind},
  execute,
  terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use kaisan_core::{
  Backend, Route,
  console::{Completion, Console, Effect},
  lifetime::MountToken,
  memory,
  pages::NotifyMode,
};
use ratatui::{Terminal, backend::CrosstermBackend};
use settings::Settings;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

const OFFLINE_EMAIL: &str = "demo@kaisan.local";
const OFFLINE_PASSWORD: &str = "kaisan123";

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "kaisan", version, about = "Terminal admin console for the Kaisan WhatsApp agent")]
struct Args {
  /// Path to the TOML settings file. Missing is fine; `KAISAN_*` variables
  /// override it.
  #[arg(short, long, value_name = "FILE", default_value = "kaisan.toml")]
  config: PathBuf,

  /// Run against an in-memory backend with a demo account.
  #[arg(long)]
  offline: bool,

  /// Password-recovery link from the reset email. Opens the reset page
  /// signed in.
  #[arg(long, value_name = "URL", conflicts_with = "offline")]
  recovery_link: Option<String>,

  /// Page to open first.
  #[arg(long, value_name = "PATH", default_value = "/")]
  route: Route,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  let args = Args::parse();
  let settings = Settings::load(&args.config)?;
  init_tracing(&settings.log_file)?;
  info!(offline = args.offline, route = %args.route, "starting console");

  if args.offline {
    let backend = memory::backend();
    backend.auth.add_user(OFFLINE_EMAIL, OFFLINE_PASSWORD);
    let hint = format!("Modo offline: entre com {OFFLINE_EMAIL} / {OFFLINE_PASSWORD}");
    return run(Arc::new(backend), args.route, settings.knowledge_notify, hint).await;
  }

  let backend = kaisan_supabase::connect(settings.supabase()?, settings.webhooks.clone())
    .context("failed to set up the Supabase client")?;
  match backend.store.check_connection().await {
    Ok(()) => info!(url = %settings.supabase_url, "Supabase reachable"),
    Err(e) => warn!(url = %settings.supabase_url, error = %e, "Supabase connectivity probe failed"),
  }
  backend.auth.spawn_refresh();

  let mut route = args.route;
  if let Some(link) = &args.recovery_link {
    backend
      .auth
      .exchange_recovery_link(link)
      .await
      .context("failed to use the recovery link")?;
    route = Route::ResetPassword;
  }

  run(Arc::new(backend), route, settings.knowledge_notify, String::new()).await
}

fn init_tracing(path: &Path) -> Result<()> {
  let file = OpenOptions::new()
    .create(true)
    .append(true)
    .open(path)
    .with_context(|| format!("failed to open log file {}", path.display()))?;
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_ansi(false)
    .with_writer(Mutex::new(file))
    .init();
  Ok(())
}

async fn run<B: Backend>(
  backend: Arc<B>,
  route: Route,
  mode: NotifyMode,
  status: String,
) -> Result<()> {
  let (console, effects) = Console::start(backend, route, mode).await;
  let mut app = App::new(console, effects);
  app.status_msg = status;

  // Set up the terminal.
  enable_raw_mode().context("enabling raw mode")?;
  let mut stdout = io::stdout();
  execute!(stdout, EnterAlternateScreen).context("entering alternate screen")?;
  let term_backend = CrosstermBackend::new(stdout);
  let mut terminal = Terminal::new(term_backend).context("creating terminal")?;

  // Run the event loop; restore terminal even on error.
  let run_result = run_event_loop(&mut terminal, &mut app).await;

  disable_raw_mode().ok();
  execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
  terminal.show_cursor().ok();

  info!("console closed");
  run_result
}

// ─── Event loop ───────────────────────────────────────────────────────────────

/// Delivered back to the loop by spawned work.
enum Message {
  Completed(Completion),
  Timer { route: Route, token: MountToken },
}

async fn run_event_loop<B: Backend>(
  terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
  app: &mut App<B>,
) -> Result<()> {
  let (tx, mut rx) = mpsc::unbounded_channel();

  loop {
    pump(app, &tx).await;
    terminal.draw(|f| ui::draw(f, app)).context("drawing frame")?;

    // Poll for an event, yielding control to tokio while waiting.
    let maybe_event = tokio::task::block_in_place(|| {
      if event::poll(Duration::from_millis(50))? {
        Ok::<_, io::Error>(Some(event::read()?))
      } else {
        Ok(None)
      }
    })?;

    if let Some(Event::Key(key)) = maybe_event
      && key.kind == KeyEventKind::Press
      && !app.handle_key(key).await?
    {
      break;
    }

    while let Ok(message) = rx.try_recv() {
      match message {
        Message::Completed(completion) => app.complete(completion),
        Message::Timer { route, token } => app.on_timer(route, token).await,
      }
    }
    app.poll_session().await;
  }

  Ok(())
}

/// Start everything the console asked for. Navigations run inline and may
/// ask for more.
async fn pump<B: Backend>(app: &mut App<B>, tx: &UnboundedSender<Message>) {
  loop {
    let effects = app.take_effects();
    if effects.is_empty() {
      return;
    }
    for effect in effects {
      match effect {
        Effect::Spawn(task) => {
          let backend = Arc::clone(app.console.backend());
          let tx = tx.clone();
          tokio::spawn(async move {
            let completion = task.run(backend.as_ref()).await;
            // the receiver is gone once the UI has quit
            let _ = tx.send(Message::Completed(completion));
          });
        }
        Effect::Navigate(route) => app.navigate(route).await,
        Effect::NavigateAfter {
          route,
          delay,
          token,
        } => {
          let tx = tx.clone();
          tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(Message::Timer { route, token });
          });
        }
      }
    }
  }
}
