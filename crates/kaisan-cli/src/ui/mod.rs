//! TUI rendering: header with the nav bar, page body, status bar.

pub mod form;
pub mod knowledge;

use chrono::Local;
use kaisan_core::{
  Backend, Route,
  pages::{NotifyMode, Page},
};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Flex, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Clear, Paragraph, Wrap},
};

use crate::app::{App, Focus};

// ─── Root draw ────────────────────────────────────────────────────────────────

/// Main draw function called each frame.
pub fn draw<B: Backend>(f: &mut Frame, app: &App<B>) {
  let area = f.area();

  let rows = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // header
      Constraint::Min(0),    // body
      Constraint::Length(1), // status bar
    ])
    .split(area);

  draw_header(f, rows[0], app);
  draw_body(f, rows[1], app);
  draw_status(f, rows[2], app);

  if let Some(modal) = app.modal {
    draw_modal(f, area, modal.message());
  }
}

// ─── Header ───────────────────────────────────────────────────────────────────

fn draw_header<B: Backend>(f: &mut Frame, area: Rect, app: &App<B>) {
  let current = app.console.route();
  let session = app.console.session();

  let mut left = vec![Span::styled(
    " Kaisan ",
    Style::default()
      .fg(Color::White)
      .add_modifier(Modifier::BOLD),
  )];
  if session.is_some() {
    for (i, route) in Route::NAV.iter().enumerate() {
      let style = if *route == current {
        Style::default()
          .fg(Color::Black)
          .bg(Color::Cyan)
          .add_modifier(Modifier::BOLD)
      } else {
        Style::default().fg(Color::Gray)
      };
      left.push(Span::raw(" "));
      left.push(Span::styled(format!("F{} {}", i + 1, route.title()), style));
    }
  }

  let right_text = match session {
    Some(s) => format!("{}  ^L Sair ", s.user.email.as_deref().unwrap_or("")),
    None => format!("Painel de Administração  {} ", Local::now().format("%d/%m/%Y")),
  };
  let right = Span::styled(right_text, Style::default().fg(Color::Gray));

  let left_width: usize = left.iter().map(|s| s.content.chars().count()).sum();
  let right_width = right.content.chars().count();
  let pad = usize::from(area.width)
    .saturating_sub(left_width)
    .saturating_sub(right_width);

  left.push(Span::raw(" ".repeat(pad)));
  left.push(right);

  let block = Block::default().style(Style::default().bg(Color::DarkGray));
  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(Paragraph::new(Line::from(left)), inner);
}

// ─── Body ─────────────────────────────────────────────────────────────────────

fn draw_body<B: Backend>(f: &mut Frame, area: Rect, app: &App<B>) {
  match app.console.page() {
    Page::Knowledge(page) => knowledge::draw(f, area, app, page),
    page => form::draw(f, area, page, app.focus),
  }
}

// ─── Status bar ───────────────────────────────────────────────────────────────

fn draw_status<B: Backend>(f: &mut Frame, area: Rect, app: &App<B>) {
  let page = app.console.page();
  let (mode_label, hints) = if app.modal.is_some() {
    ("CONFIRMAR", "s confirmar  n cancelar")
  } else if app.filter_active {
    ("FILTRO", "Digite para filtrar  Enter aplicar  Esc limpar")
  } else if app.focus == Focus::List {
    ("LISTA", "↑↓/jk mover  / filtrar  e editar  d excluir  Tab formulário")
  } else {
    ("EDITAR", page_hints(page))
  };

  let status = if app.modal.is_none() && !app.status_msg.is_empty() {
    app.status_msg.clone()
  } else if page.is_loading() {
    format!("Carregando...  {hints}")
  } else {
    hints.to_string()
  };

  let mode_span = Span::styled(
    format!(" {mode_label} "),
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD),
  );
  let hint_span = Span::styled(format!("  {status}"), Style::default().fg(Color::DarkGray));

  f.render_widget(
    Paragraph::new(Line::from(vec![mode_span, hint_span])).style(Style::default().bg(Color::Black)),
    area,
  );
}

fn page_hints(page: &Page) -> &'static str {
  match page {
    Page::Login(_) => "Tab campo  Enter enviar  ^U cadastrar  ^R recuperar senha  Esc sair",
    Page::ResetPassword(_) => "Tab campo  Enter enviar  ^B voltar ao login  Esc sair",
    Page::Knowledge(p) if p.mode == NotifyMode::Deferred => {
      "Tab campo  ^S salvar  ^X cancelar  ^P publicar alterações  Esc sair"
    }
    Page::Knowledge(_) => "Tab campo  ^S salvar  ^X cancelar edição  Esc sair",
    Page::Prompt(_) => "Enter nova linha  ^S salvar  F1-F5 páginas  Esc sair",
    _ => "Tab campo  Enter salvar  F1-F5 páginas  Esc sair",
  }
}

// ─── Modal ────────────────────────────────────────────────────────────────────

fn draw_modal(f: &mut Frame, area: Rect, message: &str) {
  let [row] = Layout::vertical([Constraint::Length(6)])
    .flex(Flex::Center)
    .areas(area);
  let [rect] = Layout::horizontal([Constraint::Length(60)])
    .flex(Flex::Center)
    .areas(row);

  let block = Block::default()
    .title(" Confirmar ")
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Yellow));
  let lines = vec![
    Line::from(message.to_string()),
    Line::from(""),
    Line::from(vec![
      Span::styled("[s] Sim", Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)),
      Span::raw("  "),
      Span::styled("[n] Não", Style::default().fg(Color::Red).add_modifier(Modifier::BOLD)),
    ]),
  ];

  f.render_widget(Clear, rect);
  f.render_widget(
    Paragraph::new(lines).block(block).wrap(Wrap { trim: true }),
    rect,
  );
}
