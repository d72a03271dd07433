//! Single-form pages: every page but the knowledge base.

use kaisan_core::{
  form::{FieldKind, FieldView},
  pages::{Page, login::View},
};
use ratatui::{
  Frame,
  layout::Rect,
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Paragraph, Wrap},
};

use crate::app::Focus;

/// Render `page` as a bordered form filling `area`.
pub fn draw(f: &mut Frame, area: Rect, page: &Page, focus: Focus) {
  let block = Block::default()
    .title(format!(" {} ", heading(page)))
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::DarkGray));

  let inner = block.inner(area);
  f.render_widget(block, area);
  f.render_widget(
    Paragraph::new(form_lines(page, focus)).wrap(Wrap { trim: false }),
    inner,
  );
}

fn heading(page: &Page) -> &'static str {
  match page {
    Page::Login(p) if p.view == View::Recovery => "Recuperar Senha",
    Page::Login(_) => "Entrar",
    Page::Knowledge(p) => p.heading(),
    page => page.route().title(),
  }
}

/// Fields, the flash message and the submit button, top to bottom.
pub fn form_lines(page: &Page, focus: Focus) -> Vec<Line<'static>> {
  let mut lines = Vec::new();

  for (i, field) in page.form().fields().iter().enumerate() {
    field_lines(&mut lines, field, focus == Focus::Field(i));
    lines.push(Line::from(""));
  }

  if let Some(flash) = page.flash() {
    let color = if flash.is_error() { Color::Red } else { Color::Green };
    lines.push(Line::from(Span::styled(flash.text.clone(), Style::default().fg(color))));
    lines.push(Line::from(""));
  }

  let button = if page.is_loading() {
    Style::default().fg(Color::DarkGray)
  } else {
    Style::default()
      .fg(Color::Black)
      .bg(Color::Cyan)
      .add_modifier(Modifier::BOLD)
  };
  lines.push(Line::from(vec![
    Span::styled(format!(" {} ", page.submit_label()), button),
    Span::styled("  Enter / ^S", Style::default().fg(Color::DarkGray)),
  ]));

  for hint in extra_actions(page) {
    lines.push(Line::from(Span::styled(*hint, Style::default().fg(Color::DarkGray))));
  }

  lines
}

fn field_lines(lines: &mut Vec<Line<'static>>, field: &FieldView<'_>, focused: bool) {
  let label_style = if focused {
    Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
  } else {
    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)
  };
  lines.push(Line::from(Span::styled(field.label, label_style)));

  let dimmed = matches!(field.kind, FieldKind::ReadOnly | FieldKind::Disabled);
  let value = match field.kind {
    FieldKind::Secret => "*".repeat(field.value.chars().count()),
    _ => field.value.to_string(),
  };
  let cursor = if focused { "_" } else { "" };

  if value.is_empty() {
    lines.push(Line::from(vec![
      Span::raw("  "),
      Span::styled(field.placeholder, Style::default().fg(Color::DarkGray)),
      Span::raw(cursor),
    ]));
    return;
  }

  let value_style = if dimmed {
    Style::default().fg(Color::DarkGray)
  } else {
    Style::default()
  };
  let mut rows = value.split('\n').peekable();
  while let Some(row) = rows.next() {
    let mut spans = vec![Span::raw("  "), Span::styled(row.to_string(), value_style)];
    if rows.peek().is_none() {
      spans.push(Span::raw(cursor));
    }
    lines.push(Line::from(spans));
  }
}

fn extra_actions(page: &Page) -> &'static [&'static str] {
  match page {
    Page::Login(p) if p.view == View::SignIn => &["", "^U Criar conta", "^R Esqueceu sua senha?"],
    Page::Login(_) => &["", "^R Voltar para o login"],
    Page::ResetPassword(_) => &["", "^B Voltar para o login"],
    Page::Knowledge(p) if p.editing.is_some() => &["", "^X Cancelar edição"],
    _ => &[],
  }
}
