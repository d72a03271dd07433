//! Knowledge base: entry form on the left, entry list on the right.

use kaisan_core::{Backend, pages::KnowledgePage};
use ratatui::{
  Frame,
  layout::{Constraint, Direction, Layout, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
};

use super::form;
use crate::app::{App, Focus};

pub fn draw<B: Backend>(f: &mut Frame, area: Rect, app: &App<B>, page: &KnowledgePage) {
  let cols = Layout::default()
    .direction(Direction::Horizontal)
    .constraints([Constraint::Percentage(45), Constraint::Percentage(55)])
    .split(area);

  form::draw(f, cols[0], app.console.page(), app.focus);
  draw_list(f, cols[1], app, page);
}

fn draw_list<B: Backend>(f: &mut Frame, area: Rect, app: &App<B>, page: &KnowledgePage) {
  let filtered = app.filtered_entries();
  let total = page.entries.len();

  let mut title = if app.filter_active || !app.filter.is_empty() {
    format!(" Entradas ({}/{}) ", filtered.len(), total)
  } else {
    format!(" Entradas ({total}) ")
  };
  if page.is_dirty() {
    title.push_str("● alterações não salvas ");
  }

  let border = if app.focus == Focus::List { Color::Cyan } else { Color::DarkGray };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));

  let mut inner_area = block.inner(area);
  f.render_widget(block, area);

  if (app.filter_active || !app.filter.is_empty()) && inner_area.height > 2 {
    let filter_area = Rect {
      x:      inner_area.x,
      y:      inner_area.y + inner_area.height - 1,
      width:  inner_area.width,
      height: 1,
    };
    inner_area.height = inner_area.height.saturating_sub(1);

    let filter_text = if app.filter_active {
      format!("/{}_", app.filter)
    } else {
      format!("/{}", app.filter)
    };
    f.render_widget(
      Paragraph::new(filter_text).style(Style::default().fg(Color::Yellow)),
      filter_area,
    );
  }

  if filtered.is_empty() {
    let hint = if total == 0 {
      "Nenhuma entrada cadastrada."
    } else {
      "Nenhuma entrada corresponde ao filtro."
    };
    f.render_widget(
      Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
      inner_area,
    );
    return;
  }

  let width = usize::from(inner_area.width.saturating_sub(2));
  let items: Vec<ListItem> = filtered
    .iter()
    .map(|entry| {
      let marker = if page.editing.as_deref() == Some(entry.id.as_str()) { "✎ " } else { "  " };
      ListItem::new(vec![
        Line::from(vec![
          Span::styled(marker, Style::default().fg(Color::Yellow)),
          Span::styled(
            truncate(&entry.question, width),
            Style::default().add_modifier(Modifier::BOLD),
          ),
        ]),
        Line::from(vec![
          Span::raw("  "),
          Span::styled(truncate(&entry.answer, width), Style::default().fg(Color::Gray)),
        ]),
        Line::from(Span::styled(
          format!("  {}", entry.created_at.format("%d/%m/%Y %H:%M")),
          Style::default().fg(Color::DarkGray),
        )),
      ])
    })
    .collect();

  let mut state = ListState::default();
  state.select(Some(app.list_cursor));

  f.render_stateful_widget(
    List::new(items)
      .highlight_style(
        Style::default()
          .bg(Color::Blue)
          .fg(Color::White)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol(""),
    inner_area,
    &mut state,
  );
}

/// First line of `text`, cut to `width` characters.
fn truncate(text: &str, width: usize) -> String {
  let line = text.lines().next().unwrap_or("");
  if line.chars().count() <= width && !text.contains('\n') {
    return line.to_string();
  }
  let keep = width.saturating_sub(1);
  let mut out: String = line.chars().take(keep).collect();
  out.push('…');
  out
}
