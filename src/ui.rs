use chrono::Utc;
use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Rect},
  style::{Modifier, Style, Stylize},
  text::{Line, Span},
  widgets::{Block, BorderType, List, ListItem, Padding, Paragraph, Wrap},
};

use crate::app::{App, AppMode};
use crate::cache::FetchStatus;
use crate::controller::ResultsView;
use crate::format::{format_duration, format_number, format_relative_date, format_view_count, parse_iso8601_duration};
use crate::mapper::DisplayRecord;
use crate::theme::Theme;
use crate::youtube::VideoDetails;

// --- Helpers ---

/// Compute the display width of the first `n` chars (accounting for double-width CJK).
pub fn display_width(s: &str, n: usize) -> usize {
  use unicode_width::UnicodeWidthChar;
  s.chars().take(n).map(|c| c.width().unwrap_or(0)).sum()
}

/// Truncate a string to `max_width` characters, appending "…" if truncated.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.chars().count() <= max_width {
    s.to_string()
  } else {
    let truncated: String = s.chars().take(max_width.saturating_sub(1)).collect();
    format!("{}…", truncated)
  }
}

fn rounded_block(theme: &Theme) -> Block<'static> {
  Block::bordered().border_type(BorderType::Rounded).border_style(Style::default().fg(theme.border))
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let theme = app.theme();

  frame.render_widget(Block::default().style(Style::default().bg(theme.bg)), frame.area());

  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(3),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, theme, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  render_input(frame, app, input_area);
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, theme: &Theme, area: Rect) {
  let title_style = Style::default().fg(theme.accent).add_modifier(Modifier::BOLD);
  let left = Line::from(Span::styled(" ▶ tubelearn ", title_style));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(theme.muted)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let list_area = if app.details.is_some() {
    let [list_area, details_area] =
      Layout::horizontal([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
    if let Some(details) = &app.details {
      render_details(frame, app.theme(), details, details_area);
    }
    list_area
  } else {
    area
  };

  match app.mode {
    AppMode::Browse => render_browse(frame, app, list_area),
    AppMode::Input | AppMode::Results => render_search(frame, app, list_area),
  }
}

fn render_browse(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let [tabs_area, list_area] = Layout::vertical([Constraint::Length(1), Constraint::Min(1)]).areas(area);

  let spans: Vec<Span> = app
    .feeds
    .iter()
    .enumerate()
    .flat_map(|(i, feed)| {
      let style = if i == app.selected_feed {
        Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD)
      } else {
        Style::default().fg(theme.muted)
      };
      [Span::styled(format!(" {} ", feed.category()), style), Span::raw(" ")]
    })
    .collect();
  frame.render_widget(Line::from(spans), tabs_area);

  let Some(view) = app.feed_views.get(app.selected_feed) else { return };
  let category = app.feeds[app.selected_feed].category().to_string();
  let title = format!(" {} · {} videos ", category, format_number(view.total_results_reported, ""));
  if view.display_records.is_empty() {
    render_notice(frame, theme, view, &category, list_area, title);
  } else {
    let list = results_list(theme, view, &app.list_state, list_area, title);
    frame.render_stateful_widget(list, list_area, &mut app.list_state);
  }
}

fn render_search(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let view = &app.search_view;
  let query = app.search.committed_query().to_string();
  let title = if view.total_results_reported > 0 {
    format!(
      " Results · {} · {} ",
      app.search.sort_order().label(),
      format_number(view.total_results_reported, " found")
    )
  } else {
    format!(" Results · {} ", app.search.sort_order().label())
  };

  if view.display_records.is_empty() {
    let query = if query.is_empty() { app.input.clone() } else { query };
    render_notice(frame, theme, view, &query, area, title);
  } else {
    let list = results_list(theme, view, &app.list_state, area, title);
    frame.render_stateful_widget(list, area, &mut app.list_state);
  }
}

/// Centered message for empty lists: gating, loading, failure or no results.
fn render_notice(frame: &mut Frame, theme: &Theme, view: &ResultsView, query: &str, area: Rect, title: String) {
  let message = view.notice.message(query).unwrap_or_default();
  let color = if view.notice.is_error() { theme.error } else { theme.muted };
  let mut text = vec![Line::from(""), Line::from(Span::styled(message, Style::default().fg(color)))];
  if view.notice.is_error() {
    text.push(Line::from(""));
    text.push(Line::from(Span::styled("Press r to retry.", Style::default().fg(theme.muted))));
  }
  let paragraph = Paragraph::new(text).alignment(Alignment::Center).wrap(Wrap { trim: true }).block(
    rounded_block(theme).title(title).title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
  );
  frame.render_widget(paragraph, area);
}

fn results_list<'a>(
  theme: &Theme,
  view: &'a ResultsView,
  list_state: &ratatui::widgets::ListState,
  area: Rect,
  title: String,
) -> List<'a> {
  // Inner width: area minus 2 borders minus 2 chars for highlight symbol ("▶ ")
  let inner_w = area.width.saturating_sub(4) as usize;
  let now = Utc::now();

  let mut items: Vec<ListItem> = view
    .display_records
    .iter()
    .enumerate()
    .map(|(i, record)| {
      let is_selected = Some(i) == list_state.selected();
      let fg = if is_selected { theme.highlight_fg } else { theme.fg };
      let bg = if is_selected {
        theme.highlight_bg
      } else if i % 2 == 1 {
        theme.stripe_bg
      } else {
        theme.bg
      };
      ListItem::new(record_line(theme, record, fg, inner_w, now)).bg(bg)
    })
    .collect();

  if view.status == FetchStatus::FetchingNextPage {
    items.push(ListItem::new(Line::from(Span::styled("  loading more…", Style::default().fg(theme.muted)))));
  }

  let title = if view.is_refreshing { format!("{}(refreshing) ", title) } else { title };
  List::new(items)
    .block(
      rounded_block(theme).title(title).title_style(Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)),
    )
    .highlight_symbol("▶ ")
    .highlight_style(Style::default().fg(theme.highlight_fg).bg(theme.highlight_bg).add_modifier(Modifier::BOLD))
}

fn record_line(
  theme: &Theme,
  record: &DisplayRecord,
  fg: ratatui::style::Color,
  inner_w: usize,
  now: chrono::DateTime<Utc>,
) -> Line<'static> {
  let right = format!("{}  {}", record.channel_title, format_relative_date(record.published_at, now));
  let right_w = right.chars().count();
  let title_max = inner_w.saturating_sub(right_w + 2);
  let title = truncate_str(&record.title, title_max);
  let gap = inner_w.saturating_sub(title.chars().count() + right_w);
  Line::from(vec![
    Span::styled(title, Style::default().fg(fg)),
    Span::raw(" ".repeat(gap)),
    Span::styled(right, Style::default().fg(theme.muted)),
  ])
}

fn render_details(frame: &mut Frame, theme: &Theme, details: &VideoDetails, area: Rect) {
  let inner_w = area.width.saturating_sub(4) as usize;
  let block = rounded_block(theme)
    .title(Span::styled(" Video ", Style::default().fg(theme.accent).add_modifier(Modifier::BOLD)))
    .padding(Padding::horizontal(1));

  let field = |label: &'static str, value: String| {
    Line::from(vec![
      Span::styled(label, Style::default().fg(theme.muted)),
      Span::styled(truncate_str(&value, inner_w.saturating_sub(label.len())), Style::default().fg(theme.fg)),
    ])
  };

  let mut lines = vec![
    Line::from(""),
    Line::from(Span::styled(details.title.clone(), Style::default().fg(theme.fg).add_modifier(Modifier::BOLD))),
    Line::from(""),
  ];
  if let Some(channel) = &details.channel_title {
    lines.push(field("Channel   ", channel.clone()));
  }
  if let Some(secs) = details.duration.as_deref().and_then(parse_iso8601_duration) {
    lines.push(field("Duration  ", format_duration(secs)));
  }
  if let Some(views) = details.view_count {
    lines.push(field("Views     ", format_view_count(views)));
  }
  if let Some(likes) = details.like_count {
    lines.push(field("Likes     ", format_number(likes, "")));
  }
  if let Some(published) = details.published_at.as_deref().and_then(|p| chrono::DateTime::parse_from_rfc3339(p).ok())
  {
    lines.push(field("Published ", format_relative_date(published.with_timezone(&Utc), Utc::now())));
  }
  lines.push(Line::from(""));
  lines.push(Line::from(Span::styled(
    truncate_str(&details.url, inner_w),
    Style::default().fg(theme.accent).add_modifier(Modifier::UNDERLINED),
  )));
  if let Some(description) = &details.description {
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(description.clone(), Style::default().fg(theme.muted))));
  }

  let paragraph = Paragraph::new(lines).wrap(Wrap { trim: false }).block(block);
  frame.render_widget(paragraph, area);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let failure = app.current_view().filter(|v| v.notice.is_error() && !v.display_records.is_empty());
  let (text, style) = if let Some(msg) = &app.status_message {
    (format!(" ⏳ {}", msg), Style::default().fg(theme.status))
  } else if let Some(err) = &app.last_error {
    (format!(" ⚠  {}", err), Style::default().fg(theme.error))
  } else if app.mode == AppMode::Input && app.search.is_typing() {
    (" …".to_string(), Style::default().fg(theme.muted))
  } else if let Some(view) = failure {
    // Load-more failures keep the list on screen; surface them here instead.
    let msg = view.notice.message(app.search.committed_query()).unwrap_or_default();
    (format!(" ⚠  {} (r to retry)", msg), Style::default().fg(theme.error))
  } else if let Some(view) = app.current_view()
    && !view.display_records.is_empty()
  {
    let more = if view.has_next_page { ", more available" } else { "" };
    (format!(" {} shown{}", view.display_records.len(), more), Style::default().fg(theme.muted))
  } else {
    (" Ready".to_string(), Style::default().fg(theme.muted))
  };
  frame.render_widget(Paragraph::new(text).style(style), area);
}

fn render_input(frame: &mut Frame, app: &mut App, area: Rect) {
  let theme = app.theme();
  let border_color = if app.mode == AppMode::Input { theme.accent } else { theme.border };
  let input_block = Block::bordered()
    .title(" Search YouTube ")
    .title_style(Style::default().fg(border_color))
    .border_type(BorderType::Rounded)
    .border_style(Style::default().fg(border_color))
    .padding(Padding::horizontal(1));

  let inner_w = area.width.saturating_sub(4) as usize;
  let cursor_col = display_width(&app.input, app.cursor_position);

  if cursor_col < app.input_scroll {
    app.input_scroll = cursor_col;
  } else if cursor_col >= app.input_scroll + inner_w {
    app.input_scroll = cursor_col.saturating_sub(inner_w) + 1;
  }

  let visible: String = app
    .input
    .chars()
    .scan(0usize, |col, c| {
      let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
      let start = *col;
      *col += w;
      Some((start, *col, c))
    })
    .skip_while(|(_, end, _)| *end <= app.input_scroll)
    .take_while(|(start, _, _)| *start < app.input_scroll + inner_w)
    .map(|(_, _, c)| c)
    .collect();

  let paragraph = Paragraph::new(visible).style(Style::default().fg(theme.fg)).block(input_block);
  frame.render_widget(paragraph, area);

  if app.mode == AppMode::Input {
    let cursor_x = area.x + 2 + (cursor_col - app.input_scroll) as u16;
    frame.set_cursor_position((cursor_x, area.y + 1));
  }
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let theme = app.theme();
  let has_results = !app.search_view.display_records.is_empty();
  let keys: Vec<(&str, &str)> = match app.mode {
    AppMode::Browse => {
      let mut k = vec![("h/l", "Category"), ("j/k", "Navigate"), ("Enter", "Details"), ("/", "Search")];
      if has_results {
        k.push(("Tab", "Results"));
      }
      k.push(("^o", "Open"));
      k.push(("q", "Quit"));
      k
    }
    AppMode::Input => {
      let mut k = vec![("Enter", "Search"), ("^s", "Sort"), ("^t", "Theme")];
      if has_results {
        k.push(("↓", "Results"));
      }
      k.push(("Esc", if app.input.is_empty() { "Home" } else { "Clear" }));
      k
    }
    AppMode::Results => vec![
      ("Enter", "Details"),
      ("j/k", "Navigate"),
      ("^o", "Open"),
      ("R", "Refresh"),
      ("^s", "Sort"),
      ("b", "Home"),
      ("Esc", "Back"),
    ],
  };

  let spans: Vec<Span> = keys
    .iter()
    .enumerate()
    .flat_map(|(i, (key, action))| {
      let mut s = vec![
        Span::styled(format!(" {} ", key), Style::default().fg(theme.key_fg).bg(theme.key_bg)),
        Span::styled(format!(" {} ", action), Style::default().fg(theme.muted)),
      ];
      if i < keys.len() - 1 {
        s.push(Span::raw("  "));
      }
      s
    })
    .collect();

  frame.render_widget(Line::from(spans), area);

  let label = format!("{} · {} ", app.search.sort_order().label(), theme.name);
  let width = label.chars().count() as u16;
  let right = Line::from(Span::styled(label, Style::default().fg(theme.muted)));
  let right_area = Rect { x: area.x + area.width.saturating_sub(width), width, ..area };
  frame.render_widget(right, right_area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncation_appends_ellipsis() {
    assert_eq!(truncate_str("short", 10), "short");
    assert_eq!(truncate_str("a longer title", 6), "a lon…");
  }

  #[test]
  fn display_width_counts_wide_chars() {
    assert_eq!(display_width("ab", 2), 2);
    assert_eq!(display_width("日本", 2), 4);
    assert_eq!(display_width("日本", 1), 2);
  }
}
