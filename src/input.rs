use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub fn handle_key_event(app: &mut App, key: event::KeyEvent) {
  if key.modifiers.contains(KeyModifiers::CONTROL) {
    match key.code {
      KeyCode::Char('c') => {
        app.should_quit = true;
        return;
      }
      KeyCode::Char('t') => {
        app.next_theme();
        return;
      }
      KeyCode::Char('s') => {
        app.cycle_sort_order();
        return;
      }
      KeyCode::Char('o') => {
        app.open_selected();
        return;
      }
      _ => {}
    }
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key),
    AppMode::Input => handle_input_key(app, key),
    AppMode::Results => handle_results_key(app, key),
  }
}

fn handle_browse_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Char('q') => app.should_quit = true,
    KeyCode::Char('/') | KeyCode::Char('i') => app.enter_mode(AppMode::Input),
    KeyCode::Tab => {
      if !app.search_view.display_records.is_empty() {
        app.enter_mode(AppMode::Results);
      }
    }
    KeyCode::Left | KeyCode::Char('h') => app.select_category(-1),
    KeyCode::Right | KeyCode::Char('l') => app.select_category(1),
    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
    KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
    KeyCode::Enter => app.trigger_details(),
    KeyCode::Char('r') => app.trigger_retry(),
    KeyCode::Esc => app.details = None,
    _ => {}
  }
}

fn handle_input_key(app: &mut App, key: event::KeyEvent) {
  app.clear_error();
  match key.code {
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
      app.on_input_changed();
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.on_input_changed();
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
        app.on_input_changed();
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    KeyCode::Esc => {
      if !app.input.is_empty() {
        app.clear_search();
      } else {
        app.enter_mode(AppMode::Browse);
      }
    }
    KeyCode::Enter => app.submit_search(),
    KeyCode::Down => {
      if !app.search_view.display_records.is_empty() {
        app.enter_mode(AppMode::Results);
      }
    }
    _ => {}
  }
}

fn handle_results_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Down | KeyCode::Char('j') => app.select_next(),
    KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
    KeyCode::Enter => app.trigger_details(),
    KeyCode::Char('r') => app.trigger_retry(),
    KeyCode::Char('R') => app.trigger_refresh(),
    KeyCode::Char('b') => app.enter_mode(AppMode::Browse),
    KeyCode::Char('/') | KeyCode::Esc => {
      if key.code == KeyCode::Esc && app.details.is_some() {
        app.details = None;
      } else {
        app.enter_mode(AppMode::Input);
      }
    }
    _ => {}
  }
}
