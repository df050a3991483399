use ratatui::widgets::ListState;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

use crate::cache::SearchCache;
use crate::config::Config;
use crate::constants::constants;
use crate::controller::{CategoryFeed, Notice, ResultsView, SearchController, SearchSettings, SortOrder};
use crate::format::is_valid_video_id;
use crate::mapper::DisplayRecord;
use crate::theme::{THEMES, theme_index};
use crate::youtube::{ResultType, TransportError, VideoDetails, YouTubeClient};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Home screen: one carousel per category.
  Browse,
  /// Typing into the search box.
  Input,
  /// Navigating search results.
  Results,
}

pub struct App {
  pub input: String,
  pub cursor_position: usize,
  pub input_scroll: usize,
  pub mode: AppMode,
  pub theme_index: usize,
  pub list_state: ListState,
  pub feeds: Vec<CategoryFeed>,
  pub feed_views: Vec<ResultsView>,
  pub selected_feed: usize,
  pub search: SearchController,
  pub search_view: ResultsView,
  pub details: Option<VideoDetails>,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  pub should_quit: bool,
  client: Arc<YouTubeClient>,
  cache: SearchCache,
  changes: watch::Receiver<u64>,
  details_rx: Option<oneshot::Receiver<Result<VideoDetails, TransportError>>>,
  /// When the last error was set, used for auto-dismiss after 5 seconds.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(cache: SearchCache, client: Arc<YouTubeClient>, config: &Config, mut settings: SearchSettings) -> Self {
    let theme_index = config.theme_name.as_deref().map_or(0, theme_index);
    if let Some(name) = config.sort_order.as_deref() {
      settings.sort_order = SortOrder::from_config(name);
    }

    let max_results = settings.max_results;
    let feeds: Vec<CategoryFeed> =
      constants().categories.iter().map(|category| CategoryFeed::new(&cache, category, max_results)).collect();
    let feed_views = feeds.iter().map(CategoryFeed::read).collect();
    let search = SearchController::new(&cache, settings);
    let search_view = search.read();

    let mut list_state = ListState::default();
    list_state.select(Some(0));

    Self {
      input: String::new(),
      cursor_position: 0,
      input_scroll: 0,
      mode: AppMode::Browse,
      theme_index,
      list_state,
      feeds,
      feed_views,
      selected_feed: 0,
      search,
      search_view,
      details: None,
      last_error: None,
      status_message: None,
      should_quit: false,
      changes: cache.changes(),
      client,
      cache,
      details_rx: None,
      error_time: None,
    }
  }

  pub fn theme(&self) -> &'static crate::theme::Theme {
    // Safety: theme_index is bounded by modular arithmetic in next_theme()
    // and by theme_index() on initialization.
    &THEMES[self.theme_index]
  }

  pub fn next_theme(&mut self) {
    self.theme_index = (self.theme_index + 1) % THEMES.len();
    self.save_config();
  }

  fn save_config(&self) {
    let mut config = Config::load();
    config.theme_name = Some(self.theme().name.to_string());
    config.sort_order = Some(self.search.sort_order().config_name().to_string());
    config.save();
  }

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after 5 seconds.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(5)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Per-frame upkeep ---

  /// Advance timers and pick up finished background work.
  pub fn tick(&mut self) {
    if self.search.tick() {
      self.list_state.select(Some(0));
      self.details = None;
      self.refresh_views();
    }
    if self.changes.has_changed().unwrap_or(false) {
      self.changes.mark_unchanged();
      self.refresh_views();
    }
    self.cache.evict_idle();
    self.check_details();
    self.expire_error();
  }

  /// Recompute every list from the cache.
  pub fn refresh_views(&mut self) {
    self.feed_views = self.feeds.iter().map(CategoryFeed::read).collect();
    self.search_view = self.search.read();
    self.clamp_selection();
  }

  fn check_details(&mut self) {
    let Some(mut rx) = self.details_rx.take() else { return };
    match rx.try_recv() {
      Ok(result) => {
        self.status_message = None;
        match result {
          // The selection may have moved on while the request was in flight.
          Ok(details) if self.selected_record().is_some_and(|r| r.id == details.id) => self.details = Some(details),
          Ok(details) => debug!(id = %details.id, "app: dropping details for deselected video"),
          Err(e) if e.is_forbidden() => self.set_error("YouTube API quota exceeded or invalid API key".to_string()),
          Err(e) if e.status() == Some(404) => self.set_error("Video not found.".to_string()),
          Err(e) => self.set_error(format!("Failed to load video: {}", e)),
        }
      }
      Err(oneshot::error::TryRecvError::Empty) => {
        self.details_rx = Some(rx);
      }
      Err(oneshot::error::TryRecvError::Closed) => {
        self.status_message = None;
        self.set_error("Video task failed.".to_string());
      }
    }
  }

  // --- Lists ---

  /// The view backing the list currently on screen.
  pub fn current_view(&self) -> Option<&ResultsView> {
    match self.mode {
      AppMode::Browse => self.feed_views.get(self.selected_feed),
      AppMode::Input | AppMode::Results => Some(&self.search_view),
    }
  }

  pub fn current_records(&self) -> &[DisplayRecord] {
    self.current_view().map(|view| view.display_records.as_slice()).unwrap_or_default()
  }

  pub fn selected_record(&self) -> Option<&DisplayRecord> {
    self.list_state.selected().and_then(|i| self.current_records().get(i))
  }

  fn clamp_selection(&mut self) {
    let count = self.current_records().len();
    if count == 0 {
      self.list_state.select(Some(0));
    } else if self.list_state.selected().is_none_or(|i| i >= count) {
      self.list_state.select(Some(count - 1));
    }
  }

  pub fn select_next(&mut self) {
    let count = self.current_records().len();
    if count == 0 {
      return;
    }
    let i = self.list_state.selected().map_or(0, |i| (i + 1).min(count - 1));
    self.list_state.select(Some(i));
    if i + constants().load_more_threshold >= count {
      self.trigger_load_more();
    }
  }

  pub fn select_prev(&mut self) {
    let i = self.list_state.selected().map_or(0, |i| i.saturating_sub(1));
    self.list_state.select(Some(i));
  }

  pub fn select_category(&mut self, delta: isize) {
    if self.feeds.is_empty() {
      return;
    }
    let len = self.feeds.len() as isize;
    self.selected_feed = (self.selected_feed as isize + delta).rem_euclid(len) as usize;
    self.list_state.select(Some(0));
    self.details = None;
  }

  pub fn enter_mode(&mut self, mode: AppMode) {
    if mode != self.mode {
      debug!(?mode, "app: mode change");
      self.mode = mode;
      self.list_state.select(Some(0));
      self.details = None;
    }
  }

  // --- Search ---

  /// Push the edited input into the debounced controller.
  pub fn on_input_changed(&mut self) {
    self.search.set_input(self.input.clone());
    // The controller may have capped the input.
    if self.search.raw_input() != self.input {
      self.input = self.search.raw_input().to_string();
      self.cursor_position = self.cursor_position.min(self.input.chars().count());
    }
  }

  /// Commit the typed query now and jump to the results once there are any.
  pub fn submit_search(&mut self) {
    if self.search.submit() {
      info!(query = %self.search.committed_query(), "search triggered");
      self.list_state.select(Some(0));
      self.details = None;
      self.refresh_views();
    }
    if !self.search_view.display_records.is_empty() {
      self.enter_mode(AppMode::Results);
    }
  }

  pub fn clear_search(&mut self) {
    self.input.clear();
    self.cursor_position = 0;
    self.input_scroll = 0;
    self.search.clear();
    self.refresh_views();
  }

  pub fn cycle_sort_order(&mut self) {
    let order = self.search.sort_order().next();
    self.search.set_sort_order(order);
    self.list_state.select(Some(0));
    self.refresh_views();
    self.save_config();
  }

  // --- Fetch actions ---

  pub fn trigger_load_more(&mut self) {
    let requested = match self.mode {
      AppMode::Browse => self.feeds.get(self.selected_feed).and_then(CategoryFeed::request_next_page),
      AppMode::Input | AppMode::Results => self.search.request_next_page(),
    };
    if requested.is_some() {
      debug!(mode = ?self.mode, "app: loading next page");
    }
  }

  pub fn trigger_retry(&mut self) {
    let notice = self.current_view().map(|v| &v.notice);
    if !notice.is_some_and(Notice::is_error) {
      return;
    }
    self.clear_error();
    let retried = match self.mode {
      AppMode::Browse => self.feeds.get(self.selected_feed).and_then(CategoryFeed::retry),
      AppMode::Input | AppMode::Results => self.search.retry(),
    };
    if retried.is_some() {
      info!(mode = ?self.mode, "app: retrying failed fetch");
    }
  }

  pub fn trigger_refresh(&mut self) {
    if matches!(self.mode, AppMode::Input | AppMode::Results) {
      let _ = self.search.refresh();
    }
  }

  /// Fetch full metadata for the selected video.
  pub fn trigger_details(&mut self) {
    let Some(record) = self.selected_record() else { return };
    let video_id = record.id.clone();
    if record.kind != ResultType::Video {
      self.set_error("Details are only available for videos. Press ^o to open it instead.".to_string());
      return;
    }
    if !is_valid_video_id(&video_id) {
      self.set_error(format!("Not a video id: {}", video_id));
      return;
    }
    self.clear_error();
    self.status_message = Some("Loading video…".to_string());

    let client = Arc::clone(&self.client);
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(client.video_details(&video_id).await);
    });
    self.details_rx = Some(rx);
  }

  /// Hand the selected video to the system's default handler.
  pub fn open_selected(&mut self) {
    let url = match (&self.details, self.selected_record()) {
      (Some(details), _) => details.url.clone(),
      (None, Some(record)) => record.url(),
      (None, None) => return,
    };
    // Use platform-appropriate command to open URL in default browser.
    #[cfg(target_os = "macos")]
    let cmd = "open";
    #[cfg(not(target_os = "macos"))]
    let cmd = "xdg-open";
    match std::process::Command::new(cmd)
      .arg(&url)
      .stdin(std::process::Stdio::null())
      .stdout(std::process::Stdio::null())
      .stderr(std::process::Stdio::null())
      .spawn()
    {
      Ok(mut child) => {
        info!(url = %url, "app: opened video");
        // Reap the child in a background thread to avoid zombie processes.
        std::thread::spawn(move || {
          let _ = child.wait();
        });
      }
      Err(e) => {
        self.set_error(format!("Failed to open browser: {}", e));
      }
    }
  }
}
