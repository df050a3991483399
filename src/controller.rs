//! Controllers turning user intent into cache subscriptions.
//!
//! [`SearchController`] backs the interactive search screen: keystrokes are
//! debounced into a committed query, short queries are gated, and the UI sort
//! order is mapped onto what the API supports. [`CategoryFeed`] backs the home
//! screen carousels, which fetch unconditionally.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

use crate::aggregate::aggregate;
use crate::cache::{FetchFailure, FetchScope, FetchStatus, PendingFetch, QueryView, SearchCache, Subscription};
use crate::constants::constants;
use crate::mapper::DisplayRecord;
use crate::youtube::{Order, ResultType, SearchQueryKey, TransportError};

// --- Sort order ---

/// Sort order offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
  #[default]
  Relevance,
  DateDesc,
  /// Not supported upstream: fetched as `date` and reversed locally.
  DateAsc,
}

impl SortOrder {
  pub const ALL: [SortOrder; 3] = [SortOrder::Relevance, SortOrder::DateDesc, SortOrder::DateAsc];

  /// Upstream order and whether the aggregated list must be reversed.
  /// Both halves belong together.
  pub fn upstream(self) -> (Order, bool) {
    match self {
      SortOrder::Relevance => (Order::Relevance, false),
      SortOrder::DateDesc => (Order::Date, false),
      SortOrder::DateAsc => (Order::Date, true),
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      SortOrder::Relevance => "Most popular",
      SortOrder::DateDesc => "Upload date: Latest",
      SortOrder::DateAsc => "Upload date: Oldest",
    }
  }

  pub fn config_name(self) -> &'static str {
    match self {
      SortOrder::Relevance => "relevance",
      SortOrder::DateDesc => "date",
      SortOrder::DateAsc => "date-asc",
    }
  }

  pub fn from_config(s: &str) -> Self {
    match s.to_lowercase().as_str() {
      "date" | "date-desc" => SortOrder::DateDesc,
      "date-asc" => SortOrder::DateAsc,
      _ => SortOrder::Relevance,
    }
  }

  pub fn next(self) -> Self {
    let idx = Self::ALL.iter().position(|o| *o == self).unwrap_or(0);
    Self::ALL[(idx + 1) % Self::ALL.len()]
  }
}

// --- Debounce ---

/// Collapses bursts of input into the final settled value.
#[derive(Debug)]
pub struct Debouncer {
  delay: Duration,
  pending: Option<(String, Instant)>,
}

impl Debouncer {
  pub fn new(delay: Duration) -> Self {
    Self { delay, pending: None }
  }

  /// Record new input and restart the timer.
  pub fn push(&mut self, value: String) {
    self.pending = Some((value, Instant::now()));
  }

  pub fn cancel(&mut self) {
    self.pending = None;
  }

  pub fn is_pending(&self) -> bool {
    self.pending.is_some()
  }

  /// The settled value, once `delay` has passed without new input.
  pub fn poll(&mut self) -> Option<String> {
    match &self.pending {
      Some((_, at)) if at.elapsed() >= self.delay => self.pending.take().map(|(value, _)| value),
      _ => None,
    }
  }
}

// --- Presentation state ---

/// What the results area should tell the user. Each asks for a different action.
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
  /// Query too short to search; not an error.
  EnterMoreCharacters { needed: usize },
  Loading,
  Failed(TransportError),
  NoResults,
  Results,
}

impl Notice {
  pub fn message(&self, query: &str) -> Option<String> {
    match self {
      Notice::EnterMoreCharacters { needed } if query.trim().is_empty() => {
        Some(format!("Enter at least {} characters to search", needed))
      }
      Notice::EnterMoreCharacters { needed } => {
        Some(format!("Enter {} more character{} to search", needed, if *needed == 1 { "" } else { "s" }))
      }
      Notice::Loading => Some("Loading…".to_string()),
      Notice::Failed(err) if err.is_forbidden() => Some("YouTube API quota exceeded or invalid API key".to_string()),
      Notice::Failed(err) if err.is_connectivity() => Some("Failed to load videos: check your connection".to_string()),
      Notice::Failed(err) => Some(format!("Failed to load videos: {}", err)),
      Notice::NoResults => Some(format!("No results found for '{}'", query.trim())),
      Notice::Results => None,
    }
  }

  pub fn is_error(&self) -> bool {
    matches!(self, Notice::Failed(_))
  }
}

/// Reactive read exposed to presentation.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultsView {
  pub display_records: Vec<DisplayRecord>,
  pub status: FetchStatus,
  pub has_next_page: bool,
  pub total_results_reported: u64,
  pub is_refreshing: bool,
  pub notice: Notice,
}

impl ResultsView {
  fn from_query(view: QueryView, reverse: bool) -> Self {
    let display_records = aggregate(&view.pages, reverse);
    let notice = match (&view.status, &view.failure) {
      (FetchStatus::LoadingFirstPage | FetchStatus::Idle, _) => Notice::Loading,
      (_, Some(FetchFailure { scope, error })) if *scope != FetchScope::Refresh => Notice::Failed(error.clone()),
      _ if display_records.is_empty() => Notice::NoResults,
      _ => Notice::Results,
    };
    ResultsView {
      display_records,
      status: view.status,
      has_next_page: view.has_next_page,
      total_results_reported: view.total_results_reported(),
      is_refreshing: view.is_refreshing,
      notice,
    }
  }

  fn gated(needed: usize) -> Self {
    ResultsView {
      display_records: Vec::new(),
      status: FetchStatus::Idle,
      has_next_page: false,
      total_results_reported: 0,
      is_refreshing: false,
      notice: Notice::EnterMoreCharacters { needed },
    }
  }
}

// --- Interactive search ---

#[derive(Debug, Clone)]
pub struct SearchSettings {
  pub debounce: Duration,
  pub min_chars: usize,
  pub max_chars: usize,
  pub max_results: u32,
  pub result_type: ResultType,
  pub sort_order: SortOrder,
}

impl Default for SearchSettings {
  fn default() -> Self {
    let c = constants();
    Self {
      debounce: c.search_debounce(),
      min_chars: c.min_search_chars,
      max_chars: c.max_query_chars,
      max_results: c.default_max_results,
      result_type: ResultType::Video,
      sort_order: SortOrder::default(),
    }
  }
}

pub struct SearchController {
  raw_input: String,
  committed_query: String,
  settings: SearchSettings,
  debouncer: Debouncer,
  subscription: Subscription,
}

impl SearchController {
  pub fn new(cache: &SearchCache, settings: SearchSettings) -> Self {
    let debouncer = Debouncer::new(settings.debounce);
    let mut controller = Self {
      raw_input: String::new(),
      committed_query: String::new(),
      subscription: cache.subscribe(SearchQueryKey::new("", settings.max_results), false),
      settings,
      debouncer,
    };
    controller.sync_subscription();
    controller
  }

  pub fn raw_input(&self) -> &str {
    &self.raw_input
  }

  pub fn committed_query(&self) -> &str {
    &self.committed_query
  }

  pub fn sort_order(&self) -> SortOrder {
    self.settings.sort_order
  }

  pub fn subscription(&self) -> &Subscription {
    &self.subscription
  }

  /// Input changed but has not settled into a query yet.
  pub fn is_typing(&self) -> bool {
    self.debouncer.is_pending()
  }

  /// Replace the raw input and restart the debounce timer.
  /// Input beyond the maximum query length is cut off.
  pub fn set_input(&mut self, raw: impl Into<String>) {
    let mut raw = raw.into();
    if let Some((idx, _)) = raw.char_indices().nth(self.settings.max_chars) {
      raw.truncate(idx);
    }
    if raw == self.raw_input {
      return;
    }
    self.raw_input = raw.clone();
    self.debouncer.push(raw);
  }

  /// Advance the debounce timer. Returns true when a new query was committed.
  pub fn tick(&mut self) -> bool {
    let Some(settled) = self.debouncer.poll() else { return false };
    if settled == self.committed_query {
      return false;
    }
    debug!(query = %settled, "search: committed");
    self.committed_query = settled;
    self.sync_subscription();
    true
  }

  /// Commit the current input immediately, bypassing the debounce.
  pub fn submit(&mut self) -> bool {
    self.debouncer.cancel();
    if self.raw_input == self.committed_query {
      return false;
    }
    debug!(query = %self.raw_input, "search: submitted");
    self.committed_query = self.raw_input.clone();
    self.sync_subscription();
    true
  }

  /// Empty the query immediately, bypassing the debounce.
  pub fn clear(&mut self) {
    self.debouncer.cancel();
    self.raw_input.clear();
    self.committed_query.clear();
    self.sync_subscription();
  }

  pub fn set_sort_order(&mut self, order: SortOrder) {
    if order == self.settings.sort_order {
      return;
    }
    info!(order = order.label(), "search: sort order changed");
    self.settings.sort_order = order;
    self.sync_subscription();
  }

  pub fn request_next_page(&self) -> Option<PendingFetch> {
    self.subscription.fetch_next_page()
  }

  pub fn retry(&self) -> Option<PendingFetch> {
    self.subscription.retry()
  }

  pub fn refresh(&self) -> Option<PendingFetch> {
    self.subscription.invalidate()
  }

  fn query(&self) -> &str {
    self.committed_query.trim()
  }

  fn is_searchable(&self) -> bool {
    self.query().chars().count() >= self.settings.min_chars
  }

  fn key(&self) -> SearchQueryKey {
    let (order, _) = self.settings.sort_order.upstream();
    SearchQueryKey::new(self.query(), self.settings.max_results)
      .with_order(order)
      .with_result_type(self.settings.result_type)
  }

  fn sync_subscription(&mut self) {
    let key = self.key();
    let enabled = self.is_searchable();
    self.subscription.update(key, enabled);
  }

  pub fn read(&self) -> ResultsView {
    if !self.is_searchable() {
      return ResultsView::gated(self.settings.min_chars.saturating_sub(self.query().chars().count()));
    }
    let (_, reverse) = self.settings.sort_order.upstream();
    ResultsView::from_query(self.subscription.view(), reverse)
  }
}

// --- Category carousels ---

/// A home screen row pre-seeded with a category name.
pub struct CategoryFeed {
  category: String,
  subscription: Subscription,
}

impl CategoryFeed {
  pub fn new(cache: &SearchCache, category: impl Into<String>, max_results: u32) -> Self {
    let category = category.into();
    let subscription = cache.subscribe(SearchQueryKey::new(category.clone(), max_results), true);
    Self { category, subscription }
  }

  pub fn category(&self) -> &str {
    &self.category
  }

  pub fn subscription(&self) -> &Subscription {
    &self.subscription
  }

  pub fn request_next_page(&self) -> Option<PendingFetch> {
    self.subscription.fetch_next_page()
  }

  pub fn retry(&self) -> Option<PendingFetch> {
    self.subscription.retry()
  }

  pub fn read(&self) -> ResultsView {
    ResultsView::from_query(self.subscription.view(), false)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::CacheOptions;
  use crate::testing::{ScriptedTransport, page};
  use std::sync::Arc;

  const DEBOUNCE: Duration = Duration::from_millis(500);

  fn settings() -> SearchSettings {
    SearchSettings {
      debounce: DEBOUNCE,
      min_chars: 3,
      max_chars: 100,
      max_results: 10,
      result_type: ResultType::Video,
      sort_order: SortOrder::Relevance,
    }
  }

  fn cache_with(transport: &Arc<ScriptedTransport>) -> SearchCache {
    SearchCache::new(
      transport.clone(),
      CacheOptions { stale_time: Duration::from_secs(300), gc_time: Duration::from_secs(1800) },
    )
  }

  async fn commit(controller: &mut SearchController, input: &str) {
    controller.set_input(input);
    tokio::time::advance(DEBOUNCE).await;
    assert!(controller.tick());
    controller.subscription().settled().await;
  }

  fn ids(view: &ResultsView) -> Vec<&str> {
    view.display_records.iter().map(|r| r.id.as_str()).collect()
  }

  // --- SortOrder ---

  #[test]
  fn sort_order_mapping_keeps_reversal_with_date_asc() {
    assert_eq!(SortOrder::Relevance.upstream(), (Order::Relevance, false));
    assert_eq!(SortOrder::DateDesc.upstream(), (Order::Date, false));
    assert_eq!(SortOrder::DateAsc.upstream(), (Order::Date, true));
  }

  #[test]
  fn sort_order_from_config() {
    assert_eq!(SortOrder::from_config("date-asc"), SortOrder::DateAsc);
    assert_eq!(SortOrder::from_config("DATE"), SortOrder::DateDesc);
    assert_eq!(SortOrder::from_config("bogus"), SortOrder::Relevance);
    for order in SortOrder::ALL {
      assert_eq!(SortOrder::from_config(order.config_name()), order);
    }
  }

  #[test]
  fn sort_order_cycles() {
    assert_eq!(SortOrder::Relevance.next(), SortOrder::DateDesc);
    assert_eq!(SortOrder::DateAsc.next(), SortOrder::Relevance);
  }

  // --- Debouncer ---

  #[tokio::test(start_paused = true)]
  async fn debouncer_waits_for_quiet_period() {
    let mut debouncer = Debouncer::new(DEBOUNCE);
    assert!(debouncer.poll().is_none());
    debouncer.push("a".to_string());
    tokio::time::advance(Duration::from_millis(400)).await;
    debouncer.push("ab".to_string());
    tokio::time::advance(Duration::from_millis(400)).await;
    assert!(debouncer.poll().is_none());
    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(debouncer.poll().as_deref(), Some("ab"));
    assert!(!debouncer.is_pending());
  }

  // --- Notice ---

  #[test]
  fn notices_have_distinct_messages() {
    let more = Notice::EnterMoreCharacters { needed: 1 }.message("Re").unwrap();
    let failed = Notice::Failed(TransportError::Network("x".into())).message("React").unwrap();
    let quota = Notice::Failed(TransportError::from_status(403, "x".into())).message("React").unwrap();
    let empty = Notice::NoResults.message("React").unwrap();
    assert_eq!(more, "Enter 1 more character to search");
    assert_eq!(quota, "YouTube API quota exceeded or invalid API key");
    assert_eq!(empty, "No results found for 'React'");
    assert_ne!(failed, quota);
    assert!(Notice::Results.message("React").is_none());
  }

  // --- SearchController ---

  #[tokio::test(start_paused = true)]
  async fn keystrokes_are_debounced_into_one_request() {
    let transport = ScriptedTransport::new();
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());

    for input in ["R", "Re", "React"] {
      controller.set_input(input);
      tokio::time::advance(Duration::from_millis(100)).await;
      assert!(!controller.tick());
    }
    assert_eq!(transport.call_count(), 0);

    tokio::time::advance(DEBOUNCE).await;
    assert!(controller.tick());
    controller.subscription().settled().await;

    let calls = transport.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].key.query, "React");
  }

  #[tokio::test(start_paused = true)]
  async fn short_queries_are_gated_not_failed() {
    let transport = ScriptedTransport::new();
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());

    assert_eq!(controller.read().notice, Notice::EnterMoreCharacters { needed: 3 });
    commit(&mut controller, "Re").await;
    let view = controller.read();
    assert_eq!(view.status, FetchStatus::Idle);
    assert_eq!(view.notice, Notice::EnterMoreCharacters { needed: 1 });
    assert!(!view.notice.is_error());
    assert_eq!(transport.call_count(), 0);
  }

  #[tokio::test(start_paused = true)]
  async fn single_page_result_has_no_next_page() {
    let transport = ScriptedTransport::new();
    transport.respond("React Native", None, Ok(page(&["a", "b"], None)));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());
    commit(&mut controller, "React Native").await;

    let view = controller.read();
    assert_eq!(view.status, FetchStatus::Success);
    assert!(!view.has_next_page);
    assert_eq!(view.display_records.len(), 2);
    assert_eq!(view.notice, Notice::Results);

    assert!(controller.request_next_page().is_none());
    assert_eq!(transport.call_count(), 1);
    assert_eq!(controller.read(), view);
  }

  #[tokio::test(start_paused = true)]
  async fn pagination_chains_cursor_and_merges_pages() {
    let transport = ScriptedTransport::new();
    transport.respond("React", None, Ok(page(&["a", "b"], Some("next-token"))));
    transport.respond("React", Some("next-token"), Ok(page(&["c"], None)));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());
    commit(&mut controller, "React").await;
    assert!(controller.read().has_next_page);

    controller.request_next_page().unwrap().await.unwrap();
    let view = controller.read();
    assert_eq!(view.display_records.len(), 3);
    assert!(!view.has_next_page);
    assert_eq!(transport.calls()[1].cursor.as_deref(), Some("next-token"));
  }

  #[tokio::test(start_paused = true)]
  async fn date_asc_requests_date_and_reverses_locally() {
    let transport = ScriptedTransport::new();
    transport.respond("React", None, Ok(page(&["A", "B"], Some("t1"))));
    transport.respond("React", Some("t1"), Ok(page(&["B", "C"], None)));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());
    controller.set_sort_order(SortOrder::DateAsc);
    commit(&mut controller, "React").await;
    controller.request_next_page().unwrap().await.unwrap();

    assert_eq!(transport.calls()[0].key.order, Order::Date);
    assert_eq!(ids(&controller.read()), ["C", "B", "A"]);
  }

  #[tokio::test(start_paused = true)]
  async fn switching_between_date_orders_reuses_cached_pages() {
    let transport = ScriptedTransport::new();
    transport.respond("React", None, Ok(page(&["A", "B"], None)));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());
    controller.set_sort_order(SortOrder::DateDesc);
    commit(&mut controller, "React").await;
    assert_eq!(ids(&controller.read()), ["A", "B"]);

    controller.set_sort_order(SortOrder::DateAsc);
    assert_eq!(ids(&controller.read()), ["B", "A"]);
    assert_eq!(transport.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn clear_detaches_immediately() {
    let transport = ScriptedTransport::new();
    transport.respond("React", None, Ok(page(&["a"], None)));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());
    commit(&mut controller, "React").await;
    controller.set_input("React Nat");

    controller.clear();
    assert_eq!(controller.raw_input(), "");
    assert_eq!(controller.committed_query(), "");
    assert!(controller.read().display_records.is_empty());
    tokio::time::advance(DEBOUNCE).await;
    assert!(!controller.tick());
    assert_eq!(transport.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn empty_results_and_failures_are_distinct() {
    let transport = ScriptedTransport::new();
    transport.respond("nothing here", None, Ok(page(&[], None)));
    transport.respond("broken", None, Err(TransportError::from_status(400, "bad".into())));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());

    commit(&mut controller, "nothing here").await;
    assert_eq!(controller.read().notice, Notice::NoResults);

    commit(&mut controller, "broken").await;
    let view = controller.read();
    assert_eq!(view.status, FetchStatus::Error);
    assert!(view.notice.is_error());
  }

  #[tokio::test(start_paused = true)]
  async fn submit_skips_the_debounce() {
    let transport = ScriptedTransport::new();
    transport.respond("Rust async", None, Ok(page(&["a"], None)));
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, settings());
    controller.set_input("Rust async");
    assert!(controller.submit());
    assert!(!controller.submit());
    controller.subscription().settled().await;
    assert_eq!(ids(&controller.read()), ["a"]);

    tokio::time::advance(DEBOUNCE).await;
    assert!(!controller.tick());
    assert_eq!(transport.call_count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn input_is_capped_at_max_length() {
    let transport = ScriptedTransport::new();
    let cache = cache_with(&transport);
    let mut controller = SearchController::new(&cache, SearchSettings { max_chars: 5, ..settings() });
    controller.set_input("abcdefgh");
    assert_eq!(controller.raw_input(), "abcde");
  }

  // --- CategoryFeed ---

  #[tokio::test]
  async fn category_feed_fetches_immediately() {
    let transport = ScriptedTransport::new();
    transport.respond("React Native", None, Ok(page(&["a", "b"], Some("t1"))));
    transport.respond("React Native", Some("t1"), Ok(page(&["b", "c"], None)));
    let cache = cache_with(&transport);
    let feed = CategoryFeed::new(&cache, "React Native", 10);
    assert_eq!(feed.read().notice, Notice::Loading);
    feed.subscription().settled().await;
    assert_eq!(feed.read().display_records.len(), 2);

    feed.request_next_page().unwrap().await.unwrap();
    assert_eq!(ids(&feed.read()), ["a", "b", "c"]);
    assert_eq!(feed.category(), "React Native");
  }
}
