//! Query-identity cache for paginated searches.
//!
//! One [`SearchCache`] is constructed by the application and shared (it is a
//! cheap `Clone` handle) by every result list. Pages are partitioned by
//! [`SearchQueryKey`]; each key has at most one fetch in flight at any time.
//!
//! Fetches run on spawned tokio tasks. The in-flight registry keeps a
//! [`Shared`] handle to each so that concurrent callers attach to the same
//! operation. Dropping handles never cancels a fetch: a response arriving after
//! its subscriber moved on is still cached for later.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::constants::constants;
use crate::youtube::{Page, SearchQueryKey, SearchTransport, TransportError};

/// Handle to an in-flight fetch. Resolves once the cache has applied its result.
pub type PendingFetch = Shared<BoxFuture<'static, Result<(), TransportError>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
  Idle,
  LoadingFirstPage,
  Success,
  Error,
  FetchingNextPage,
}

/// Which operation a fetch (or failure) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchScope {
  FirstPage,
  NextPage,
  /// Re-fetch of a stale key while its pages stay on screen.
  Refresh,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchFailure {
  pub scope: FetchScope,
  pub error: TransportError,
}

#[derive(Debug, Clone, Copy)]
pub struct CacheOptions {
  /// How long fetched pages are served without a background refresh.
  pub stale_time: Duration,
  /// How long an unsubscribed key is retained before eviction.
  pub gc_time: Duration,
}

impl Default for CacheOptions {
  fn default() -> Self {
    Self { stale_time: constants().stale_time(), gc_time: constants().gc_time() }
  }
}

/// Snapshot of one key's state.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryView {
  pub pages: Vec<Arc<Page>>,
  pub status: FetchStatus,
  pub has_next_page: bool,
  pub failure: Option<FetchFailure>,
  pub is_refreshing: bool,
}

impl QueryView {
  pub fn idle() -> Self {
    Self { pages: Vec::new(), status: FetchStatus::Idle, has_next_page: false, failure: None, is_refreshing: false }
  }

  /// Total reported by the most recent page.
  pub fn total_results_reported(&self) -> u64 {
    self.pages.last().map_or(0, |page| page.total_results_reported)
  }
}

#[derive(Default)]
struct Entry {
  pages: Vec<Arc<Page>>,
  /// `cursors[i]` is the cursor `pages[i]` was fetched with; `cursors[0]` is `None`.
  cursors: Vec<Option<String>>,
  in_flight: Option<(FetchScope, PendingFetch)>,
  failure: Option<FetchFailure>,
  updated_at: Option<Instant>,
  subscribers: usize,
  idle_since: Option<Instant>,
}

impl Entry {
  fn status(&self) -> FetchStatus {
    match &self.in_flight {
      Some((FetchScope::FirstPage, _)) => return FetchStatus::LoadingFirstPage,
      Some((FetchScope::NextPage, _)) => return FetchStatus::FetchingNextPage,
      _ => {}
    }
    if self.failure.as_ref().is_some_and(|f| f.scope != FetchScope::Refresh) {
      FetchStatus::Error
    } else if self.pages.is_empty() {
      FetchStatus::Idle
    } else {
      FetchStatus::Success
    }
  }

  fn next_cursor(&self) -> Option<&str> {
    self.pages.last().and_then(|page| page.next_cursor.as_deref())
  }

  fn is_stale(&self, stale_time: Duration) -> bool {
    self.updated_at.is_none_or(|at| at.elapsed() >= stale_time)
  }

  fn view(&self) -> QueryView {
    QueryView {
      pages: self.pages.clone(),
      status: self.status(),
      has_next_page: self.next_cursor().is_some(),
      failure: self.failure.clone(),
      is_refreshing: matches!(self.in_flight, Some((FetchScope::Refresh, _))),
    }
  }
}

struct CacheInner {
  transport: Arc<dyn SearchTransport>,
  options: CacheOptions,
  entries: Mutex<HashMap<SearchQueryKey, Entry>>,
  generation: watch::Sender<u64>,
}

impl CacheInner {
  fn entries(&self) -> MutexGuard<'_, HashMap<SearchQueryKey, Entry>> {
    self.entries.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn notify(&self) {
    self.generation.send_modify(|generation| *generation = generation.wrapping_add(1));
  }

  /// Apply a finished fetch. The only writer of `pages` for a key.
  fn complete(
    &self,
    key: &SearchQueryKey,
    scope: FetchScope,
    result: Result<Vec<(Option<String>, Page)>, TransportError>,
  ) -> Result<(), TransportError> {
    let outcome = {
      let mut entries = self.entries();
      let entry = entries.entry(key.clone()).or_default();
      entry.in_flight = None;
      match result {
        Ok(fetched) => {
          let fetched = fetched.into_iter().map(|(cursor, page)| (cursor, Arc::new(page)));
          if scope == FetchScope::Refresh {
            let (cursors, pages): (Vec<_>, Vec<_>) = fetched.unzip();
            entry.cursors = cursors;
            entry.pages = pages;
          } else {
            for (cursor, page) in fetched {
              entry.cursors.push(cursor);
              entry.pages.push(page);
            }
          }
          entry.failure = None;
          entry.updated_at = Some(Instant::now());
          let has_next = entry.next_cursor().is_some();
          debug!(query = %key.query, ?scope, pages = entry.pages.len(), has_next, "cache: fetch applied");
          Ok(())
        }
        Err(error) => {
          warn!(query = %key.query, ?scope, %error, "cache: fetch failed");
          entry.failure = Some(FetchFailure { scope, error: error.clone() });
          Err(error)
        }
      }
    };
    self.notify();
    outcome
  }
}

/// Re-fetch up to `depth` pages from the start, chaining fresh cursors.
async fn refetch_pages(
  transport: &dyn SearchTransport,
  key: &SearchQueryKey,
  depth: usize,
) -> Result<Vec<(Option<String>, Page)>, TransportError> {
  let mut fetched = Vec::with_capacity(depth);
  let mut cursor: Option<String> = None;
  for _ in 0..depth {
    let page = transport.fetch_page(key, cursor.as_deref()).await?;
    let next = page.next_cursor.clone();
    fetched.push((cursor.take(), page));
    match next {
      Some(next) => cursor = Some(next),
      None => break,
    }
  }
  Ok(fetched)
}

/// Shared paginated query cache.
#[derive(Clone)]
pub struct SearchCache {
  inner: Arc<CacheInner>,
}

impl SearchCache {
  pub fn new(transport: Arc<dyn SearchTransport>, options: CacheOptions) -> Self {
    let (generation, _) = watch::channel(0);
    Self { inner: Arc::new(CacheInner { transport, options, entries: Mutex::new(HashMap::new()), generation }) }
  }

  /// Receiver that changes on every cache state transition.
  pub fn changes(&self) -> watch::Receiver<u64> {
    self.inner.generation.subscribe()
  }

  /// Subscribe to `key`. Ineligible subscriptions (`enabled == false` or a
  /// non-fetchable key) never touch the network and read as idle.
  pub fn subscribe(&self, key: SearchQueryKey, enabled: bool) -> Subscription {
    self.evict_idle();
    let mut subscription = Subscription { cache: self.clone(), key: key.clone(), enabled, attached: None };
    subscription.reevaluate();
    subscription
  }

  pub fn view(&self, key: &SearchQueryKey) -> QueryView {
    self.inner.entries().get(key).map_or_else(QueryView::idle, Entry::view)
  }

  /// The fetch currently in flight for `key`, if any.
  pub fn pending(&self, key: &SearchQueryKey) -> Option<PendingFetch> {
    self.inner.entries().get(key).and_then(|entry| entry.in_flight.as_ref().map(|(_, pending)| pending.clone()))
  }

  /// Request the page after the last fetched one.
  ///
  /// Returns `None` (and does nothing) unless the key is in `success` with a
  /// next cursor. A next-page fetch already in flight is returned instead of
  /// starting another one.
  pub fn fetch_next_page(&self, key: &SearchQueryKey) -> Option<PendingFetch> {
    let mut entries = self.inner.entries();
    let entry = entries.get_mut(key)?;
    if let Some((FetchScope::NextPage, pending)) = &entry.in_flight {
      return Some(pending.clone());
    }
    if entry.in_flight.is_some() || entry.status() != FetchStatus::Success || entry.next_cursor().is_none() {
      return None;
    }
    Some(self.start_fetch(entry, key, FetchScope::NextPage))
  }

  /// Re-issue whichever fetch last failed for `key`.
  pub fn retry(&self, key: &SearchQueryKey) -> Option<PendingFetch> {
    let mut entries = self.inner.entries();
    let entry = entries.get_mut(key)?;
    if entry.in_flight.is_some() {
      return None;
    }
    let failure = entry.failure.as_ref()?;
    let scope = if entry.pages.is_empty() { FetchScope::FirstPage } else { failure.scope };
    info!(query = %key.query, ?scope, "cache: retry");
    Some(self.start_fetch(entry, key, scope))
  }

  /// Mark `key` stale; refresh it right away if anyone is subscribed.
  pub fn invalidate(&self, key: &SearchQueryKey) -> Option<PendingFetch> {
    let mut entries = self.inner.entries();
    let entry = entries.get_mut(key)?;
    entry.updated_at = None;
    if entry.subscribers == 0 || entry.in_flight.is_some() {
      return None;
    }
    let scope = if entry.pages.is_empty() { FetchScope::FirstPage } else { FetchScope::Refresh };
    Some(self.start_fetch(entry, key, scope))
  }

  /// Drop entries nobody has subscribed to for at least `gc_time`.
  /// Returns the number of evicted keys.
  pub fn evict_idle(&self) -> usize {
    let gc_time = self.inner.options.gc_time;
    let mut entries = self.inner.entries();
    let before = entries.len();
    entries.retain(|key, entry| {
      let expired = entry.subscribers == 0
        && entry.in_flight.is_none()
        && entry.idle_since.is_some_and(|since| since.elapsed() >= gc_time);
      if expired {
        debug!(query = %key.query, "cache: evicting idle key");
      }
      !expired
    });
    let evicted = before - entries.len();
    if evicted > 0 {
      info!(evicted, remaining = entries.len(), "cache: evicted idle keys");
    }
    evicted
  }

  fn attach(&self, key: &SearchQueryKey) {
    let mut entries = self.inner.entries();
    let entry = entries.entry(key.clone()).or_default();
    entry.subscribers += 1;
    entry.idle_since = None;

    if entry.in_flight.is_some() {
      return;
    }
    if entry.pages.is_empty() {
      self.start_fetch(entry, key, FetchScope::FirstPage);
    } else if entry.is_stale(self.inner.options.stale_time) {
      info!(query = %key.query, "cache: stale hit, refreshing in background");
      self.start_fetch(entry, key, FetchScope::Refresh);
    } else {
      debug!(query = %key.query, pages = entry.pages.len(), "cache: fresh hit");
    }
  }

  fn detach(&self, key: &SearchQueryKey) {
    let mut entries = self.inner.entries();
    if let Some(entry) = entries.get_mut(key) {
      entry.subscribers = entry.subscribers.saturating_sub(1);
      if entry.subscribers == 0 {
        entry.idle_since = Some(Instant::now());
      }
    }
  }

  /// Spawn a fetch and register it as the key's in-flight operation.
  /// Must be called with the entries lock held so the task cannot complete
  /// before it is registered.
  fn start_fetch(&self, entry: &mut Entry, key: &SearchQueryKey, scope: FetchScope) -> PendingFetch {
    let inner = Arc::clone(&self.inner);
    let key = key.clone();
    let cursor = match scope {
      FetchScope::NextPage => entry.next_cursor().map(str::to_string),
      _ => None,
    };
    let depth = entry.pages.len().max(1);
    info!(query = %key.query, ?scope, cursor = ?cursor, "cache: fetch started");

    let task = tokio::spawn(async move {
      let result = match scope {
        FetchScope::Refresh => refetch_pages(inner.transport.as_ref(), &key, depth).await,
        _ => {
          let page = inner.transport.fetch_page(&key, cursor.as_deref()).await;
          page.map(|page| vec![(cursor, page)])
        }
      };
      inner.complete(&key, scope, result)
    });
    let pending: PendingFetch =
      async move { task.await.unwrap_or_else(|e| Err(TransportError::Aborted(e.to_string()))) }.boxed().shared();

    if scope != FetchScope::Refresh {
      entry.failure = None;
    }
    entry.in_flight = Some((scope, pending.clone()));
    self.inner.notify();
    pending
  }
}

/// A consumer's live interest in one key.
///
/// The key and `enabled` flag can change over time; eligibility is re-checked
/// on every change. Dropping the subscription lets the key age out.
pub struct Subscription {
  cache: SearchCache,
  key: SearchQueryKey,
  enabled: bool,
  /// Key whose subscriber count this subscription holds.
  attached: Option<SearchQueryKey>,
}

impl Subscription {
  pub fn is_eligible(&self) -> bool {
    self.enabled && self.key.is_fetchable()
  }

  /// Switch to another key and/or eligibility.
  pub fn update(&mut self, key: SearchQueryKey, enabled: bool) {
    if key == self.key && enabled == self.enabled {
      return;
    }
    self.key = key;
    self.enabled = enabled;
    self.reevaluate();
  }

  fn reevaluate(&mut self) {
    let target = self.is_eligible().then(|| self.key.clone());
    if target == self.attached {
      return;
    }
    if let Some(old) = self.attached.take() {
      debug!(query = %old.query, "subscription: detached");
      self.cache.detach(&old);
    }
    if let Some(key) = target {
      self.cache.attach(&key);
      self.attached = Some(key);
    } else {
      debug!(query = %self.key.query, enabled = self.enabled, "subscription: not eligible, skipping fetch");
    }
  }

  pub fn view(&self) -> QueryView {
    match &self.attached {
      Some(key) => self.cache.view(key),
      None => QueryView::idle(),
    }
  }

  pub fn fetch_next_page(&self) -> Option<PendingFetch> {
    self.attached.as_ref().and_then(|key| self.cache.fetch_next_page(key))
  }

  pub fn retry(&self) -> Option<PendingFetch> {
    self.attached.as_ref().and_then(|key| self.cache.retry(key))
  }

  pub fn invalidate(&self) -> Option<PendingFetch> {
    self.attached.as_ref().and_then(|key| self.cache.invalidate(key))
  }

  pub fn pending(&self) -> Option<PendingFetch> {
    self.attached.as_ref().and_then(|key| self.cache.pending(key))
  }

  /// Wait until no fetch is in flight for the attached key.
  pub async fn settled(&self) {
    while let Some(pending) = self.pending() {
      let _ = pending.await;
    }
  }
}

impl Drop for Subscription {
  fn drop(&mut self) {
    if let Some(key) = self.attached.take() {
      self.cache.detach(&key);
    }
  }
}
