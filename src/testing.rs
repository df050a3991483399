//! Test fixtures and a scripted transport double.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;

use crate::youtube::{Page, RawRecord, ResourceId, SearchQueryKey, SearchTransport, Snippet, Thumbnail, Thumbnails,
  TransportError};

pub fn raw_record(id: &str) -> RawRecord {
  let medium = Some(Thumbnail { url: format!("{}-medium.jpg", id) });
  RawRecord {
    id: ResourceId { video_id: Some(id.to_string()), ..Default::default() },
    snippet: Some(Snippet {
      published_at: Some("2024-01-01T00:00:00Z".to_string()),
      title: Some(format!("Video {}", id)),
      description: Some(format!("Description {}", id)),
      thumbnails: Thumbnails { medium },
      channel_title: Some("Channel".to_string()),
    }),
  }
}

pub fn page(ids: &[&str], next_cursor: Option<&str>) -> Page {
  Page {
    items: ids.iter().map(|id| raw_record(id)).collect(),
    next_cursor: next_cursor.map(str::to_string),
    total_results_reported: 100,
  }
}

/// One recorded `fetch_page` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
  pub key: SearchQueryKey,
  pub cursor: Option<String>,
}

/// Transport double answering from a script keyed by `(query, cursor)`.
///
/// Unscripted requests answer with an empty final page. When built with
/// [`ScriptedTransport::held`], every response waits for a permit from
/// [`ScriptedTransport::release`].
#[derive(Default)]
pub struct ScriptedTransport {
  responses: Mutex<HashMap<(String, Option<String>), Result<Page, TransportError>>>,
  calls: Mutex<Vec<Call>>,
  gate: Option<Semaphore>,
}

impl ScriptedTransport {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn held() -> Arc<Self> {
    Arc::new(Self { gate: Some(Semaphore::new(0)), ..Default::default() })
  }

  pub fn respond(&self, query: &str, cursor: Option<&str>, result: Result<Page, TransportError>) {
    self.responses.lock().unwrap().insert((query.to_string(), cursor.map(str::to_string)), result);
  }

  pub fn release(&self, n: usize) {
    if let Some(gate) = &self.gate {
      gate.add_permits(n);
    }
  }

  pub fn calls(&self) -> Vec<Call> {
    self.calls.lock().unwrap().clone()
  }

  pub fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

#[async_trait]
impl SearchTransport for ScriptedTransport {
  async fn fetch_page(&self, key: &SearchQueryKey, cursor: Option<&str>) -> Result<Page, TransportError> {
    self.calls.lock().unwrap().push(Call { key: key.clone(), cursor: cursor.map(str::to_string) });
    if let Some(gate) = &self.gate {
      gate.acquire().await.unwrap().forget();
    }
    self
      .responses
      .lock()
      .unwrap()
      .get(&(key.query.clone(), cursor.map(str::to_string)))
      .cloned()
      .unwrap_or_else(|| Ok(Page::default()))
  }
}
