use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

// --- Query identity ---

/// Kind of resource a search is restricted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultType {
  #[default]
  Video,
  Channel,
  Playlist,
}

impl ResultType {
  pub fn as_param(self) -> &'static str {
    match self {
      ResultType::Video => "video",
      ResultType::Channel => "channel",
      ResultType::Playlist => "playlist",
    }
  }
}

impl FromStr for ResultType {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "video" => Ok(ResultType::Video),
      "channel" => Ok(ResultType::Channel),
      "playlist" => Ok(ResultType::Playlist),
      other => Err(format!("unknown result type '{}'", other)),
    }
  }
}

/// Upstream sort order. There is no ascending date order upstream.
#[allow(dead_code)] // only relevance and date are offered in the sort menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Order {
  #[default]
  Relevance,
  Date,
  Rating,
  Title,
  ViewCount,
  VideoCount,
}

impl Order {
  pub fn as_param(self) -> &'static str {
    match self {
      Order::Relevance => "relevance",
      Order::Date => "date",
      Order::Rating => "rating",
      Order::Title => "title",
      Order::ViewCount => "viewCount",
      Order::VideoCount => "videoCount",
    }
  }
}

/// Identifies one logically distinct paginated result stream.
///
/// Two subscriptions with equal keys share cached pages; changing any field
/// starts a new stream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SearchQueryKey {
  pub query: String,
  pub max_results: u32,
  pub result_type: ResultType,
  pub order: Order,
}

impl SearchQueryKey {
  pub fn new(query: impl Into<String>, max_results: u32) -> Self {
    Self { query: query.into(), max_results, result_type: ResultType::Video, order: Order::Relevance }
  }

  pub fn with_order(mut self, order: Order) -> Self {
    self.order = order;
    self
  }

  pub fn with_result_type(mut self, result_type: ResultType) -> Self {
    self.result_type = result_type;
    self
  }

  /// Whether this key may be sent upstream at all.
  pub fn is_fetchable(&self) -> bool {
    !self.query.is_empty() && self.max_results > 0
  }
}

// --- Wire types ---
//
// Only the fields the mapper reads are decoded; serde skips the rest.

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceId {
  pub video_id: Option<String>,
  pub channel_id: Option<String>,
  pub playlist_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Thumbnail {
  pub url: String,
}

/// Thumbnail tiers. Lists show the `medium` tier only.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Thumbnails {
  pub medium: Option<Thumbnail>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snippet {
  pub published_at: Option<String>,
  pub title: Option<String>,
  pub description: Option<String>,
  #[serde(default)]
  pub thumbnails: Thumbnails,
  pub channel_title: Option<String>,
}

/// One search result as delivered by the API.
///
/// Every field is optional here so that a single malformed record never fails
/// the whole page; required fields are checked by the mapper.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawRecord {
  #[serde(default)]
  pub id: ResourceId,
  pub snippet: Option<Snippet>,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
  #[serde(default)]
  total_results: u64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
  #[serde(default)]
  items: Vec<RawRecord>,
  next_page_token: Option<String>,
  #[serde(default)]
  page_info: PageInfo,
}

/// One fetched page. Immutable once fetched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
  pub items: Vec<RawRecord>,
  /// Absent means there are no further pages, regardless of `items.len()`.
  pub next_cursor: Option<String>,
  pub total_results_reported: u64,
}

impl AsRef<Page> for Page {
  fn as_ref(&self) -> &Page {
    self
  }
}

impl From<SearchListResponse> for Page {
  fn from(response: SearchListResponse) -> Self {
    Page {
      items: response.items,
      next_cursor: response.next_page_token.filter(|token| !token.is_empty()),
      total_results_reported: response.page_info.total_results,
    }
  }
}

// --- Errors ---

/// Failure talking to the video API. No partial page accompanies it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
  #[error("invalid request (HTTP {status}): {message}")]
  BadRequest { status: u16, message: String },
  #[error("API key rejected or quota exceeded (HTTP {status}): {message}")]
  Forbidden { status: u16, message: String },
  #[error("unexpected HTTP {status}: {message}")]
  Status { status: u16, message: String },
  #[error("network failure: {0}")]
  Network(String),
  #[error("malformed response: {0}")]
  Decode(String),
  #[error("fetch task aborted: {0}")]
  Aborted(String),
}

impl TransportError {
  pub fn from_status(status: u16, message: String) -> Self {
    match status {
      400 => TransportError::BadRequest { status, message },
      403 => TransportError::Forbidden { status, message },
      _ => TransportError::Status { status, message },
    }
  }

  /// HTTP status code, if the server answered at all.
  pub fn status(&self) -> Option<u16> {
    match self {
      TransportError::BadRequest { status, .. }
      | TransportError::Forbidden { status, .. }
      | TransportError::Status { status, .. } => Some(*status),
      _ => None,
    }
  }

  /// Credential or quota failures need a dedicated message in the UI.
  pub fn is_forbidden(&self) -> bool {
    matches!(self, TransportError::Forbidden { .. })
  }

  pub fn is_connectivity(&self) -> bool {
    matches!(self, TransportError::Network(_))
  }
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
  error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
  message: String,
}

/// Pull the human-readable message out of a Google API error body.
/// Falls back to the raw body (trimmed) when it isn't the expected JSON shape.
fn api_error_message(body: &str) -> String {
  match serde_json::from_str::<ApiErrorEnvelope>(body) {
    Ok(envelope) => envelope.error.message,
    Err(_) => body.trim().chars().take(200).collect(),
  }
}

// --- Transport ---

/// Issues a single paginated search request.
///
/// Implementations never retry; retry policy belongs to the caller.
#[async_trait]
pub trait SearchTransport: Send + Sync {
  async fn fetch_page(&self, key: &SearchQueryKey, cursor: Option<&str>) -> Result<Page, TransportError>;
}

/// YouTube Data API v3 client.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
  http: Client,
  base_url: String,
  api_key: String,
}

impl YouTubeClient {
  pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self { http: Client::new(), base_url: base_url.into(), api_key: api_key.into() }
  }

  fn endpoint_url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url, TransportError> {
    let base = format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'));
    let params = params.iter().copied().chain(std::iter::once(("key", self.api_key.as_str())));
    Url::parse_with_params(&base, params)
      .map_err(|e| TransportError::BadRequest { status: 400, message: e.to_string() })
  }

  async fn get<T: DeserializeOwned>(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<T, TransportError> {
    let url = self.endpoint_url(endpoint, params)?;
    let response = self.http.get(url).send().await.map_err(|e| TransportError::Network(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      let body = response.text().await.unwrap_or_default();
      let err = TransportError::from_status(status.as_u16(), api_error_message(&body));
      if err.is_forbidden() {
        warn!(status = status.as_u16(), "youtube: API quota exceeded or invalid API key");
      } else {
        warn!(status = status.as_u16(), endpoint, "youtube: request rejected");
      }
      return Err(err);
    }

    response.json::<T>().await.map_err(|e| TransportError::Decode(e.to_string()))
  }

  /// Fetch full metadata for a single video.
  pub async fn video_details(&self, video_id: &str) -> Result<VideoDetails, TransportError> {
    let response: VideoListResponse =
      self.get("videos", &[("part", "snippet,contentDetails,statistics"), ("id", video_id)]).await?;
    let item = response
      .items
      .into_iter()
      .next()
      .ok_or_else(|| TransportError::Status { status: 404, message: format!("video {} not found", video_id) })?;
    Ok(VideoDetails::from_item(item))
  }
}

#[async_trait]
impl SearchTransport for YouTubeClient {
  async fn fetch_page(&self, key: &SearchQueryKey, cursor: Option<&str>) -> Result<Page, TransportError> {
    let max_results = key.max_results.to_string();
    let mut params = vec![
      ("part", "snippet"),
      ("q", key.query.as_str()),
      ("type", key.result_type.as_param()),
      ("maxResults", max_results.as_str()),
      ("order", key.order.as_param()),
    ];
    if let Some(cursor) = cursor {
      params.push(("pageToken", cursor));
    }
    debug!(query = %key.query, order = key.order.as_param(), cursor = ?cursor, "youtube: GET /search");
    let response: SearchListResponse = self.get("search", &params).await?;
    Ok(Page::from(response))
  }
}

// --- Video details ---

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContentDetails {
  duration: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
  view_count: Option<String>,
  like_count: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
  id: String,
  #[serde(default)]
  snippet: Snippet,
  #[serde(default)]
  content_details: ContentDetails,
  #[serde(default)]
  statistics: Statistics,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
  #[serde(default)]
  items: Vec<VideoItem>,
}

/// Metadata shown on the video screen.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoDetails {
  pub id: String,
  pub url: String,
  pub title: String,
  pub channel_title: Option<String>,
  pub published_at: Option<String>,
  pub description: Option<String>,
  /// ISO-8601 duration, e.g. `PT4M13S`.
  pub duration: Option<String>,
  pub view_count: Option<u64>,
  pub like_count: Option<u64>,
}

impl VideoDetails {
  fn from_item(item: VideoItem) -> Self {
    let count = |s: Option<String>| s.and_then(|s| s.parse::<u64>().ok());
    VideoDetails {
      url: format!("https://youtube.com/watch?v={}", item.id),
      title: item.snippet.title.unwrap_or_else(|| item.id.clone()),
      id: item.id,
      channel_title: item.snippet.channel_title,
      published_at: item.snippet.published_at,
      description: item.snippet.description.filter(|d| !d.is_empty()),
      duration: item.content_details.duration,
      view_count: count(item.statistics.view_count),
      like_count: count(item.statistics.like_count),
    }
  }
}
