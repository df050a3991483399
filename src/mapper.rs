use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

use crate::youtube::{RawRecord, ResultType};

/// Normalized record rendered by every result list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DisplayRecord {
  /// Stable external id; the deduplication key across pages.
  pub id: String,
  pub kind: ResultType,
  pub title: String,
  pub thumbnail_url: String,
  pub channel_title: String,
  pub published_at: DateTime<Utc>,
  pub description: Option<String>,
}

impl DisplayRecord {
  pub fn url(&self) -> String {
    match self.kind {
      ResultType::Video => format!("https://youtube.com/watch?v={}", self.id),
      ResultType::Channel => format!("https://youtube.com/channel/{}", self.id),
      ResultType::Playlist => format!("https://youtube.com/playlist?list={}", self.id),
    }
  }
}

/// A raw record lacking something every display record needs.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingDefect {
  #[error("record is missing `{0}`")]
  MissingField(&'static str),
  #[error("record has unparsable publish time `{0}`")]
  BadTimestamp(String),
}

/// Map one API record to its display shape.
///
/// The thumbnail is always the `medium` tier so that every list gets the same
/// aspect ratio. Optional upstream fields are copied through as-is.
pub fn map_record(raw: &RawRecord) -> Result<DisplayRecord, MappingDefect> {
  let (kind, id) = [
    (ResultType::Video, &raw.id.video_id),
    (ResultType::Channel, &raw.id.channel_id),
    (ResultType::Playlist, &raw.id.playlist_id),
  ]
  .into_iter()
  .find_map(|(kind, id)| id.as_ref().filter(|id| !id.is_empty()).map(|id| (kind, id)))
  .ok_or(MappingDefect::MissingField("id"))?;
  let snippet = raw.snippet.as_ref().ok_or(MappingDefect::MissingField("snippet"))?;
  let title = snippet.title.as_ref().ok_or(MappingDefect::MissingField("snippet.title"))?;
  let channel_title = snippet.channel_title.as_ref().ok_or(MappingDefect::MissingField("snippet.channelTitle"))?;
  let thumbnail =
    snippet.thumbnails.medium.as_ref().ok_or(MappingDefect::MissingField("snippet.thumbnails.medium"))?;
  let published_at = snippet.published_at.as_deref().ok_or(MappingDefect::MissingField("snippet.publishedAt"))?;
  let published_at = DateTime::parse_from_rfc3339(published_at)
    .map_err(|_| MappingDefect::BadTimestamp(published_at.to_string()))?
    .with_timezone(&Utc);

  Ok(DisplayRecord {
    id: id.clone(),
    kind,
    title: title.clone(),
    thumbnail_url: thumbnail.url.clone(),
    channel_title: channel_title.clone(),
    published_at,
    description: snippet.description.clone(),
  })
}
