//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available,
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // YouTube Data API
  pub api_base_url: String,
  pub api_key_env: String,

  // Paging
  pub default_max_results: u32,

  // Home screen carousels
  pub categories: Vec<String>,

  // Interactive search
  pub search_debounce_ms: u64,
  pub min_search_chars: usize,
  pub max_query_chars: usize,

  // Query cache
  pub stale_time_secs: u64,
  pub gc_time_secs: u64,

  pub load_more_threshold: usize,
}

impl Constants {
  pub fn search_debounce(&self) -> Duration {
    Duration::from_millis(self.search_debounce_ms)
  }

  pub fn stale_time(&self) -> Duration {
    Duration::from_secs(self.stale_time_secs)
  }

  pub fn gc_time(&self) -> Duration {
    Duration::from_secs(self.gc_time_secs)
  }
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn embedded_constants_parse() {
    let c = constants();
    assert!(c.api_base_url.starts_with("https://"));
    assert_eq!(c.categories.len(), 4);
    assert_eq!(c.min_search_chars, 3);
    assert!(c.default_max_results > 0);
  }

  #[test]
  fn durations_derive_from_raw_values() {
    let c = constants();
    assert_eq!(c.stale_time(), Duration::from_secs(300));
    assert_eq!(c.gc_time(), Duration::from_secs(1800));
    assert_eq!(c.search_debounce(), Duration::from_millis(500));
  }
}
