use std::collections::HashSet;
use tracing::warn;

use crate::mapper::{DisplayRecord, map_record};
use crate::youtube::Page;

/// Flatten pages (in fetch order) into one list of display records.
///
/// Records are deduplicated by id, keeping the first occurrence at its original
/// position. Defective records are dropped individually. With `reverse` the
/// deduplicated list is reversed as the very last step.
pub fn aggregate<P: AsRef<Page>>(pages: &[P], reverse: bool) -> Vec<DisplayRecord> {
  let mut seen = HashSet::new();
  let mut records: Vec<DisplayRecord> = pages
    .iter()
    .flat_map(|page| page.as_ref().items.iter())
    .filter_map(|raw| match map_record(raw) {
      Ok(record) => Some(record),
      Err(defect) => {
        warn!(%defect, "aggregate: dropping malformed record");
        None
      }
    })
    .filter(|record| seen.insert(record.id.clone()))
    .collect();

  // Must stay after dedup, otherwise the last duplicate would win.
  if reverse {
    records.reverse();
  }
  records
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::testing::{page, raw_record};

  fn ids(records: &[DisplayRecord]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
  }

  #[test]
  fn empty_input_yields_nothing() {
    let pages: Vec<Page> = Vec::new();
    assert!(aggregate(&pages, false).is_empty());
    assert!(aggregate(&pages, true).is_empty());
  }

  #[test]
  fn flattens_in_fetch_order() {
    let pages = vec![page(&["a", "b"], Some("t1")), page(&["c"], None)];
    assert_eq!(ids(&aggregate(&pages, false)), ["a", "b", "c"]);
  }

  #[test]
  fn duplicate_across_pages_keeps_first_position() {
    let pages = vec![page(&["x", "a", "b"], Some("t1")), page(&["c", "x", "d"], None)];
    let records = aggregate(&pages, false);
    assert_eq!(ids(&records), ["x", "a", "b", "c", "d"]);
    assert_eq!(records.iter().filter(|r| r.id == "x").count(), 1);
  }

  #[test]
  fn later_duplicate_is_discarded_not_merged() {
    let mut second = page(&["a"], None);
    second.items[0].snippet.as_mut().unwrap().title = Some("renamed".to_string());
    let pages = vec![page(&["a"], Some("t1")), second];
    let records = aggregate(&pages, false);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Video a");
  }

  #[test]
  fn reversal_happens_after_dedup() {
    let pages = vec![page(&["A", "B"], Some("t1")), page(&["B", "C"], None)];
    assert_eq!(ids(&aggregate(&pages, true)), ["C", "B", "A"]);
  }

  #[test]
  fn malformed_record_is_dropped_without_losing_the_page() {
    let mut first = page(&["a", "b", "c"], None);
    first.items[1].snippet = None;
    first.items.push(raw_record(""));
    assert_eq!(ids(&aggregate(&[first], false)), ["a", "c"]);
  }
}
