//! Display formatting for counts, durations and dates, plus input validators.

use chrono::{DateTime, Utc};

/// Format seconds as `h:mm:ss` or `m:ss`.
pub fn format_duration(total_secs: u64) -> String {
  let hours = total_secs / 3600;
  let minutes = (total_secs % 3600) / 60;
  let secs = total_secs % 60;
  if hours > 0 { format!("{}:{:02}:{:02}", hours, minutes, secs) } else { format!("{}:{:02}", minutes, secs) }
}

/// Parse an ISO-8601 video duration (`PT1H2M3S`, `P1DT2H`) into seconds.
pub fn parse_iso8601_duration(s: &str) -> Option<u64> {
  let rest = s.strip_prefix('P')?;
  let (date_part, time_part) = match rest.split_once('T') {
    Some((d, t)) => (d, t),
    None => (rest, ""),
  };
  if date_part.is_empty() && time_part.is_empty() {
    return None;
  }

  let mut total = 0u64;
  let mut parse_part = |part: &str, units: &[(char, u64)]| -> Option<()> {
    let mut number = String::new();
    for c in part.chars() {
      if c.is_ascii_digit() {
        number.push(c);
      } else {
        let (_, factor) = units.iter().find(|(unit, _)| *unit == c)?;
        let seconds = number.parse::<u64>().ok()?.checked_mul(*factor)?;
        total = total.checked_add(seconds)?;
        number.clear();
      }
    }
    number.is_empty().then_some(())
  };
  parse_part(date_part, &[('W', 604_800), ('D', 86_400)])?;
  parse_part(time_part, &[('H', 3600), ('M', 60), ('S', 1)])?;
  Some(total)
}

/// Compact count: `1.2K`, `3.4M`, `1.0B`, with an optional suffix.
pub fn format_number(count: u64, suffix: &str) -> String {
  let compact = |n: u64, div: f64, unit: &str| format!("{:.1}{}{}", n as f64 / div, unit, suffix);
  match count {
    n if n >= 1_000_000_000 => compact(n, 1e9, "B"),
    n if n >= 1_000_000 => compact(n, 1e6, "M"),
    n if n >= 1_000 => compact(n, 1e3, "K"),
    n => format!("{}{}", n, suffix),
  }
}

pub fn format_view_count(count: u64) -> String {
  format_number(count, " views")
}

/// Relative age of a publish date: `Today`, `Yesterday`, `3 days ago`, …
pub fn format_relative_date(published: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let days = (now - published).num_days().max(0);
  match days {
    0 => "Today".to_string(),
    1 => "Yesterday".to_string(),
    d if d < 7 => format!("{} days ago", d),
    d if d < 30 => plural(d / 7, "week"),
    d if d < 365 => plural(d / 30, "month"),
    d => plural(d / 365, "year"),
  }
}

fn plural(n: i64, unit: &str) -> String {
  if n == 1 { format!("1 {} ago", unit) } else { format!("{} {}s ago", n, unit) }
}

/// YouTube video ids are 11 characters of `[A-Za-z0-9_-]`.
pub fn is_valid_video_id(id: &str) -> bool {
  id.len() == 11 && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  // --- format_duration ---

  #[test]
  fn duration_minutes_and_hours() {
    assert_eq!(format_duration(0), "0:00");
    assert_eq!(format_duration(213), "3:33");
    assert_eq!(format_duration(3723), "1:02:03");
  }

  // --- parse_iso8601_duration ---

  #[test]
  fn iso_duration_parses_time_components() {
    assert_eq!(parse_iso8601_duration("PT3M33S"), Some(213));
    assert_eq!(parse_iso8601_duration("PT1H2M3S"), Some(3723));
    assert_eq!(parse_iso8601_duration("PT45S"), Some(45));
    assert_eq!(parse_iso8601_duration("P1DT1S"), Some(86_401));
  }

  #[test]
  fn iso_duration_rejects_garbage() {
    assert_eq!(parse_iso8601_duration(""), None);
    assert_eq!(parse_iso8601_duration("P"), None);
    assert_eq!(parse_iso8601_duration("3M"), None);
    assert_eq!(parse_iso8601_duration("PT3X"), None);
    assert_eq!(parse_iso8601_duration("PT12"), None);
  }

  #[test]
  fn iso_duration_overflow_is_none() {
    assert_eq!(parse_iso8601_duration("P99999999999999W"), None);
    assert_eq!(parse_iso8601_duration("P30500000000000DT99999999999999999H"), None);
    assert_eq!(parse_iso8601_duration("P1W"), Some(604_800));
  }

  // --- format_number ---

  #[test]
  fn number_compaction() {
    assert_eq!(format_number(999, ""), "999");
    assert_eq!(format_number(1_200, ""), "1.2K");
    assert_eq!(format_number(3_400_000, ""), "3.4M");
    assert_eq!(format_number(1_000_000_000, ""), "1.0B");
    assert_eq!(format_view_count(15_300), "15.3K views");
  }

  // --- format_relative_date ---

  #[test]
  fn relative_dates() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_date(now - Duration::hours(3), now), "Today");
    assert_eq!(format_relative_date(now - Duration::days(1), now), "Yesterday");
    assert_eq!(format_relative_date(now - Duration::days(4), now), "4 days ago");
    assert_eq!(format_relative_date(now - Duration::days(7), now), "1 week ago");
    assert_eq!(format_relative_date(now - Duration::days(65), now), "2 months ago");
    assert_eq!(format_relative_date(now - Duration::days(800), now), "2 years ago");
  }

  #[test]
  fn future_dates_read_as_today() {
    let now = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(format_relative_date(now + Duration::days(2), now), "Today");
  }

  // --- is_valid_video_id ---

  #[test]
  fn video_id_validation() {
    assert!(is_valid_video_id("dQw4w9WgXcQ"));
    assert!(is_valid_video_id("a_b-c_d-e_f"));
    assert!(!is_valid_video_id("short"));
    assert!(!is_valid_video_id("dQw4w9WgXc!"));
    assert!(!is_valid_video_id("dQw4w9WgXcQQ"));
  }
}
