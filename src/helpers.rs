use chrono::{DateTime, Utc};

/// Parse a kubectl timestamp (`2017-06-01T12:00:00Z`). Anything that is not
/// RFC 3339 is treated as absent.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s.trim())
        .ok()
        .map(|dt| dt.to_utc())
}

pub fn human_duration_secs(total_secs: i64) -> String {
    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else if total_secs < 86400 {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    } else {
        let days = total_secs / 86400;
        let hours = (total_secs % 86400) / 3600;
        format!("{}d{}h", days, hours)
    }
}

pub fn age_since(start: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match start {
        Some(t) => human_duration_secs((now - t).num_seconds().max(0)),
        None => String::new(),
    }
}

/// Shorten long names for summary text, keeping both ends.
pub fn truncate_middle(s: &str, max_chars: usize) -> String {
    let count = s.chars().count();
    if count <= max_chars {
        return s.to_string();
    }
    let half = max_chars / 2;
    let head: String = s.chars().take(half).collect();
    let tail: String = s.chars().skip(count - half).collect();
    format!("{}...{}", head, tail)
}
