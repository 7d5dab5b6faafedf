//! Parses `since` window arguments: either a relative duration (`30d`, `12h`) or an
//! absolute ISO-8601 timestamp. Grounded in the original `parse_since` helper used
//! throughout the GitHub provider.

use chrono::{DateTime, Duration, Utc};

/// Resolves a `since` argument against the current instant.
///
/// - `"30d"` / `"12h"` resolve to `now - N`.
/// - Anything else is parsed as RFC3339; a timestamp missing a zone is assumed UTC.
/// - Unparseable input returns `None` (caller decides whether to forward it verbatim).
pub fn parse_since(input: &str) -> Option<DateTime<Utc>> {
    let trimmed = input.trim();
    if let Some(days) = trimmed.strip_suffix('d') {
        if let Ok(n) = days.parse::<i64>() {
            return Some(Utc::now() - Duration::days(n));
        }
    }
    if let Some(hours) = trimmed.strip_suffix('h') {
        if let Ok(n) = hours.parse::<i64>() {
            return Some(Utc::now() - Duration::hours(n));
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

/// Clamps `since` so it never reaches further back than `now - max_days`, when given.
pub fn clamp_since(since: Option<DateTime<Utc>>, max_days: Option<u32>) -> Option<DateTime<Utc>> {
    match (since, max_days) {
        (Some(s), Some(max)) => {
            let floor = Utc::now() - Duration::days(max as i64);
            Some(s.max(floor))
        }
        (Some(s), None) => Some(s),
        (None, Some(max)) => Some(Utc::now() - Duration::days(max as i64)),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relative_days() {
        let now = Utc::now();
        let since = parse_since("30d").unwrap();
        let delta = now - since;
        assert!((delta.num_seconds() - 30 * 86400).abs() < 5);
    }

    #[test]
    fn parses_relative_hours() {
        let now = Utc::now();
        let since = parse_since("12h").unwrap();
        let delta = now - since;
        assert!((delta.num_seconds() - 12 * 3600).abs() < 5);
    }

    #[test]
    fn parses_absolute_rfc3339() {
        let since = parse_since("2024-01-01T00:00:00Z").unwrap();
        assert_eq!(since.to_rfc3339(), "2024-01-01T00:00:00+00:00");
    }

    #[test]
    fn unparseable_returns_none() {
        assert!(parse_since("not-a-date").is_none());
    }

    #[test]
    fn clamp_floors_to_max_days() {
        let far = Utc::now() - Duration::days(400);
        let clamped = clamp_since(Some(far), Some(365)).unwrap();
        let floor = Utc::now() - Duration::days(365);
        assert!(clamped >= floor - Duration::seconds(2));
    }
}
