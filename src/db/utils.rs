//! Database utility functions.

use chrono::{Duration, NaiveDateTime, Utc};

/// Timestamp format used for every stored datetime column.
///
/// Second precision, UTC, lexicographically sortable.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Generate a fresh entity id.
pub fn generate_entity_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Current UTC datetime as a stored-format string.
pub fn current_timestamp() -> String {
    Utc::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Stored-format string for now minus the given number of days.
pub fn timestamp_days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days))
        .format(TIMESTAMP_FORMAT)
        .to_string()
}

/// Parse a stored-format timestamp.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT).ok()
}

/// Minutes elapsed between a stored timestamp and now. None when the
/// stored value is unparseable.
pub fn minutes_since(s: &str) -> Option<i64> {
    let then = parse_timestamp(s)?;
    Some((Utc::now().naive_utc() - then).num_minutes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_ids_are_unique() {
        let a = generate_entity_id();
        let b = generate_entity_id();
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
    }

    #[test]
    fn timestamps_round_trip() {
        let now = current_timestamp();
        assert!(parse_timestamp(&now).is_some());
        assert!(minutes_since(&now).unwrap() <= 1);
    }

    #[test]
    fn days_ago_sorts_before_now() {
        assert!(timestamp_days_ago(14) < current_timestamp());
    }
}
