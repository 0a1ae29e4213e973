//! Timestamp utilities
//!
//! Timestamps are stored as RFC 3339 TEXT in the database and round-tripped
//! through these helpers so parse-error handling lives in one place.

use chrono::{DateTime, Utc};

use crate::{Error, Result};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Encode a timestamp for database storage
pub fn to_db(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

/// Decode a timestamp read from the database
pub fn from_db(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse timestamp {:?}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_now_returns_valid_timestamp() {
        let timestamp = now();
        // Should be a reasonable timestamp (after year 2000)
        assert!(timestamp.timestamp() > 946_684_800); // 2000-01-01 00:00:00 UTC
    }

    #[test]
    fn test_db_round_trip() {
        let ts = now();
        let decoded = from_db(&to_db(ts)).unwrap();
        assert_eq!(decoded, ts);
    }

    #[test]
    fn test_from_db_rejects_garbage() {
        assert!(from_db("yesterday").is_err());
    }
}
