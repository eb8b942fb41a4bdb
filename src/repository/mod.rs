//! Persistence gateway: diesel-async SQLite repository for conversations,
//! messages, and uploaded images.
//!
//! The pipeline talks to this module through the `pipeline::MessageStore`
//! trait; the HTTP handlers call the repository directly. Nothing outside
//! this module issues SQL.

mod conversations;
mod pool;
mod records;

pub use conversations::ConversationRepository;
pub use pool::{AsyncSqlitePool, DieselError};

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime_round_trip() {
        let now = Utc::now();
        let parsed = parse_datetime(&now.to_rfc3339());
        assert_eq!(parsed.timestamp(), now.timestamp());
    }

    #[test]
    fn test_parse_datetime_garbage_defaults_to_epoch() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
    }
}
