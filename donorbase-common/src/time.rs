//! Timestamp utilities
//!
//! `last_updated` doubles as the optimistic-concurrency token, so it is
//! formatted with nanosecond precision and compared as an opaque string.

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp as an RFC 3339 concurrency token
pub fn token(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Fresh concurrency token for a write happening now
pub fn fresh_token() -> String {
    token(now())
}
