//! Timestamp utilities

use chrono::{DateTime, SecondsFormat, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Current UTC time in the RFC 3339 form stored in every `*_at` column
pub fn now_rfc3339() -> String {
    now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
