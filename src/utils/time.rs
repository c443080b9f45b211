use chrono::{DateTime, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Seconds elapsed since `since`, never negative.
pub fn seconds_since(since: DateTime<Utc>) -> i64 {
    (now() - since).num_seconds().max(0)
}
