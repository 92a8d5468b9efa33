use chrono::{DateTime, Utc};

/// Wall-clock timestamp used for every `*At` field in the workflow state.
pub type Timestamp = DateTime<Utc>;

pub fn now() -> Timestamp {
    Utc::now()
}
