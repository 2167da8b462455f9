pub mod credits;
pub mod direction;
pub mod profile;
pub mod subscription;
pub mod video;

pub use credits::CreditTransaction;
pub use direction::{DirectionMessageRecord, DirectionSessionRecord, SessionStatus};
pub use profile::ProfileRecord;
pub use subscription::SubscriptionRecord;
pub use video::VideoRecord;

use chrono::{DateTime, Utc};

/// Timestamps are stored as RFC 3339 text.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}
