use chrono::{DateTime, Utc};

pub const VIDEO_QUEUED: &str = "queued";

/// A row in the `videos` table.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRecord {
    pub id: String,
    pub user_id: String,
    pub session_id: String,
    pub status: String,
    pub from_subscription: i64,
    pub from_overage: i64,
    pub created_at: DateTime<Utc>,
}
