use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Complete,
}

/// A row in the `direction_sessions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionSessionRecord {
    pub id: String,
    pub user_id: String,
    pub brand_name: String,
    pub brand_description: Option<String>,
    pub phase: u8,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row in the `direction_messages` table.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionMessageRecord {
    pub id: String,
    pub session_id: String,
    pub seq: i64,
    pub role: String,
    pub content: String,
    /// JSON-encoded `Vec<ChoiceOption>`.
    pub options_json: Option<String>,
    pub is_clarification: Option<bool>,
    pub created_at: DateTime<Utc>,
}
