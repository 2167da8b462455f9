use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum TransactionKind {
    AdminAdjustment,
    SubscriptionGrant,
    PackPurchase,
    VideoRender,
}

/// A row in the `credit_transactions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct CreditTransaction {
    pub id: String,
    pub user_id: String,
    pub admin_id: Option<String>,
    pub kind: String,
    pub delta: i64,
    pub reason: String,
    pub created_at: DateTime<Utc>,
}
