use chrono::{DateTime, Utc};

/// Provider statuses that still entitle the user to plan credits.
pub const LIVE_STATUSES: &[&str] = &["active", "trialing", "past_due"];

/// A row in the `subscriptions` table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRecord {
    pub id: String,
    pub user_id: String,
    pub stripe_subscription_id: String,
    pub stripe_customer_id: Option<String>,
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<DateTime<Utc>>,
    pub cancel_at_period_end: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionRecord {
    pub fn is_live(&self) -> bool {
        LIVE_STATUSES.contains(&self.status.as_str())
    }
}
