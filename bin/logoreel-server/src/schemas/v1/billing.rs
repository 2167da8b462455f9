use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::entities::SubscriptionRecord;

/// Start a subscription checkout (or switch plan) for `plan`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanRequest {
    /// `starter`, `pro` or `agency`.
    pub plan: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreditPackRequest {
    /// Number of packs to buy.
    #[serde(default = "one")]
    #[validate(range(min = 1, max = 20, message = "quantity must be between 1 and 20"))]
    pub quantity: i64,
}

fn one() -> i64 {
    1
}

/// A provider-hosted page the client should navigate to.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RedirectResponse {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionResponse {
    pub plan: String,
    pub status: String,
    pub current_period_end: Option<String>,
    pub cancel_at_period_end: bool,
    pub monthly_credits: Option<i64>,
}

impl SubscriptionRecord {
    pub fn to_response(&self) -> SubscriptionResponse {
        SubscriptionResponse {
            plan: self.plan.clone(),
            status: self.status.clone(),
            current_period_end: self.current_period_end.map(|t| t.to_rfc3339()),
            cancel_at_period_end: self.cancel_at_period_end,
            monthly_credits: logoreel_core::billing::Plan::parse(&self.plan)
                .ok()
                .map(|p| p.monthly_credits()),
        }
    }
}
