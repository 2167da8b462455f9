use logoreel_core::billing::CreditBalance;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreditBalanceResponse {
    pub subscription_credits: i64,
    pub overage_credits: i64,
    pub total: i64,
}

impl From<CreditBalance> for CreditBalanceResponse {
    fn from(balance: CreditBalance) -> Self {
        Self {
            subscription_credits: balance.subscription_credits,
            overage_credits: balance.overage_credits,
            total: balance.total(),
        }
    }
}
