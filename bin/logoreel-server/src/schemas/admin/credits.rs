use logoreel_core::billing::CreditAdjustment;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::entities::CreditTransaction;
use crate::schemas::v1::credits::CreditBalanceResponse;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdjustCreditsRequest {
    /// UUID of the user whose balance changes.
    pub user_id: String,
    /// Signed change, -1000 to 1000.
    pub delta: i64,
    /// Audit note, 10 to 500 characters.
    pub reason: String,
}

impl From<AdjustCreditsRequest> for CreditAdjustment {
    fn from(req: AdjustCreditsRequest) -> Self {
        CreditAdjustment {
            user_id: req.user_id,
            delta: req.delta,
            reason: req.reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AdjustCreditsResponse {
    pub user_id: String,
    pub delta: i64,
    pub balance: CreditBalanceResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TransactionResponse {
    pub id: String,
    pub kind: String,
    pub delta: i64,
    pub reason: String,
    pub admin_id: Option<String>,
    pub created_at: String,
}

impl CreditTransaction {
    pub fn to_response(&self) -> TransactionResponse {
        TransactionResponse {
            id: self.id.clone(),
            kind: self.kind.clone(),
            delta: self.delta,
            reason: self.reason.clone(),
            admin_id: self.admin_id.clone(),
            created_at: self.created_at.to_rfc3339(),
        }
    }
}
