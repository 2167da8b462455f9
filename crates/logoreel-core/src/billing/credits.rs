//! Credit balance arithmetic.
//!
//! A balance has two buckets: credits granted by the active subscription for
//! the current period, and overage credits (bonus grants and purchased
//! packs). Spending drains the subscription bucket first. The store applies
//! these rules inside its own transaction; nothing here touches storage.

use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::CoreError;

/// Largest absolute delta an admin may apply in one adjustment.
pub const MAX_ADJUSTMENT: i64 = 1000;
/// Inclusive bounds on the length (in characters) of an adjustment reason.
pub const REASON_MIN_CHARS: u64 = 10;
pub const REASON_MAX_CHARS: u64 = 500;

/// Credits consumed by one video render.
pub const CREDITS_PER_VIDEO: i64 = 1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalance {
    pub subscription_credits: i64,
    pub overage_credits: i64,
}

/// Which buckets a debit was taken from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditDraw {
    pub from_subscription: i64,
    pub from_overage: i64,
}

impl CreditBalance {
    pub fn new(subscription_credits: i64, overage_credits: i64) -> Self {
        Self {
            subscription_credits,
            overage_credits,
        }
    }

    pub fn total(&self) -> i64 {
        self.subscription_credits + self.overage_credits
    }

    /// Take `amount` credits, subscription bucket first.
    pub fn draw(&self, amount: i64) -> Result<(CreditBalance, CreditDraw), CoreError> {
        if amount < 0 {
            return Err(CoreError::Validation(format!("cannot draw a negative amount ({amount})")));
        }
        if amount > self.total() {
            return Err(CoreError::InsufficientCredits {
                requested: amount,
                available: self.total(),
            });
        }
        let from_subscription = amount.min(self.subscription_credits.max(0));
        let from_overage = amount - from_subscription;
        let next = CreditBalance {
            subscription_credits: self.subscription_credits - from_subscription,
            overage_credits: self.overage_credits - from_overage,
        };
        Ok((
            next,
            CreditDraw {
                from_subscription,
                from_overage,
            },
        ))
    }

    /// Apply an admin adjustment.
    ///
    /// Grants land in the overage bucket. Removals come out of overage first,
    /// then out of the subscription bucket; the total may not go negative.
    pub fn apply_adjustment(&self, delta: i64) -> Result<CreditBalance, CoreError> {
        if delta >= 0 {
            return Ok(CreditBalance {
                subscription_credits: self.subscription_credits,
                overage_credits: self.overage_credits + delta,
            });
        }

        let removal = -delta;
        if removal > self.total() {
            return Err(CoreError::InsufficientCredits {
                requested: removal,
                available: self.total(),
            });
        }
        let from_overage = removal.min(self.overage_credits.max(0));
        Ok(CreditBalance {
            subscription_credits: self.subscription_credits - (removal - from_overage),
            overage_credits: self.overage_credits - from_overage,
        })
    }
}

/// An admin's request to change a user's balance.
#[derive(Debug, Clone, PartialEq, Eq, Validate, Serialize, Deserialize)]
pub struct CreditAdjustment {
    pub user_id: String,
    #[validate(range(min = -1000, max = 1000, message = "delta must be between -1000 and 1000"))]
    pub delta: i64,
    #[validate(length(min = 10, max = 500, message = "reason must be 10 to 500 characters"))]
    pub reason: String,
}

impl CreditAdjustment {
    /// Check every rule and return the adjustment with a trimmed reason.
    ///
    /// Runs before any store call so bad input never reaches the ledger.
    pub fn validated(self) -> Result<CreditAdjustment, CoreError> {
        let adjustment = CreditAdjustment {
            user_id: self.user_id.trim().to_owned(),
            delta: self.delta,
            reason: self.reason.trim().to_owned(),
        };
        adjustment
            .validate()
            .map_err(|e| CoreError::Validation(e.to_string()))?;
        Uuid::parse_str(&adjustment.user_id)
            .map_err(|_| CoreError::Validation(format!("user_id '{}' is not a UUID", adjustment.user_id)))?;
        Ok(adjustment)
    }
}
