//! Credits and subscription plans.

pub mod credits;
pub mod plans;

pub use credits::{CREDITS_PER_VIDEO, CreditAdjustment, CreditBalance, CreditDraw, MAX_ADJUSTMENT};
pub use plans::{Plan, PlanPrices};
