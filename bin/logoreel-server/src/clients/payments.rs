//! Payments-provider seam used by billing routes and the webhook.

use async_trait::async_trait;
use serde_json::Value;
use strum::Display;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentsError {
    #[error("payments provider is not configured")]
    NotConfigured,

    #[error("network error talking to the payments API: {0}")]
    Network(String),

    #[error("payments API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("unexpected payments API payload: {0}")]
    Protocol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum CheckoutMode {
    /// Recurring plan purchase.
    Subscription,
    /// One-off credit pack.
    Payment,
}

/// Parameters for a hosted checkout page.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub mode: CheckoutMode,
    pub customer_id: String,
    pub price_id: String,
    pub quantity: i64,
    pub user_id: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Extra key/value pairs echoed back in the completion event.
    pub metadata: Vec<(String, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

/// The parts of a provider subscription object the ledger cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub id: String,
    pub customer_id: String,
    pub status: String,
    pub item_id: Option<String>,
    pub price_id: Option<String>,
    /// Unix seconds.
    pub current_period_end: Option<i64>,
    pub cancel_at_period_end: bool,
    /// `metadata.user_id`, set when the subscription was created through checkout.
    pub user_id: Option<String>,
}

impl SubscriptionSnapshot {
    /// Read a subscription object as sent by the API or inside a webhook event.
    pub fn from_stripe(object: &Value) -> Result<Self, PaymentsError> {
        let id = str_field(object, "id")
            .ok_or_else(|| PaymentsError::Protocol("subscription without id".into()))?;
        let customer_id = match object.get("customer") {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Object(c)) => c
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_owned(),
            _ => String::new(),
        };
        let first_item = object.pointer("/items/data/0");
        let current_period_end = object
            .get("current_period_end")
            .and_then(Value::as_i64)
            .or_else(|| first_item.and_then(|i| i.get("current_period_end")).and_then(Value::as_i64));

        Ok(Self {
            id,
            customer_id,
            status: str_field(object, "status").unwrap_or_else(|| "incomplete".into()),
            item_id: first_item.and_then(|i| str_field(i, "id")),
            price_id: first_item.and_then(|i| i.pointer("/price/id")).and_then(Value::as_str).map(str::to_owned),
            current_period_end,
            cancel_at_period_end: object
                .get("cancel_at_period_end")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            user_id: object
                .pointer("/metadata/user_id")
                .and_then(Value::as_str)
                .map(str::to_owned),
        })
    }
}

fn str_field(object: &Value, key: &str) -> Option<String> {
    object.get(key).and_then(Value::as_str).map(str::to_owned)
}

#[async_trait]
pub trait PaymentsApi: Send + Sync {
    fn is_configured(&self) -> bool;

    /// Create a customer record and return its id.
    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Result<String, PaymentsError>;

    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentsError>;

    async fn get_subscription(&self, subscription_id: &str) -> Result<SubscriptionSnapshot, PaymentsError>;

    /// Swap the subscription's single item to `price_id`, prorating.
    async fn change_price(
        &self,
        subscription: &SubscriptionSnapshot,
        price_id: &str,
    ) -> Result<SubscriptionSnapshot, PaymentsError>;

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<SubscriptionSnapshot, PaymentsError>;

    /// Billing-portal URL for the customer.
    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, PaymentsError>;
}
