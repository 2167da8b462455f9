//! Stripe REST client and webhook signature verification.
//!
//! Requests are form-encoded with bracketed keys (`line_items[0][price]`);
//! responses are read as loose JSON and narrowed to what the ledger needs.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use super::payments::{CheckoutRequest, CheckoutSession, PaymentsApi, PaymentsError, SubscriptionSnapshot};

/// Maximum age of a signed webhook payload.
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

pub struct StripeClient {
    client: reqwest::Client,
    secret_key: Option<String>,
    api_base: String,
}

impl StripeClient {
    pub fn new(client: reqwest::Client, secret_key: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            client,
            secret_key,
            api_base: api_base.into(),
        }
    }

    fn key(&self) -> Result<&str, PaymentsError> {
        self.secret_key.as_deref().ok_or(PaymentsError::NotConfigured)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{path}", self.api_base.trim_end_matches('/'))
    }

    async fn post_form(&self, path: &str, form: &[(String, String)]) -> Result<Value, PaymentsError> {
        let response = self
            .client
            .post(self.url(path))
            .basic_auth(self.key()?, None::<&str>)
            .form(form)
            .send()
            .await
            .map_err(|e| PaymentsError::Network(e.to_string()))?;
        read_json(response).await
    }

    async fn get_json(&self, path: &str) -> Result<Value, PaymentsError> {
        let response = self
            .client
            .get(self.url(path))
            .basic_auth(self.key()?, None::<&str>)
            .send()
            .await
            .map_err(|e| PaymentsError::Network(e.to_string()))?;
        read_json(response).await
    }
}

async fn read_json(response: reqwest::Response) -> Result<Value, PaymentsError> {
    let status = response.status().as_u16();
    let body: Value = response
        .json()
        .await
        .map_err(|e| PaymentsError::Protocol(e.to_string()))?;
    if !(200..300).contains(&status) {
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_owned();
        return Err(PaymentsError::Api { status, message });
    }
    Ok(body)
}

fn pair(key: impl Into<String>, value: impl Into<String>) -> (String, String) {
    (key.into(), value.into())
}

/// Form fields for a checkout session.
pub fn checkout_form(request: &CheckoutRequest) -> Vec<(String, String)> {
    let mut form = vec![
        pair("mode", request.mode.to_string()),
        pair("customer", &request.customer_id),
        pair("client_reference_id", &request.user_id),
        pair("line_items[0][price]", &request.price_id),
        pair("line_items[0][quantity]", request.quantity.to_string()),
        pair("success_url", &request.success_url),
        pair("cancel_url", &request.cancel_url),
        pair("metadata[user_id]", &request.user_id),
    ];
    for (key, value) in &request.metadata {
        form.push(pair(format!("metadata[{key}]"), value));
    }
    if request.mode == super::payments::CheckoutMode::Subscription {
        form.push(pair("subscription_data[metadata][user_id]", &request.user_id));
    }
    form
}

#[async_trait]
impl PaymentsApi for StripeClient {
    fn is_configured(&self) -> bool {
        self.secret_key.is_some()
    }

    async fn create_customer(&self, user_id: &str, email: Option<&str>) -> Result<String, PaymentsError> {
        let mut form = vec![pair("metadata[user_id]", user_id)];
        if let Some(email) = email {
            form.push(pair("email", email));
        }
        let body = self.post_form("customers", &form).await?;
        body.get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PaymentsError::Protocol("customer without id".into()))
    }

    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentsError> {
        let body = self.post_form("checkout/sessions", &checkout_form(&request)).await?;
        let id = body.get("id").and_then(Value::as_str);
        let url = body.get("url").and_then(Value::as_str);
        match (id, url) {
            (Some(id), Some(url)) => {
                debug!(session_id = id, mode = %request.mode, "checkout session created");
                Ok(CheckoutSession {
                    id: id.to_owned(),
                    url: url.to_owned(),
                })
            }
            _ => Err(PaymentsError::Protocol("checkout session without id or url".into())),
        }
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<SubscriptionSnapshot, PaymentsError> {
        let body = self.get_json(&format!("subscriptions/{subscription_id}")).await?;
        SubscriptionSnapshot::from_stripe(&body)
    }

    async fn change_price(
        &self,
        subscription: &SubscriptionSnapshot,
        price_id: &str,
    ) -> Result<SubscriptionSnapshot, PaymentsError> {
        let item_id = subscription
            .item_id
            .as_deref()
            .ok_or_else(|| PaymentsError::Protocol("subscription has no items".into()))?;
        let form = vec![
            pair("items[0][id]", item_id),
            pair("items[0][price]", price_id),
            pair("proration_behavior", "create_prorations"),
        ];
        let body = self
            .post_form(&format!("subscriptions/{}", subscription.id), &form)
            .await?;
        SubscriptionSnapshot::from_stripe(&body)
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<SubscriptionSnapshot, PaymentsError> {
        let form = vec![pair("cancel_at_period_end", "true")];
        let body = self
            .post_form(&format!("subscriptions/{subscription_id}"), &form)
            .await?;
        SubscriptionSnapshot::from_stripe(&body)
    }

    async fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, PaymentsError> {
        let form = vec![pair("customer", customer_id), pair("return_url", return_url)];
        let body = self.post_form("billing_portal/sessions", &form).await?;
        body.get("url")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or_else(|| PaymentsError::Protocol("portal session without url".into()))
    }
}

// ── Webhooks ─────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("malformed signature header")]
    Malformed,
    #[error("signature does not match payload")]
    Mismatch,
    #[error("signature timestamp outside tolerance")]
    Expired,
}

/// A delivered webhook event.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookData {
    pub object: Value,
}

/// Check a `Stripe-Signature` header (`t=<unix>,v1=<hex>[,v1=...]`).
///
/// The signed content is `"{t}.{payload}"`; any one matching `v1` entry is
/// enough.
pub fn verify_signature(payload: &[u8], header: &str, secret: &str, now: i64) -> Result<(), SignatureError> {
    let mut timestamp: Option<i64> = None;
    let mut signatures: Vec<Vec<u8>> = Vec::new();
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = value.parse().ok(),
            Some(("v1", value)) => {
                if let Ok(bytes) = hex::decode(value) {
                    signatures.push(bytes);
                }
            }
            _ => {}
        }
    }
    let timestamp = timestamp.ok_or(SignatureError::Malformed)?;
    if signatures.is_empty() {
        return Err(SignatureError::Malformed);
    }
    if now.abs_diff(timestamp) > SIGNATURE_TOLERANCE_SECS.unsigned_abs() {
        return Err(SignatureError::Expired);
    }

    let matches = signatures.iter().any(|expected| {
        let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        mac.verify_slice(expected).is_ok()
    });
    if matches { Ok(()) } else { Err(SignatureError::Mismatch) }
}

/// Produce a header value the way the provider signs deliveries.
#[cfg(test)]
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> String {
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}.").as_bytes());
    mac.update(payload);
    format!("t={timestamp},v1={}", hex::encode(mac.finalize().into_bytes()))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clients::payments::CheckoutMode;

    const SECRET: &str = "whsec_test";
    const NOW: i64 = 1_760_000_000;

    #[test]
    fn accepts_valid_signature() {
        let payload = br#"{"id":"evt_1"}"#;
        let header = sign_payload(payload, SECRET, NOW);
        assert_eq!(verify_signature(payload, &header, SECRET, NOW + 10), Ok(()));
    }

    #[test]
    fn accepts_when_any_v1_matches() {
        let payload = b"{}";
        let good = sign_payload(payload, SECRET, NOW);
        let header = format!("t={NOW},v1={},{}", "00".repeat(32), good.split(',').nth(1).unwrap());
        assert_eq!(verify_signature(payload, &header, SECRET, NOW), Ok(()));
    }

    #[test]
    fn rejects_tampered_body() {
        let header = sign_payload(br#"{"amount":1}"#, SECRET, NOW);
        assert_eq!(
            verify_signature(br#"{"amount":9}"#, &header, SECRET, NOW),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_wrong_secret() {
        let header = sign_payload(b"{}", "whsec_other", NOW);
        assert_eq!(verify_signature(b"{}", &header, SECRET, NOW), Err(SignatureError::Mismatch));
    }

    #[test]
    fn rejects_stale_timestamp() {
        let header = sign_payload(b"{}", SECRET, NOW);
        assert_eq!(
            verify_signature(b"{}", &header, SECRET, NOW + SIGNATURE_TOLERANCE_SECS + 1),
            Err(SignatureError::Expired)
        );
    }

    #[test]
    fn rejects_extreme_timestamps() {
        for t in [i64::MIN, i64::MAX] {
            let header = format!("t={t},v1={}", "00".repeat(32));
            assert_eq!(verify_signature(b"{}", &header, SECRET, NOW), Err(SignatureError::Expired));
        }
    }

    #[test]
    fn rejects_malformed_header() {
        assert_eq!(verify_signature(b"{}", "garbage", SECRET, NOW), Err(SignatureError::Malformed));
        assert_eq!(verify_signature(b"{}", &format!("t={NOW}"), SECRET, NOW), Err(SignatureError::Malformed));
    }

    #[test]
    fn checkout_form_carries_metadata() {
        let form = checkout_form(&CheckoutRequest {
            mode: CheckoutMode::Payment,
            customer_id: "cus_1".into(),
            price_id: "price_pack".into(),
            quantity: 2,
            user_id: "u1".into(),
            success_url: "https://app/ok".into(),
            cancel_url: "https://app/no".into(),
            metadata: vec![("credits".into(), "10".into())],
        });
        assert!(form.contains(&("mode".into(), "payment".into())));
        assert!(form.contains(&("metadata[credits]".into(), "10".into())));
        assert!(form.contains(&("line_items[0][quantity]".into(), "2".into())));
        assert!(!form.iter().any(|(k, _)| k.starts_with("subscription_data")));
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_calls() {
        let client = StripeClient::new(reqwest::Client::new(), None, "http://127.0.0.1:9");
        assert!(matches!(client.create_customer("u1", None).await, Err(PaymentsError::NotConfigured)));
    }
}
