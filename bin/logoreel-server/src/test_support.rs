//! Fakes for the hosted-service clients and a router harness for tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use logoreel_core::billing::PlanPrices;
use logoreel_core::ratelimit::{FailurePolicy, MemoryCounterStore, RateLimiter};
use serde_json::Value;
use tower::ServiceExt;

use crate::clients::auth::{AuthError, AuthUser, AuthVerifier};
use crate::clients::mail::{Email, MailError, Mailer};
use crate::clients::model::{ChatModel, ModelError, ModelRequest, TextStream};
use crate::clients::payments::{CheckoutRequest, CheckoutSession, PaymentsApi, PaymentsError, SubscriptionSnapshot};
use crate::config::Config;
use crate::entities::AnyStore;
use crate::entities::dao::profile::ROLE_ADMIN;
use crate::entities::ProfileStore;
use crate::routes;
use crate::state::AppState;

pub const USER_ID: &str = "7f1c2b4e-9a3d-4c8e-b1f0-2d5e6a7b8c9d";
pub const OTHER_ID: &str = "0b6a3e5d-2c1f-4a9b-8e7d-6f5c4b3a2918";
pub const ADMIN_ID: &str = "c3d2e1f0-a9b8-4c7d-9e6f-5a4b3c2d1e0f";

pub const USER_TOKEN: &str = "token-user";
pub const OTHER_TOKEN: &str = "token-other";
pub const ADMIN_TOKEN: &str = "token-admin";

pub const WEBHOOK_SECRET: &str = "whsec_test";

// ── fakes ────────────────────────────────────────────────────────────────────

pub struct FakeModel {
    configured: bool,
    chunks: Vec<String>,
    fail_after: Option<usize>,
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl FakeModel {
    /// Streams `reply` in a few chunks.
    pub fn replying(reply: &str) -> Self {
        let chunks = reply
            .split_inclusive('\n')
            .map(str::to_owned)
            .collect();
        Self {
            configured: true,
            chunks,
            fail_after: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::replying("")
        }
    }

    /// Emits `chunks` deltas, then a stream error.
    pub fn failing_after(reply: &str, chunks: usize) -> Self {
        Self {
            fail_after: Some(chunks),
            ..Self::replying(reply)
        }
    }

    pub fn last_request(&self) -> Option<ModelRequest> {
        self.requests.lock().ok()?.last().cloned()
    }
}

#[async_trait]
impl ChatModel for FakeModel {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn stream(&self, request: ModelRequest) -> Result<TextStream, ModelError> {
        if !self.configured {
            return Err(ModelError::NotConfigured);
        }
        self.requests.lock().unwrap().push(request);
        let mut items: Vec<Result<String, ModelError>> = self.chunks.iter().cloned().map(Ok).collect();
        if let Some(n) = self.fail_after {
            items.truncate(n);
            items.push(Err(ModelError::Stream("overloaded_error: Overloaded".into())));
        }
        Ok(Box::pin(futures::stream::iter(items)))
    }
}

pub struct FakeAuth {
    users: HashMap<String, AuthUser>,
}

impl FakeAuth {
    pub fn new() -> Self {
        let users = [
            (USER_TOKEN, USER_ID, "user@example.com"),
            (OTHER_TOKEN, OTHER_ID, "other@example.com"),
            (ADMIN_TOKEN, ADMIN_ID, "admin@example.com"),
        ]
        .into_iter()
        .map(|(token, id, email)| {
            (
                token.to_owned(),
                AuthUser {
                    id: id.to_owned(),
                    email: Some(email.to_owned()),
                },
            )
        })
        .collect();
        Self { users }
    }
}

#[async_trait]
impl AuthVerifier for FakeAuth {
    async fn verify(&self, access_token: &str) -> Result<Option<AuthUser>, AuthError> {
        Ok(self.users.get(access_token).cloned())
    }
}

pub struct FakePayments {
    configured: bool,
    pub calls: Mutex<Vec<String>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    pub subscription: Mutex<Option<SubscriptionSnapshot>>,
}

impl FakePayments {
    pub fn new(configured: bool) -> Self {
        Self {
            configured,
            calls: Mutex::new(Vec::new()),
            checkouts: Mutex::new(Vec::new()),
            subscription: Mutex::new(None),
        }
    }

    pub fn set_subscription(&self, snapshot: SubscriptionSnapshot) {
        *self.subscription.lock().unwrap() = Some(snapshot);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: impl Into<String>) -> Result<(), PaymentsError> {
        if !self.configured {
            return Err(PaymentsError::NotConfigured);
        }
        self.calls.lock().unwrap().push(call.into());
        Ok(())
    }

    fn current(&self, id: &str) -> Result<SubscriptionSnapshot, PaymentsError> {
        self.subscription
            .lock()
            .unwrap()
            .clone()
            .filter(|s| s.id == id)
            .ok_or(PaymentsError::Api {
                status: 404,
                message: format!("No such subscription: '{id}'"),
            })
    }
}

#[async_trait]
impl PaymentsApi for FakePayments {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn create_customer(&self, user_id: &str, _email: Option<&str>) -> Result<String, PaymentsError> {
        self.record(format!("create_customer:{user_id}"))?;
        Ok(format!("cus_{}", &user_id[..8]))
    }

    async fn create_checkout(&self, request: CheckoutRequest) -> Result<CheckoutSession, PaymentsError> {
        self.record(format!("create_checkout:{}", request.mode))?;
        let url = format!("https://checkout.test/{}", request.mode);
        self.checkouts.lock().unwrap().push(request);
        Ok(CheckoutSession {
            id: "cs_test_1".into(),
            url,
        })
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<SubscriptionSnapshot, PaymentsError> {
        self.record(format!("get_subscription:{subscription_id}"))?;
        self.current(subscription_id)
    }

    async fn change_price(
        &self,
        subscription: &SubscriptionSnapshot,
        price_id: &str,
    ) -> Result<SubscriptionSnapshot, PaymentsError> {
        self.record(format!("change_price:{}:{price_id}", subscription.id))?;
        let mut changed = subscription.clone();
        changed.price_id = Some(price_id.to_owned());
        Ok(changed)
    }

    async fn cancel_at_period_end(&self, subscription_id: &str) -> Result<SubscriptionSnapshot, PaymentsError> {
        self.record(format!("cancel:{subscription_id}"))?;
        let mut snapshot = self.current(subscription_id)?;
        snapshot.cancel_at_period_end = true;
        Ok(snapshot)
    }

    async fn create_portal_session(&self, customer_id: &str, _return_url: &str) -> Result<String, PaymentsError> {
        self.record(format!("portal:{customer_id}"))?;
        Ok("https://portal.test/session".into())
    }
}

#[derive(Default)]
pub struct FakeMailer {
    pub sent: Mutex<Vec<Email>>,
}

#[async_trait]
impl Mailer for FakeMailer {
    fn is_configured(&self) -> bool {
        true
    }

    async fn send(&self, email: Email) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

// ── harness ──────────────────────────────────────────────────────────────────

/// Configuration with prices and webhook secret filled in.
pub fn test_config() -> Config {
    Config {
        stripe_webhook_secret: Some(WEBHOOK_SECRET.into()),
        plan_prices: PlanPrices {
            starter: Some("price_starter".into()),
            pro: Some("price_pro".into()),
            agency: Some("price_agency".into()),
        },
        credit_pack_price_id: Some("price_pack".into()),
        ..Config::default()
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub store: Arc<AnyStore>,
    pub model: Arc<FakeModel>,
    pub payments: Arc<FakePayments>,
    pub mailer: Arc<FakeMailer>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::build(test_config(), FakeModel::replying("Hello")).await
    }

    pub async fn with_model(model: FakeModel) -> Self {
        Self::build(test_config(), model).await
    }

    pub async fn build(config: Config, model: FakeModel) -> Self {
        let store = Arc::new(
            AnyStore::connect(&config.database_url)
                .await
                .expect("test database opens"),
        );
        store.ensure_profile(ADMIN_ID, Some("admin@example.com")).await.unwrap();
        store.set_role(ADMIN_ID, ROLE_ADMIN).await.unwrap();

        let model = Arc::new(model);
        let payments = Arc::new(FakePayments::new(true));
        let mailer = Arc::new(FakeMailer::default());
        let rate_limiter = Arc::new(RateLimiter::new(
            Some(Arc::new(MemoryCounterStore::new())),
            FailurePolicy::from_fail_open(config.rate_limit_fail_open),
        ));

        let state = Arc::new(AppState {
            config: Arc::new(config),
            store: Arc::clone(&store),
            model: model.clone(),
            payments: payments.clone(),
            auth: Arc::new(FakeAuth::new()),
            mailer: mailer.clone(),
            rate_limiter,
        });
        Self {
            state,
            store,
            model,
            payments,
            mailer,
        }
    }

    pub fn router(&self) -> Router {
        routes::build(Arc::clone(&self.state))
    }

    /// Send one request and return the status and raw body.
    pub async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Like [`TestApp::call`], parsing the body as JSON.
    pub async fn call_json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let (status, text) = self.call(method, uri, token, body).await;
        (status, serde_json::from_str(&text).unwrap_or(Value::Null))
    }
}
