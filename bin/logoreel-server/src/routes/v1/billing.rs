//! Plan checkout, upgrades, cancellation and credit packs.
//!
//! These handlers only talk to the payments provider. Credits and the local
//! subscription row change when the provider's webhook arrives.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::{Extension, Json, Router};
use logoreel_core::billing::Plan;
use serde_json::{Value, json};
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

use crate::clients::auth::AuthUser;
use crate::clients::payments::{CheckoutMode, CheckoutRequest};
use crate::entities::{ProfileStore, SubscriptionRecord, SubscriptionStore};
use crate::error::ServerError;
use crate::schemas::v1::billing::{CreditPackRequest, PlanRequest, RedirectResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(checkout, upgrade, cancel, portal, credit_pack_checkout),
    components(schemas(PlanRequest, CreditPackRequest, RedirectResponse))
)]
pub struct BillingApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/billing/checkout", post(checkout))
        .route("/billing/upgrade", post(upgrade))
        .route("/billing/cancel", post(cancel))
        .route("/billing/portal", post(portal))
        .route("/billing/credits/checkout", post(credit_pack_checkout))
}

fn price_for(state: &AppState, plan: Plan) -> Result<String, ServerError> {
    state
        .config
        .plan_prices
        .price_for(plan)
        .map(str::to_owned)
        .ok_or_else(|| ServerError::ServiceUnavailable(format!("no price configured for the {plan} plan")))
}

/// The caller's provider customer id, created on first use.
async fn ensure_customer(state: &AppState, user: &AuthUser) -> Result<String, ServerError> {
    let profile = state
        .store
        .get_profile(&user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound("profile not found".into()))?;
    if let Some(customer_id) = profile.stripe_customer_id {
        return Ok(customer_id);
    }
    let customer_id = state
        .payments
        .create_customer(&user.id, profile.email.as_deref().or(user.email.as_deref()))
        .await?;
    state.store.set_stripe_customer(&user.id, &customer_id).await?;
    info!(user_id = %user.id, %customer_id, "payments customer created");
    Ok(customer_id)
}

async fn live_subscription(state: &AppState, user: &AuthUser) -> Result<Option<SubscriptionRecord>, ServerError> {
    Ok(state
        .store
        .current_subscription(&user.id)
        .await?
        .filter(SubscriptionRecord::is_live))
}

fn billing_url(state: &AppState, query: &str) -> String {
    format!("{}/billing{query}", state.config.app_url.trim_end_matches('/'))
}

#[utoipa::path(
    post,
    path = "/v1/billing/checkout",
    tag = "billing",
    security(("bearer" = [])),
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Hosted checkout page", body = RedirectResponse),
        (status = 400, description = "Unknown plan or already subscribed"),
        (status = 503, description = "Payments not configured"),
    )
)]
pub async fn checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<RedirectResponse>, ServerError> {
    let plan = Plan::parse(&req.plan)?;
    let price_id = price_for(&state, plan)?;
    if live_subscription(&state, &user).await?.is_some() {
        return Err(ServerError::BadRequest(
            "already subscribed; use /v1/billing/upgrade to change plan".into(),
        ));
    }

    let customer_id = ensure_customer(&state, &user).await?;
    let session = state
        .payments
        .create_checkout(CheckoutRequest {
            mode: CheckoutMode::Subscription,
            customer_id,
            price_id,
            quantity: 1,
            user_id: user.id.clone(),
            success_url: billing_url(&state, "?checkout=success"),
            cancel_url: billing_url(&state, "?checkout=cancelled"),
            metadata: vec![("plan".into(), plan.to_string())],
        })
        .await?;
    info!(user_id = %user.id, %plan, session_id = %session.id, "subscription checkout started");
    Ok(Json(RedirectResponse { url: session.url }))
}

#[utoipa::path(
    post,
    path = "/v1/billing/upgrade",
    tag = "billing",
    security(("bearer" = [])),
    request_body = PlanRequest,
    responses(
        (status = 200, description = "Upgrade requested; credits follow via webhook"),
        (status = 400, description = "Unknown plan, no live subscription, or not an upgrade"),
        (status = 503, description = "Payments not configured"),
    )
)]
pub async fn upgrade(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<PlanRequest>,
) -> Result<Json<Value>, ServerError> {
    let target = Plan::parse(&req.plan)?;
    let current = live_subscription(&state, &user)
        .await?
        .ok_or_else(|| ServerError::BadRequest("no active subscription to upgrade".into()))?;
    let current_plan = Plan::parse(&current.plan)?;
    if !target.is_upgrade_from(current_plan) {
        return Err(ServerError::BadRequest(format!(
            "{target} is not an upgrade from {current_plan}"
        )));
    }
    let price_id = price_for(&state, target)?;

    let snapshot = state
        .payments
        .get_subscription(&current.stripe_subscription_id)
        .await?;
    let changed = state.payments.change_price(&snapshot, &price_id).await?;
    info!(user_id = %user.id, from = %current_plan, to = %target, "subscription upgrade requested");
    Ok(Json(json!({ "plan": target.to_string(), "status": changed.status })))
}

#[utoipa::path(
    post,
    path = "/v1/billing/cancel",
    tag = "billing",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Subscription will end at the period boundary"),
        (status = 400, description = "No live subscription"),
    )
)]
pub async fn cancel(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Value>, ServerError> {
    let current = live_subscription(&state, &user)
        .await?
        .ok_or_else(|| ServerError::BadRequest("no active subscription to cancel".into()))?;
    let snapshot = state
        .payments
        .cancel_at_period_end(&current.stripe_subscription_id)
        .await?;
    info!(user_id = %user.id, subscription_id = %snapshot.id, "cancellation scheduled");
    Ok(Json(json!({
        "cancel_at_period_end": snapshot.cancel_at_period_end,
        "current_period_end": current.current_period_end.map(|t| t.to_rfc3339()),
    })))
}

#[utoipa::path(
    post,
    path = "/v1/billing/portal",
    tag = "billing",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Customer portal page", body = RedirectResponse),
        (status = 400, description = "Caller has never paid"),
    )
)]
pub async fn portal(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RedirectResponse>, ServerError> {
    let customer_id = state
        .store
        .get_profile(&user.id)
        .await?
        .and_then(|p| p.stripe_customer_id)
        .ok_or_else(|| ServerError::BadRequest("no billing account yet".into()))?;
    let url = state
        .payments
        .create_portal_session(&customer_id, &billing_url(&state, ""))
        .await?;
    Ok(Json(RedirectResponse { url }))
}

#[utoipa::path(
    post,
    path = "/v1/billing/credits/checkout",
    tag = "billing",
    security(("bearer" = [])),
    request_body = CreditPackRequest,
    responses(
        (status = 200, description = "Hosted checkout page", body = RedirectResponse),
        (status = 400, description = "Invalid quantity"),
        (status = 503, description = "Credit packs not configured"),
    )
)]
pub async fn credit_pack_checkout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreditPackRequest>,
) -> Result<Json<RedirectResponse>, ServerError> {
    req.validate()?;
    let price_id = state
        .config
        .credit_pack_price_id
        .clone()
        .ok_or_else(|| ServerError::ServiceUnavailable("credit packs are not configured".into()))?;
    let credits = req.quantity * state.config.credit_pack_size;

    let customer_id = ensure_customer(&state, &user).await?;
    let session = state
        .payments
        .create_checkout(CheckoutRequest {
            mode: CheckoutMode::Payment,
            customer_id,
            price_id,
            quantity: req.quantity,
            user_id: user.id.clone(),
            success_url: billing_url(&state, "?credits=success"),
            cancel_url: billing_url(&state, "?credits=cancelled"),
            metadata: vec![("credits".into(), credits.to_string())],
        })
        .await?;
    info!(user_id = %user.id, credits, session_id = %session.id, "credit pack checkout started");
    Ok(Json(RedirectResponse { url: session.url }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::clients::payments::SubscriptionSnapshot;
    use crate::test_support::{TestApp, USER_ID, USER_TOKEN};
    use axum::http::{Method, StatusCode};
    use chrono::Utc;

    async fn subscribe(app: &TestApp, plan: &str, status: &str) {
        app.store.ensure_profile(USER_ID, None).await.unwrap();
        let now = Utc::now();
        app.store
            .upsert_subscription(&SubscriptionRecord {
                id: "local-1".into(),
                user_id: USER_ID.into(),
                stripe_subscription_id: "sub_1".into(),
                stripe_customer_id: Some("cus_existing".into()),
                plan: plan.into(),
                status: status.into(),
                current_period_end: Some(now + chrono::Duration::days(20)),
                cancel_at_period_end: false,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
        app.payments.set_subscription(SubscriptionSnapshot {
            id: "sub_1".into(),
            customer_id: "cus_existing".into(),
            status: status.into(),
            item_id: Some("si_1".into()),
            price_id: Some(format!("price_{plan}")),
            current_period_end: None,
            cancel_at_period_end: false,
            user_id: Some(USER_ID.into()),
        });
    }

    #[tokio::test]
    async fn checkout_creates_customer_once_and_returns_url() {
        let app = TestApp::new().await;
        let (status, body) = app
            .call_json(Method::POST, "/v1/billing/checkout", Some(USER_TOKEN), Some(json!({"plan": "pro"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://checkout.test/subscription");

        let checkout = app.payments.checkouts.lock().unwrap()[0].clone();
        assert_eq!(checkout.price_id, "price_pro");
        assert_eq!(checkout.user_id, USER_ID);
        assert!(checkout.metadata.contains(&("plan".into(), "pro".into())));

        let profile = app.store.get_profile(USER_ID).await.unwrap().unwrap();
        assert_eq!(profile.stripe_customer_id, Some(checkout.customer_id));

        app.call(Method::POST, "/v1/billing/checkout", Some(USER_TOKEN), Some(json!({"plan": "starter"})))
            .await;
        let customers = app.payments.calls().iter().filter(|c| c.starts_with("create_customer")).count();
        assert_eq!(customers, 1);
    }

    #[tokio::test]
    async fn unknown_plan_is_rejected() {
        let app = TestApp::new().await;
        let (status, _) = app
            .call(Method::POST, "/v1/billing/checkout", Some(USER_TOKEN), Some(json!({"plan": "platinum"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(app.payments.calls().is_empty());
    }

    #[tokio::test]
    async fn live_subscribers_cannot_checkout_again() {
        let app = TestApp::new().await;
        subscribe(&app, "starter", "active").await;
        let (status, _) = app
            .call(Method::POST, "/v1/billing/checkout", Some(USER_TOKEN), Some(json!({"plan": "pro"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn upgrade_swaps_price_but_rejects_downgrade() {
        let app = TestApp::new().await;
        subscribe(&app, "pro", "active").await;

        let (status, _) = app
            .call(Method::POST, "/v1/billing/upgrade", Some(USER_TOKEN), Some(json!({"plan": "starter"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = app
            .call_json(Method::POST, "/v1/billing/upgrade", Some(USER_TOKEN), Some(json!({"plan": "agency"})))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plan"], "agency");
        assert!(app.payments.calls().contains(&"change_price:sub_1:price_agency".to_owned()));
    }

    #[tokio::test]
    async fn upgrade_without_subscription_is_rejected() {
        let app = TestApp::new().await;
        let (status, _) = app
            .call(Method::POST, "/v1/billing/upgrade", Some(USER_TOKEN), Some(json!({"plan": "agency"})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn cancel_schedules_period_end() {
        let app = TestApp::new().await;
        subscribe(&app, "starter", "active").await;
        let (status, body) = app.call_json(Method::POST, "/v1/billing/cancel", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancel_at_period_end"], true);
    }

    #[tokio::test]
    async fn portal_requires_billing_account() {
        let app = TestApp::new().await;
        let (status, _) = app.call(Method::POST, "/v1/billing/portal", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        app.store.set_stripe_customer(USER_ID, "cus_existing").await.unwrap();
        let (status, body) = app.call_json(Method::POST, "/v1/billing/portal", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["url"], "https://portal.test/session");
    }

    #[tokio::test]
    async fn credit_pack_checkout_scales_credits_by_quantity() {
        let app = TestApp::new().await;
        let (status, _) = app
            .call(Method::POST, "/v1/billing/credits/checkout", Some(USER_TOKEN), Some(json!({"quantity": 3})))
            .await;
        assert_eq!(status, StatusCode::OK);
        let checkout = app.payments.checkouts.lock().unwrap()[0].clone();
        assert_eq!(checkout.mode, CheckoutMode::Payment);
        assert_eq!(checkout.quantity, 3);
        assert!(checkout.metadata.contains(&("credits".into(), "30".into())));

        let (status, _) = app
            .call(Method::POST, "/v1/billing/credits/checkout", Some(USER_TOKEN), Some(json!({"quantity": 0})))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_price_is_unavailable() {
        let config = crate::config::Config {
            credit_pack_price_id: None,
            ..crate::test_support::test_config()
        };
        let app = TestApp::build(config, crate::test_support::FakeModel::replying("ok")).await;
        let (status, _) = app
            .call(Method::POST, "/v1/billing/credits/checkout", Some(USER_TOKEN), Some(json!({})))
            .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }
}
