//! Payments webhook.
//!
//! Each delivery is verified against the signing secret, then claimed by
//! event id so a redelivered event is acknowledged without being applied
//! twice. If applying fails the claim is released and the provider's retry
//! gets another chance.

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use chrono::{DateTime, Utc};
use logoreel_core::billing::Plan;
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use crate::clients::mail::credits_purchased_email;
use crate::clients::payments::SubscriptionSnapshot;
use crate::clients::stripe::{WebhookEvent, verify_signature};
use crate::entities::{CreditStore, ProfileStore, SubscriptionRecord, SubscriptionStore, WebhookStore};
use crate::error::ServerError;
use crate::state::AppState;

const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(OpenApi)]
#[openapi(paths(stripe_webhook))]
pub struct WebhooksApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/webhooks/stripe", post(stripe_webhook))
}

#[utoipa::path(
    post,
    path = "/webhooks/stripe",
    tag = "webhooks",
    request_body(content = String, description = "Raw signed event payload", content_type = "application/json"),
    responses(
        (status = 200, description = "Event accepted (or already processed)"),
        (status = 400, description = "Missing or invalid signature, or malformed event"),
        (status = 503, description = "Webhook secret not configured"),
    )
)]
pub async fn stripe_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, ServerError> {
    let secret = state
        .config
        .stripe_webhook_secret
        .as_deref()
        .ok_or_else(|| ServerError::ServiceUnavailable("webhook secret is not configured".into()))?;
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest("missing signature".into()))?;
    verify_signature(&body, signature, secret, Utc::now().timestamp()).map_err(|e| {
        warn!(error = %e, "webhook signature rejected");
        ServerError::BadRequest(format!("invalid signature: {e}"))
    })?;

    let event: WebhookEvent =
        serde_json::from_slice(&body).map_err(|e| ServerError::BadRequest(format!("malformed event: {e}")))?;

    if !state.store.claim_webhook_event(&event.id, &event.event_type).await? {
        debug!(event_id = %event.id, event_type = %event.event_type, "duplicate webhook delivery");
        return Ok(Json(json!({ "received": true, "duplicate": true })));
    }

    if let Err(e) = apply_event(&state, &event).await {
        warn!(event_id = %event.id, event_type = %event.event_type, error = %e, "webhook processing failed");
        state.store.release_webhook_event(&event.id).await?;
        return Err(e);
    }
    Ok(Json(json!({ "received": true })))
}

async fn apply_event(state: &AppState, event: &WebhookEvent) -> Result<(), ServerError> {
    let object = &event.data.object;
    match event.event_type.as_str() {
        "checkout.session.completed" => checkout_completed(state, object).await,
        "customer.subscription.updated" => {
            let snapshot = SubscriptionSnapshot::from_stripe(object)?;
            subscription_updated(state, snapshot).await
        }
        "customer.subscription.deleted" => {
            let mut snapshot = SubscriptionSnapshot::from_stripe(object)?;
            snapshot.status = "canceled".into();
            subscription_deleted(state, snapshot).await
        }
        "invoice.paid" => invoice_paid(state, object).await,
        other => {
            debug!(event_type = other, "ignoring webhook event");
            Ok(())
        }
    }
}

fn str_at<'a>(object: &'a Value, pointer: &str) -> Option<&'a str> {
    object.pointer(pointer).and_then(Value::as_str).filter(|s| !s.is_empty())
}

/// An id field that may be a bare string or an expanded object.
fn id_at<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    match object.get(key)? {
        Value::String(s) => Some(s.as_str()),
        Value::Object(o) => o.get("id").and_then(Value::as_str),
        _ => None,
    }
}

async fn checkout_completed(state: &AppState, object: &Value) -> Result<(), ServerError> {
    let Some(user_id) = str_at(object, "/client_reference_id").or_else(|| str_at(object, "/metadata/user_id")) else {
        warn!("checkout completed without a user reference");
        return Ok(());
    };
    let email = str_at(object, "/customer_details/email");
    state.store.ensure_profile(user_id, email).await?;
    if let Some(customer_id) = id_at(object, "customer") {
        state.store.set_stripe_customer(user_id, customer_id).await?;
    }

    match str_at(object, "/mode") {
        Some("subscription") => {
            let subscription_id = id_at(object, "subscription")
                .ok_or_else(|| ServerError::BadRequest("subscription checkout without subscription".into()))?;
            let snapshot = state.payments.get_subscription(subscription_id).await?;
            let Some((record, plan)) = sync_subscription(state, &snapshot, Some(user_id)).await? else {
                return Ok(());
            };
            if let Some(plan) = plan {
                grant_plan(state, &record.user_id, plan, "subscription started").await?;
            }
            Ok(())
        }
        Some("payment") => {
            if str_at(object, "/payment_status").is_some_and(|s| s != "paid") {
                info!(%user_id, "credit pack checkout not paid yet");
                return Ok(());
            }
            let credits = str_at(object, "/metadata/credits")
                .and_then(|c| c.parse::<i64>().ok())
                .filter(|c| *c > 0)
                .ok_or_else(|| ServerError::BadRequest("credit pack checkout without credit count".into()))?;
            state
                .store
                .add_overage_credits(user_id, credits, &format!("credit pack: {credits} credits"))
                .await?;
            info!(%user_id, credits, "credit pack fulfilled");
            send_receipt(state, user_id, email, credits).await;
            Ok(())
        }
        other => {
            debug!(mode = ?other, "ignoring checkout mode");
            Ok(())
        }
    }
}

/// Best effort: the credits are already committed, so nothing here may fail
/// the delivery.
async fn send_receipt(state: &AppState, user_id: &str, email: Option<&str>, credits: i64) {
    let to = match email {
        Some(email) => Some(email.to_owned()),
        None => match state.store.get_profile(user_id).await {
            Ok(profile) => profile.and_then(|p| p.email),
            Err(e) => {
                warn!(%user_id, error = %e, "credit receipt skipped; profile lookup failed");
                None
            }
        },
    };
    let Some(to) = to else {
        return;
    };
    let mailer = Arc::clone(&state.mailer);
    let user_id = user_id.to_owned();
    tokio::spawn(async move {
        if let Err(e) = mailer.send(credits_purchased_email(&to, credits)).await {
            warn!(%user_id, error = %e, "credit receipt email failed");
        }
    });
}

async fn subscription_updated(state: &AppState, snapshot: SubscriptionSnapshot) -> Result<(), ServerError> {
    let previous = state.store.get_subscription_by_stripe_id(&snapshot.id).await?;
    let Some((record, plan)) = sync_subscription(state, &snapshot, None).await? else {
        return Ok(());
    };
    let plan_changed = previous.as_ref().is_none_or(|p| p.plan != record.plan);
    if let Some(plan) = plan.filter(|_| plan_changed && record.is_live()) {
        grant_plan(state, &record.user_id, plan, "plan changed").await?;
    }
    Ok(())
}

async fn subscription_deleted(state: &AppState, snapshot: SubscriptionSnapshot) -> Result<(), ServerError> {
    let Some((record, _)) = sync_subscription(state, &snapshot, None).await? else {
        return Ok(());
    };
    state
        .store
        .set_subscription_credits(&record.user_id, 0, "subscription ended")
        .await?;
    info!(user_id = %record.user_id, subscription_id = %snapshot.id, "subscription ended");
    Ok(())
}

async fn invoice_paid(state: &AppState, object: &Value) -> Result<(), ServerError> {
    if str_at(object, "/billing_reason") != Some("subscription_cycle") {
        return Ok(());
    }
    let Some(subscription_id) = id_at(object, "subscription")
        .or_else(|| str_at(object, "/parent/subscription_details/subscription"))
    else {
        warn!("renewal invoice without a subscription");
        return Ok(());
    };

    let record = match state.store.get_subscription_by_stripe_id(subscription_id).await? {
        Some(record) => record,
        None => {
            let snapshot = state.payments.get_subscription(subscription_id).await?;
            match sync_subscription(state, &snapshot, None).await? {
                Some((record, _)) => record,
                None => return Ok(()),
            }
        }
    };
    match Plan::parse(&record.plan) {
        Ok(plan) => grant_plan(state, &record.user_id, plan, "monthly renewal").await,
        Err(_) => {
            warn!(subscription_id, plan = %record.plan, "renewal for unknown plan");
            Ok(())
        }
    }
}

async fn grant_plan(state: &AppState, user_id: &str, plan: Plan, reason: &str) -> Result<(), ServerError> {
    let credits = plan.monthly_credits();
    state
        .store
        .set_subscription_credits(user_id, credits, &format!("{reason}: {plan}"))
        .await?;
    info!(%user_id, %plan, credits, "subscription credits granted");
    Ok(())
}

/// Write the provider's view of a subscription to the local table.
///
/// The owner comes from the existing row, the subscription metadata, the
/// `user_hint`, or the customer id, in that order. Returns `None` when no
/// owner can be found. The plan is `None` when the price id is not one of
/// the configured plan prices.
async fn sync_subscription(
    state: &AppState,
    snapshot: &SubscriptionSnapshot,
    user_hint: Option<&str>,
) -> Result<Option<(SubscriptionRecord, Option<Plan>)>, ServerError> {
    let existing = state.store.get_subscription_by_stripe_id(&snapshot.id).await?;
    let mut user_id = existing
        .as_ref()
        .map(|r| r.user_id.clone())
        .or_else(|| snapshot.user_id.clone())
        .or_else(|| user_hint.map(str::to_owned));
    if user_id.is_none() && !snapshot.customer_id.is_empty() {
        user_id = state
            .store
            .find_profile_by_customer(&snapshot.customer_id)
            .await?
            .map(|p| p.id);
    }
    let Some(user_id) = user_id else {
        warn!(subscription_id = %snapshot.id, "subscription has no known owner");
        return Ok(None);
    };
    state.store.ensure_profile(&user_id, None).await?;

    let plan = snapshot
        .price_id
        .as_deref()
        .and_then(|price| state.config.plan_prices.plan_for_price(price));
    if plan.is_none() {
        warn!(subscription_id = %snapshot.id, price_id = ?snapshot.price_id, "subscription price is not a known plan");
    }

    let now = Utc::now();
    let record = SubscriptionRecord {
        id: existing.as_ref().map_or_else(|| Uuid::new_v4().to_string(), |r| r.id.clone()),
        user_id,
        stripe_subscription_id: snapshot.id.clone(),
        stripe_customer_id: (!snapshot.customer_id.is_empty()).then(|| snapshot.customer_id.clone()),
        plan: plan
            .map(|p| p.to_string())
            .or_else(|| existing.as_ref().map(|r| r.plan.clone()))
            .unwrap_or_else(|| "unknown".into()),
        status: snapshot.status.clone(),
        current_period_end: snapshot
            .current_period_end
            .and_then(|secs| DateTime::from_timestamp(secs, 0))
            .or_else(|| existing.as_ref().and_then(|r| r.current_period_end)),
        cancel_at_period_end: snapshot.cancel_at_period_end,
        created_at: existing.as_ref().map_or(now, |r| r.created_at),
        updated_at: now,
    };
    state.store.upsert_subscription(&record).await?;
    debug!(subscription_id = %snapshot.id, status = %record.status, plan = %record.plan, "subscription synced");
    Ok(Some((record, plan)))
}
