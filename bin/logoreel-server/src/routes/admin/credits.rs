//! Admin credit management.
//!
//! Request validation runs before the role check, so a malformed request is
//! a 400 even for callers who are not admins.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use logoreel_core::billing::CreditAdjustment;
use utoipa::OpenApi;

use crate::clients::auth::AuthUser;
use crate::entities::{AdjustmentOutcome, CreditStore, ProfileStore};
use crate::error::ServerError;
use crate::middleware::auth::authorize_admin;
use crate::schemas::admin::credits::{AdjustCreditsRequest, AdjustCreditsResponse, TransactionResponse};
use crate::schemas::v1::credits::CreditBalanceResponse;
use crate::state::AppState;

/// Rows returned by the transaction history endpoint.
const HISTORY_LIMIT: i64 = 100;

#[derive(OpenApi)]
#[openapi(
    paths(adjust_credits, get_user_credits, list_user_transactions),
    components(schemas(AdjustCreditsRequest, AdjustCreditsResponse, TransactionResponse))
)]
pub struct AdminCreditsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/credits/adjust", post(adjust_credits))
        .route("/users/{id}/credits", get(get_user_credits))
        .route("/users/{id}/transactions", get(list_user_transactions))
}

#[utoipa::path(
    post,
    path = "/admin/credits/adjust",
    tag = "admin",
    security(("bearer" = [])),
    request_body = AdjustCreditsRequest,
    responses(
        (status = 200, description = "Balance after the adjustment", body = AdjustCreditsResponse),
        (status = 400, description = "Invalid input, or removal exceeds the balance"),
        (status = 401, description = "Missing or invalid token"),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "Target user not found"),
    )
)]
pub async fn adjust_credits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<AdjustCreditsRequest>,
) -> Result<Json<AdjustCreditsResponse>, ServerError> {
    let adjustment = CreditAdjustment::from(req).validated()?;
    let admin = authorize_admin(&state, &user).await?;

    match state.store.adjust_credits(&admin.id, &adjustment).await? {
        AdjustmentOutcome::Applied(balance) => Ok(Json(AdjustCreditsResponse {
            user_id: adjustment.user_id,
            delta: adjustment.delta,
            balance: balance.into(),
        })),
        AdjustmentOutcome::UnknownUser => Err(ServerError::NotFound(format!("user {} not found", adjustment.user_id))),
        AdjustmentOutcome::InsufficientBalance { available } => Err(ServerError::BadRequest(format!(
            "cannot remove {} credits; user has {available}",
            -adjustment.delta
        ))),
    }
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}/credits",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "User's balance", body = CreditBalanceResponse),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_user_credits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<CreditBalanceResponse>, ServerError> {
    authorize_admin(&state, &user).await?;
    let balance = state
        .store
        .get_balance(&id)
        .await?
        .ok_or_else(|| ServerError::NotFound(format!("user {id} not found")))?;
    Ok(Json(balance.into()))
}

#[utoipa::path(
    get,
    path = "/admin/users/{id}/transactions",
    tag = "admin",
    security(("bearer" = [])),
    params(("id" = String, Path, description = "User id")),
    responses(
        (status = 200, description = "Most recent ledger entries first", body = Vec<TransactionResponse>),
        (status = 403, description = "Caller is not an admin"),
        (status = 404, description = "User not found"),
    )
)]
pub async fn list_user_transactions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TransactionResponse>>, ServerError> {
    authorize_admin(&state, &user).await?;
    if state.store.get_profile(&id).await?.is_none() {
        return Err(ServerError::NotFound(format!("user {id} not found")));
    }
    let transactions = state.store.list_transactions(&id, HISTORY_LIMIT).await?;
    Ok(Json(transactions.iter().map(|t| t.to_response()).collect()))
}

#[cfg(test)]
mod test {
    use crate::entities::{CreditStore, ProfileStore};
    use crate::test_support::{ADMIN_ID, ADMIN_TOKEN, OTHER_ID, TestApp, USER_ID, USER_TOKEN};
    use axum::http::{Method, StatusCode};
    use serde_json::{Value, json};

    fn adjust(user_id: &str, delta: i64) -> Value {
        json!({"user_id": user_id, "delta": delta, "reason": "goodwill for outage on Monday"})
    }

    #[tokio::test]
    async fn requires_authentication() {
        let app = TestApp::new().await;
        let (status, _) = app
            .call(Method::POST, "/admin/credits/adjust", None, Some(adjust(USER_ID, 5)))
            .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn invalid_input_is_reported_before_role_check() {
        let app = TestApp::new().await;
        let body = json!({"user_id": USER_ID, "delta": 5, "reason": "short"});
        let (status, _) = app.call(Method::POST, "/admin/credits/adjust", Some(USER_TOKEN), Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = app
            .call(Method::POST, "/admin/credits/adjust", Some(USER_TOKEN), Some(adjust(USER_ID, 5000)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn non_admins_are_forbidden() {
        let app = TestApp::new().await;
        let (status, body) = app
            .call_json(Method::POST, "/admin/credits/adjust", Some(USER_TOKEN), Some(adjust(USER_ID, 5)))
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"], "admin role required");
    }

    #[tokio::test]
    async fn admin_grant_and_removal_update_balance_with_audit() {
        let app = TestApp::new().await;
        app.store.ensure_profile(USER_ID, None).await.unwrap();
        app.store.set_subscription_credits(USER_ID, 3, "seed").await.unwrap();

        let (status, body) = app
            .call_json(Method::POST, "/admin/credits/adjust", Some(ADMIN_TOKEN), Some(adjust(USER_ID, 5)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"]["overage_credits"], 5);
        assert_eq!(body["balance"]["total"], 8);

        let (status, body) = app
            .call_json(Method::POST, "/admin/credits/adjust", Some(ADMIN_TOKEN), Some(adjust(USER_ID, -6)))
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["balance"]["subscription_credits"], 2);
        assert_eq!(body["balance"]["overage_credits"], 0);

        let (status, history) = app
            .call_json(Method::GET, &format!("/admin/users/{USER_ID}/transactions"), Some(ADMIN_TOKEN), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        let admin_rows: Vec<&Value> = history
            .as_array()
            .unwrap()
            .iter()
            .filter(|t| t["kind"] == "admin_adjustment")
            .collect();
        assert_eq!(admin_rows.len(), 2);
        assert!(admin_rows.iter().all(|t| t["admin_id"] == ADMIN_ID));
    }

    #[tokio::test]
    async fn removal_beyond_balance_is_rejected() {
        let app = TestApp::new().await;
        app.store.ensure_profile(USER_ID, None).await.unwrap();
        let (status, _) = app
            .call(Method::POST, "/admin/credits/adjust", Some(ADMIN_TOKEN), Some(adjust(USER_ID, -1)))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(app.store.get_balance(USER_ID).await.unwrap().unwrap().total(), 0);
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let app = TestApp::new().await;
        let (status, _) = app
            .call(Method::POST, "/admin/credits/adjust", Some(ADMIN_TOKEN), Some(adjust(OTHER_ID, 5)))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = app
            .call(Method::GET, &format!("/admin/users/{OTHER_ID}/credits"), Some(ADMIN_TOKEN), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
