use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use utoipa::OpenApi;

use crate::clients::auth::AuthUser;
use crate::entities::{CreditStore, SubscriptionStore};
use crate::error::ServerError;
use crate::schemas::v1::billing::SubscriptionResponse;
use crate::schemas::v1::credits::CreditBalanceResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(get_credits, get_subscription),
    components(schemas(CreditBalanceResponse, SubscriptionResponse))
)]
pub struct CreditsApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/credits", get(get_credits))
        .route("/subscription", get(get_subscription))
}

#[utoipa::path(
    get,
    path = "/v1/credits",
    tag = "credits",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current balance", body = CreditBalanceResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn get_credits(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<CreditBalanceResponse>, ServerError> {
    let balance = state.store.get_balance(&user.id).await?.unwrap_or_default();
    Ok(Json(balance.into()))
}

/// The caller's subscription, or `null` if they never subscribed.
#[utoipa::path(
    get,
    path = "/v1/subscription",
    tag = "credits",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Current subscription", body = Option<SubscriptionResponse>),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Option<SubscriptionResponse>>, ServerError> {
    let subscription = state.store.current_subscription(&user.id).await?;
    Ok(Json(subscription.map(|s| s.to_response())))
}

#[cfg(test)]
mod test {
    use crate::test_support::{TestApp, USER_TOKEN};
    use axum::http::{Method, StatusCode};
    use serde_json::Value;

    #[tokio::test]
    async fn new_user_has_zero_balance_and_no_subscription() {
        let app = TestApp::new().await;
        let (status, body) = app.call_json(Method::GET, "/v1/credits", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 0);

        let (status, body) = app.call_json(Method::GET, "/v1/subscription", Some(USER_TOKEN), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::Null);
    }
}
