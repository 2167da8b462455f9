use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Extension, Json, Router};
use utoipa::OpenApi;

use crate::clients::auth::AuthUser;
use crate::entities::ProfileStore;
use crate::error::ServerError;
use crate::schemas::v1::account::MeResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_me), components(schemas(MeResponse)))]
pub struct AccountApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/me", get(get_me))
}

#[utoipa::path(
    get,
    path = "/v1/me",
    tag = "account",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Caller's profile", body = MeResponse),
        (status = 401, description = "Missing or invalid token"),
    )
)]
pub async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>, ServerError> {
    let profile = state
        .store
        .get_profile(&user.id)
        .await?
        .ok_or_else(|| ServerError::NotFound("profile not found".into()))?;
    Ok(Json(profile.to_response()))
}
