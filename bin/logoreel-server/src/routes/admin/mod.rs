pub mod credits;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa::OpenApi;

use crate::middleware::auth;
use crate::state::AppState;

/// Routes nested under `/admin`. Authentication happens here; each handler
/// checks the admin role itself so input errors are reported first.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(credits::router())
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}

pub fn api_docs() -> utoipa::openapi::OpenApi {
    credits::AdminCreditsApi::openapi()
}
