pub mod account;
pub mod billing;
pub mod credits;
pub mod direction;
pub mod videos;

use std::sync::Arc;

use axum::{Router, middleware};
use utoipa::OpenApi;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};

use crate::middleware::auth;
use crate::state::AppState;

/// Routes nested under `/v1`; every one requires a signed-in user.
pub fn router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .merge(account::router())
        .merge(direction::router())
        .merge(credits::router())
        .merge(billing::router())
        .merge(videos::router())
        .route_layer(middleware::from_fn_with_state(state, auth::require_user))
}

#[derive(OpenApi)]
pub struct V1Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = V1Api::openapi();
    doc.merge(account::AccountApi::openapi());
    doc.merge(direction::DirectionApi::openapi());
    doc.merge(credits::CreditsApi::openapi());
    doc.merge(billing::BillingApi::openapi());
    doc.merge(videos::VideosApi::openapi());

    let components = doc.components.get_or_insert_with(Default::default);
    components.add_security_scheme(
        "bearer",
        SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
    );
    doc
}
