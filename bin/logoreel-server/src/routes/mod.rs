//! Axum router construction.
//!
//! [`build`] assembles the complete application router:
//! - middleware layers (CORS, per-request trace id)
//! - optional Swagger UI / OpenAPI document (`LOGOREEL_ENABLE_SWAGGER`)
//! - health check and the payments webhook (unauthenticated)
//! - user routes under `/v1` and admin routes under `/admin`, both behind
//!   bearer-token authentication

mod admin;
pub mod doc;
mod health;
mod v1;
mod webhooks;

use std::sync::Arc;

use axum::Router;
use axum::middleware;
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(webhooks::router())
        .nest("/v1", v1::router(state.clone()))
        .nest("/admin", admin::router(state.clone()));

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app.layer(ServiceBuilder::new().layer(cors::cors_layer(state.clone())))
        .layer(middleware::from_fn_with_state(state.clone(), trace::trace_middleware))
        .with_state(state)
}
