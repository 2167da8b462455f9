//! Health / heartbeat endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Always answers 200; `status` is `"degraded"` when the database does not
/// respond. `integrations` tells which hosted services have credentials.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is up", body = Value)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = state.store.ping().await.is_ok();
    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "version": env!("CARGO_PKG_VERSION"),
        "database": database,
        "integrations": {
            "ai": state.model.is_configured(),
            "payments": state.payments.is_configured(),
            "email": state.mailer.is_configured(),
            "rate_limit_store": state.rate_limiter.is_backed(),
        },
    }))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test_support::{FakeModel, TestApp, test_config};
    use axum::http::{Method, StatusCode};

    #[tokio::test]
    async fn health_reports_database_and_integrations() {
        let app = TestApp::new().await;
        let (status, body) = app.call_json(Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["integrations"]["ai"], true);
        assert!(!body["version"].as_str().unwrap_or("").is_empty());
    }

    #[tokio::test]
    async fn health_shows_unconfigured_model() {
        let app = TestApp::build(test_config(), FakeModel::unconfigured()).await;
        let Json(body) = get_health(State(app.state.clone())).await;
        assert_eq!(body["integrations"]["ai"], false);
    }
}
