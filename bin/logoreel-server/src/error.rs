//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors become a JSON body
//! `{"error": "..."}` with the matching status code.
//!
//! Internal errors (database, upstream providers) are logged with full detail
//! but only a generic message is returned, so SQL, provider payloads and keys
//! never reach clients.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use logoreel_core::CoreError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

use crate::clients::auth::AuthError;
use crate::clients::model::ModelError;
use crate::clients::payments::PaymentsError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or rejected credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Authenticated, but not allowed to do this.
    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("insufficient credits: {0}")]
    PaymentRequired(String),

    #[error("rate limit exceeded")]
    RateLimited { reset_at: DateTime<Utc> },

    /// A hosted integration has no credentials configured.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A hosted provider failed or answered unexpectedly.
    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match &self {
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
            ServerError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_owned()),
            ServerError::Forbidden(m) => (StatusCode::FORBIDDEN, m.clone()),
            ServerError::PaymentRequired(m) => (StatusCode::PAYMENT_REQUIRED, m.clone()),
            ServerError::ServiceUnavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
            ServerError::RateLimited { reset_at } => {
                let retry_after = (*reset_at - Utc::now()).num_seconds().max(1);
                let body = Json(json!({
                    "error": "rate limit exceeded",
                    "reset_at": reset_at.to_rfc3339(),
                }));
                let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
                if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                    response.headers_mut().insert(header::RETRY_AFTER, value);
                }
                return response;
            }

            ServerError::Database(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
            ServerError::Upstream(m) => {
                error!(message = %m, "upstream provider error");
                (StatusCode::INTERNAL_SERVER_ERROR, "upstream service error".to_owned())
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

impl From<validator::ValidationErrors> for ServerError {
    fn from(e: validator::ValidationErrors) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<CoreError> for ServerError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InsufficientCredits { .. } => ServerError::PaymentRequired(e.to_string()),
            CoreError::InvalidPhase(_)
            | CoreError::PhaseRegression { .. }
            | CoreError::ConversationFull { .. }
            | CoreError::Validation(_)
            | CoreError::UnknownPlan(_) => ServerError::BadRequest(e.to_string()),
        }
    }
}

impl From<ModelError> for ServerError {
    fn from(e: ModelError) -> Self {
        match e {
            ModelError::NotConfigured => ServerError::ServiceUnavailable("AI service is not configured".into()),
            other => ServerError::Upstream(other.to_string()),
        }
    }
}

impl From<PaymentsError> for ServerError {
    fn from(e: PaymentsError) -> Self {
        match e {
            PaymentsError::NotConfigured => ServerError::ServiceUnavailable("payments are not configured".into()),
            other => ServerError::Upstream(other.to_string()),
        }
    }
}

impl From<AuthError> for ServerError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::NotConfigured => ServerError::ServiceUnavailable("authentication is not configured".into()),
            AuthError::Upstream(m) => ServerError::Upstream(m),
        }
    }
}
