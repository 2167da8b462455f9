//! Bearer-token authentication for user-facing routes.

use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderMap, header};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::clients::auth::AuthUser;
use crate::clients::mail::welcome_email;
use crate::entities::{ProfileRecord, ProfileStore};
use crate::error::ServerError;
use crate::state::AppState;

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve the caller and attach [`AuthUser`] to the request extensions.
///
/// The first request from a new user creates their profile and zero balance
/// and sends the welcome email in the background.
pub async fn require_user(
    State(state): State<Arc<AppState>>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, ServerError> {
    let token = bearer_token(req.headers())
        .ok_or(ServerError::Unauthorized)?
        .to_owned();
    let user = state.auth.verify(&token).await?.ok_or(ServerError::Unauthorized)?;

    let created = state.store.ensure_profile(&user.id, user.email.as_deref()).await?;
    if created {
        debug!(user_id = %user.id, "profile created");
        if let Some(email) = user.email.clone() {
            let mailer = Arc::clone(&state.mailer);
            let message = welcome_email(&email, &state.config.app_url);
            let user_id = user.id.clone();
            tokio::spawn(async move {
                if let Err(e) = mailer.send(message).await {
                    warn!(%user_id, error = %e, "welcome email failed");
                }
            });
        }
    }

    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}

/// Load the caller's profile and require the admin role.
pub async fn authorize_admin(state: &AppState, user: &AuthUser) -> Result<ProfileRecord, ServerError> {
    match state.store.get_profile(&user.id).await? {
        Some(profile) if profile.is_admin() => Ok(profile),
        _ => {
            warn!(user_id = %user.id, "admin route refused");
            Err(ServerError::Forbidden("admin role required".into()))
        }
    }
}
