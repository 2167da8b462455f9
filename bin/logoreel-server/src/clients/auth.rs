//! Bearer-token verification seam.

use async_trait::async_trait;
use thiserror::Error;

/// The authenticated caller, attached to the request by `require_user`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth provider is not configured")]
    NotConfigured,

    #[error("auth provider request failed: {0}")]
    Upstream(String),
}

#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Resolve an access token to a user.
    ///
    /// `Ok(None)` means the token was rejected; `Err` means the provider could
    /// not answer.
    async fn verify(&self, access_token: &str) -> Result<Option<AuthUser>, AuthError>;
}
