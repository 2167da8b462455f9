//! Supabase Auth token verification.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use super::auth::{AuthError, AuthUser, AuthVerifier};

pub struct SupabaseAuth {
    client: reqwest::Client,
    url: Option<String>,
    anon_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserBody {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl SupabaseAuth {
    pub fn new(client: reqwest::Client, url: Option<String>, anon_key: Option<String>) -> Self {
        Self {
            client,
            url,
            anon_key,
        }
    }
}

#[async_trait]
impl AuthVerifier for SupabaseAuth {
    async fn verify(&self, access_token: &str) -> Result<Option<AuthUser>, AuthError> {
        let (Some(url), Some(anon_key)) = (self.url.as_deref(), self.anon_key.as_deref()) else {
            return Err(AuthError::NotConfigured);
        };

        let response = self
            .client
            .get(format!("{}/auth/v1/user", url.trim_end_matches('/')))
            .header("apikey", anon_key)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                debug!("access token rejected");
                Ok(None)
            }
            status if status.is_success() => {
                let user: UserBody = response
                    .json()
                    .await
                    .map_err(|e| AuthError::Upstream(format!("unexpected user payload: {e}")))?;
                Ok(Some(AuthUser {
                    id: user.id,
                    email: user.email,
                }))
            }
            status => Err(AuthError::Upstream(format!("auth provider returned {status}"))),
        }
    }
}
