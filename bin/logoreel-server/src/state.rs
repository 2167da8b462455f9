//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use logoreel_core::ratelimit::RateLimiter;

use crate::clients::auth::AuthVerifier;
use crate::clients::mail::Mailer;
use crate::clients::model::ChatModel;
use crate::clients::payments::PaymentsApi;
use crate::config::Config;
use crate::entities::AnyStore;

/// State shared across all HTTP handlers.
///
/// Every hosted-service client is built once at startup and handed in here;
/// tests swap in fakes through the same fields.
#[derive(Clone)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Ledger, sessions and webhook bookkeeping.
    pub store: Arc<AnyStore>,
    pub model: Arc<dyn ChatModel>,
    pub payments: Arc<dyn PaymentsApi>,
    pub auth: Arc<dyn AuthVerifier>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: Arc<RateLimiter>,
}
