//! Clients for the hosted services the server delegates to.
//!
//! Each integration is a trait (the seam handlers depend on) plus one real
//! implementation. All clients are built once in `main` and injected through
//! [`crate::state::AppState`]; a client whose secret is missing is still
//! constructed but reports "not configured" on every call.

pub mod anthropic;
pub mod auth;
pub mod mail;
pub mod model;
pub mod payments;
pub mod resend;
pub mod sse;
pub mod stripe;
pub mod supabase;
pub mod upstash;

use std::time::Duration;

/// Upper bound on establishing a TCP/TLS connection to any provider.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared outbound HTTP client settings.
pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .user_agent(concat!("logoreel-server/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "failed to build tuned HTTP client; using defaults");
            reqwest::Client::new()
        })
}
