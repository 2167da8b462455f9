//! logoreel-server – entry point.
//!
//! Startup order:
//! 1. Parse configuration from environment variables.
//! 2. Initialise structured tracing (JSON in production, pretty in dev),
//!    optionally mirrored to a daily log file.
//! 3. Build the hosted-service clients and the rate limiter.
//! 4. Open the database and run pending migrations.
//! 5. Build the Axum router and start the HTTP server with graceful shutdown.

mod clients;
mod config;
mod entities;
mod error;
mod middleware;
mod routes;
mod schemas;
mod state;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;

use logoreel_core::ratelimit::{CounterStore, FailurePolicy, MemoryCounterStore, RateLimiter};
use tracing::{info, warn};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, fmt};

use crate::clients::anthropic::AnthropicClient;
use crate::clients::resend::ResendMailer;
use crate::clients::stripe::StripeClient;
use crate::clients::supabase::SupabaseAuth;
use crate::clients::upstash::UpstashStore;
use crate::config::Config;
use crate::entities::AnyStore;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Configuration ───────────────────────────────────────────────────────
    let cfg = Config::from_env();

    // ── 2. Tracing ─────────────────────────────────────────────────────────────
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(f) => f,
        Err(_) => match cfg.log_level.parse::<EnvFilter>() {
            Ok(f) => f,
            Err(e) => {
                eprintln!(
                    "WARN: LOGOREEL_LOG='{}' is not a valid tracing filter ({}); \
                     falling back to 'info'",
                    cfg.log_level, e
                );
                EnvFilter::new("info")
            }
        },
    };

    let stdout_layer = if cfg.log_json {
        fmt::layer().json().with_target(true).boxed()
    } else {
        fmt::layer().with_target(true).with_thread_ids(true).boxed()
    };

    // The guard flushes buffered file output on drop; keep it for all of main.
    let (file_layer, _log_guard) = match cfg.log_dir.as_deref() {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "logoreel-server.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer).with_ansi(false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "logoreel-server starting");

    // ── 3. Clients ─────────────────────────────────────────────────────────────
    let http = clients::http_client();

    let model = AnthropicClient::new(http.clone(), cfg.anthropic_api_key.clone(), cfg.anthropic_base_url.clone());
    let payments = StripeClient::new(http.clone(), cfg.stripe_secret_key.clone(), cfg.stripe_api_base.clone());
    let auth = SupabaseAuth::new(http.clone(), cfg.supabase_url.clone(), cfg.supabase_anon_key.clone());
    let mailer = ResendMailer::new(http.clone(), cfg.resend_api_key.clone(), cfg.email_from.clone());

    let counter_store: Option<Arc<dyn CounterStore>> =
        match (cfg.upstash_redis_url.as_deref(), cfg.upstash_redis_token.as_deref()) {
            (Some(url), Some(token)) => {
                info!("rate limiting backed by Upstash");
                Some(Arc::new(UpstashStore::new(http.clone(), url, token)))
            }
            _ if cfg.rate_limit_in_memory => {
                info!("rate limiting backed by process memory");
                Some(Arc::new(MemoryCounterStore::new()))
            }
            _ => None,
        };
    let rate_limiter = RateLimiter::new(counter_store, FailurePolicy::from_fail_open(cfg.rate_limit_fail_open));

    if cfg.anthropic_api_key.is_none() {
        warn!("ANTHROPIC_API_KEY not set; creative direction will answer 503");
    }
    if cfg.stripe_secret_key.is_none() {
        warn!("STRIPE_SECRET_KEY not set; billing endpoints will answer 503");
    }
    if cfg.stripe_webhook_secret.is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set; webhook deliveries will be refused");
    }
    if cfg.supabase_url.is_none() || cfg.supabase_anon_key.is_none() {
        warn!("Supabase auth not configured; authenticated routes will answer 503");
    }
    if cfg.resend_api_key.is_none() {
        warn!("RESEND_API_KEY not set; transactional email is disabled");
    }
    if !rate_limiter.is_backed() {
        warn!(fail_open = cfg.rate_limit_fail_open, "no rate-limit store configured");
    }

    // ── 4. Database ────────────────────────────────────────────────────────────
    let store = AnyStore::connect(&cfg.database_url).await?;
    info!(database_url = %cfg.database_url, "database ready");

    // ── 5. Shared application state ────────────────────────────────────────────
    let state = Arc::new(AppState {
        config: Arc::new(cfg.clone()),
        store: Arc::new(store),
        model: Arc::new(model),
        payments: Arc::new(payments),
        auth: Arc::new(auth),
        mailer: Arc::new(mailer),
        rate_limiter: Arc::new(rate_limiter),
    });

    // ── 6. HTTP server with graceful shutdown ──────────────────────────────────
    let app = routes::build(Arc::clone(&state));
    let addr: SocketAddr = cfg.bind_address.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("logoreel-server stopped");
    Ok(())
}

/// Returns a future that resolves when SIGINT (Ctrl-C) or SIGTERM is received.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install CTRL+C signal handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut s) => {
                s.recv().await;
            }
            Err(e) => warn!(error = %e, "failed to install SIGTERM handler"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received; starting graceful shutdown");
}
