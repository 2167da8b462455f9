//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use logoreel_core::billing::PlanPrices;
use logoreel_core::direction::ModelSelection;

/// Runtime configuration for logoreel-server.
///
/// Every field has a default so the server starts without any environment
/// variables set. Integrations whose secrets are missing stay unconfigured and
/// answer `503` when used; rate limiting fails open by default.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx database URL (default: `"sqlite://logoreel.db?mode=rwc"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// When set, also write daily-rotated log files into this directory.
    pub log_dir: Option<String>,

    /// Serve Swagger UI at `/swagger-ui`.
    pub enable_swagger: bool,

    /// Comma-separated list of allowed CORS origins; `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Public URL of the web app, used for checkout and portal redirects.
    pub app_url: String,

    pub anthropic_api_key: Option<String>,
    pub anthropic_base_url: String,
    pub models: ModelSelection,

    pub upstash_redis_url: Option<String>,
    pub upstash_redis_token: Option<String>,
    /// Use a process-local counter store when Upstash is not configured.
    pub rate_limit_in_memory: bool,
    pub rate_limit_max_requests: u64,
    pub rate_limit_window: Duration,
    pub rate_limit_fail_open: bool,

    pub stripe_secret_key: Option<String>,
    pub stripe_webhook_secret: Option<String>,
    pub stripe_api_base: String,
    pub plan_prices: PlanPrices,
    pub credit_pack_price_id: Option<String>,
    pub credit_pack_size: i64,

    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,

    pub resend_api_key: Option<String>,
    pub email_from: String,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            bind_address: env_or("LOGOREEL_BIND", "0.0.0.0:3000"),
            database_url: env_or("LOGOREEL_DATABASE_URL", "sqlite://logoreel.db?mode=rwc"),
            log_level: env_or("LOGOREEL_LOG", "info"),
            log_json: env_flag("LOGOREEL_LOG_JSON", false),
            log_dir: env_opt("LOGOREEL_LOG_DIR"),
            enable_swagger: env_flag("LOGOREEL_ENABLE_SWAGGER", true),
            cors_allowed_origins: env_opt("LOGOREEL_CORS_ORIGINS"),
            app_url: env_or("LOGOREEL_APP_URL", "http://localhost:5173"),

            anthropic_api_key: env_opt("ANTHROPIC_API_KEY"),
            anthropic_base_url: env_or("ANTHROPIC_BASE_URL", "https://api.anthropic.com"),
            models: ModelSelection {
                clarification: env_or(
                    "LOGOREEL_CLARIFY_MODEL",
                    &ModelSelection::default().clarification,
                ),
                generation: env_or(
                    "LOGOREEL_GENERATION_MODEL",
                    &ModelSelection::default().generation,
                ),
            },

            upstash_redis_url: env_opt("UPSTASH_REDIS_REST_URL"),
            upstash_redis_token: env_opt("UPSTASH_REDIS_REST_TOKEN"),
            rate_limit_in_memory: env_flag("LOGOREEL_RATE_LIMIT_IN_MEMORY", false),
            rate_limit_max_requests: parse_env("LOGOREEL_RATE_LIMIT_MAX", 20),
            rate_limit_window: Duration::from_millis(parse_env(
                "LOGOREEL_RATE_LIMIT_WINDOW_MS",
                60 * 60 * 1000,
            )),
            rate_limit_fail_open: env_flag("LOGOREEL_RATE_LIMIT_FAIL_OPEN", true),

            stripe_secret_key: env_opt("STRIPE_SECRET_KEY"),
            stripe_webhook_secret: env_opt("STRIPE_WEBHOOK_SECRET"),
            stripe_api_base: env_or("STRIPE_API_BASE", "https://api.stripe.com"),
            plan_prices: PlanPrices {
                starter: env_opt("STRIPE_PRICE_STARTER"),
                pro: env_opt("STRIPE_PRICE_PRO"),
                agency: env_opt("STRIPE_PRICE_AGENCY"),
            },
            credit_pack_price_id: env_opt("STRIPE_PRICE_CREDIT_PACK"),
            credit_pack_size: parse_env("LOGOREEL_CREDIT_PACK_SIZE", 10),

            supabase_url: env_opt("SUPABASE_URL"),
            supabase_anon_key: env_opt("SUPABASE_ANON_KEY"),

            resend_api_key: env_opt("RESEND_API_KEY"),
            email_from: env_or("LOGOREEL_EMAIL_FROM", "logoreel <hello@logoreel.app>"),
        }
    }
}

impl Default for Config {
    /// Defaults with every integration unconfigured.
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".into(),
            database_url: "sqlite::memory:".into(),
            log_level: "info".into(),
            log_json: false,
            log_dir: None,
            enable_swagger: false,
            cors_allowed_origins: None,
            app_url: "http://localhost:5173".into(),
            anthropic_api_key: None,
            anthropic_base_url: "https://api.anthropic.com".into(),
            models: ModelSelection::default(),
            upstash_redis_url: None,
            upstash_redis_token: None,
            rate_limit_in_memory: false,
            rate_limit_max_requests: 20,
            rate_limit_window: Duration::from_secs(60 * 60),
            rate_limit_fail_open: true,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_base: "https://api.stripe.com".into(),
            plan_prices: PlanPrices::default(),
            credit_pack_price_id: None,
            credit_pack_size: 10,
            supabase_url: None,
            supabase_anon_key: None,
            resend_api_key: None,
            email_from: "logoreel <hello@logoreel.app>".into(),
        }
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

/// Unset and empty values both count as "not configured".
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
