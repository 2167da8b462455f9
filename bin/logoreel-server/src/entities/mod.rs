//! Persistence layer.
//!
//! One store trait per table group, all implemented on [`AnyStore`]. The
//! ledger's invariants (non-negative balance, audit row per change, one
//! application per webhook event) are enforced inside these methods'
//! transactions; handlers never write balances directly.
//!
//! Trait methods use `impl Future` in their signatures so no extra
//! `async-trait` boxing is needed on this hot path.

pub mod credits;
pub mod dao;
pub mod direction;
pub mod profile;
pub mod subscription;
pub mod video;
pub mod webhook;

pub use dao::{
    CreditTransaction, DirectionMessageRecord, DirectionSessionRecord, ProfileRecord, SessionStatus,
    SubscriptionRecord, VideoRecord,
};

pub use credits::{AdjustmentOutcome, CreditStore};
pub use direction::DirectionStore;
pub use profile::ProfileStore;
pub use subscription::SubscriptionStore;
pub use video::{ChargeOutcome, VideoStore};
pub use webhook::WebhookStore;

use std::str::FromStr;

use sqlx::any::{AnyConnectOptions, AnyPoolOptions};

#[derive(Clone, Debug)]
pub struct AnyStore {
    pool: sqlx::Pool<sqlx::Any>,
}

impl AnyStore {
    /// Open (or create) the database at `url` and run pending migrations.
    ///
    /// `url` is any sqlx URL with a compiled-in driver, e.g.
    /// `"sqlite://logoreel.db?mode=rwc"` or `"sqlite::memory:"` for tests.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        sqlx::any::install_default_drivers();
        let options = AnyConnectOptions::from_str(url)?;
        let mut pool_options = AnyPoolOptions::new();
        if url.contains(":memory:") {
            // Every in-memory SQLite connection is its own database.
            pool_options = pool_options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = pool_options.connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Round-trip a trivial query; used by the health check.
    pub async fn ping(&self) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
impl AnyStore {
    /// Run a statement against the raw pool, for tests that need rows the
    /// store API would never write.
    pub(crate) async fn execute_raw(&self, sql: &str) -> Result<u64, sqlx::Error> {
        Ok(sqlx::query(sql).execute(&self.pool).await?.rows_affected())
    }
}

#[cfg(test)]
pub(crate) async fn memory_store() -> AnyStore {
    AnyStore::connect("sqlite::memory:")
        .await
        .expect("in-memory database opens and migrates")
}
