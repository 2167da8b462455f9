//! Fixed-window, per-user request limiter.
//!
//! The counter lives in a [`CounterStore`] so the window survives process
//! restarts and is shared between instances. The first request of a window
//! creates the counter with a TTL equal to the window; later requests
//! increment it until `max_requests` is reached.
//!
//! The existence check and the increment are two separate store calls, so a
//! concurrent burst can admit slightly more than `max_requests`.

mod memory;

pub use memory::MemoryCounterStore;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of every counter key; the user id follows.
pub const KEY_PREFIX: &str = "ai_rate_limit:";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("counter store request failed: {0}")]
    Request(String),
    #[error("counter store returned an unexpected reply: {0}")]
    Protocol(String),
}

/// Minimal key/value surface the limiter needs from its backing store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Current counter value, `None` if the key is absent or expired.
    async fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;
    /// Create (or overwrite) the counter with an expiry.
    async fn set_with_ttl(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError>;
    /// Increment and return the new value.
    async fn incr(&self, key: &str) -> Result<u64, StoreError>;
    /// Remaining time to live, `None` if the key is absent or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError>;
}

/// What to do when the counter store is missing or failing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Allow the request and log a warning.
    FailOpen,
    /// Deny the request.
    FailClosed,
}

impl FailurePolicy {
    pub fn from_fail_open(fail_open: bool) -> Self {
        if fail_open { Self::FailOpen } else { Self::FailClosed }
    }
}

/// Outcome of a single [`RateLimiter::check_limit`] call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u64,
    pub reset_at: DateTime<Utc>,
}

pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
    policy: FailurePolicy,
}

impl RateLimiter {
    pub fn new(store: Option<Arc<dyn CounterStore>>, policy: FailurePolicy) -> Self {
        Self { store, policy }
    }

    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    pub fn is_backed(&self) -> bool {
        self.store.is_some()
    }

    /// Count one request for `user_id` against `max_requests` per `window`.
    pub async fn check_limit(
        &self,
        user_id: &str,
        max_requests: u64,
        window: Duration,
    ) -> RateLimitDecision {
        let Some(store) = self.store.as_deref() else {
            warn!(user_id, policy = ?self.policy, "rate limit store not configured");
            return self.degraded(max_requests, window);
        };

        match count_request(store, &format!("{KEY_PREFIX}{user_id}"), max_requests, window).await {
            Ok(decision) => {
                debug!(user_id, allowed = decision.allowed, remaining = decision.remaining, "rate limit checked");
                decision
            }
            Err(e) => {
                warn!(user_id, error = %e, policy = ?self.policy, "rate limit store unavailable");
                self.degraded(max_requests, window)
            }
        }
    }

    fn degraded(&self, max_requests: u64, window: Duration) -> RateLimitDecision {
        let reset_at = reset_after(window);
        match self.policy {
            FailurePolicy::FailOpen => RateLimitDecision {
                allowed: true,
                remaining: max_requests,
                reset_at,
            },
            FailurePolicy::FailClosed => RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            },
        }
    }
}

async fn count_request(
    store: &dyn CounterStore,
    key: &str,
    max_requests: u64,
    window: Duration,
) -> Result<RateLimitDecision, StoreError> {
    let Some(current) = store.get(key).await? else {
        store.set_with_ttl(key, 1, window).await?;
        return Ok(RateLimitDecision {
            allowed: max_requests >= 1,
            remaining: max_requests.saturating_sub(1),
            reset_at: reset_after(window),
        });
    };

    if current >= max_requests {
        let ttl = ensure_expiry(store, key, current, window).await?;
        return Ok(RateLimitDecision {
            allowed: false,
            remaining: 0,
            reset_at: reset_after(ttl),
        });
    }

    let count = store.incr(key).await?;
    let ttl = ensure_expiry(store, key, count, window).await?;
    Ok(RateLimitDecision {
        allowed: true,
        remaining: max_requests.saturating_sub(count),
        reset_at: reset_after(ttl),
    })
}

/// Remaining window for `key`, re-arming the expiry if the key has none.
///
/// A key that expires between `get` and `incr` is recreated by the
/// increment without a TTL and would otherwise never reset.
async fn ensure_expiry(
    store: &dyn CounterStore,
    key: &str,
    count: u64,
    window: Duration,
) -> Result<Duration, StoreError> {
    match store.ttl(key).await? {
        Some(ttl) => Ok(ttl),
        None => {
            debug!(key, "counter had no expiry; re-arming window");
            store.set_with_ttl(key, count, window).await?;
            Ok(window)
        }
    }
}

fn reset_after(ttl: Duration) -> DateTime<Utc> {
    let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
    Utc::now() + ttl
}

#[cfg(test)]
mod test {
    use super::*;
    use tracing_test::traced_test;

    const WINDOW: Duration = Duration::from_secs(60);

    struct BrokenStore;

    #[async_trait]
    impl CounterStore for BrokenStore {
        async fn get(&self, _: &str) -> Result<Option<u64>, StoreError> {
            Err(StoreError::Request("connection refused".into()))
        }
        async fn set_with_ttl(&self, _: &str, _: u64, _: Duration) -> Result<(), StoreError> {
            Err(StoreError::Request("connection refused".into()))
        }
        async fn incr(&self, _: &str) -> Result<u64, StoreError> {
            Err(StoreError::Request("connection refused".into()))
        }
        async fn ttl(&self, _: &str) -> Result<Option<Duration>, StoreError> {
            Err(StoreError::Request("connection refused".into()))
        }
    }

    /// Lets the window run out between `get` and `incr`, once.
    struct ExpiresBeforeIncr {
        inner: MemoryCounterStore,
        fired: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl CounterStore for ExpiresBeforeIncr {
        async fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
            self.inner.get(key).await
        }
        async fn set_with_ttl(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError> {
            self.inner.set_with_ttl(key, value, ttl).await
        }
        async fn incr(&self, key: &str) -> Result<u64, StoreError> {
            if !self.fired.swap(true, std::sync::atomic::Ordering::SeqCst) {
                tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
            }
            self.inner.incr(key).await
        }
        async fn ttl(&self, key: &str) -> Result<Option<Duration>, StoreError> {
            self.inner.ttl(key).await
        }
    }

    fn limiter() -> RateLimiter {
        RateLimiter::new(Some(Arc::new(MemoryCounterStore::new())), FailurePolicy::FailOpen)
    }

    #[tokio::test]
    async fn sixth_request_in_window_is_denied() {
        let limiter = limiter();
        let mut remaining = Vec::new();
        for _ in 0..5 {
            let decision = limiter.check_limit("user-1", 5, WINDOW).await;
            assert!(decision.allowed);
            remaining.push(decision.remaining);
        }
        assert_eq!(remaining, vec![4, 3, 2, 1, 0]);

        let sixth = limiter.check_limit("user-1", 5, WINDOW).await;
        assert!(!sixth.allowed);
        assert_eq!(sixth.remaining, 0);
        assert!(sixth.reset_at > Utc::now());
    }

    #[tokio::test]
    async fn users_have_independent_windows() {
        let limiter = limiter();
        for _ in 0..2 {
            limiter.check_limit("busy", 2, WINDOW).await;
        }
        assert!(!limiter.check_limit("busy", 2, WINDOW).await.allowed);
        assert!(limiter.check_limit("quiet", 2, WINDOW).await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn window_expiry_resets_the_counter() {
        let limiter = limiter();
        limiter.check_limit("user-2", 1, WINDOW).await;
        assert!(!limiter.check_limit("user-2", 1, WINDOW).await.allowed);

        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
        assert!(limiter.check_limit("user-2", 1, WINDOW).await.allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn counter_recreated_by_incr_still_expires() {
        let store = Arc::new(ExpiresBeforeIncr {
            inner: MemoryCounterStore::new(),
            fired: Default::default(),
        });
        let limiter = RateLimiter::new(Some(store.clone()), FailurePolicy::FailOpen);
        let key = format!("{KEY_PREFIX}user-3");

        assert!(limiter.check_limit("user-3", 2, WINDOW).await.allowed);
        // The window lapses inside this call; the increment recreates the key.
        assert!(limiter.check_limit("user-3", 2, WINDOW).await.allowed);
        assert!(store.ttl(&key).await.unwrap().is_some());

        assert!(limiter.check_limit("user-3", 2, WINDOW).await.allowed);
        assert!(!limiter.check_limit("user-3", 2, WINDOW).await.allowed);

        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
        assert!(limiter.check_limit("user-3", 2, WINDOW).await.allowed);
    }

    #[tokio::test]
    #[traced_test]
    async fn missing_store_fails_open_with_warning() {
        let limiter = RateLimiter::new(None, FailurePolicy::FailOpen);
        for _ in 0..10 {
            let decision = limiter.check_limit("anyone", 1, WINDOW).await;
            assert!(decision.allowed);
        }
        assert!(logs_contain("rate limit store not configured"));
    }

    #[tokio::test]
    async fn broken_store_fails_open() {
        let limiter = RateLimiter::new(Some(Arc::new(BrokenStore)), FailurePolicy::FailOpen);
        assert!(limiter.check_limit("u", 1, WINDOW).await.allowed);
    }

    #[tokio::test]
    async fn broken_store_fails_closed_when_configured() {
        let limiter = RateLimiter::new(Some(Arc::new(BrokenStore)), FailurePolicy::FailClosed);
        let decision = limiter.check_limit("u", 1, WINDOW).await;
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }
}
