//! Per-identity fixed-window rate limiting for order creation.
//!
//! A window opens with the first call for a key and lasts [`RateLimitConfig::window`]. Up to
//! [`RateLimitConfig::max_calls`] calls are admitted in that window; the rest are refused until it expires, at which
//! point the next call opens a fresh window.
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use log::*;

#[cfg(feature = "sqlite")]
use crate::{traits::RateLimitManagement, SqliteDatabase};

pub const DEFAULT_MAX_CALLS: u32 = 5;
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(60);
const PURGE_THRESHOLD: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_calls: u32,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_calls: DEFAULT_MAX_CALLS, window: DEFAULT_WINDOW }
    }
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Registers a call for `key`. Returns `false` if the key has used up its allowance in the current window.
    async fn allow(&self, key: &str) -> bool;
}

//--------------------------------------   In-process limiter   ------------------------------------------------------
#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Keeps the counters in process memory. Only correct when a single service instance handles all traffic.
#[derive(Debug, Default)]
pub struct FixedWindowRateLimiter {
    config: RateLimitConfig,
    windows: DashMap<String, Window>,
}

impl FixedWindowRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { config, windows: DashMap::new() }
    }

    /// The entry lock is held for the whole check-and-increment, so concurrent calls for one key are serialised.
    pub fn allow_at(&self, key: &str, now: Instant) -> bool {
        if self.windows.len() > PURGE_THRESHOLD {
            self.purge_expired(now);
        }
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window { started: now, count: 0 });
        let window = entry.value_mut();
        if now.saturating_duration_since(window.started) >= self.config.window {
            *window = Window { started: now, count: 0 };
        }
        if window.count >= self.config.max_calls {
            return false;
        }
        window.count += 1;
        true
    }

    pub fn purge_expired(&self, now: Instant) {
        let before = self.windows.len();
        self.windows.retain(|_, w| now.saturating_duration_since(w.started) < self.config.window);
        trace!("🚦️ Purged {} expired rate limit windows", before - self.windows.len());
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn allow(&self, key: &str) -> bool {
        let allowed = self.allow_at(key, Instant::now());
        if !allowed {
            debug!("🚦️ Rate limit reached for {key}");
        }
        allowed
    }
}

//--------------------------------------    Shared limiter     -------------------------------------------------------
/// Keeps the counters in the database, so every instance that shares the database shares the limit.
///
/// If the store cannot be reached the call is admitted. The order insert that follows will surface the outage.
#[cfg(feature = "sqlite")]
#[derive(Debug, Clone)]
pub struct StoreRateLimiter {
    db: SqliteDatabase,
    config: RateLimitConfig,
}

#[cfg(feature = "sqlite")]
impl StoreRateLimiter {
    pub fn new(db: SqliteDatabase, config: RateLimitConfig) -> Self {
        Self { db, config }
    }
}

#[cfg(feature = "sqlite")]
#[async_trait]
impl RateLimiter for StoreRateLimiter {
    async fn allow(&self, key: &str) -> bool {
        let window = chrono::Duration::milliseconds(i64::try_from(self.config.window.as_millis()).unwrap_or(i64::MAX));
        match self.db.register_call(key, chrono::Utc::now(), window, self.config.max_calls).await {
            Ok(true) => true,
            Ok(false) => {
                debug!("🚦️ Rate limit reached for {key}");
                false
            },
            Err(e) => {
                error!("🚦️ Could not check the rate limit for {key}. Admitting the call. {e}");
                true
            },
        }
    }
}
