//! Time-to-live cache store for search results and provider short-circuit flags.
//!
//! The orchestrator caches successful search responses here, and rate-limited
//! providers park a flag here that makes later calls fail fast until the flag
//! expires.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use bookmeta_core::cache::{CacheStore, MemoryCache};
//!
//! # async fn example() {
//! let cache = MemoryCache::new();
//! cache.put("book_search:abc", "{}".to_string(), Duration::from_secs(60)).await;
//! assert!(cache.has("book_search:abc").await);
//! # }
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, instrument};

/// Key/value cache with per-entry expiry.
///
/// Values are opaque strings (serialized JSON in practice). Implementations
/// must be safe to share between concurrent requests; no single-flight
/// de-duplication is expected.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Returns the live value for `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key` for `ttl`.
    async fn put(&self, key: &str, value: String, ttl: Duration);

    /// True when `key` holds a live value.
    async fn has(&self, key: &str) -> bool {
        self.get(key).await.is_some()
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

/// Inserts between sweeps of expired entries.
const SWEEP_INTERVAL: usize = 64;

/// In-process cache backed by a concurrent map.
///
/// Expired entries are evicted on read. Every `SWEEP_INTERVAL` inserts a
/// sweep also drops expired entries that are never read again.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
    inserts: AtomicUsize,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet evicted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Removes every expired entry.
    pub fn sweep_expired(&self) {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, "swept expired cache entries");
        }
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        // clone out before removing so the shard lock is released
        let entry = self.entries.get(key).map(|entry| entry.value().clone())?;
        if entry.is_expired(now) {
            self.entries.remove_if(key, |_, current| current.is_expired(now));
            debug!(key, "cache entry expired");
            return None;
        }
        Some(entry.value)
    }

    async fn put(&self, key: &str, value: String, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.entries
            .insert(key.to_string(), CacheEntry { value, expires_at });
        if (self.inserts.fetch_add(1, Ordering::Relaxed) + 1) % SWEEP_INTERVAL == 0 {
            self.sweep_expired();
        }
    }
}

/// Cache key of a provider's rate-limit flag.
#[must_use]
pub fn rate_limit_key(provider: &str) -> String {
    format!("provider_rate_limited:{}", provider.to_ascii_lowercase().replace(' ', "_"))
}

/// Marks `provider` as rate limited for `window`.
#[instrument(skip(cache))]
pub async fn set_rate_limited(cache: &dyn CacheStore, provider: &str, window: Duration) {
    debug!(window_secs = window.as_secs(), "setting rate-limit flag");
    cache.put(&rate_limit_key(provider), "1".to_string(), window).await;
}

/// True while `provider` has a live rate-limit flag.
pub async fn is_rate_limited(cache: &dyn CacheStore, provider: &str) -> bool {
    cache.has(&rate_limit_key(provider)).await
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_cache_put_get_has() {
        let cache = MemoryCache::new();
        assert!(cache.get("missing").await.is_none());

        cache
            .put("k", "value".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.get("k").await.as_deref(), Some("value"));
        assert!(cache.has("k").await);
    }

    #[tokio::test]
    async fn test_memory_cache_expired_entry_is_evicted() {
        let cache = MemoryCache::new();
        cache.put("k", "value".to_string(), Duration::ZERO).await;

        assert!(cache.get("k").await.is_none());
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn test_memory_cache_put_sweeps_unread_expired_entries() {
        let cache = MemoryCache::new();
        for i in 0..(SWEEP_INTERVAL * 3) {
            cache.put(&format!("stale:{i}"), "v".to_string(), Duration::ZERO).await;
        }
        assert!(cache.len() < SWEEP_INTERVAL);

        cache.put("fresh", "v".to_string(), Duration::from_secs(60)).await;
        cache.sweep_expired();
        assert_eq!(cache.len(), 1);
        assert!(cache.has("fresh").await);
    }

    #[tokio::test]
    async fn test_memory_cache_put_overwrites() {
        let cache = MemoryCache::new();
        cache.put("k", "a".to_string(), Duration::from_secs(60)).await;
        cache.put("k", "b".to_string(), Duration::from_secs(60)).await;
        assert_eq!(cache.get("k").await.as_deref(), Some("b"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_rate_limit_flag_round_trip() {
        let cache = MemoryCache::new();
        assert!(!is_rate_limited(&cache, "Amazon Creators").await);

        set_rate_limited(&cache, "Amazon Creators", Duration::from_secs(300)).await;
        assert!(is_rate_limited(&cache, "Amazon Creators").await);
        assert!(!is_rate_limited(&cache, "Google Books").await);
    }

    #[test]
    fn test_rate_limit_key_is_stable() {
        assert_eq!(
            rate_limit_key("Amazon Creators"),
            "provider_rate_limited:amazon_creators"
        );
    }
}
