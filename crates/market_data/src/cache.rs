//! Time- and size-bounded keyed store.
//!
//! Expired entries are evicted lazily: when read, and in a sweep before each
//! insert. When the store is full, the oldest *inserted* entry is dropped
//! (insertion order, not LRU).
//!
//! Keys are plain strings; naming is the caller's job. Use
//! `{domain}-{networkId}-{...}` (see `MarketKey::cache_key`) so that
//! `clear_by_network` stays correct.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use common::config::CacheSettings;
use common::{MarketInfo, NetworkId};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Construction-time bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub ttl: Duration,
    pub max_size: usize,
}

impl CacheConfig {
    pub fn new(ttl: Duration, max_size: usize) -> Self {
        Self { ttl, max_size }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self::new(Duration::from_secs(settings.ttl_secs), settings.max_size)
    }
}

/// One stored value with its insertion time and network.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub key: String,
    pub data: V,
    pub timestamp: Instant,
    pub network_id: NetworkId,
    seq: u64,
}

impl<V> CacheEntry<V> {
    /// Fresh while `now - timestamp <= ttl`.
    pub fn is_expired(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.timestamp) > ttl
    }
}

/// Generic TTL cache.
#[derive(Debug)]
pub struct TtlCache<V> {
    config: CacheConfig,
    entries: HashMap<String, CacheEntry<V>>,
    next_seq: u64,
}

impl<V> TtlCache<V> {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Store `data` under `key`, stamped now.
    ///
    /// Sweeps expired entries first; if the store is still full, evicts the
    /// oldest-inserted entry. Overwriting an existing key keeps its
    /// insertion position and evicts nothing.
    pub fn set(&mut self, key: impl Into<String>, data: V, network_id: NetworkId) {
        if self.config.max_size == 0 {
            return;
        }

        let key = key.into();
        let now = Instant::now();
        self.sweep(now);

        let seq = match self.entries.get(&key) {
            Some(existing) => existing.seq,
            None => {
                if self.entries.len() >= self.config.max_size {
                    self.evict_oldest();
                }
                let seq = self.next_seq;
                self.next_seq += 1;
                seq
            }
        };

        self.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                data,
                timestamp: now,
                network_id,
                seq,
            },
        );
    }

    /// The stored value if still fresh. An expired entry is deleted.
    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.get_entry(key).map(|e| &e.data)
    }

    /// Like `get`, but exposes the entry's timestamp and network.
    pub fn get_entry(&mut self, key: &str) -> Option<&CacheEntry<V>> {
        let now = Instant::now();
        let ttl = self.config.ttl;
        if self
            .entries
            .get(key)
            .is_some_and(|e| e.is_expired(ttl, now))
        {
            debug!("cache: {} expired", key);
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key)
    }

    /// Same freshness check as `get`.
    pub fn has(&mut self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Remove one entry. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Remove every entry for a network. Returns how many were removed.
    pub fn clear_by_network(&mut self, network_id: &NetworkId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| &e.network_id != network_id);
        let removed = before - self.entries.len();
        if removed > 0 {
            debug!("cache: cleared {} entries for {}", removed, network_id);
        }
        removed
    }

    /// Stored entry count, including expired entries not yet swept.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sweep(&mut self, now: Instant) {
        let ttl = self.config.ttl;
        self.entries.retain(|_, e| !e.is_expired(ttl, now));
    }

    fn evict_oldest(&mut self) {
        let oldest = self
            .entries
            .values()
            .min_by_key(|e| e.seq)
            .map(|e| e.key.clone());
        if let Some(key) = oldest {
            debug!("cache: full, evicting {}", key);
            self.entries.remove(&key);
        }
    }
}

impl<V: Clone> TtlCache<V> {
    /// Fresh entries for a network, in insertion order. Expired entries of
    /// that network found during the scan are deleted.
    pub fn get_by_network(&mut self, network_id: &NetworkId) -> Vec<CacheEntry<V>> {
        let now = Instant::now();
        let ttl = self.config.ttl;
        self.entries
            .retain(|_, e| &e.network_id != network_id || !e.is_expired(ttl, now));

        let mut fresh: Vec<CacheEntry<V>> = self
            .entries
            .values()
            .filter(|e| &e.network_id == network_id)
            .cloned()
            .collect();
        fresh.sort_by_key(|e| e.seq);
        fresh
    }
}

/// Process-wide market cache, shared by every orchestrator that needs it.
pub type SharedMarketCache = Arc<Mutex<TtlCache<MarketInfo>>>;

/// Create a new empty SharedMarketCache.
pub fn new_market_cache(config: CacheConfig) -> SharedMarketCache {
    Arc::new(Mutex::new(TtlCache::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn cache(ttl_secs: u64, max_size: usize) -> TtlCache<u32> {
        TtlCache::new(CacheConfig::new(Duration::from_secs(ttl_secs), max_size))
    }

    fn net(id: &str) -> NetworkId {
        NetworkId::new(id)
    }

    #[tokio::test(start_paused = true)]
    async fn test_round_trip_then_expiry() {
        let mut c = cache(30, 10);
        c.set("market-mainnet-main-USDC", 7, net("mainnet"));
        assert_eq!(c.get("market-mainnet-main-USDC"), Some(&7));

        // Exactly at the TTL the entry is still fresh.
        advance(Duration::from_secs(30)).await;
        assert!(c.has("market-mainnet-main-USDC"));

        advance(Duration::from_secs(1)).await;
        assert_eq!(c.get("market-mainnet-main-USDC"), None);
        assert!(!c.has("market-mainnet-main-USDC"));
        // Lazy eviction removed it.
        assert!(c.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_cache_evicts_oldest_inserted() {
        let mut c = cache(60, 2);
        c.set("a", 1, net("mainnet"));
        advance(Duration::from_secs(1)).await;
        c.set("b", 2, net("mainnet"));

        // Reading "a" does not protect it: eviction is by insertion, not use.
        assert_eq!(c.get("a"), Some(&1));
        c.set("c", 3, net("mainnet"));

        assert!(!c.has("a"));
        assert!(c.has("b"));
        assert!(c.has("c"));
        assert_eq!(c.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_sweeps_expired_before_evicting() {
        let mut c = cache(10, 2);
        c.set("old", 1, net("mainnet"));
        advance(Duration::from_secs(5)).await;
        c.set("mid", 2, net("mainnet"));
        advance(Duration::from_secs(6)).await;

        // "old" is expired and swept, so "mid" survives.
        c.set("new", 3, net("mainnet"));
        assert!(c.has("mid"));
        assert!(c.has("new"));
        assert_eq!(c.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_does_not_evict() {
        let mut c = cache(60, 2);
        c.set("a", 1, net("mainnet"));
        c.set("b", 2, net("mainnet"));
        c.set("a", 10, net("mainnet"));

        assert_eq!(c.get("a"), Some(&10));
        assert_eq!(c.get("b"), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_overwrite_refreshes_timestamp() {
        let mut c = cache(10, 4);
        c.set("a", 1, net("mainnet"));
        advance(Duration::from_secs(8)).await;
        c.set("a", 2, net("mainnet"));
        advance(Duration::from_secs(8)).await;
        assert_eq!(c.get("a"), Some(&2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_scoped_operations() {
        let mut c = cache(10, 10);
        c.set("market-mainnet-1", 1, net("mainnet"));
        c.set("market-testnet-1", 2, net("testnet"));
        advance(Duration::from_secs(6)).await;
        c.set("market-mainnet-2", 3, net("mainnet"));

        let fresh = c.get_by_network(&net("mainnet"));
        let values: Vec<u32> = fresh.iter().map(|e| e.data).collect();
        assert_eq!(values, vec![1, 3]);

        advance(Duration::from_secs(5)).await;
        let fresh = c.get_by_network(&net("mainnet"));
        assert_eq!(fresh.len(), 1);
        assert_eq!(fresh[0].key, "market-mainnet-2");
        // The expired testnet entry is untouched by a mainnet scan.
        assert_eq!(c.len(), 2);

        assert_eq!(c.clear_by_network(&net("testnet")), 1);
        assert_eq!(c.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_and_clear() {
        let mut c = cache(10, 10);
        c.set("a", 1, net("mainnet"));
        c.set("b", 2, net("mainnet"));

        assert!(c.delete("a"));
        assert!(!c.delete("a"));
        assert_eq!(c.len(), 1);

        c.clear();
        assert!(c.is_empty());
    }

    #[test]
    fn test_zero_capacity_stores_nothing() {
        let mut c = cache(10, 0);
        c.set("a", 1, net("mainnet"));
        assert!(c.is_empty());
    }
}
