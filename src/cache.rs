use crate::metrics;
use crate::types::PriceMap;
use crate::utils::now_epoch_ms;
use dashmap::DashMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

/// Time source for the cache, injectable so expiry can be tested without
/// sleeping.
pub trait Clock: Send + Sync {
    fn now_epoch_ms(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_ms(&self) -> i64 {
        now_epoch_ms()
    }
}

/// Manually driven clock. Clones share the same time.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_epoch_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(start_epoch_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms.fetch_add(by.as_millis() as i64, Ordering::Relaxed);
    }

    pub fn set(&self, epoch_ms: i64) {
        self.now_ms.store(epoch_ms, Ordering::Relaxed);
    }
}

impl Clock for ManualClock {
    fn now_epoch_ms(&self) -> i64 {
        self.now_ms.load(Ordering::Relaxed)
    }
}

/// Last aggregated price map stored under a cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub payload: PriceMap,
    pub stored_at_epoch_ms: i64,
}

impl CacheEntry {
    fn is_expired(&self, now_ms: i64, ttl: Duration) -> bool {
        now_ms.saturating_sub(self.stored_at_epoch_ms) > ttl.as_millis() as i64
    }
}

/// Short-lived price map cache.
///
/// One entry per key, expiry is lazy: an entry older than the TTL is dropped
/// the next time it is read, nothing is evicted in the background.
///
/// The cache never calls the aggregator itself. Callers check `get`, resolve
/// on a miss and `set` the result.
///
/// ## Durable mirror
///
/// With `with_mirror`, every `set` also writes all entries to a JSON file and
/// a memory miss consults that file (with the same age check). The mirror is
/// best-effort: I/O or decode failures are logged and otherwise ignored.
#[derive(Clone)]
pub struct PriceCache {
    entries: Arc<DashMap<String, CacheEntry>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    mirror: Option<Arc<PathBuf>>,
}

impl Default for PriceCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl: DEFAULT_TTL,
            clock: Arc::new(SystemClock),
            mirror: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_mirror(mut self, path: impl Into<PathBuf>) -> Self {
        self.mirror = Some(Arc::new(path.into()));
        self
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the payload stored under `key` unless it is older than the TTL.
    pub fn get(&self, key: &str) -> Option<PriceMap> {
        let now = self.clock.now_epoch_ms();

        let cached = self.entries.get(key).map(|e| e.value().clone());
        let entry = match cached {
            Some(entry) => Some(entry),
            None => self.load_from_mirror(key),
        };

        match entry {
            Some(entry) if !entry.is_expired(now, self.ttl) => {
                metrics::increment_cache_hit(key);
                let payload = entry.payload.clone();
                self.entries.entry(key.to_string()).or_insert(entry);
                Some(payload)
            }
            Some(_) => {
                debug!("Price cache entry {:?} expired (ttl {:?})", key, self.ttl);
                self.evict_if_expired(key, now);
                metrics::increment_cache_miss(key);
                None
            }
            None => {
                metrics::increment_cache_miss(key);
                None
            }
        }
    }

    /// Stores `payload` under `key`, replacing any previous entry.
    pub fn set(&self, key: &str, payload: PriceMap) {
        let entry = CacheEntry {
            payload,
            stored_at_epoch_ms: self.clock.now_epoch_ms(),
        };
        self.entries.insert(key.to_string(), entry);
        self.write_mirror();
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
        self.write_mirror();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Re-checks the age under the shard lock: a concurrent `set` that
    // replaced the stale entry keeps its fresh one.
    fn evict_if_expired(&self, key: &str, now: i64) {
        let ttl = self.ttl;
        self.entries.remove_if(key, |_, entry| entry.is_expired(now, ttl));
    }

    fn load_from_mirror(&self, key: &str) -> Option<CacheEntry> {
        let path = self.mirror.as_deref()?;
        read_mirror(path).remove(key)
    }

    fn write_mirror(&self) {
        let Some(path) = self.mirror.as_deref() else {
            return;
        };
        let snapshot: HashMap<String, CacheEntry> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect();
        if let Err(e) = write_atomically(path, &snapshot) {
            warn!("⚠️ Failed to write price cache mirror {}: {}", path.display(), e);
        }
    }
}

fn read_mirror(path: &Path) -> HashMap<String, CacheEntry> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            debug!("No price cache mirror at {}: {}", path.display(), e);
            return HashMap::new();
        }
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("⚠️ Ignoring unreadable price cache mirror {}: {}", path.display(), e);
            HashMap::new()
        }
    }
}

fn write_atomically(path: &Path, entries: &HashMap<String, CacheEntry>) -> anyhow::Result<()> {
    let json = serde_json::to_string(entries)?;
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, json)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TokenAddress;

    fn payload() -> PriceMap {
        let mut map = PriceMap::new();
        map.insert(TokenAddress::new("0xabc").unwrap(), 1.23);
        map
    }

    #[test]
    fn entry_expires_strictly_after_ttl() {
        let clock = ManualClock::new(1_000_000);
        let cache = PriceCache::new()
            .with_ttl(Duration::from_secs(30))
            .with_clock(Arc::new(clock.clone()));

        cache.set("multi_price", payload());
        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get("multi_price"), Some(payload()));

        clock.advance(Duration::from_millis(1));
        assert_eq!(cache.get("multi_price"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn eviction_keeps_an_entry_refreshed_after_the_stale_read() {
        let clock = ManualClock::new(0);
        let cache = PriceCache::new()
            .with_ttl(Duration::from_secs(30))
            .with_clock(Arc::new(clock.clone()));

        cache.set("multi_price", payload());
        clock.advance(Duration::from_secs(31));
        let stale_seen_at = clock.now_epoch_ms();

        // Another task stores a fresh map between the read and the eviction
        let mut fresh = PriceMap::new();
        fresh.insert(TokenAddress::new("0xdef").unwrap(), 4.0);
        cache.set("multi_price", fresh.clone());

        cache.evict_if_expired("multi_price", stale_seen_at);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("multi_price"), Some(fresh));

        clock.advance(Duration::from_secs(31));
        cache.evict_if_expired("multi_price", clock.now_epoch_ms());
        assert!(cache.is_empty());
    }

    #[test]
    fn keys_are_independent_and_set_overwrites() {
        let cache = PriceCache::new();
        cache.set("a", payload());
        assert_eq!(cache.get("b"), None);

        let mut other = PriceMap::new();
        other.insert(TokenAddress::new("0xdef").unwrap(), 4.0);
        cache.set("a", other.clone());
        assert_eq!(cache.get("a"), Some(other));
        assert_eq!(cache.len(), 1);

        cache.invalidate("a");
        assert_eq!(cache.get("a"), None);
    }
}
