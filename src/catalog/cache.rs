// Response Cache
// Fingerprint -> (payload, stored_at) with a fixed TTL judged lazily on read.
// Entries live in a pluggable ResponseStore; the in-memory store is bounded.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::envelope::CatalogMethod;
use crate::observability::{record_metric, MetricType};

/// Default time-to-live for cached catalog responses (one hour)
pub const DEFAULT_TTL: Duration = Duration::from_millis(3_600_000);

/// Default bound for the in-memory store
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Source of "now" for TTL decisions
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to. Used to exercise TTL expiry.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let delta = TimeDelta::from_std(by).unwrap_or(TimeDelta::MAX);
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(Utc::now())
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Cache key: method wire name plus the caller's serialized parameters.
///
/// `serde_json::Map` keeps keys sorted, so equal parameter sets always
/// produce the same fingerprint regardless of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(method: CatalogMethod, params: &Map<String, Value>) -> Self {
        let serialized = Value::Object(params.clone()).to_string();
        Self(format!("{}:{}", method.wire_name(), serialized))
    }

    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One cached upstream response
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub fingerprint: Fingerprint,
    pub payload: Value,
    pub stored_at: DateTime<Utc>,
}

/// Backing store for cache entries. Freshness is decided by `ResponseCache`,
/// stores only keep entries and their timestamps.
#[async_trait]
pub trait ResponseStore: Send + Sync {
    async fn load(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>>;

    /// Insert or overwrite the entry for its fingerprint
    async fn save(&self, entry: CacheEntry) -> Result<()>;

    /// Remove every entry stored strictly before `cutoff`, returning how many went
    async fn purge_stored_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

    async fn len(&self) -> Result<usize>;
}

/// Process-local store bounded to `max_entries`.
/// When full, inserting a new fingerprint evicts the oldest stored entry.
pub struct MemoryResponseStore {
    entries: Mutex<HashMap<Fingerprint, CacheEntry>>,
    max_entries: usize,
}

impl MemoryResponseStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries: max_entries.max(1),
        }
    }
}

impl Default for MemoryResponseStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ENTRIES)
    }
}

#[async_trait]
impl ResponseStore for MemoryResponseStore {
    async fn load(&self, fingerprint: &Fingerprint) -> Result<Option<CacheEntry>> {
        Ok(self.entries.lock().get(fingerprint).cloned())
    }

    async fn save(&self, entry: CacheEntry) -> Result<()> {
        let mut entries = self.entries.lock();

        if !entries.contains_key(&entry.fingerprint) && entries.len() >= self.max_entries {
            let oldest = entries
                .values()
                .min_by_key(|e| e.stored_at)
                .map(|e| e.fingerprint.clone());
            if let Some(oldest) = oldest {
                debug!(fingerprint = %oldest, "evicting oldest cache entry");
                entries.remove(&oldest);
            }
        }

        entries.insert(entry.fingerprint.clone(), entry);
        Ok(())
    }

    async fn purge_stored_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.stored_at >= cutoff);
        Ok(before - entries.len())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.lock().len())
    }
}

/// Snapshot of cache counters
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    pub ttl_seconds: u64,
}

/// TTL cache owned by a gateway instance
pub struct ResponseCache {
    store: Arc<dyn ResponseStore>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    ttl_delta: TimeDelta,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    pub fn new(store: Arc<dyn ResponseStore>, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl,
            ttl_delta: TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry) -> bool {
        self.clock.now() - entry.stored_at < self.ttl_delta
    }

    /// Fresh payload for the fingerprint, or `None` on a miss.
    /// Expired entries count as misses; store failures are logged and count as misses.
    pub async fn get(&self, fingerprint: &Fingerprint) -> Option<Value> {
        let loaded = match self.store.load(fingerprint).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(fingerprint = %fingerprint, error = %e, "cache store read failed");
                None
            }
        };

        match loaded {
            Some(entry) if self.is_fresh(&entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                record_metric(MetricType::Counter {
                    name: "cache.hit",
                    value: 1,
                });
                Some(entry.payload)
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                record_metric(MetricType::Counter {
                    name: "cache.miss",
                    value: 1,
                });
                None
            }
        }
    }

    /// Store a payload stamped with the current clock time
    pub async fn put(&self, fingerprint: Fingerprint, payload: Value) {
        let entry = CacheEntry {
            fingerprint,
            payload,
            stored_at: self.clock.now(),
        };
        let key = entry.fingerprint.clone();
        if let Err(e) = self.store.save(entry).await {
            warn!(fingerprint = %key, error = %e, "cache store write failed");
        }
    }

    /// Drop every expired entry from the backing store
    pub async fn sweep_expired(&self) -> Result<usize> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(self.ttl_delta)
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let removed = self.store.purge_stored_before(cutoff).await?;
        if removed > 0 {
            debug!(removed, "swept expired cache entries");
        }
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheStats {
        let entries = match self.store.len().await {
            Ok(len) => len,
            Err(e) => {
                warn!(error = %e, "cache store size query failed");
                0
            }
        };
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entries,
            ttl_seconds: self.ttl.as_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn cache_with_clock(max_entries: usize) -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let cache = ResponseCache::new(
            Arc::new(MemoryResponseStore::new(max_entries)),
            DEFAULT_TTL,
            clock.clone(),
        );
        (cache, clock)
    }

    fn key(n: u32) -> Fingerprint {
        let mut params = Map::new();
        params.insert("page".to_string(), json!(n));
        Fingerprint::new(CatalogMethod::Articles, &params)
    }

    #[test]
    fn test_fingerprint_ignores_insertion_order() {
        let mut a = Map::new();
        a.insert("b".to_string(), json!(2));
        a.insert("a".to_string(), json!(1));
        let mut b = Map::new();
        b.insert("a".to_string(), json!(1));
        b.insert("b".to_string(), json!(2));

        let fa = Fingerprint::new(CatalogMethod::Articles, &a);
        assert_eq!(fa, Fingerprint::new(CatalogMethod::Articles, &b));
        assert_eq!(fa.as_str(), r#"getArticles:{"a":1,"b":2}"#);
    }

    #[tokio::test]
    async fn test_hit_within_ttl_and_miss_after() {
        let (cache, clock) = cache_with_clock(10);
        assert!(cache.get(&key(1)).await.is_none());

        cache.put(key(1), json!({"ok": true})).await;
        clock.advance(Duration::from_millis(3_599_999));
        assert_eq!(cache.get(&key(1)).await, Some(json!({"ok": true})));

        clock.advance(Duration::from_millis(1));
        assert!(cache.get(&key(1)).await.is_none());

        let stats = cache.stats().await;
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.ttl_seconds, 3600);
    }

    #[tokio::test]
    async fn test_stale_entry_overwritten_on_put() {
        let (cache, clock) = cache_with_clock(10);
        cache.put(key(1), json!(1)).await;
        clock.advance(DEFAULT_TTL);
        cache.put(key(1), json!(2)).await;
        assert_eq!(cache.get(&key(1)).await, Some(json!(2)));
    }

    #[tokio::test]
    async fn test_memory_store_evicts_oldest_when_full() {
        let (cache, clock) = cache_with_clock(2);
        cache.put(key(1), json!(1)).await;
        clock.advance(Duration::from_secs(1));
        cache.put(key(2), json!(2)).await;
        clock.advance(Duration::from_secs(1));
        cache.put(key(3), json!(3)).await;

        assert!(cache.get(&key(1)).await.is_none());
        assert_eq!(cache.get(&key(2)).await, Some(json!(2)));
        assert_eq!(cache.get(&key(3)).await, Some(json!(3)));
        assert_eq!(cache.stats().await.entries, 2);
    }

    #[tokio::test]
    async fn test_overwrite_does_not_evict() {
        let (cache, _clock) = cache_with_clock(2);
        cache.put(key(1), json!(1)).await;
        cache.put(key(2), json!(2)).await;
        cache.put(key(2), json!(22)).await;
        assert_eq!(cache.get(&key(1)).await, Some(json!(1)));
        assert_eq!(cache.get(&key(2)).await, Some(json!(22)));
    }

    #[tokio::test]
    async fn test_sweep_removes_only_expired() {
        let (cache, clock) = cache_with_clock(10);
        cache.put(key(1), json!(1)).await;
        clock.advance(Duration::from_secs(1800));
        cache.put(key(2), json!(2)).await;
        clock.advance(Duration::from_secs(1801));

        assert_eq!(cache.sweep_expired().await.expect("sweep"), 1);
        assert_eq!(cache.stats().await.entries, 1);
        assert_eq!(cache.get(&key(2)).await, Some(json!(2)));
    }
}
