use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};

use cstage_common::key::MetricKey;
use cstage_common::types::ProbeResult;
use tokio::sync::Mutex;

/// Cache identity: metric key plus the canonical parameter tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    key: MetricKey,
    params: Vec<String>,
}

impl CacheKey {
    pub fn new(key: MetricKey, params: Vec<String>) -> Self {
        CacheKey { key, params }
    }

    pub fn metric(&self) -> &MetricKey {
        &self.key
    }
}

/// One cached collection outcome. Failures are cached the same way as
/// values (negative caching); the TTL is chosen by the dispatcher.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub outcome: ProbeResult,
    computed_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    pub fn new(outcome: ProbeResult, ttl: Duration) -> Self {
        CacheEntry {
            outcome,
            computed_at: Instant::now(),
            ttl,
        }
    }

    pub fn is_expired_at(&self, now: Instant) -> bool {
        now.duration_since(self.computed_at) >= self.ttl
    }

    pub fn age(&self) -> Duration {
        self.computed_at.elapsed()
    }
}

struct Slot {
    entry: CacheEntry,
    /// Recency tick; also the slot's key into `CacheInner::recency`.
    tick: u64,
}

struct CacheInner {
    map: HashMap<CacheKey, Slot>,
    /// Recency index: lowest tick = least recently used.
    recency: BTreeMap<u64, CacheKey>,
    clock: u64,
}

impl CacheInner {
    fn touch(&mut self, key: &CacheKey) {
        self.clock += 1;
        let tick = self.clock;
        if let Some(slot) = self.map.get_mut(key) {
            self.recency.remove(&slot.tick);
            slot.tick = tick;
            self.recency.insert(tick, key.clone());
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(slot) = self.map.remove(key) {
            self.recency.remove(&slot.tick);
        }
    }

    /// Drops every expired entry, then least-recently-used unexpired
    /// entries until the map fits `capacity`.
    fn enforce_capacity(&mut self, capacity: usize, now: Instant) {
        if self.map.len() <= capacity {
            return;
        }
        let expired: Vec<CacheKey> = self
            .map
            .iter()
            .filter(|(_, slot)| slot.entry.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        for key in expired {
            self.remove(&key);
        }
        while self.map.len() > capacity {
            let Some((&tick, _)) = self.recency.iter().next() else {
                break;
            };
            let Some(key) = self.recency.remove(&tick) else {
                break;
            };
            self.map.remove(&key);
        }
    }
}

/// Bounded result cache with per-entry TTL and LRU eviction.
///
/// Lookups never return expired entries (they are evicted lazily on
/// access). Once capacity is exceeded, expired entries are purged first,
/// then the least recently used unexpired entries. All access goes
/// through one async mutex, so readers observe complete entries only.
/// Capacity zero disables caching entirely.
pub struct ResultCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl ResultCache {
    pub fn new(capacity: usize) -> Self {
        ResultCache {
            inner: Mutex::new(CacheInner {
                map: HashMap::new(),
                recency: BTreeMap::new(),
                clock: 0,
            }),
            capacity,
        }
    }

    /// Returns a fresh entry and marks it recently used, or nothing.
    pub async fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        if self.capacity == 0 {
            return None;
        }
        let mut inner = self.inner.lock().await;
        let now = Instant::now();
        let entry = match inner.map.get(key) {
            None => return None,
            Some(slot) if slot.entry.is_expired_at(now) => None,
            Some(slot) => Some(slot.entry.clone()),
        };
        match entry {
            Some(entry) => {
                inner.touch(key);
                Some(entry)
            }
            None => {
                inner.remove(key);
                None
            }
        }
    }

    /// Inserts or atomically replaces the entry for `key`.
    pub async fn put(&self, key: CacheKey, entry: CacheEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut inner = self.inner.lock().await;
        inner.remove(&key);
        inner.clock += 1;
        let tick = inner.clock;
        inner.recency.insert(tick, key.clone());
        inner.map.insert(key, Slot { entry, tick });
        inner.enforce_capacity(self.capacity, Instant::now());
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.map.len()
    }
}
