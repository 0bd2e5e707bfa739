//! Per-key request coalescing.
//!
//! Concurrent `collect` calls for the same (metric, parameters) pair must
//! not stampede a slow subsystem: the first caller executes the probe and
//! the rest queue on a per-key async lock, re-checking the cache once
//! they acquire it. Locks are held in a concurrent map as weak references
//! and removed as soon as the last guard drops, so the table stays empty
//! when nothing is in flight.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::cache::CacheKey;

pub(crate) struct FlightTable {
    locks: Arc<DashMap<CacheKey, Weak<Mutex<()>>>>,
}

/// Guard for one in-flight (metric, parameters) pair. Dropping it wakes
/// the next queued caller; the last guard removes the map entry.
pub(crate) struct FlightGuard {
    guard: Option<OwnedMutexGuard<()>>,
    lock: Arc<Mutex<()>>,
    key: CacheKey,
    locks: Arc<DashMap<CacheKey, Weak<Mutex<()>>>>,
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only this guard's Arc remains: no holder, no waiter. Remove the
        // entry so the table does not accumulate dead weak refs.
        if Arc::strong_count(&self.lock) == 1 {
            self.locks.remove(&self.key);
        }
    }
}

impl FlightTable {
    pub(crate) fn new() -> Self {
        FlightTable {
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Acquires the in-flight slot for `key`, queueing behind an existing
    /// execution if there is one.
    pub(crate) async fn acquire(&self, key: &CacheKey) -> FlightGuard {
        let lock = self.lock_for(key);
        let guard = Arc::clone(&lock).lock_owned().await;
        FlightGuard {
            guard: Some(guard),
            lock,
            key: key.clone(),
            locks: Arc::clone(&self.locks),
        }
    }

    fn lock_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        loop {
            match self.locks.entry(key.clone()) {
                dashmap::mapref::entry::Entry::Occupied(occupied) => {
                    if let Some(live) = occupied.get().upgrade() {
                        return live;
                    }
                    // The last holder raced us between upgrade and its
                    // Drop cleanup; retry with a fresh lock.
                    occupied.remove();
                }
                dashmap::mapref::entry::Entry::Vacant(vacant) => {
                    let lock = Arc::new(Mutex::new(()));
                    vacant.insert(Arc::downgrade(&lock));
                    return lock;
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn in_flight(&self) -> usize {
        self.locks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn key(metric: &str) -> CacheKey {
        CacheKey::new(metric.parse().unwrap(), Vec::new())
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let table = Arc::new(FlightTable::new());
        let peak = Arc::new(AtomicUsize::new(0));
        let active = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let table = Arc::clone(&table);
            let peak = Arc::clone(&peak);
            let active = Arc::clone(&active);
            handles.push(tokio::spawn(async move {
                let _guard = table.acquire(&key("a.b")).await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                sleep(Duration::from_millis(2)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let table = Arc::new(FlightTable::new());
        let started = std::time::Instant::now();

        let mut handles = Vec::new();
        for i in 0..5 {
            let table = Arc::clone(&table);
            handles.push(tokio::spawn(async move {
                let _guard = table.acquire(&key(&format!("a.k{i}"))).await;
                sleep(Duration::from_millis(50)).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(
            started.elapsed() < Duration::from_millis(200),
            "independent keys must not serialize"
        );
    }

    #[tokio::test]
    async fn table_empties_after_the_last_guard_drops() {
        let table = FlightTable::new();
        {
            let _guard = table.acquire(&key("a.b")).await;
            assert_eq!(table.in_flight(), 1);
        }
        assert_eq!(table.in_flight(), 0);
    }
}
