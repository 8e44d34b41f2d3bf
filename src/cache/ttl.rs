//! Deduplicating TTL cache
//!
//! `DedupCache` shares one expensive, idempotent load per key between all
//! concurrent callers:
//! - A fresh value (or error) is returned without calling the loader.
//! - A missing or expired entry is loaded exactly once; callers arriving
//!   while the load is in flight wait on the key's lock and observe the
//!   same result.
//! - Errors are cached too (for `error_ttl`), so a failing backend is not
//!   hit on every request.
//!
//! Every key owns a cell with its own `RwLock`; unrelated keys never contend.
//! The number of cells is bounded and the least recently used ones are
//! dropped first. A cell whose load is in flight stays reachable even if it
//! was evicted meanwhile, so eviction pressure cannot start a second load.
//!
//! If the caller driving a load is cancelled, nothing is stored and the next
//! waiter runs the loader itself, so a cancelled request never poisons the
//! entry for everyone else.

use moka::policy::EvictionPolicy;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::stats::{CacheStats, CacheStatsTracker};

struct Loaded<V, E> {
    result: Result<V, E>,
    expire_at: Instant,
}

struct Cell<V, E> {
    state: RwLock<Option<Loaded<V, E>>>,
}

impl<V, E> Cell<V, E> {
    fn new() -> Self {
        Self {
            state: RwLock::new(None),
        }
    }
}

type InFlightMap<K, V, E> = Mutex<HashMap<K, Arc<Cell<V, E>>>>;

fn lock_map<K, V, E>(map: &InFlightMap<K, V, E>) -> MutexGuard<'_, HashMap<K, Arc<Cell<V, E>>>> {
    map.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registration of a running load; removed on completion or cancellation.
struct InFlight<'a, K: Hash + Eq, V, E> {
    map: &'a InFlightMap<K, V, E>,
    key: K,
    cell: Arc<Cell<V, E>>,
}

impl<'a, K: Hash + Eq + Clone, V, E> InFlight<'a, K, V, E> {
    fn register(map: &'a InFlightMap<K, V, E>, key: &K, cell: &Arc<Cell<V, E>>) -> Self {
        lock_map(map).insert(key.clone(), Arc::clone(cell));
        Self {
            map,
            key: key.clone(),
            cell: Arc::clone(cell),
        }
    }
}

impl<K: Hash + Eq, V, E> Drop for InFlight<'_, K, V, E> {
    fn drop(&mut self) {
        let mut map = lock_map(self.map);
        if map
            .get(&self.key)
            .map_or(false, |cell| Arc::ptr_eq(cell, &self.cell))
        {
            map.remove(&self.key);
        }
    }
}

/// Keyed cache with single-flight loading and timed expiry
pub struct DedupCache<K, V, E> {
    cells: moka::sync::Cache<K, Arc<Cell<V, E>>>,
    inflight: InFlightMap<K, V, E>,
    ttl: Duration,
    error_ttl: Duration,
    stats: CacheStatsTracker,
}

impl<K, V, E> DedupCache<K, V, E>
where
    K: Hash + Eq + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    /// Create a cache whose entries live for `ttl` and which keeps at most
    /// `max_keys` distinct keys.
    pub fn new(ttl: Duration, max_keys: u64) -> Self {
        let cells = moka::sync::Cache::builder()
            .max_capacity(max_keys)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            cells,
            inflight: Mutex::new(HashMap::new()),
            ttl,
            error_ttl: ttl,
            stats: CacheStatsTracker::new(),
        }
    }

    /// Cache failed loads for a different duration than successful ones.
    pub fn with_error_ttl(mut self, error_ttl: Duration) -> Self {
        self.error_ttl = error_ttl;
        self
    }

    fn cell(&self, key: &K) -> Arc<Cell<V, E>> {
        if let Some(cell) = lock_map(&self.inflight).get(key) {
            return Arc::clone(cell);
        }
        self.cells.get_with(key.clone(), || Arc::new(Cell::new()))
    }

    /// Return the cached result for `key`, running `loader` when the entry
    /// is missing or expired.
    pub async fn load<F, Fut>(&self, key: &K, loader: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = self.cell(key);

        {
            let state = cell.state.read().await;
            if let Some(loaded) = state.as_ref() {
                if Instant::now() < loaded.expire_at {
                    self.stats.increment_hits();
                    return loaded.result.clone();
                }
            }
        }

        let mut state = cell.state.write().await;

        // Another caller may have finished loading while we waited
        if let Some(loaded) = state.as_ref() {
            if Instant::now() < loaded.expire_at {
                self.stats.increment_hits();
                return loaded.result.clone();
            }
        }

        self.stats.increment_misses();
        self.stats.increment_loads();

        let _inflight = InFlight::register(&self.inflight, key, &cell);
        let result = loader().await;
        let ttl = if result.is_ok() {
            self.ttl
        } else {
            self.error_ttl
        };

        *state = Some(Loaded {
            result: result.clone(),
            expire_at: Instant::now() + ttl,
        });

        // Put the cell back if it was evicted during the load
        self.cells
            .entry(key.clone())
            .or_insert_with(|| Arc::clone(&cell));

        result
    }

    /// Drop the cell for `key`; the next `load` runs the loader.
    pub fn invalidate(&self, key: &K) {
        self.cells.invalidate(key);
    }

    /// Approximate number of cells held.
    pub fn len(&self) -> u64 {
        self.cells.entry_count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Process pending evictions (moka maintenance).
    pub fn run_pending_tasks(&self) {
        self.cells.run_pending_tasks();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(0, self.cells.entry_count(), 0)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
