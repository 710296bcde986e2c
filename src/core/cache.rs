//! Weak memoization of materialized child nodes.
//!
//! Readers build children lazily and remember them only weakly: a parent
//! hands out the live instance while someone holds it and rebuilds from the
//! stored headers once everyone has let go.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

use crate::util::Result;

/// Entry count below which dead entries are left in place.
const MIN_PRUNE_AT: usize = 32;

/// Map from child key to the last instance handed out.
pub struct WeakCache<K, T: ?Sized> {
    entries: Mutex<Entries<K, T>>,
}

struct Entries<K, T: ?Sized> {
    map: HashMap<K, Weak<T>>,
    /// Dead entries are swept once the map reaches this size, which is then
    /// reset to twice what survived.
    prune_at: usize,
}

impl<K: Eq + Hash, T: ?Sized> Entries<K, T> {
    fn prune_if_due(&mut self) {
        if self.map.len() < self.prune_at {
            return;
        }
        self.map.retain(|_, weak| weak.strong_count() > 0);
        self.prune_at = (self.map.len() * 2).max(MIN_PRUNE_AT);
    }
}

impl<K: Eq + Hash, T: ?Sized> Default for WeakCache<K, T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(Entries {
                map: HashMap::new(),
                prune_at: MIN_PRUNE_AT,
            }),
        }
    }
}

impl<K: Eq + Hash + Clone, T: ?Sized> WeakCache<K, T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The live instance for `key`, if any.
    pub fn get(&self, key: &K) -> Option<Arc<T>> {
        self.entries.lock().map.get(key).and_then(Weak::upgrade)
    }

    /// Return the live instance for `key` or build one with `make`.
    ///
    /// The lock is held while `make` runs, so two racing callers get the
    /// same instance. `make` must not touch this cache.
    pub fn get_or_try_insert_with<F>(&self, key: &K, make: F) -> Result<Arc<T>>
    where
        F: FnOnce() -> Result<Arc<T>>,
    {
        let mut entries = self.entries.lock();
        if let Some(live) = entries.map.get(key).and_then(Weak::upgrade) {
            return Ok(live);
        }
        let fresh = make()?;
        if !entries.map.contains_key(key) {
            entries.prune_if_due();
        }
        entries.map.insert(key.clone(), Arc::downgrade(&fresh));
        tracing::trace!(entries = entries.map.len(), "materialized child");
        Ok(fresh)
    }

    /// Number of entries whose instance is still alive.
    pub fn live_count(&self) -> usize {
        self.entries
            .lock()
            .map
            .values()
            .filter(|weak| weak.strong_count() > 0)
            .count()
    }

    /// Entries held, dead ones included.
    pub fn num_entries(&self) -> usize {
        self.entries.lock().map.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_same_instance_while_alive() {
        let cache: WeakCache<usize, String> = WeakCache::new();
        let builds = AtomicUsize::new(0);
        let make = || {
            builds.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new("x".to_string()))
        };

        let a = cache.get_or_try_insert_with(&0, make).unwrap();
        let b = cache.get_or_try_insert_with(&0, make).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(builds.load(Ordering::SeqCst), 1);

        drop(a);
        drop(b);
        assert!(cache.get(&0).is_none());
        assert_eq!(cache.live_count(), 0);

        let _c = cache.get_or_try_insert_with(&0, make).unwrap();
        assert_eq!(builds.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failed_build_is_not_cached() {
        let cache: WeakCache<&str, u32> = WeakCache::new();
        let err = cache.get_or_try_insert_with(&"k", || Err(crate::util::Error::other("nope")));
        assert!(err.is_err());
        assert!(cache.get(&"k").is_none());
    }

    #[test]
    fn test_dead_entries_are_swept_in_batches() {
        let cache: WeakCache<usize, usize> = WeakCache::new();
        let kept: Vec<Arc<usize>> = (0..10)
            .map(|i| cache.get_or_try_insert_with(&i, || Ok(Arc::new(i))).unwrap())
            .collect();
        for i in 10..10_000 {
            cache.get_or_try_insert_with(&i, || Ok(Arc::new(i))).unwrap();
            assert!(cache.num_entries() <= MIN_PRUNE_AT);
        }
        assert_eq!(cache.live_count(), kept.len());
        for (i, live) in kept.iter().enumerate() {
            assert!(cache.get(&i).is_some_and(|v| Arc::ptr_eq(&v, live)));
        }
    }

    #[test]
    fn test_racing_builders_share_one_winner() {
        let cache: Arc<WeakCache<u8, u64>> = Arc::new(WeakCache::new());
        let builds = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                let builds = builds.clone();
                std::thread::spawn(move || {
                    cache
                        .get_or_try_insert_with(&1, || {
                            builds.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Ok(Arc::new(7))
                        })
                        .unwrap()
                })
            })
            .collect();
        let results: Vec<Arc<u64>> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(builds.load(Ordering::SeqCst), 1);
    }
}
