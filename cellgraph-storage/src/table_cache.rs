use lru::LruCache;
use std::io;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// An open handle to one store table.
pub trait TableHandle {
    fn name(&self) -> &str;

    /// Releases the handle. Called once, when the cache lets go of it.
    fn close(&self);
}

struct Entry<H> {
    handle: Arc<H>,
    last_access: Instant,
}

/// Bounded cache of open table handles with expire-after-access.
///
/// Handles leaving the cache through capacity eviction, expiry or
/// invalidation are closed exactly once.
pub struct TableCache<H: TableHandle> {
    entries: Mutex<LruCache<String, Entry<H>>>,
    ttl: Duration,
}

impl<H: TableHandle> TableCache<H> {
    pub fn new(capacity: NonZeroUsize, ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    fn lock(&self) -> MutexGuard<'_, LruCache<String, Entry<H>>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached handle for `name`, opening it on a miss.
    pub fn get<F>(&self, name: &str, open: F) -> io::Result<Arc<H>>
    where
        F: FnOnce(&str) -> io::Result<H>,
    {
        let mut entries = self.lock();
        self.expire(&mut entries);

        if let Some(entry) = entries.get_mut(name) {
            entry.last_access = Instant::now();
            return Ok(Arc::clone(&entry.handle));
        }

        let handle = Arc::new(open(name)?);
        let entry = Entry {
            handle: Arc::clone(&handle),
            last_access: Instant::now(),
        };
        if let Some((evicted, old)) = entries.push(name.to_string(), entry) {
            debug!(table = %evicted, "evicting table handle");
            old.handle.close();
        }
        Ok(handle)
    }

    fn expire(&self, entries: &mut LruCache<String, Entry<H>>) {
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, e)| e.last_access.elapsed() >= self.ttl)
            .map(|(k, _)| k.clone())
            .collect();
        for name in expired {
            if let Some(entry) = entries.pop(&name) {
                debug!(table = %name, "table handle expired");
                entry.handle.close();
            }
        }
    }

    pub fn invalidate(&self, name: &str) {
        if let Some(entry) = self.lock().pop(name) {
            entry.handle.close();
        }
    }

    /// Closes and drops every cached handle.
    pub fn invalidate_all(&self) {
        let mut entries = self.lock();
        while let Some((_, entry)) = entries.pop_lru() {
            entry.handle.close();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<H: TableHandle> Drop for TableCache<H> {
    fn drop(&mut self) {
        self.invalidate_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandle {
        name: String,
        closes: Arc<AtomicUsize>,
    }

    impl TableHandle for CountingHandle {
        fn name(&self) -> &str {
            &self.name
        }

        fn close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn opener(closes: &Arc<AtomicUsize>) -> impl Fn(&str) -> io::Result<CountingHandle> + '_ {
        move |name| {
            Ok(CountingHandle {
                name: name.to_string(),
                closes: Arc::clone(closes),
            })
        }
    }

    #[test]
    fn hit_reuses_the_handle() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cache = TableCache::new(NonZeroUsize::new(2).unwrap(), Duration::from_secs(60));
        let a = cache.get("a", opener(&closes)).unwrap();
        let b = cache.get("a", opener(&closes)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.name(), "a");
        assert_eq!(closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn capacity_eviction_closes_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cache = TableCache::new(NonZeroUsize::new(1).unwrap(), Duration::from_secs(60));
        cache.get("a", opener(&closes)).unwrap();
        cache.get("b", opener(&closes)).unwrap();
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
        cache.invalidate_all();
        assert_eq!(closes.load(Ordering::SeqCst), 2);
        assert!(cache.is_empty());
        drop(cache);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn expired_handles_are_reopened() {
        let closes = Arc::new(AtomicUsize::new(0));
        let cache = TableCache::new(NonZeroUsize::new(4).unwrap(), Duration::ZERO);
        let first = cache.get("a", opener(&closes)).unwrap();
        let second = cache.get("a", opener(&closes)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn drop_closes_everything() {
        let closes = Arc::new(AtomicUsize::new(0));
        {
            let cache = TableCache::new(NonZeroUsize::new(4).unwrap(), Duration::from_secs(60));
            cache.get("a", opener(&closes)).unwrap();
            cache.get("b", opener(&closes)).unwrap();
        }
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }
}
