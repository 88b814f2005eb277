//! Bounded pools of free mount content for one allocator.
//!
//! [`ItemPool`] is the seam that pool factories and allocators plug into;
//! [`DefaultPool`] is the stock LIFO implementation.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::allocator::{ContentAllocator, PoolKey, discard};

// ---------------------------------------------------------------------------
// PoolStats
// ---------------------------------------------------------------------------

/// Pool statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Maximum number of free instances the pool retains.
    pub capacity: usize,
    /// Current number of free instances.
    pub idle: usize,
    /// Acquisitions served from the pool.
    pub hits: u64,
    /// Acquisitions that found the pool empty.
    pub misses: u64,
    /// Releases the pool retained.
    pub accepted: u64,
    /// Releases the pool handed back because it was full or released.
    pub refused: u64,
    /// Free instances discarded when the pool was released.
    pub discarded: u64,
}

// ---------------------------------------------------------------------------
// ItemPool
// ---------------------------------------------------------------------------

/// A bounded, thread-safe stash of interchangeable content instances.
///
/// Implementations must uphold:
/// - `len() <= capacity()` at all times;
/// - an instance returned by `acquire` is no longer held by the pool;
/// - after `release_all`, `acquire` returns `None` and `release` refuses.
pub trait ItemPool<C>: Send + Sync {
    /// Take a free instance, if any.
    fn acquire(&self) -> Option<C>;

    /// Offer an instance back. `Err` hands it back to the caller, who
    /// must discard it.
    fn release(&self, content: C) -> Result<(), C>;

    /// Close the pool and discard every free instance through `allocator`.
    /// Instances currently held by callers are not affected.
    fn release_all(&self, allocator: &dyn ContentAllocator<C>);

    /// Maximum number of free instances retained.
    fn capacity(&self) -> usize;

    /// Current number of free instances.
    fn len(&self) -> usize;

    /// Whether there are no free instances.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a release would currently be retained.
    fn has_room(&self) -> bool {
        self.len() < self.capacity()
    }

    /// Diagnostic snapshot.
    fn stats(&self) -> PoolStats {
        PoolStats {
            capacity: self.capacity(),
            idle: self.len(),
            ..PoolStats::default()
        }
    }
}

// ---------------------------------------------------------------------------
// PoolFactory
// ---------------------------------------------------------------------------

/// Builds pools on behalf of a scope. Returning `None` falls through to
/// the allocator's own pool and then to [`DefaultPool`].
pub trait PoolFactory<C>: Send + Sync {
    /// Create the pool for `key` with room for `capacity` free instances.
    fn create_pool(&self, key: PoolKey, capacity: usize) -> Option<Arc<dyn ItemPool<C>>>;
}

impl<C, F> PoolFactory<C> for F
where
    F: Fn(PoolKey, usize) -> Option<Arc<dyn ItemPool<C>>> + Send + Sync,
{
    fn create_pool(&self, key: PoolKey, capacity: usize) -> Option<Arc<dyn ItemPool<C>>> {
        self(key, capacity)
    }
}

// ---------------------------------------------------------------------------
// DefaultPool
// ---------------------------------------------------------------------------

struct PoolState<C> {
    free: Vec<C>,
    released: bool,
    stats: PoolStats,
}

/// Default pool: a mutex-guarded LIFO stack.
///
/// The most recently released instance is handed out first, keeping warm
/// instances in circulation.
pub struct DefaultPool<C> {
    key: PoolKey,
    capacity: usize,
    state: Mutex<PoolState<C>>,
}

impl<C> DefaultPool<C> {
    /// Create an empty pool for `key` retaining at most `capacity` instances.
    #[must_use]
    pub fn new(key: PoolKey, capacity: usize) -> Self {
        Self {
            key,
            capacity,
            state: Mutex::new(PoolState {
                free: Vec::with_capacity(capacity),
                released: false,
                stats: PoolStats {
                    capacity,
                    ..PoolStats::default()
                },
            }),
        }
    }

    /// The key this pool was created for.
    #[must_use]
    pub fn key(&self) -> PoolKey {
        self.key
    }

    /// Whether [`release_all`](ItemPool::release_all) has run.
    #[must_use]
    pub fn is_released(&self) -> bool {
        self.state.lock().released
    }
}

impl<C: Send + 'static> ItemPool<C> for DefaultPool<C> {
    fn acquire(&self) -> Option<C> {
        let mut state = self.state.lock();
        let content = state.free.pop();
        if content.is_some() {
            state.stats.hits += 1;
        } else {
            state.stats.misses += 1;
        }
        content
    }

    fn release(&self, content: C) -> Result<(), C> {
        let mut state = self.state.lock();
        if state.released || state.free.len() >= self.capacity {
            state.stats.refused += 1;
            return Err(content);
        }
        state.free.push(content);
        state.stats.accepted += 1;
        Ok(())
    }

    fn release_all(&self, allocator: &dyn ContentAllocator<C>) {
        let drained = {
            let mut state = self.state.lock();
            state.released = true;
            let drained = std::mem::take(&mut state.free);
            state.stats.discarded += drained.len() as u64;
            drained
        };

        for content in drained {
            discard(allocator, content);
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.state.lock().free.len()
    }

    fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            idle: state.free.len(),
            ..state.stats.clone()
        }
    }
}

impl<C> fmt::Debug for DefaultPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("DefaultPool")
            .field("key", &self.key)
            .field("capacity", &self.capacity)
            .field("idle", &state.free.len())
            .field("released", &state.released)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::CountingAllocator;

    fn pool(capacity: usize) -> DefaultPool<u64> {
        DefaultPool::new(PoolKey::numeric(1, "test"), capacity)
    }

    #[test]
    fn empty_pool_misses() {
        let pool = pool(2);
        assert!(pool.acquire().is_none());
        assert_eq!(pool.stats().misses, 1);
    }

    #[test]
    fn release_then_acquire_returns_same_instance() {
        let pool = pool(2);
        assert!(pool.release(7).is_ok());
        assert_eq!(pool.acquire(), Some(7));
        assert!(pool.is_empty());
    }

    #[test]
    fn lifo_order() {
        let pool = pool(3);
        pool.release(1).unwrap();
        pool.release(2).unwrap();
        pool.release(3).unwrap();
        assert_eq!(pool.acquire(), Some(3));
        assert_eq!(pool.acquire(), Some(2));
    }

    #[test]
    fn full_pool_refuses() {
        let pool = pool(2);
        assert!(pool.release(1).is_ok());
        assert!(pool.release(2).is_ok());
        assert!(!pool.has_room());
        assert_eq!(pool.release(3), Err(3));

        let stats = pool.stats();
        assert_eq!(stats.accepted, 2);
        assert_eq!(stats.refused, 1);
        assert_eq!(stats.idle, 2);
    }

    #[test]
    fn zero_capacity_refuses_everything() {
        let pool = pool(0);
        assert_eq!(pool.release(1), Err(1));
        assert!(pool.acquire().is_none());
    }

    #[test]
    fn release_all_hands_owned_content_to_allocator() {
        struct Labels(Mutex<Vec<String>>);

        impl ContentAllocator<String> for Labels {
            fn pool_key(&self) -> PoolKey {
                PoolKey::of::<String>()
            }

            fn create_content(&self, _host: &crate::HostContext) -> crate::Result<String> {
                Ok(String::from("label"))
            }

            fn on_content_discarded(&self, content: String) {
                self.0.lock().push(content);
            }
        }

        let labels = Labels(Mutex::new(Vec::new()));
        let pool: Arc<dyn ItemPool<String>> = Arc::new(DefaultPool::new(PoolKey::of::<String>(), 2));
        pool.release(String::from("title")).unwrap();
        pool.release(String::from("subtitle")).unwrap();

        pool.release_all(&labels);
        assert_eq!(*labels.0.lock(), vec!["title".to_string(), "subtitle".to_string()]);
        assert_eq!(
            pool.release(String::from("late")),
            Err(String::from("late"))
        );
    }

    #[test]
    fn release_all_discards_resident_only() {
        let allocator = CountingAllocator::new("release-all");
        let pool = pool(4);
        pool.release(1).unwrap();
        pool.release(2).unwrap();
        let held = pool.acquire();
        assert!(held.is_some());

        pool.release_all(&allocator);
        assert_eq!(allocator.discarded(), 1);
        assert!(pool.is_released());
        assert!(pool.acquire().is_none());
        assert_eq!(pool.stats().discarded, 1);
    }

    #[test]
    fn released_pool_refuses_late_returns() {
        let allocator = CountingAllocator::new("late");
        let pool = pool(4);
        pool.release_all(&allocator);
        assert_eq!(pool.release(9), Err(9));
    }

    #[test]
    fn closure_factory() {
        let factory = |key: PoolKey, capacity: usize| -> Option<Arc<dyn ItemPool<u64>>> {
            Some(Arc::new(DefaultPool::new(key, capacity * 2)))
        };
        let pool = PoolFactory::<u64>::create_pool(&factory, PoolKey::numeric(2, "doubled"), 3)
            .unwrap();
        assert_eq!(pool.capacity(), 6);
    }
}
