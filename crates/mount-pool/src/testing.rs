//! Testing utilities for mount-content pooling

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::allocator::{ContentAllocator, PoolKey};
use crate::error::{Error, Result};
use crate::host::HostContext;
use crate::policy::PoolingPolicy;
use crate::pool::{DefaultPool, ItemPool, PoolFactory};

/// Allocator producing sequential `u64` ids and recording every call.
///
/// The pool key is derived from the name, so two counting allocators with
/// the same name share pools.
pub struct CountingAllocator {
    name: &'static str,
    key: PoolKey,
    policy: PoolingPolicy,
    pool_size: usize,
    fail_after: Option<u64>,
    next_id: AtomicU64,
    discarded: Mutex<Vec<u64>>,
}

impl CountingAllocator {
    /// Allocator with the default policy and a pool size of 3.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self {
            name,
            key: PoolKey::numeric(hasher.finish(), name),
            policy: PoolingPolicy::Default,
            pool_size: crate::config::DEFAULT_POOL_SIZE,
            fail_after: None,
            next_id: AtomicU64::new(0),
            discarded: Mutex::new(Vec::new()),
        }
    }

    /// Shorthand for `Arc::new(CountingAllocator::new(name))`.
    #[must_use]
    pub fn shared(name: &'static str) -> Arc<Self> {
        Arc::new(Self::new(name))
    }

    /// Use `policy`.
    #[must_use]
    pub fn with_policy(mut self, policy: PoolingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Prefer a pool of `size`.
    #[must_use]
    pub fn with_pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    /// Fail every creation once `successes` instances were created.
    #[must_use]
    pub fn failing_after(mut self, successes: u64) -> Self {
        self.fail_after = Some(successes);
        self
    }

    /// Instances created so far.
    pub fn created(&self) -> u64 {
        self.next_id.load(Ordering::SeqCst)
    }

    /// Discard callbacks received so far.
    pub fn discarded(&self) -> usize {
        self.discarded.lock().len()
    }

    /// Ids passed to the discard callback, in call order.
    pub fn discarded_ids(&self) -> Vec<u64> {
        self.discarded.lock().clone()
    }
}

impl ContentAllocator<u64> for CountingAllocator {
    fn pool_key(&self) -> PoolKey {
        self.key
    }

    fn create_content(&self, _host: &HostContext) -> Result<u64> {
        if let Some(limit) = self.fail_after
            && self.next_id.load(Ordering::SeqCst) >= limit
        {
            return Err(Error::content_creation(self.name, "creation limit reached"));
        }
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    fn pooling_policy(&self) -> PoolingPolicy {
        self.policy
    }

    fn pool_size(&self) -> usize {
        self.pool_size
    }

    fn on_content_discarded(&self, content: u64) {
        self.discarded.lock().push(content);
    }
}

/// Pool factory that makes pooling inert: every pool it builds has
/// capacity zero, so nothing is ever retained.
#[derive(Debug, Default, Clone, Copy)]
pub struct InertPoolFactory;

impl<C: Send + 'static> PoolFactory<C> for InertPoolFactory {
    fn create_pool(&self, key: PoolKey, _capacity: usize) -> Option<Arc<dyn ItemPool<C>>> {
        Some(Arc::new(DefaultPool::new(key, 0)))
    }
}

/// Pool factory that records the keys and capacities it was asked for and
/// defers construction to the next stage.
#[derive(Debug, Default)]
pub struct RecordingPoolFactory {
    requests: Mutex<Vec<(PoolKey, usize)>>,
}

impl RecordingPoolFactory {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests seen so far.
    pub fn requests(&self) -> Vec<(PoolKey, usize)> {
        self.requests.lock().clone()
    }
}

impl<C> PoolFactory<C> for RecordingPoolFactory {
    fn create_pool(&self, key: PoolKey, capacity: usize) -> Option<Arc<dyn ItemPool<C>>> {
        self.requests.lock().push((key, capacity));
        None
    }
}
