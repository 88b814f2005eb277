//! Pool scopes: lifetime boundaries for a set of pools.
//!
//! A scope owns one pool per [`PoolKey`] and releases all of them at once.
//! What triggers the release depends on the [`ScopeKind`].

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use uuid::Uuid;

use crate::allocator::{PoolKey, SharedAllocator};
use crate::config::PoolsConfig;
use crate::host::HostId;
use crate::lifecycle::{LifecycleObservable, LifecycleObserver, SubscriptionId};
use crate::pool::{DefaultPool, ItemPool, PoolFactory, PoolStats};

// ---------------------------------------------------------------------------
// Identity and kind
// ---------------------------------------------------------------------------

/// Unique identifier of a pool scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(Uuid);

impl ScopeId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scope:{}", self.0)
    }
}

/// What ends a scope's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScopeKind {
    /// Default scope of a root host; released when the host is destroyed.
    Implicit {
        /// The root host this scope belongs to.
        host: HostId,
    },
    /// Released only by an explicit [`PoolScope::release`] call.
    ManuallyManaged,
    /// Released when the bound lifecycle reaches its terminal state, or
    /// earlier by an explicit call.
    LifecycleAware,
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Implicit { host } => write!(f, "implicit({host})"),
            Self::ManuallyManaged => write!(f, "manually-managed"),
            Self::LifecycleAware => write!(f, "lifecycle-aware"),
        }
    }
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

struct PoolEntry<C> {
    pool: Arc<dyn ItemPool<C>>,
    allocator: SharedAllocator<C>,
}

enum ScopeState<C> {
    Active(HashMap<PoolKey, PoolEntry<C>>),
    Released,
}

struct LifecycleBinding {
    observable: Arc<dyn LifecycleObservable>,
    subscription: SubscriptionId,
}

/// Releases a scope on the terminal lifecycle event without keeping it alive.
struct ScopeReleaser<C> {
    scope: Weak<PoolScope<C>>,
}

impl<C> LifecycleObserver for ScopeReleaser<C> {
    fn on_terminal(&self) {
        if let Some(scope) = self.scope.upgrade() {
            scope.release();
        }
    }
}

// ---------------------------------------------------------------------------
// PoolScope
// ---------------------------------------------------------------------------

/// A set of pools, keyed by allocator identity, that share one lifetime.
///
/// Once released a scope stays released: it owns no pools, every acquire
/// through it misses and every recycle through it discards. Dropping an
/// unreleased scope releases it.
pub struct PoolScope<C> {
    id: ScopeId,
    kind: ScopeKind,
    config: PoolsConfig,
    state: Mutex<ScopeState<C>>,
    binding: Mutex<Option<LifecycleBinding>>,
}

impl<C> PoolScope<C> {
    fn with_kind(kind: ScopeKind, config: &PoolsConfig) -> Self {
        Self {
            id: ScopeId::new(),
            kind,
            config: config.clone(),
            state: Mutex::new(ScopeState::Active(HashMap::new())),
            binding: Mutex::new(None),
        }
    }

    /// Create a scope that lives until [`release`](Self::release) is called.
    #[must_use]
    pub fn manually_managed() -> Arc<Self> {
        Self::manually_managed_with(&PoolsConfig::default())
    }

    pub(crate) fn manually_managed_with(config: &PoolsConfig) -> Arc<Self> {
        Arc::new(Self::with_kind(ScopeKind::ManuallyManaged, config))
    }

    pub(crate) fn implicit(host: HostId, config: &PoolsConfig) -> Arc<Self> {
        Arc::new(Self::with_kind(ScopeKind::Implicit { host }, config))
    }

    /// Scope identifier.
    #[must_use]
    pub fn id(&self) -> ScopeId {
        self.id
    }

    /// What ends this scope's life.
    #[must_use]
    pub fn kind(&self) -> ScopeKind {
        self.kind
    }

    /// Whether the scope has been released.
    #[must_use]
    pub fn is_released(&self) -> bool {
        matches!(*self.state.lock(), ScopeState::Released)
    }

    /// Number of pools currently owned.
    #[must_use]
    pub fn pool_count(&self) -> usize {
        match &*self.state.lock() {
            ScopeState::Active(pools) => pools.len(),
            ScopeState::Released => 0,
        }
    }

    /// The pool for `key`, without creating one.
    #[must_use]
    pub fn existing_pool(&self, key: PoolKey) -> Option<Arc<dyn ItemPool<C>>> {
        match &*self.state.lock() {
            ScopeState::Active(pools) => pools.get(&key).map(|entry| Arc::clone(&entry.pool)),
            ScopeState::Released => None,
        }
    }

    /// Statistics of the pool for `key`, if it exists.
    #[must_use]
    pub fn pool_stats(&self, key: PoolKey) -> Option<PoolStats> {
        self.existing_pool(key).map(|pool| pool.stats())
    }

    /// Release every owned pool and forget them.
    ///
    /// Each pool discards its resident instances through the allocator it
    /// was created for. Instances held by callers are untouched and will be
    /// discarded when they are recycled. Returns `true` only for the call
    /// that performed the transition; later calls are no-ops.
    pub fn release(&self) -> bool {
        let entries = {
            let mut state = self.state.lock();
            match std::mem::replace(&mut *state, ScopeState::Released) {
                ScopeState::Active(pools) => pools,
                ScopeState::Released => return false,
            }
        };

        if let Some(binding) = self.binding.lock().take() {
            binding.observable.unsubscribe(binding.subscription);
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            scope = %self.id,
            kind = %self.kind,
            pools = entries.len(),
            "Releasing pool scope"
        );

        for entry in entries.into_values() {
            entry.pool.release_all(entry.allocator.as_ref());
        }
        true
    }
}

impl<C: Send + 'static> PoolScope<C> {
    /// Create a scope bound to `observable`.
    ///
    /// The scope is released when the observable signals its terminal
    /// state. If it is already terminal, the returned scope is released.
    #[must_use]
    pub fn lifecycle_aware(observable: Arc<dyn LifecycleObservable>) -> Arc<Self> {
        Self::lifecycle_aware_with(observable, &PoolsConfig::default())
    }

    pub(crate) fn lifecycle_aware_with(
        observable: Arc<dyn LifecycleObservable>,
        config: &PoolsConfig,
    ) -> Arc<Self> {
        let scope = Arc::new(Self::with_kind(ScopeKind::LifecycleAware, config));
        let releaser: Arc<dyn LifecycleObserver> = Arc::new(ScopeReleaser {
            scope: Arc::downgrade(&scope),
        });
        let subscription = observable.subscribe(releaser);

        if scope.is_released() {
            observable.unsubscribe(subscription);
            return scope;
        }

        *scope.binding.lock() = Some(LifecycleBinding {
            observable,
            subscription,
        });

        // A release that raced the store above found no binding to drop.
        if scope.is_released()
            && let Some(binding) = scope.binding.lock().take()
        {
            binding.observable.unsubscribe(binding.subscription);
        }
        scope
    }

    /// Return the pool for `allocator`, creating it on first use.
    ///
    /// A new pool gets `requested_capacity` if supplied, otherwise the
    /// allocator's preferred size, clamped when a maximum is configured. It is
    /// built by `factory` if one is installed and produces a pool, then by
    /// the allocator's own [`create_recycling_pool`](crate::ContentAllocator::create_recycling_pool),
    /// and finally as a [`DefaultPool`]. Returns `None` once the scope is
    /// released.
    pub fn get_or_create_pool(
        &self,
        allocator: &SharedAllocator<C>,
        requested_capacity: Option<usize>,
        factory: Option<&dyn PoolFactory<C>>,
    ) -> Option<Arc<dyn ItemPool<C>>> {
        let key = allocator.pool_key();
        match &*self.state.lock() {
            ScopeState::Active(pools) => {
                if let Some(entry) = pools.get(&key) {
                    return Some(Arc::clone(&entry.pool));
                }
            }
            ScopeState::Released => return None,
        }

        // Build outside the lock: factories and allocators are caller code.
        let capacity = self
            .config
            .clamp_capacity(requested_capacity.unwrap_or_else(|| allocator.pool_size()));
        let pool = factory
            .and_then(|factory| factory.create_pool(key, capacity))
            .or_else(|| allocator.create_recycling_pool(capacity))
            .unwrap_or_else(|| Arc::new(DefaultPool::new(key, capacity)));

        let mut state = self.state.lock();
        match &mut *state {
            ScopeState::Active(pools) => {
                let entry = pools.entry(key).or_insert_with(|| {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(
                        scope = %self.id,
                        allocator = key.name(),
                        capacity = pool.capacity(),
                        "Created mount content pool"
                    );
                    PoolEntry {
                        pool,
                        allocator: Arc::clone(allocator),
                    }
                });
                Some(Arc::clone(&entry.pool))
            }
            ScopeState::Released => None,
        }
    }
}

impl<C> Drop for PoolScope<C> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C> fmt::Debug for PoolScope<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolScope")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("pools", &self.pool_count())
            .field("released", &self.is_released())
            .finish()
    }
}
