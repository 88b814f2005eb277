//! Mount content registry: the entry point that routes acquire, recycle
//! and prefill calls to the pool that governs them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::allocator::{ContentAllocator, PoolKey, SharedAllocator, discard};
use crate::config::PoolsConfig;
use crate::error::Result;
use crate::host::{HostContext, HostId};
use crate::lifecycle::LifecycleObservable;
use crate::policy::{PoolOperation, PoolingPolicy};
use crate::pool::{ItemPool, PoolFactory, PoolStats};
use crate::scope::PoolScope;

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for [`MountContentPools`].
pub struct MountContentPoolsBuilder<C> {
    config: PoolsConfig,
    pool_factory: Option<Arc<dyn PoolFactory<C>>>,
}

impl<C: Send + 'static> MountContentPoolsBuilder<C> {
    /// Use `config` instead of the defaults.
    pub fn config(mut self, config: PoolsConfig) -> Self {
        self.config = config;
        self
    }

    /// Build every new pool through `factory` first.
    pub fn pool_factory(mut self, factory: Arc<dyn PoolFactory<C>>) -> Self {
        self.pool_factory = Some(factory);
        self
    }

    /// Validate the configuration and build the registry.
    pub fn build(self) -> Result<MountContentPools<C>> {
        self.config.validate()?;
        Ok(MountContentPools::from_parts(self.config, self.pool_factory))
    }
}

// ---------------------------------------------------------------------------
// MountContentPools
// ---------------------------------------------------------------------------

/// Registry of mount-content pools.
///
/// Maps each root host to its implicit [`PoolScope`], tracks
/// lifecycle-aware scopes it created, and resolves every operation to the
/// scope that governs it: the explicit scope when one is passed, otherwise
/// the host's implicit scope. Embedders usually keep one registry per
/// process and share it behind an `Arc`; independent registries never
/// share pools.
pub struct MountContentPools<C> {
    config: PoolsConfig,
    /// Root host -> implicit scope.
    implicit_scopes: DashMap<HostId, Arc<PoolScope<C>>>,
    /// Lifecycle-aware scopes created through this registry.
    tracked_scopes: Mutex<Vec<Weak<PoolScope<C>>>>,
    pool_factory: RwLock<Option<Arc<dyn PoolFactory<C>>>>,
    created: AtomicU64,
    discarded: AtomicU64,
}

impl<C: Send + 'static> MountContentPools<C> {
    /// Create a registry with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::from_parts(PoolsConfig::default(), None)
    }

    fn from_parts(config: PoolsConfig, pool_factory: Option<Arc<dyn PoolFactory<C>>>) -> Self {
        Self {
            config,
            implicit_scopes: DashMap::new(),
            tracked_scopes: Mutex::new(Vec::new()),
            pool_factory: RwLock::new(pool_factory),
            created: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        }
    }

    /// Start building a registry.
    #[must_use]
    pub fn builder() -> MountContentPoolsBuilder<C> {
        MountContentPoolsBuilder {
            config: PoolsConfig::default(),
            pool_factory: None,
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> &PoolsConfig {
        &self.config
    }

    // -- Scopes ------------------------------------------------------------

    /// Create a scope released only by an explicit
    /// [`PoolScope::release`]. The registry does not track it.
    #[must_use]
    pub fn manually_managed_scope(&self) -> Arc<PoolScope<C>> {
        PoolScope::manually_managed_with(&self.config)
    }

    /// Create a scope released when `observable` reaches its terminal state.
    ///
    /// The registry tracks the scope so [`clear`](Self::clear) releases it
    /// too, but does not keep it alive.
    pub fn lifecycle_aware_scope(
        &self,
        observable: Arc<dyn LifecycleObservable>,
    ) -> Arc<PoolScope<C>> {
        let scope = PoolScope::lifecycle_aware_with(observable, &self.config);
        let mut tracked = self.tracked_scopes.lock();
        tracked.retain(|weak| weak.upgrade().is_some_and(|s| !s.is_released()));
        tracked.push(Arc::downgrade(&scope));
        scope
    }

    /// The implicit scope of `host`'s root, if one exists.
    #[must_use]
    pub fn implicit_scope(&self, host: &HostContext) -> Option<Arc<PoolScope<C>>> {
        self.implicit_scopes
            .get(&host.root_id())
            .map(|entry| Arc::clone(entry.value()))
    }

    fn implicit_scope_or_create(&self, host: &HostContext) -> Option<Arc<PoolScope<C>>> {
        if host.is_destroyed() {
            return None;
        }
        let root = host.root_id();
        let scope = Arc::clone(
            self.implicit_scopes
                .entry(root)
                .or_insert_with(|| PoolScope::implicit(root, &self.config))
                .value(),
        );

        // Destruction may have removed the entry just before we inserted it.
        if host.is_destroyed() {
            self.implicit_scopes
                .remove_if(&root, |_, existing| Arc::ptr_eq(existing, &scope));
            scope.release();
            return None;
        }
        Some(scope)
    }

    /// Resolve the pool governing `allocator`, creating scope and pool on
    /// first use. `None` means the governing scope is gone.
    fn pool_for(
        &self,
        host: &HostContext,
        allocator: &SharedAllocator<C>,
        scope: Option<&PoolScope<C>>,
        requested_capacity: Option<usize>,
    ) -> Option<Arc<dyn ItemPool<C>>> {
        let factory = self.pool_factory.read().clone();
        match scope {
            Some(scope) => {
                scope.get_or_create_pool(allocator, requested_capacity, factory.as_deref())
            }
            None => self
                .implicit_scope_or_create(host)?
                .get_or_create_pool(allocator, requested_capacity, factory.as_deref()),
        }
    }

    fn policy_for(&self, allocator: &dyn ContentAllocator<C>) -> PoolingPolicy {
        allocator
            .pooling_policy()
            .effective(self.config.pooling_enabled)
    }

    fn create(&self, host: &HostContext, allocator: &SharedAllocator<C>) -> Result<C> {
        let content = allocator.create_content(host).inspect_err(|_err| {
            #[cfg(feature = "tracing")]
            tracing::debug!(
                allocator = allocator.pool_key().name(),
                error = %_err,
                "Mount content creation failed"
            );
        })?;
        self.created.fetch_add(1, Ordering::Relaxed);
        Ok(content)
    }

    fn discard(&self, allocator: &SharedAllocator<C>, content: C) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
        discard(allocator.as_ref(), content);
    }

    // -- Operations --------------------------------------------------------

    /// Acquire content for `allocator`.
    ///
    /// Draws a free instance from the governing pool when the policy allows
    /// it, otherwise creates one through the allocator. A missing or
    /// released scope behaves like an empty pool. Allocator errors are
    /// returned unchanged.
    pub fn acquire_mount_content(
        &self,
        host: &HostContext,
        allocator: &SharedAllocator<C>,
        scope: Option<&PoolScope<C>>,
    ) -> Result<C> {
        let access = self.policy_for(allocator.as_ref()).access(PoolOperation::Acquire);
        if access.read_pool
            && let Some(pool) = self.pool_for(host, allocator, scope, None)
            && let Some(content) = pool.acquire()
        {
            return Ok(content);
        }
        self.create(host, allocator)
    }

    /// Return content acquired for `allocator`.
    ///
    /// The instance goes back into the governing pool when the policy
    /// allows it and the pool has room. Otherwise (full pool, released
    /// scope, destroyed host, policy refusal) the allocator's discard
    /// callback receives it.
    pub fn recycle(
        &self,
        host: &HostContext,
        allocator: &SharedAllocator<C>,
        content: C,
        scope: Option<&PoolScope<C>>,
    ) {
        let access = self.policy_for(allocator.as_ref()).access(PoolOperation::Recycle);
        if !access.write_pool {
            self.discard(allocator, content);
            return;
        }

        match self.pool_for(host, allocator, scope, None) {
            Some(pool) => {
                if let Err(content) = pool.release(content) {
                    self.discard(allocator, content);
                }
            }
            None => self.discard(allocator, content),
        }
    }

    /// Eagerly create up to `count` instances into the governing pool.
    ///
    /// If the pool does not exist yet it is created with capacity `count`
    /// instead of the allocator's preferred size, clamped only when
    /// `max_pool_size` is configured. Filling stops once the pool is full.
    /// Returns the number of instances placed; zero when the policy forbids
    /// writing or the scope is released.
    pub fn prefill_mount_content_pool(
        &self,
        host: &HostContext,
        count: usize,
        allocator: &SharedAllocator<C>,
        scope: Option<&PoolScope<C>>,
    ) -> Result<usize> {
        let access = self.policy_for(allocator.as_ref()).access(PoolOperation::Prefill);
        if count == 0 || !access.write_pool {
            return Ok(0);
        }
        let Some(pool) = self.pool_for(host, allocator, scope, Some(count)) else {
            return Ok(0);
        };

        let mut placed = 0;
        while placed < count && pool.has_room() {
            let content = self.create(host, allocator)?;
            if let Err(content) = pool.release(content) {
                self.discard(allocator, content);
                break;
            }
            placed += 1;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            allocator = allocator.pool_key().name(),
            requested = count,
            placed,
            "Prefilled mount content pool"
        );
        Ok(placed)
    }

    /// Tear down the implicit scope of `host`'s root.
    ///
    /// Marks the root destroyed so later implicit-scope operations for it
    /// always miss and always discard. Explicit scopes that were used with
    /// this host are not affected. Returns whether an implicit scope was
    /// released.
    pub fn on_context_destroyed(&self, host: &HostContext) -> bool {
        host.mark_destroyed();
        let root = host.root_id();
        let Some((_, scope)) = self.implicit_scopes.remove(&root) else {
            return false;
        };

        #[cfg(feature = "tracing")]
        tracing::debug!(host = %root, label = host.root().label(), "Host destroyed, releasing pools");
        scope.release()
    }

    /// Install or clear the pool factory. Only pools created afterwards
    /// are affected.
    pub fn set_pool_factory(&self, factory: Option<Arc<dyn PoolFactory<C>>>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(installed = factory.is_some(), "Mount content pool factory changed");
        *self.pool_factory.write() = factory;
    }

    /// Release every implicit scope and every tracked lifecycle-aware
    /// scope, and forget them.
    ///
    /// Manually managed scopes are owned by their callers and are left
    /// alone. The installed pool factory and the diagnostic counters are
    /// kept.
    pub fn clear(&self) {
        let mut scopes = Vec::new();
        self.implicit_scopes.retain(|_, scope| {
            scopes.push(Arc::clone(scope));
            false
        });
        let tracked = std::mem::take(&mut *self.tracked_scopes.lock());
        scopes.extend(tracked.iter().filter_map(Weak::upgrade));

        #[cfg(feature = "tracing")]
        tracing::debug!(scopes = scopes.len(), "Clearing mount content pools");

        for scope in scopes {
            scope.release();
        }
    }

    // -- Diagnostics -------------------------------------------------------

    /// Instances created through this registry.
    #[must_use]
    pub fn created_count(&self) -> u64 {
        self.created.load(Ordering::Relaxed)
    }

    /// Instances discarded by recycle or prefill overflow. Instances
    /// discarded by scope teardown are counted in [`PoolStats::discarded`].
    #[must_use]
    pub fn discarded_count(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }

    /// Implicit scopes plus live tracked scopes.
    #[must_use]
    pub fn scope_count(&self) -> usize {
        let tracked = self
            .tracked_scopes
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|scope| !scope.is_released())
            .count();
        self.implicit_scopes.len() + tracked
    }

    /// Statistics of `key`'s pool in `host`'s implicit scope.
    #[must_use]
    pub fn pool_stats(&self, host: &HostContext, key: PoolKey) -> Option<PoolStats> {
        self.implicit_scope(host)?.pool_stats(key)
    }
}

impl<C: Send + 'static> Default for MountContentPools<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> fmt::Debug for MountContentPools<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MountContentPools")
            .field("config", &self.config)
            .field("implicit_scopes", &self.implicit_scopes.len())
            .field("created", &self.created.load(Ordering::Relaxed))
            .field("discarded", &self.discarded.load(Ordering::Relaxed))
            .finish()
    }
}
