//! Content allocators: how mount content of one type is created, sized and
//! discarded.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::config::DEFAULT_POOL_SIZE;
use crate::error::Result;
use crate::host::HostContext;
use crate::policy::PoolingPolicy;
use crate::pool::ItemPool;

// ---------------------------------------------------------------------------
// PoolKey
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum KeyRepr {
    Type(TypeId),
    Numeric(u64),
}

/// Identity under which an allocator's pool is stored in a scope.
///
/// Two allocators with equal keys share pools, so a key must identify the
/// content *type*, not an allocator instance. Equality and hashing ignore
/// the name.
///
/// A pool keeps the allocator that created it and discards its resident
/// instances through that allocator when its scope is released, whichever
/// allocator recycled them. Allocators sharing a key must therefore discard
/// content the same way.
#[derive(Clone, Copy)]
pub struct PoolKey {
    repr: KeyRepr,
    name: &'static str,
}

impl PoolKey {
    /// Key derived from a Rust type, usually the allocator or content type.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            repr: KeyRepr::Type(TypeId::of::<T>()),
            name: std::any::type_name::<T>(),
        }
    }

    /// Key from an explicit numeric identity, for allocators that are not
    /// distinguished by type (e.g. one allocator type serving many view
    /// classes).
    #[must_use]
    pub const fn numeric(id: u64, name: &'static str) -> Self {
        Self {
            repr: KeyRepr::Numeric(id),
            name,
        }
    }

    /// Human-readable name for logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for PoolKey {
    fn eq(&self, other: &Self) -> bool {
        self.repr == other.repr
    }
}

impl Eq for PoolKey {}

impl Hash for PoolKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.repr.hash(state);
    }
}

impl fmt::Debug for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PoolKey").field(&self.name).finish()
    }
}

impl fmt::Display for PoolKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ---------------------------------------------------------------------------
// ContentAllocator
// ---------------------------------------------------------------------------

/// Describes how to create, pool and discard mount content of one type.
///
/// Allocators are supplied by the caller on every operation. The pooling
/// core never mutates them; a scope only keeps a shared handle so it can
/// call [`on_content_discarded`](Self::on_content_discarded) when it is
/// torn down.
pub trait ContentAllocator<C>: Send + Sync + 'static {
    /// Identity of the pool this allocator's content lives in.
    fn pool_key(&self) -> PoolKey;

    /// Create a fresh instance for `host`.
    ///
    /// Errors propagate unchanged to the caller of
    /// [`acquire_mount_content`](crate::MountContentPools::acquire_mount_content)
    /// or [`prefill_mount_content_pool`](crate::MountContentPools::prefill_mount_content_pool).
    fn create_content(&self, host: &HostContext) -> Result<C>;

    /// How this allocator's content participates in pooling.
    fn pooling_policy(&self) -> PoolingPolicy {
        PoolingPolicy::Default
    }

    /// Preferred steady-state pool capacity. Zero disables retention.
    fn pool_size(&self) -> usize {
        DEFAULT_POOL_SIZE
    }

    /// Called once for every instance that leaves pooling for good.
    ///
    /// Scope teardown calls this on the allocator that created the pool,
    /// which may be a different allocator with the same [`PoolKey`] than
    /// the one that recycled the instance.
    fn on_content_discarded(&self, content: C) {
        drop(content);
    }

    /// Supply a custom pool for this allocator's content.
    ///
    /// Consulted when a scope creates the pool and no registry-wide
    /// [`PoolFactory`](crate::PoolFactory) produced one. `None` selects
    /// [`DefaultPool`](crate::DefaultPool).
    fn create_recycling_pool(&self, _capacity: usize) -> Option<Arc<dyn ItemPool<C>>> {
        None
    }
}

/// Shared, type-erased allocator handle as passed to the registry.
pub type SharedAllocator<C> = Arc<dyn ContentAllocator<C>>;

/// Hand `content` to the allocator's discard callback.
pub(crate) fn discard<C: 'static>(allocator: &dyn ContentAllocator<C>, content: C) {
    #[cfg(feature = "tracing")]
    tracing::trace!(allocator = allocator.pool_key().name(), "Discarding mount content");
    allocator.on_content_discarded(content);
}
