//! # Mount Content Pools
//!
//! Scoped, lifecycle-aware pools that recycle expensive mount content
//! (platform views and drawables) across render passes.
//!
//! The mounting layer asks a [`MountContentPools`] registry for content of a
//! given [`ContentAllocator`] and hands it back once unmounted. The registry
//! resolves the [`PoolScope`] that governs the call, applies the allocator's
//! [`PoolingPolicy`], and either reuses a pooled instance or creates a new
//! one. Scopes are torn down when their host is destroyed, when a bound
//! [`LifecycleObservable`] reaches its terminal state, or on request;
//! every instance still resident at that point is passed to the
//! allocator's discard callback.
//!
//! ```
//! use std::sync::Arc;
//! use mount_pool::{ContentAllocator, HostContext, MountContentPools, PoolKey, Result, SharedAllocator};
//!
//! struct Label(String);
//!
//! struct LabelAllocator;
//!
//! impl ContentAllocator<Label> for LabelAllocator {
//!     fn pool_key(&self) -> PoolKey {
//!         PoolKey::of::<Label>()
//!     }
//!
//!     fn create_content(&self, host: &HostContext) -> Result<Label> {
//!         Ok(Label(format!("label@{}", host.label())))
//!     }
//! }
//!
//! let pools = MountContentPools::<Label>::new();
//! let host = HostContext::new("main-activity");
//! let allocator: SharedAllocator<Label> = Arc::new(LabelAllocator);
//!
//! let label = pools.acquire_mount_content(&host, &allocator, None)?;
//! pools.recycle(&host, &allocator, label, None);
//! assert_eq!(pools.created_count(), 1);
//!
//! pools.on_context_destroyed(&host);
//! # Ok::<(), mount_pool::Error>(())
//! ```

pub mod allocator;
pub mod config;
pub mod error;
pub mod host;
pub mod lifecycle;
pub mod policy;
pub mod pool;
pub mod registry;
pub mod scope;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use allocator::{ContentAllocator, PoolKey, SharedAllocator};
pub use config::{DEFAULT_POOL_SIZE, PoolsConfig};
pub use error::{Error, Result};
pub use host::{HostContext, HostId};
pub use lifecycle::{
    HostLifecycle, LifecycleObservable, LifecycleObserver, LifecycleState, SubscriptionId,
};
pub use policy::{PoolAccess, PoolOperation, PoolingPolicy};
pub use pool::{DefaultPool, ItemPool, PoolFactory, PoolStats};
pub use registry::{MountContentPools, MountContentPoolsBuilder};
pub use scope::{PoolScope, ScopeId, ScopeKind};
