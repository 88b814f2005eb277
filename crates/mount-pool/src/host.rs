//! Host contexts: identity handles for the platform hosts content is mounted in

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

/// Stable identity of a root host context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HostId(Uuid);

impl HostId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The underlying UUID.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "host:{}", self.0)
    }
}

struct HostInner {
    id: HostId,
    label: String,
    parent: Option<HostContext>,
    destroyed: AtomicBool,
}

/// Handle to the platform host (activity, service, window) that mount
/// content is created for.
///
/// Cloning is cheap. A context created with [`wrap`](Self::wrap) behaves
/// like a themed or decorated wrapper: it has its own label but resolves to
/// the same [`root`](Self::root) host, so pools are shared with it and the
/// destroyed state is the root's.
#[derive(Clone)]
pub struct HostContext {
    inner: Arc<HostInner>,
}

impl HostContext {
    /// Create a new root host.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HostInner {
                id: HostId::new(),
                label: label.into(),
                parent: None,
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Create a wrapper context that resolves to this context's root.
    #[must_use]
    pub fn wrap(&self, label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(HostInner {
                id: HostId::new(),
                label: label.into(),
                parent: Some(self.clone()),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    /// Identity of this particular handle (wrappers have their own).
    #[must_use]
    pub fn id(&self) -> HostId {
        self.inner.id
    }

    /// Human-readable label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// The root host this context resolves to.
    #[must_use]
    pub fn root(&self) -> &Self {
        let mut current = self;
        while let Some(parent) = &current.inner.parent {
            current = parent;
        }
        current
    }

    /// Identity of the root host; pools are keyed by this.
    #[must_use]
    pub fn root_id(&self) -> HostId {
        self.root().id()
    }

    /// Whether the root host has been torn down.
    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.root().inner.destroyed.load(Ordering::Acquire)
    }

    /// Mark the root host destroyed. Returns `true` only for the call that
    /// performed the transition.
    pub(crate) fn mark_destroyed(&self) -> bool {
        !self.root().inner.destroyed.swap(true, Ordering::AcqRel)
    }
}

impl PartialEq for HostContext {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for HostContext {}

impl fmt::Debug for HostContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostContext")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .field("root", &self.root_id())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapper_resolves_to_root() {
        let activity = HostContext::new("activity");
        let themed = activity.wrap("themed");
        let nested = themed.wrap("nested");

        assert_ne!(themed.id(), activity.id());
        assert_eq!(nested.root_id(), activity.id());
        assert_eq!(nested.root(), &activity);
        assert_eq!(activity.root_id(), activity.id());
    }

    #[test]
    fn destroying_root_is_visible_through_wrappers() {
        let activity = HostContext::new("activity");
        let themed = activity.wrap("themed");

        assert!(!themed.is_destroyed());
        assert!(themed.mark_destroyed());
        assert!(activity.is_destroyed());
        assert!(!activity.mark_destroyed(), "second transition is a no-op");
    }

    #[test]
    fn distinct_roots_have_distinct_ids() {
        let a = HostContext::new("a");
        let b = HostContext::new("a");
        assert_ne!(a, b);
        assert_ne!(a.root_id(), b.root_id());
    }
}
