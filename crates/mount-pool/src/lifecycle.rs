//! Host lifecycle signals.
//!
//! [`LifecycleObservable`] abstracts any host lifecycle API down to what the
//! pooling core needs: subscribe, unsubscribe, and a single terminal
//! notification. [`HostLifecycle`] is a ready-made implementation driven by
//! the embedding platform layer.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

// ---------------------------------------------------------------------------
// Observer contract
// ---------------------------------------------------------------------------

/// Receives the terminal event of a lifecycle.
pub trait LifecycleObserver: Send + Sync {
    /// Called exactly once, when the observed lifecycle reaches its
    /// terminal state.
    fn on_terminal(&self);
}

/// Handle returned by [`LifecycleObservable::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Something with a terminal state that observers can wait for.
pub trait LifecycleObservable: Send + Sync {
    /// Register `observer`. If the lifecycle is already terminal the
    /// observer is notified before this call returns.
    fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> SubscriptionId;

    /// Remove a subscription. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);

    /// Whether the terminal state has been reached.
    fn is_terminal(&self) -> bool;
}

// ---------------------------------------------------------------------------
// LifecycleState
// ---------------------------------------------------------------------------

/// States a host moves through. Only `Destroyed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// Constructed, not yet created.
    Initialized,
    /// Created.
    Created,
    /// Visible.
    Started,
    /// In the foreground.
    Resumed,
    /// Left the foreground.
    Paused,
    /// No longer visible.
    Stopped,
    /// Torn down; no further transitions.
    Destroyed,
}

impl LifecycleState {
    /// Whether this state is terminal.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        self == Self::Destroyed
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Initialized => "Initialized",
            Self::Created => "Created",
            Self::Started => "Started",
            Self::Resumed => "Resumed",
            Self::Paused => "Paused",
            Self::Stopped => "Stopped",
            Self::Destroyed => "Destroyed",
        };
        f.write_str(name)
    }
}

// ---------------------------------------------------------------------------
// HostLifecycle
// ---------------------------------------------------------------------------

struct LifecycleInner {
    state: LifecycleState,
    observers: Vec<(SubscriptionId, Arc<dyn LifecycleObserver>)>,
}

/// Lifecycle of one host, driven by the platform layer.
///
/// State and observer list share one lock so a subscription racing the
/// terminal transition is either notified by the transition or by
/// `subscribe` itself, never both and never neither. Observers are always
/// called with the lock released.
pub struct HostLifecycle {
    inner: Mutex<LifecycleInner>,
    next_id: AtomicU64,
}

impl HostLifecycle {
    /// Create a lifecycle in the `Initialized` state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(LifecycleInner {
                state: LifecycleState::Initialized,
                observers: Vec::new(),
            }),
            next_id: AtomicU64::new(0),
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        self.inner.lock().state
    }

    /// Move to `next`. Returns `false` if the lifecycle was already
    /// destroyed, in which case nothing changes.
    pub fn advance(&self, next: LifecycleState) -> bool {
        let to_notify = {
            let mut inner = self.inner.lock();
            if inner.state.is_terminal() {
                return false;
            }
            inner.state = next;
            if next.is_terminal() {
                std::mem::take(&mut inner.observers)
            } else {
                Vec::new()
            }
        };

        for (_, observer) in to_notify {
            observer.on_terminal();
        }
        true
    }

    /// Shorthand for `advance(LifecycleState::Destroyed)`.
    pub fn destroy(&self) -> bool {
        self.advance(LifecycleState::Destroyed)
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }
}

impl Default for HostLifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl LifecycleObservable for HostLifecycle {
    fn subscribe(&self, observer: Arc<dyn LifecycleObserver>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        {
            let mut inner = self.inner.lock();
            if !inner.state.is_terminal() {
                inner.observers.push((id, observer));
                return id;
            }
        }
        observer.on_terminal();
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.inner.lock().observers.retain(|(sid, _)| *sid != id);
    }

    fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }
}

impl fmt::Debug for HostLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("HostLifecycle")
            .field("state", &inner.state)
            .field("observers", &inner.observers.len())
            .finish()
    }
}
