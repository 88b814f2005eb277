//! Pooling policies and the pool-access decision table

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How an allocator's content participates in pooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PoolingPolicy {
    /// Acquire reads the pool, recycle and prefill write it.
    #[default]
    Default,
    /// Acquire and prefill use the pool, recycled instances are always discarded.
    AcquireOnly,
    /// No reuse at all: always create, always discard.
    Disabled,
}

/// A pool operation subject to policy gating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolOperation {
    /// Taking content out for mounting.
    Acquire,
    /// Returning content after unmounting.
    Recycle,
    /// Eagerly creating content into the pool.
    Prefill,
}

/// Which sides of a pool an operation may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolAccess {
    /// The operation may take free instances out of the pool.
    pub read_pool: bool,
    /// The operation may put instances into the pool.
    pub write_pool: bool,
}

impl PoolAccess {
    const NONE: Self = Self {
        read_pool: false,
        write_pool: false,
    };
    const READ: Self = Self {
        read_pool: true,
        write_pool: false,
    };
    const WRITE: Self = Self {
        read_pool: false,
        write_pool: true,
    };
}

impl PoolingPolicy {
    /// Decide what `operation` may do with the pool under this policy.
    #[must_use]
    pub fn access(self, operation: PoolOperation) -> PoolAccess {
        match (self, operation) {
            (Self::Disabled, _) => PoolAccess::NONE,
            (_, PoolOperation::Acquire) => PoolAccess::READ,
            (Self::Default, PoolOperation::Recycle) => PoolAccess::WRITE,
            (Self::AcquireOnly, PoolOperation::Recycle) => PoolAccess::NONE,
            (_, PoolOperation::Prefill) => PoolAccess::WRITE,
        }
    }

    /// The effective policy once the registry-wide kill switch is applied.
    #[must_use]
    pub fn effective(self, pooling_enabled: bool) -> Self {
        if pooling_enabled { self } else { Self::Disabled }
    }
}

impl fmt::Display for PoolingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Default => write!(f, "default"),
            Self::AcquireOnly => write!(f, "acquire-only"),
            Self::Disabled => write!(f, "disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(PoolingPolicy::Default, PoolOperation::Acquire, true, false)]
    #[test_case(PoolingPolicy::Default, PoolOperation::Recycle, false, true)]
    #[test_case(PoolingPolicy::Default, PoolOperation::Prefill, false, true)]
    #[test_case(PoolingPolicy::AcquireOnly, PoolOperation::Acquire, true, false)]
    #[test_case(PoolingPolicy::AcquireOnly, PoolOperation::Recycle, false, false)]
    #[test_case(PoolingPolicy::AcquireOnly, PoolOperation::Prefill, false, true)]
    #[test_case(PoolingPolicy::Disabled, PoolOperation::Acquire, false, false)]
    #[test_case(PoolingPolicy::Disabled, PoolOperation::Recycle, false, false)]
    #[test_case(PoolingPolicy::Disabled, PoolOperation::Prefill, false, false)]
    fn access_table(policy: PoolingPolicy, op: PoolOperation, read: bool, write: bool) {
        let access = policy.access(op);
        assert_eq!(access.read_pool, read);
        assert_eq!(access.write_pool, write);
    }

    #[test]
    fn kill_switch_disables_everything() {
        assert_eq!(
            PoolingPolicy::Default.effective(false),
            PoolingPolicy::Disabled
        );
        assert_eq!(
            PoolingPolicy::AcquireOnly.effective(true),
            PoolingPolicy::AcquireOnly
        );
    }

    #[test]
    fn default_policy_is_default() {
        assert_eq!(PoolingPolicy::default(), PoolingPolicy::Default);
        assert_eq!(PoolingPolicy::AcquireOnly.to_string(), "acquire-only");
    }
}
