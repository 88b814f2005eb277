//! Pooling configuration types

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Pool size used when an allocator does not override
/// [`ContentAllocator::pool_size`](crate::ContentAllocator::pool_size).
pub const DEFAULT_POOL_SIZE: usize = 3;

/// Configuration for a [`MountContentPools`](crate::MountContentPools) registry
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PoolsConfig {
    /// Optional upper bound for any single pool's capacity, including
    /// prefilled pools. `None` leaves allocator sizes and prefill counts
    /// untouched.
    pub max_pool_size: Option<usize>,
    /// When `false`, every allocator is treated as
    /// [`PoolingPolicy::Disabled`](crate::PoolingPolicy::Disabled)
    pub pooling_enabled: bool,
}

impl Default for PoolsConfig {
    fn default() -> Self {
        Self {
            max_pool_size: None,
            pooling_enabled: true,
        }
    }
}

impl PoolsConfig {
    /// Validate the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.max_pool_size == Some(0) {
            return Err(Error::configuration(
                "max_pool_size must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Clamp a requested pool capacity to `max_pool_size`, if one is set.
    #[must_use]
    pub fn clamp_capacity(&self, requested: usize) -> usize {
        match self.max_pool_size {
            Some(max) => requested.min(max),
            None => requested,
        }
    }
}
