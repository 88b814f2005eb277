//! Property tests for pool acquire/recycle invariants.
//!
//! After any sequence of acquire, recycle, prefill and release operations:
//! - the free count never exceeds the pool capacity;
//! - every instance ever created is exactly one of held, pooled or discarded.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use mount_pool::{
    ContentAllocator, HostContext, MountContentPools, PoolKey, PoolingPolicy, Result,
    SharedAllocator,
};
use proptest::prelude::*;

// ---------------------------------------------------------------------------
// Test allocator
// ---------------------------------------------------------------------------

struct CountingAllocator {
    policy: PoolingPolicy,
    pool_size: usize,
    created: AtomicU64,
    discarded: AtomicU64,
}

impl ContentAllocator<u64> for CountingAllocator {
    fn pool_key(&self) -> PoolKey {
        PoolKey::numeric(1, "counting")
    }

    fn create_content(&self, _host: &HostContext) -> Result<u64> {
        Ok(self.created.fetch_add(1, Ordering::SeqCst))
    }

    fn pooling_policy(&self) -> PoolingPolicy {
        self.policy
    }

    fn pool_size(&self) -> usize {
        self.pool_size
    }

    fn on_content_discarded(&self, _content: u64) {
        self.discarded.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone)]
enum Op {
    Acquire,
    Recycle(usize),
    Prefill(usize),
    Release,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Acquire),
        4 => (0usize..16).prop_map(Op::Recycle),
        1 => (0usize..6).prop_map(Op::Prefill),
        1 => Just(Op::Release),
    ]
}

fn policy() -> impl Strategy<Value = PoolingPolicy> {
    prop_oneof![
        Just(PoolingPolicy::Default),
        Just(PoolingPolicy::AcquireOnly),
        Just(PoolingPolicy::Disabled),
    ]
}

// ---------------------------------------------------------------------------
// Property: capacity bound and instance conservation
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn pool_invariants_hold(
        pool_size in 0usize..6,
        policy in policy(),
        ops in proptest::collection::vec(op(), 1..60),
    ) {
        let counting = Arc::new(CountingAllocator {
            policy,
            pool_size,
            created: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        });
        let allocator: SharedAllocator<u64> = counting.clone();
        let pools = MountContentPools::<u64>::new();
        let host = HostContext::new("activity");
        let mut scope = pools.manually_managed_scope();
        let mut held: Vec<u64> = Vec::new();

        for op in ops {
            match op {
                Op::Acquire => {
                    let content = pools
                        .acquire_mount_content(&host, &allocator, Some(&scope))
                        .unwrap();
                    prop_assert!(!held.contains(&content), "instance handed out twice");
                    held.push(content);
                }
                Op::Recycle(index) => {
                    if !held.is_empty() {
                        let content = held.swap_remove(index % held.len());
                        pools.recycle(&host, &allocator, content, Some(&scope));
                    }
                }
                Op::Prefill(count) => {
                    pools
                        .prefill_mount_content_pool(&host, count, &allocator, Some(&scope))
                        .unwrap();
                }
                Op::Release => {
                    scope.release();
                    scope = pools.manually_managed_scope();
                }
            }

            let idle = match scope.pool_stats(allocator.pool_key()) {
                Some(stats) => {
                    prop_assert!(
                        stats.idle <= stats.capacity,
                        "idle={} exceeds capacity={}", stats.idle, stats.capacity,
                    );
                    stats.idle as u64
                }
                None => 0,
            };

            let created = counting.created.load(Ordering::SeqCst);
            let discarded = counting.discarded.load(Ordering::SeqCst);
            prop_assert_eq!(
                created,
                held.len() as u64 + idle + discarded,
                "instances leaked or double-counted",
            );
        }
    }

    #[test]
    fn disabled_policy_never_reuses(rounds in 1usize..20) {
        let counting = Arc::new(CountingAllocator {
            policy: PoolingPolicy::Disabled,
            pool_size: 4,
            created: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        });
        let allocator: SharedAllocator<u64> = counting.clone();
        let pools = MountContentPools::<u64>::new();
        let host = HostContext::new("activity");

        for _ in 0..rounds {
            let content = pools.acquire_mount_content(&host, &allocator, None).unwrap();
            pools.recycle(&host, &allocator, content, None);
        }

        prop_assert_eq!(counting.created.load(Ordering::SeqCst), rounds as u64);
        prop_assert_eq!(counting.discarded.load(Ordering::SeqCst), rounds as u64);
    }
}
