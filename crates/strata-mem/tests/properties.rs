// Property tests for the accounting and reuse laws.

mod common;

use common::tracking_debug;
use proptest::prelude::*;
use strata_mem::{ArenaResource, MemoryResource, PoolResource, system_resource};

#[derive(Debug, Clone)]
enum Op {
    Allocate(usize),
    Deallocate(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..512).prop_map(Op::Allocate),
        any::<usize>().prop_map(Op::Deallocate),
    ]
}

proptest! {
    #[test]
    fn test_debug_accounting_matches_prefix_sums(ops in prop::collection::vec(op(), 0..64)) {
        let debug = tracking_debug(system_resource());
        let mut live = Vec::new();
        let mut current = 0i64;
        let mut peak = 0u64;

        for op in ops {
            match op {
                Op::Allocate(size) => {
                    live.push((debug.allocate(size, 8).unwrap(), size));
                    current += size as i64;
                    peak = peak.max(current as u64);
                }
                Op::Deallocate(pick) if !live.is_empty() => {
                    let (ptr, size) = live.swap_remove(pick % live.len());
                    unsafe { debug.deallocate(ptr, size, 8) };
                    current -= size as i64;
                }
                Op::Deallocate(_) => {}
            }
            prop_assert_eq!(debug.current_bytes_outstanding(), current);
            prop_assert_eq!(debug.peak_bytes_outstanding(), peak);
        }

        for (ptr, size) in live {
            unsafe { debug.deallocate(ptr, size, 8) };
        }
        prop_assert!(debug.check_released().is_ok());
    }

    #[test]
    fn test_pool_reuses_freed_block(size in 0usize..=4096, align_shift in 0u32..=4) {
        let align = 1usize << align_shift;
        let debug = tracking_debug(system_resource());
        let pool = PoolResource::new(&debug);

        let first = pool.allocate(size, align).unwrap();
        let upstream = debug.num_allocations();
        unsafe { pool.deallocate(first, size, align) };

        let second = pool.allocate(size, align).unwrap();
        prop_assert_eq!(first, second);
        prop_assert_eq!(debug.num_allocations(), upstream);
        unsafe { pool.deallocate(second, size, align) };
    }

    #[test]
    fn test_arena_reaches_upstream_once_within_a_region(words in prop::collection::vec(1usize..=16, 1..=8)) {
        let debug = tracking_debug(system_resource());
        {
            let arena = ArenaResource::new(&debug);
            for &count in &words {
                let size = count * 8;
                let ptr = arena.allocate(size, 8).unwrap();
                unsafe { arena.deallocate(ptr, size, 8) };
            }
            prop_assert_eq!(debug.num_allocations(), 1);
            prop_assert_eq!(debug.num_deallocations(), 0);
        }
        prop_assert_eq!(debug.num_deallocations(), 1);
        prop_assert_eq!(debug.current_bytes_outstanding(), 0);
    }
}
