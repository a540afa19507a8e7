// Matrix storage is routed through whatever resource is installed.

use proptest::prelude::*;
use strata_linalg::{DenseMatrix, SparseMatrix, Triplet, storage};
use strata_mem::registry::{self, FallbackPolicy};
use strata_mem::{ArenaResource, DebugOptions, DebugResource, PoolResource, system_resource};

fn tracking() -> DebugResource<'static> {
    DebugResource::with_options(system_resource(), DebugOptions { track_live: true })
}

fn workload() {
    let mut dense = DenseMatrix::zeros(8, 8);
    let mut sparse = SparseMatrix::new(8, 8);
    for i in 0..20 {
        let b = DenseMatrix::from_fn(8, 8, |r, c| ((r + c + i) % 5) as f64);
        dense += &b;
        dense *= &b;

        let mut triplets = storage::buffer();
        for k in 0..8 {
            triplets.push(Triplet::new(k, (k + i) % 8, 1.0 + k as f64));
        }
        let s = SparseMatrix::from_triplets(8, 8, &triplets).unwrap();
        sparse += &s;
        sparse = &sparse * &s;
    }
}

#[test]
fn test_every_allocation_reaches_installed_resource() {
    let debug = tracking();
    {
        let _guard = unsafe { registry::install(&debug) };
        workload();
    }
    let stats = debug.finish().unwrap();
    assert!(stats.num_allocations > 0);
    assert_eq!(stats.num_allocations, stats.num_deallocations);
}

#[test]
fn test_workload_under_pool_and_arena_chains() {
    let debug = tracking();
    {
        let arena = ArenaResource::new(&debug);
        let pool = PoolResource::new(&arena);
        let _guard = unsafe { registry::install(&pool) };
        workload();
    }
    {
        let pool = PoolResource::new(&debug);
        let arena = ArenaResource::new(&pool);
        let _guard = unsafe { registry::install(&arena) };
        workload();
    }
    assert_eq!(debug.finish().unwrap().current_bytes_outstanding, 0);
}

#[test]
fn test_strict_fallback_rejects_unmanaged_storage() {
    let previous = registry::set_fallback_policy(FallbackPolicy::Reject);
    let result = DenseMatrix::try_zeros(4, 4);
    registry::set_fallback_policy(previous);

    assert!(result.is_err());
}

proptest! {
    #[test]
    fn test_sparse_product_matches_dense(
        entries in prop::collection::vec((0usize..5, 0usize..5, -4i32..4), 0..20),
    ) {
        let triplets: Vec<_> = entries
            .iter()
            .map(|&(row, col, value)| Triplet::new(row, col, f64::from(value)))
            .collect();
        let a = SparseMatrix::from_triplets(5, 5, &triplets).unwrap();
        let b = a.to_dense().transpose();
        let b_sparse = SparseMatrix::from_triplets(
            5,
            5,
            &a.iter().map(|t| Triplet::new(t.col, t.row, t.value)).collect::<Vec<_>>(),
        )
        .unwrap();

        prop_assert_eq!((&a * &b_sparse).to_dense(), &a.to_dense() * &b);
        prop_assert_eq!((&a + &a).to_dense(), &a.to_dense() + &a.to_dense());
    }
}
