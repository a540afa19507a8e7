// Chain benchmarks for strata-bench
//
// Each workload is measured on every chain with the quick configuration, so
// the numbers compare allocation strategies rather than problem sizes.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use strata_bench::{BenchConfig, ChainKind, Workload, run_with_chain};
use strata_mem::DebugOptions;

fn config() -> BenchConfig {
    BenchConfig {
        debug: DebugOptions { track_live: false },
        ..BenchConfig::quick()
    }
}

/// Benchmark the matrix workloads on every chain.
fn bench_linalg(c: &mut Criterion) {
    let config = config();
    for workload in [Workload::DenseMult, Workload::SparseSum, Workload::SparseMult] {
        let mut group = c.benchmark_group(workload.name());
        for kind in ChainKind::ALL {
            group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
                b.iter(|| {
                    run_with_chain(kind, &config, |resource| {
                        black_box(workload.run(resource, &config))
                    })
                });
            });
        }
        group.finish();
    }
}

/// Benchmark the container workloads on every chain.
fn bench_containers(c: &mut Criterion) {
    let config = config();
    for workload in Workload::CONTAINERS {
        let mut group = c.benchmark_group(workload.name());
        for kind in ChainKind::ALL {
            group.bench_with_input(BenchmarkId::from_parameter(kind), &kind, |b, &kind| {
                b.iter(|| {
                    run_with_chain(kind, &config, |resource| {
                        black_box(workload.run(resource, &config))
                    })
                });
            });
        }
        group.finish();
    }
}

criterion_group!(benches, bench_linalg, bench_containers);
criterion_main!(benches);
