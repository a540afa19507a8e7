// End-to-end runs of every chain over the quick configuration.

use strata_bench::{BenchConfig, ChainKind, Suite, Workload, run_chain};

#[test]
fn test_every_chain_runs_every_workload() {
    let config = BenchConfig::quick();
    let workloads = Suite::All.workloads();

    for kind in ChainKind::ALL {
        let report = run_chain(kind, &workloads, &config).unwrap();

        assert_eq!(report.kind, kind);
        assert_eq!(report.timings.len(), workloads.len());

        let Some(stats) = report.stats else {
            assert_eq!(kind, ChainKind::Baseline);
            continue;
        };
        assert_eq!(stats.current_bytes_outstanding, 0, "{kind}");
        assert_eq!(stats.num_allocations, stats.num_deallocations, "{kind}");
        assert!(stats.peak_bytes_outstanding > 0, "{kind}");
    }
}

#[test]
fn test_checksums_do_not_depend_on_the_chain() {
    let config = BenchConfig::quick();
    let workloads = Suite::Linalg.workloads();

    let reference = run_chain(ChainKind::Debug, &workloads, &config).unwrap();
    for kind in ChainKind::ALL {
        let report = run_chain(kind, &workloads, &config).unwrap();
        for (ours, theirs) in report.timings.iter().zip(&reference.timings) {
            assert_eq!(ours.checksum, theirs.checksum, "{kind} {}", ours.workload.name());
        }
    }
}

#[test]
fn test_strategies_batch_upstream_traffic() {
    let config = BenchConfig::quick();
    let workloads = [Workload::SparseSum, Workload::NestedVectors];

    let direct = run_chain(ChainKind::Debug, &workloads, &config)
        .unwrap()
        .stats
        .unwrap();
    for kind in [
        ChainKind::Pool,
        ChainKind::Arena,
        ChainKind::PoolOverArena,
        ChainKind::ArenaOverPool,
    ] {
        let stats = run_chain(kind, &workloads, &config).unwrap().stats.unwrap();
        assert!(
            stats.num_allocations < direct.num_allocations,
            "{kind}: {} vs {}",
            stats.num_allocations,
            direct.num_allocations
        );
    }
}

#[test]
fn test_report_lists_workloads_in_order() {
    let config = BenchConfig::quick();
    let report = run_chain(ChainKind::Arena, &Suite::Containers.workloads(), &config).unwrap();
    let text = report.to_string();

    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("buffer resource"));
    assert_eq!(lines.next(), Some("---"));
    assert!(lines.next().is_some_and(|line| line.starts_with("vector test 1 (")));
    assert!(text.contains("num deallocs: "));
    assert!(text.ends_with("\n"));
}

#[test]
fn test_baseline_report_has_no_counters() {
    let config = BenchConfig::quick();
    let report = run_chain(ChainKind::Baseline, &Suite::Containers.workloads(), &config).unwrap();
    let text = report.to_string();

    assert!(text.starts_with("no resource\n---\n"));
    assert!(text.contains("unordered map test 2 ("));
    assert!(text.ends_with("num allocs: ?\nnum deallocs: ?\ncurr bytes: ?\nmax bytes: ?\n"));
}
