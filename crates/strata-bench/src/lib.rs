//! Benchmark harness for strata memory resources.
//!
//! Builds each [`ChainKind`], runs a [`Suite`] of workloads on it, and
//! reports wall-clock time per workload together with what the debug layer
//! at the bottom of the chain observed.

pub mod chain;
pub mod config;
pub mod report;
pub mod workload;

pub use chain::{ChainKind, ChainRun, run_with_chain};
pub use config::{BenchConfig, ContainerSizes};
pub use report::{ChainReport, WorkloadTiming};
pub use workload::{Suite, Workload};

use std::hint::black_box;
use std::time::Instant;
use strata_log::info;

/// Runs `workloads` on a fresh `kind` chain, `config.repeats` times each.
///
/// # Errors
///
/// Returns [`strata_mem::ResourceError::LiveAllocations`] if the chain is
/// torn down with memory still outstanding.
pub fn run_chain(
    kind: ChainKind,
    workloads: &[Workload],
    config: &BenchConfig,
) -> strata_mem::Result<ChainReport> {
    info!("running {} workloads on {kind}", workloads.len());

    let run = run_with_chain(kind, config, |resource| {
        workloads
            .iter()
            .map(|&workload| {
                let start = Instant::now();
                let mut checksum = 0.0;
                for _ in 0..config.repeats {
                    checksum = black_box(workload.run(resource, config));
                }
                WorkloadTiming {
                    workload,
                    elapsed: start.elapsed(),
                    checksum,
                }
            })
            .collect::<Vec<_>>()
    })?;

    Ok(ChainReport {
        kind,
        timings: run.output,
        stats: run.stats,
    })
}
