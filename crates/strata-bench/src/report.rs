//! Per-chain reports.

use crate::chain::ChainKind;
use crate::workload::Workload;
use std::fmt;
use std::time::Duration;
use strata_mem::DebugStats;

/// Wall-clock time spent on one workload across all repeats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkloadTiming {
    pub workload: Workload,
    pub elapsed: Duration,
    /// Checksum of the last repeat, kept so the work cannot be optimized out.
    pub checksum: f64,
}

/// Timings and final debug counters of one chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainReport {
    pub kind: ChainKind,
    pub timings: Vec<WorkloadTiming>,
    /// `None` for the baseline, printed as `?`.
    pub stats: Option<DebugStats>,
}

impl fmt::Display for ChainReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.kind.title())?;
        writeln!(f, "---")?;
        for timing in &self.timings {
            writeln!(
                f,
                "{} ({} ms)",
                timing.workload.name(),
                timing.elapsed.as_millis()
            )?;
        }
        match &self.stats {
            Some(stats) => {
                writeln!(f, "num allocs: {}", stats.num_allocations)?;
                writeln!(f, "num deallocs: {}", stats.num_deallocations)?;
                writeln!(f, "curr bytes: {}", stats.current_bytes_outstanding)?;
                writeln!(f, "max bytes: {}", stats.peak_bytes_outstanding)
            }
            None => {
                writeln!(f, "num allocs: ?")?;
                writeln!(f, "num deallocs: ?")?;
                writeln!(f, "curr bytes: ?")?;
                writeln!(f, "max bytes: ?")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_format() {
        let report = ChainReport {
            kind: ChainKind::Pool,
            timings: vec![WorkloadTiming {
                workload: Workload::DenseSum,
                elapsed: Duration::from_millis(42),
                checksum: 1.0,
            }],
            stats: Some(DebugStats {
                num_allocations: 3,
                num_deallocations: 3,
                current_bytes_outstanding: 0,
                peak_bytes_outstanding: 4096,
            }),
        };

        assert_eq!(
            report.to_string(),
            "pool resource\n---\ndense sum test (42 ms)\nnum allocs: 3\nnum deallocs: 3\ncurr bytes: 0\nmax bytes: 4096\n"
        );
    }

    #[test]
    fn test_baseline_report_format() {
        let report = ChainReport {
            kind: ChainKind::Baseline,
            timings: vec![
                WorkloadTiming {
                    workload: Workload::VectorPush,
                    elapsed: Duration::from_millis(3),
                    checksum: 100.0,
                },
                WorkloadTiming {
                    workload: Workload::StringMap,
                    elapsed: Duration::from_millis(17),
                    checksum: 100.0,
                },
            ],
            stats: None,
        };

        assert_eq!(
            report.to_string(),
            "no resource\n---\nvector test 1 (3 ms)\nunordered map test 1 (17 ms)\nnum allocs: ?\nnum deallocs: ?\ncurr bytes: ?\nmax bytes: ?\n"
        );
    }
}
