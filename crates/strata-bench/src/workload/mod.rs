//! Benchmark workloads.
//!
//! Numeric workloads allocate through the registry, so they run with the
//! chain head installed. Container workloads take the resource explicitly.

pub mod containers;
pub mod linalg;

use crate::config::BenchConfig;
use clap::ValueEnum;
use strata_mem::{MemoryResource, registry};

/// A single timed workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Workload {
    DenseAssign,
    DenseSum,
    DenseMult,
    SparseAssign,
    SparseSum,
    SparseMult,
    VectorPush,
    NestedVectors,
    StringMap,
    NestedMaps,
}

impl Workload {
    pub const LINALG: [Workload; 6] = [
        Workload::DenseAssign,
        Workload::DenseSum,
        Workload::DenseMult,
        Workload::SparseAssign,
        Workload::SparseSum,
        Workload::SparseMult,
    ];

    pub const CONTAINERS: [Workload; 4] = [
        Workload::VectorPush,
        Workload::NestedVectors,
        Workload::StringMap,
        Workload::NestedMaps,
    ];

    /// Name used in reports.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Workload::DenseAssign => "dense assign test",
            Workload::DenseSum => "dense sum test",
            Workload::DenseMult => "dense mult test",
            Workload::SparseAssign => "sparse assign test",
            Workload::SparseSum => "sparse sum test",
            Workload::SparseMult => "sparse mult test",
            Workload::VectorPush => "vector test 1",
            Workload::NestedVectors => "vector test 2",
            Workload::StringMap => "unordered map test 1",
            Workload::NestedMaps => "unordered map test 2",
        }
    }

    /// Whether the workload reads its resource from the registry.
    #[must_use]
    pub const fn uses_registry(self) -> bool {
        matches!(
            self,
            Workload::DenseAssign
                | Workload::DenseSum
                | Workload::DenseMult
                | Workload::SparseAssign
                | Workload::SparseSum
                | Workload::SparseMult
        )
    }

    /// Runs the workload once against `resource` and returns a checksum of
    /// its result.
    pub fn run(self, resource: &dyn MemoryResource, config: &BenchConfig) -> f64 {
        if self.uses_registry() {
            // SAFETY: every matrix is created and dropped inside `run_linalg`,
            // which returns a plain `f64`; nothing allocated through the
            // registry outlives the guard.
            let _guard = unsafe { registry::install(resource) };
            self.run_linalg(config)
        } else {
            self.run_containers(resource, config)
        }
    }

    fn run_linalg(self, config: &BenchConfig) -> f64 {
        match self {
            Workload::DenseAssign => linalg::dense_assign(config),
            Workload::DenseSum => linalg::dense_sum(config),
            Workload::DenseMult => linalg::dense_mult(config),
            Workload::SparseAssign => linalg::sparse_assign(config),
            Workload::SparseSum => linalg::sparse_sum(config),
            Workload::SparseMult => linalg::sparse_mult(config),
            _ => unreachable!("{} does not use the registry", self.name()),
        }
    }

    fn run_containers(self, resource: &dyn MemoryResource, config: &BenchConfig) -> f64 {
        let sizes = &config.containers;
        let checksum = match self {
            Workload::VectorPush => containers::vector_push(resource, sizes.vector_len),
            Workload::NestedVectors => containers::nested_vectors(
                resource,
                sizes.nested_vectors,
                sizes.nested_vector_len,
            ),
            Workload::StringMap => containers::string_map(resource, sizes.map_len),
            Workload::NestedMaps => {
                containers::nested_maps(resource, sizes.nested_maps, sizes.nested_map_len)
            }
            _ => unreachable!("{} reads the registry", self.name()),
        };
        checksum as f64
    }
}

/// Groups of workloads selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Suite {
    /// Dense and sparse matrix workloads.
    Linalg,
    /// Vector and hash map workloads.
    Containers,
    /// Both.
    #[default]
    All,
}

impl Suite {
    #[must_use]
    pub fn workloads(self) -> Vec<Workload> {
        match self {
            Suite::Linalg => Workload::LINALG.to_vec(),
            Suite::Containers => Workload::CONTAINERS.to_vec(),
            Suite::All => Workload::LINALG
                .into_iter()
                .chain(Workload::CONTAINERS)
                .collect(),
        }
    }
}
