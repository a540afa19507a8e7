//! Benchmark parameters.

use strata_mem::{ArenaConfig, DebugOptions, PoolOptions};

/// Times each workload is repeated per chain.
pub const DEFAULT_REPEATS: usize = 10;

/// Inner iterations of each numeric workload.
pub const DEFAULT_ITERATIONS: usize = 10_000;

/// Order of the square matrices.
pub const DEFAULT_DIMENSION: usize = 10;

/// Probability that a generated sparse entry is skipped.
pub const DEFAULT_SPARSITY: f64 = 0.8;

/// Seed for the sparse matrix generator.
pub const DEFAULT_SEED: u64 = 0x5eed;

/// Sizes of the container workloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerSizes {
    /// Integers pushed into one vector.
    pub vector_len: usize,
    /// Vectors in the nested-vector workload.
    pub nested_vectors: usize,
    /// Integers per nested vector.
    pub nested_vector_len: usize,
    /// Entries in the string-keyed map.
    pub map_len: usize,
    /// Maps in the nested-map workload.
    pub nested_maps: usize,
    /// Entries per nested map.
    pub nested_map_len: usize,
}

impl Default for ContainerSizes {
    fn default() -> Self {
        Self {
            vector_len: 100_000,
            nested_vectors: 1000,
            nested_vector_len: 100,
            map_len: 10_000,
            nested_maps: 100,
            nested_map_len: 100,
        }
    }
}

/// Everything a benchmark run needs besides the chain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BenchConfig {
    pub repeats: usize,
    pub iterations: usize,
    pub dimension: usize,
    pub sparsity: f64,
    pub seed: u64,
    pub containers: ContainerSizes,
    pub arena: ArenaConfig,
    pub pool: PoolOptions,
    pub debug: DebugOptions,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            repeats: DEFAULT_REPEATS,
            iterations: DEFAULT_ITERATIONS,
            dimension: DEFAULT_DIMENSION,
            sparsity: DEFAULT_SPARSITY,
            seed: DEFAULT_SEED,
            containers: ContainerSizes::default(),
            arena: ArenaConfig::default(),
            pool: PoolOptions::default(),
            debug: DebugOptions::default(),
        }
    }
}

impl BenchConfig {
    /// A small configuration for tests and smoke runs.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            repeats: 1,
            iterations: 25,
            dimension: 6,
            containers: ContainerSizes {
                vector_len: 1000,
                nested_vectors: 20,
                nested_vector_len: 10,
                map_len: 200,
                nested_maps: 10,
                nested_map_len: 10,
            },
            debug: DebugOptions { track_live: true },
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_full_scale() {
        let config = BenchConfig::default();
        assert_eq!(config.repeats, 10);
        assert_eq!(config.iterations, 10_000);
        assert_eq!(config.dimension, 10);
        assert_eq!(config.containers.vector_len, 100_000);
    }

    #[test]
    fn test_quick_is_smaller() {
        let quick = BenchConfig::quick();
        let full = BenchConfig::default();
        assert!(quick.iterations < full.iterations);
        assert!(quick.containers.map_len < full.containers.map_len);
        assert!(quick.debug.track_live);
        assert_eq!(quick.sparsity, full.sparsity);
    }
}
