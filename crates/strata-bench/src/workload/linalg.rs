//! Matrix workloads. Each one keeps a long-lived matrix `a` and, every
//! iteration, builds a temporary `b` and folds it into `a` by assignment,
//! accumulation or multiplication.
//!
//! All storage comes from the resource installed in the registry.

use crate::config::BenchConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strata_linalg::{DenseMatrix, SparseMatrix, Triplet, storage};

/// Random sparse matrix with roughly `1 - sparsity` of its entries set.
///
/// The triplet list is itself allocated through the active resource.
pub fn random_sparse(rng: &mut impl Rng, sparsity: f64, rows: usize, cols: usize) -> SparseMatrix {
    let mut triplets = storage::buffer();
    for row in 0..rows {
        for col in 0..cols {
            if rng.r#gen::<f64>() > sparsity {
                triplets.push(Triplet::new(row, col, rng.r#gen::<f64>()));
            }
        }
    }

    match SparseMatrix::from_triplets(rows, cols, &triplets) {
        Ok(matrix) => matrix,
        Err(err) => unreachable!("generated triplets are in bounds: {err}"),
    }
}

/// Matrix with entries in `[0, 1)`.
fn random_dense(rng: &mut impl Rng, n: usize) -> DenseMatrix {
    DenseMatrix::from_fn(n, n, |_, _| rng.r#gen::<f64>())
}

fn dense_sum_of(m: &DenseMatrix) -> f64 {
    m.as_slice().iter().sum()
}

fn sparse_sum_of(m: &SparseMatrix) -> f64 {
    m.iter().map(|t| t.value).sum()
}

pub fn dense_assign(config: &BenchConfig) -> f64 {
    let n = config.dimension;
    let mut a = DenseMatrix::zeros(n, n);
    for _ in 0..config.iterations {
        let b = DenseMatrix::zeros(n, n);
        a.assign(&b);
    }
    dense_sum_of(&a)
}

pub fn dense_sum(config: &BenchConfig) -> f64 {
    let n = config.dimension;
    let mut a = DenseMatrix::zeros(n, n);
    let mut rng = StdRng::seed_from_u64(config.seed);
    for _ in 0..config.iterations {
        let b = random_dense(&mut rng, n);
        a += &b;
    }
    dense_sum_of(&a)
}

pub fn dense_mult(config: &BenchConfig) -> f64 {
    let n = config.dimension;
    let mut a = DenseMatrix::identity(n);
    for _ in 0..config.iterations {
        // Identity keeps `a` bounded however many iterations run.
        let b = DenseMatrix::identity(n);
        a *= &b;
    }
    dense_sum_of(&a)
}

pub fn sparse_assign(config: &BenchConfig) -> f64 {
    let n = config.dimension;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut a = random_sparse(&mut rng, config.sparsity, n, n);
    for _ in 0..config.iterations {
        let b = random_sparse(&mut rng, config.sparsity, n, n);
        a.assign(&b);
    }
    sparse_sum_of(&a)
}

pub fn sparse_sum(config: &BenchConfig) -> f64 {
    let n = config.dimension;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut a = random_sparse(&mut rng, config.sparsity, n, n);
    for _ in 0..config.iterations {
        let b = random_sparse(&mut rng, config.sparsity, n, n);
        a += &b;
    }
    sparse_sum_of(&a)
}

pub fn sparse_mult(config: &BenchConfig) -> f64 {
    let n = config.dimension;
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut a = random_sparse(&mut rng, config.sparsity, n, n);
    for _ in 0..config.iterations {
        let b = random_sparse(&mut rng, config.sparsity, n, n);
        a = &a * &b;
    }
    sparse_sum_of(&a)
}
