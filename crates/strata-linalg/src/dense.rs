//! Dense column-major matrices.
//!
//! Storage is captured from the active resource when a matrix is created.
//! Assignment between equal shapes reuses the destination's storage;
//! products allocate a fresh result.

use crate::error::{LinalgError, Result};
use crate::storage::{self, Buffer};
use std::fmt;
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, MulAssign};

/// A `rows x cols` matrix of `f64` in column-major order.
pub struct DenseMatrix {
    rows: usize,
    cols: usize,
    data: Buffer<f64>,
}

fn len_or_panic(rows: usize, cols: usize) -> usize {
    storage::element_count(rows, cols).unwrap_or_else(|err| panic!("{err}"))
}

impl DenseMatrix {
    /// Zero matrix.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    #[must_use]
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: storage::filled(0.0, len_or_panic(rows, cols)),
        }
    }

    /// Zero matrix, reporting failure instead of panicking or aborting.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::DimensionOverflow`] if `rows * cols` overflows,
    /// and [`LinalgError::AllocationFailed`] if the active resource refuses
    /// the storage.
    pub fn try_zeros(rows: usize, cols: usize) -> Result<Self> {
        let len = storage::element_count(rows, cols)?;
        Ok(Self {
            rows,
            cols,
            data: storage::try_filled(0.0, len)?,
        })
    }

    /// Builds a matrix from `f(row, col)`.
    ///
    /// # Panics
    ///
    /// Panics if `rows * cols` overflows `usize`.
    #[must_use]
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = storage::buffer_with_capacity(len_or_panic(rows, cols));
        for col in 0..cols {
            for row in 0..rows {
                data.push(f(row, col));
            }
        }
        Self { rows, cols, data }
    }

    /// Identity matrix of order `n`.
    #[must_use]
    pub fn identity(n: usize) -> Self {
        Self::from_fn(n, n, |row, col| if row == col { 1.0 } else { 0.0 })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    /// `(rows, cols)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Elements in column-major order.
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    fn offset(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.cols).then(|| col * self.rows + row)
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> LinalgError {
        LinalgError::IndexOutOfBounds {
            row,
            col,
            rows: self.rows,
            cols: self.cols,
        }
    }

    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.offset(row, col).map(|offset| self.data[offset])
    }

    /// Writes one element.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::IndexOutOfBounds`] outside the matrix.
    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        let offset = self
            .offset(row, col)
            .ok_or_else(|| self.out_of_bounds(row, col))?;
        self.data[offset] = value;
        Ok(())
    }

    /// Makes `self` a copy of `other`. Storage is reused when it is large
    /// enough.
    pub fn assign(&mut self, other: &DenseMatrix) {
        self.rows = other.rows;
        self.cols = other.cols;
        storage::assign_slice(&mut self.data, &other.data);
    }

    fn check_same_shape(&self, other: &DenseMatrix, op: &'static str) -> Result<()> {
        if self.shape() == other.shape() {
            Ok(())
        } else {
            Err(LinalgError::ShapeMismatch {
                op,
                left: self.shape(),
                right: other.shape(),
            })
        }
    }

    /// Element-wise `self += other`, in place.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] unless the shapes are equal.
    pub fn try_add_assign(&mut self, other: &DenseMatrix) -> Result<()> {
        self.check_same_shape(other, "add")?;
        for (lhs, rhs) in self.data.iter_mut().zip(other.data.iter()) {
            *lhs += rhs;
        }
        Ok(())
    }

    /// Element-wise sum as a new matrix.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] unless the shapes are equal.
    pub fn try_add(&self, other: &DenseMatrix) -> Result<DenseMatrix> {
        self.check_same_shape(other, "add")?;
        let mut sum = self.clone();
        sum.try_add_assign(other)?;
        Ok(sum)
    }

    /// Matrix product `self * other`.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] if `self.cols() != other.rows()`,
    /// or the errors of [`try_zeros`](Self::try_zeros) for the product.
    pub fn try_mul(&self, other: &DenseMatrix) -> Result<DenseMatrix> {
        if self.cols != other.rows {
            return Err(LinalgError::ShapeMismatch {
                op: "mul",
                left: self.shape(),
                right: other.shape(),
            });
        }

        let mut product = DenseMatrix::try_zeros(self.rows, other.cols)?;
        for col in 0..other.cols {
            let out = &mut product.data[col * self.rows..(col + 1) * self.rows];
            for k in 0..self.cols {
                let scale = other.data[col * other.rows + k];
                let lhs = &self.data[k * self.rows..(k + 1) * self.rows];
                for (acc, value) in out.iter_mut().zip(lhs) {
                    *acc += value * scale;
                }
            }
        }
        Ok(product)
    }

    /// `self = self * other`. The product is computed into a temporary.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] if `self.cols() != other.rows()`.
    pub fn try_mul_assign(&mut self, other: &DenseMatrix) -> Result<()> {
        let product = self.try_mul(other)?;
        self.assign(&product);
        Ok(())
    }

    /// Transposed copy.
    #[must_use]
    pub fn transpose(&self) -> DenseMatrix {
        DenseMatrix::from_fn(self.cols, self.rows, |row, col| self[(col, row)])
    }
}

/// Clones into storage from the resource active at the time of the clone.
impl Clone for DenseMatrix {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: storage::copied(&self.data),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl PartialEq for DenseMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape() && self.data[..] == other.data[..]
    }
}

impl fmt::Debug for DenseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DenseMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("data", &&self.data[..])
            .finish()
    }
}

impl Index<(usize, usize)> for DenseMatrix {
    type Output = f64;

    fn index(&self, (row, col): (usize, usize)) -> &f64 {
        match self.offset(row, col) {
            Some(offset) => &self.data[offset],
            None => panic!("{}", self.out_of_bounds(row, col)),
        }
    }
}

impl IndexMut<(usize, usize)> for DenseMatrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f64 {
        match self.offset(row, col) {
            Some(offset) => &mut self.data[offset],
            None => panic!("{}", self.out_of_bounds(row, col)),
        }
    }
}

impl AddAssign<&DenseMatrix> for DenseMatrix {
    fn add_assign(&mut self, rhs: &DenseMatrix) {
        if let Err(err) = self.try_add_assign(rhs) {
            panic!("{err}");
        }
    }
}

impl Add for &DenseMatrix {
    type Output = DenseMatrix;

    fn add(self, rhs: &DenseMatrix) -> DenseMatrix {
        self.try_add(rhs).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl Mul for &DenseMatrix {
    type Output = DenseMatrix;

    fn mul(self, rhs: &DenseMatrix) -> DenseMatrix {
        self.try_mul(rhs).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl MulAssign<&DenseMatrix> for DenseMatrix {
    fn mul_assign(&mut self, rhs: &DenseMatrix) {
        if let Err(err) = self.try_mul_assign(rhs) {
            panic!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_mem::registry;
    use strata_mem::{DebugResource, system_resource};

    fn sequential(rows: usize, cols: usize) -> DenseMatrix {
        DenseMatrix::from_fn(rows, cols, |row, col| (row * cols + col) as f64)
    }

    #[test]
    fn test_layout_is_column_major() {
        let m = sequential(2, 3);
        assert_eq!(m.as_slice(), &[0.0, 3.0, 1.0, 4.0, 2.0, 5.0]);
        assert_eq!(m[(1, 2)], 5.0);
        assert_eq!(m.get(2, 0), None);
    }

    #[test]
    fn test_set_checks_bounds() {
        let mut m = DenseMatrix::zeros(2, 2);
        m.set(1, 1, 7.0).unwrap();
        assert_eq!(m[(1, 1)], 7.0);
        assert_eq!(
            m.set(2, 0, 1.0),
            Err(LinalgError::IndexOutOfBounds {
                row: 2,
                col: 0,
                rows: 2,
                cols: 2
            })
        );
    }

    #[test]
    fn test_add() {
        let a = sequential(2, 2);
        let mut b = DenseMatrix::identity(2);
        b += &a;

        assert_eq!(b.as_slice(), &[1.0, 2.0, 1.0, 4.0]);
        assert_eq!(&a + &a, DenseMatrix::from_fn(2, 2, |r, c| 2.0 * (r * 2 + c) as f64));
    }

    #[test]
    fn test_mul() {
        let a = sequential(2, 3);
        let b = sequential(3, 2);
        let product = &a * &b;

        // [0 1 2; 3 4 5] * [0 1; 2 3; 4 5]
        assert_eq!(product.shape(), (2, 2));
        assert_eq!(product[(0, 0)], 10.0);
        assert_eq!(product[(0, 1)], 13.0);
        assert_eq!(product[(1, 0)], 28.0);
        assert_eq!(product[(1, 1)], 40.0);
    }

    #[test]
    fn test_mul_assign_by_identity() {
        let mut a = sequential(3, 3);
        let expected = a.clone();
        a *= &DenseMatrix::identity(3);
        assert_eq!(a, expected);
    }

    #[test]
    fn test_shape_mismatch() {
        let a = sequential(2, 3);
        let b = sequential(2, 3);

        assert_eq!(
            a.try_mul(&b).err(),
            Some(LinalgError::ShapeMismatch {
                op: "mul",
                left: (2, 3),
                right: (2, 3)
            })
        );
        assert!(a.try_add(&sequential(3, 2)).is_err());
    }

    #[test]
    #[should_panic(expected = "shape mismatch in add")]
    fn test_add_assign_panics_on_mismatch() {
        let mut a = DenseMatrix::zeros(2, 2);
        a += &DenseMatrix::zeros(3, 3);
    }

    #[test]
    fn test_try_zeros_reports_dimension_overflow() {
        assert_eq!(
            DenseMatrix::try_zeros(usize::MAX, 2).err(),
            Some(LinalgError::DimensionOverflow {
                rows: usize::MAX,
                cols: 2
            })
        );
        assert_eq!(
            DenseMatrix::try_zeros(1 << 40, 1 << 20).err(),
            Some(LinalgError::AllocationFailed { elements: 1 << 60 })
        );
        assert_eq!(DenseMatrix::try_zeros(2, 3).unwrap().shape(), (2, 3));
    }

    #[test]
    #[should_panic(expected = "too large to address")]
    fn test_zeros_panics_on_dimension_overflow() {
        let _ = DenseMatrix::zeros(1 << 33, 1 << 33);
    }

    #[test]
    fn test_transpose() {
        let m = sequential(2, 3);
        let t = m.transpose();
        assert_eq!(t.shape(), (3, 2));
        assert_eq!(t[(2, 1)], m[(1, 2)]);
    }

    #[test]
    fn test_assign_same_shape_does_not_allocate() {
        let debug = DebugResource::new(system_resource());
        {
            let _guard = unsafe { registry::install(&debug) };
            let mut a = DenseMatrix::zeros(10, 10);
            let allocations = debug.num_allocations();

            for _ in 0..100 {
                let b = DenseMatrix::identity(10);
                a.assign(&b);
            }
            assert_eq!(a, DenseMatrix::identity(10));
            // Only the temporaries allocated.
            assert_eq!(debug.num_allocations(), allocations + 101);
        }
        assert_eq!(debug.current_bytes_outstanding(), 0);
    }

    #[test]
    fn test_clone_uses_resource_active_at_clone_time() {
        let first = DebugResource::new(system_resource());
        let second = DebugResource::new(system_resource());

        let guard = unsafe { registry::install(&first) };
        let a = DenseMatrix::zeros(4, 4);
        drop(guard);

        let guard = unsafe { registry::install(&second) };
        let b = a.clone();
        assert_eq!(first.num_allocations(), 1);
        assert_eq!(second.num_allocations(), 1);

        drop(b);
        drop(guard);
        drop(a);
        assert_eq!(first.current_bytes_outstanding(), 0);
        assert_eq!(second.current_bytes_outstanding(), 0);
    }
}
