//! Sparse matrices in compressed sparse column (CSC) form.
//!
//! Column `c` owns the entries `col_ptr[c]..col_ptr[c + 1]` of `row_idx` and
//! `values`, with row indices strictly increasing inside a column. Explicit
//! zeros produced by arithmetic are kept.
//!
//! All storage, including the scratch space of construction and products,
//! comes from the active resource.

use crate::dense::DenseMatrix;
use crate::error::{LinalgError, Result};
use crate::storage::{self, Buffer};
use std::fmt;
use std::ops::{Add, AddAssign, Mul, MulAssign};

/// One `(row, col, value)` entry used to build a [`SparseMatrix`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Triplet {
    pub row: usize,
    pub col: usize,
    pub value: f64,
}

impl Triplet {
    #[must_use]
    pub fn new(row: usize, col: usize, value: f64) -> Self {
        Self { row, col, value }
    }
}

/// A `rows x cols` sparse matrix of `f64`.
pub struct SparseMatrix {
    rows: usize,
    cols: usize,
    col_ptr: Buffer<usize>,
    row_idx: Buffer<usize>,
    values: Buffer<f64>,
}

impl SparseMatrix {
    /// Matrix with no stored entries.
    ///
    /// # Panics
    ///
    /// Panics if `cols == usize::MAX`.
    #[must_use]
    pub fn new(rows: usize, cols: usize) -> Self {
        let ptr_len =
            storage::column_pointer_count(rows, cols).unwrap_or_else(|err| panic!("{err}"));
        Self {
            rows,
            cols,
            col_ptr: storage::filled(0, ptr_len),
            row_idx: storage::buffer(),
            values: storage::buffer(),
        }
    }

    /// Builds a matrix from unordered triplets. Entries with the same
    /// position are summed.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::IndexOutOfBounds`] for a triplet outside the
    /// matrix, and [`LinalgError::DimensionOverflow`] if `cols == usize::MAX`.
    pub fn from_triplets(rows: usize, cols: usize, triplets: &[Triplet]) -> Result<Self> {
        let ptr_len = storage::column_pointer_count(rows, cols)?;
        if let Some(bad) = triplets.iter().find(|t| t.row >= rows || t.col >= cols) {
            return Err(LinalgError::IndexOutOfBounds {
                row: bad.row,
                col: bad.col,
                rows,
                cols,
            });
        }

        // Bucket by column.
        let mut col_ptr = storage::filled(0usize, ptr_len);
        for triplet in triplets {
            col_ptr[triplet.col + 1] += 1;
        }
        for col in 0..cols {
            col_ptr[col + 1] += col_ptr[col];
        }

        let mut row_idx = storage::filled(0usize, triplets.len());
        let mut values = storage::filled(0.0, triplets.len());
        {
            let mut next = storage::copied(&col_ptr[..cols]);
            for triplet in triplets {
                let slot = next[triplet.col];
                row_idx[slot] = triplet.row;
                values[slot] = triplet.value;
                next[triplet.col] += 1;
            }
        }

        // Sort each column by row and fold duplicates, compacting in place.
        let mut column: Buffer<(usize, f64)> = storage::buffer();
        let mut write = 0;
        for col in 0..cols {
            let (start, end) = (col_ptr[col], col_ptr[col + 1]);
            column.clear();
            column.extend((start..end).map(|i| (row_idx[i], values[i])));
            column.sort_unstable_by_key(|&(row, _)| row);

            col_ptr[col] = write;
            for &(row, value) in column.iter() {
                if write > col_ptr[col] && row_idx[write - 1] == row {
                    values[write - 1] += value;
                } else {
                    row_idx[write] = row;
                    values[write] = value;
                    write += 1;
                }
            }
        }
        col_ptr[cols] = write;
        row_idx.truncate(write);
        values.truncate(write);

        Ok(Self {
            rows,
            cols,
            col_ptr,
            row_idx,
            values,
        })
    }

    #[must_use]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Number of stored entries.
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    fn column_range(&self, col: usize) -> std::ops::Range<usize> {
        self.col_ptr[col]..self.col_ptr[col + 1]
    }

    /// Stored `(row, value)` pairs of one column, by increasing row.
    ///
    /// # Panics
    ///
    /// Panics if `col >= self.cols()`.
    pub fn column(&self, col: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.column_range(col);
        self.row_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// Stored entries in column-major order.
    pub fn iter(&self) -> impl Iterator<Item = Triplet> + '_ {
        (0..self.cols).flat_map(move |col| {
            self.column(col)
                .map(move |(row, value)| Triplet { row, col, value })
        })
    }

    /// Element at `(row, col)`: `Some(0.0)` when not stored, `None` outside
    /// the matrix.
    #[must_use]
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let range = self.column_range(col);
        let rows = &self.row_idx[range.clone()];
        Some(match rows.binary_search(&row) {
            Ok(found) => self.values[range.start + found],
            Err(_) => 0.0,
        })
    }

    /// Makes `self` a copy of `other`, reusing storage where possible.
    pub fn assign(&mut self, other: &SparseMatrix) {
        self.rows = other.rows;
        self.cols = other.cols;
        storage::assign_slice(&mut self.col_ptr, &other.col_ptr);
        storage::assign_slice(&mut self.row_idx, &other.row_idx);
        storage::assign_slice(&mut self.values, &other.values);
    }

    /// Element-wise sum as a new matrix.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] unless the shapes are equal.
    pub fn try_add(&self, other: &SparseMatrix) -> Result<SparseMatrix> {
        if self.shape() != other.shape() {
            return Err(LinalgError::ShapeMismatch {
                op: "add",
                left: self.shape(),
                right: other.shape(),
            });
        }

        let capacity = self.nnz() + other.nnz();
        let mut col_ptr = storage::buffer_with_capacity(self.cols + 1);
        let mut row_idx = storage::buffer_with_capacity(capacity);
        let mut values = storage::buffer_with_capacity(capacity);
        col_ptr.push(0);

        for col in 0..self.cols {
            let mut lhs = self.column(col).peekable();
            let mut rhs = other.column(col).peekable();
            loop {
                let (row, value) = match (lhs.peek().copied(), rhs.peek().copied()) {
                    (None, None) => break,
                    (Some(l), None) => {
                        lhs.next();
                        l
                    }
                    (None, Some(r)) => {
                        rhs.next();
                        r
                    }
                    (Some(l), Some(r)) if l.0 < r.0 => {
                        lhs.next();
                        l
                    }
                    (Some(l), Some(r)) if r.0 < l.0 => {
                        rhs.next();
                        r
                    }
                    (Some(l), Some(r)) => {
                        lhs.next();
                        rhs.next();
                        (l.0, l.1 + r.1)
                    }
                };
                row_idx.push(row);
                values.push(value);
            }
            col_ptr.push(row_idx.len());
        }

        Ok(SparseMatrix {
            rows: self.rows,
            cols: self.cols,
            col_ptr,
            row_idx,
            values,
        })
    }

    /// `self += other`. The sum is built in scratch storage and copied back.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] unless the shapes are equal.
    pub fn try_add_assign(&mut self, other: &SparseMatrix) -> Result<()> {
        let sum = self.try_add(other)?;
        self.assign(&sum);
        Ok(())
    }

    /// Sparse product `self * other` (column-by-column accumulation).
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] if `self.cols() != other.rows()`.
    pub fn try_mul(&self, other: &SparseMatrix) -> Result<SparseMatrix> {
        if self.cols != other.rows {
            return Err(LinalgError::ShapeMismatch {
                op: "mul",
                left: self.shape(),
                right: other.shape(),
            });
        }

        let mut accum = storage::filled(0.0, self.rows);
        let mut marker = storage::filled(usize::MAX, self.rows);
        let mut pattern: Buffer<usize> = storage::buffer_with_capacity(self.rows);

        let mut col_ptr = storage::buffer_with_capacity(other.cols + 1);
        let mut row_idx = storage::buffer();
        let mut values = storage::buffer();
        col_ptr.push(0);

        for col in 0..other.cols {
            pattern.clear();
            for (k, rhs) in other.column(col) {
                for (row, lhs) in self.column(k) {
                    if marker[row] == col {
                        accum[row] += lhs * rhs;
                    } else {
                        marker[row] = col;
                        accum[row] = lhs * rhs;
                        pattern.push(row);
                    }
                }
            }

            pattern.sort_unstable();
            for &row in pattern.iter() {
                row_idx.push(row);
                values.push(accum[row]);
            }
            col_ptr.push(row_idx.len());
        }

        Ok(SparseMatrix {
            rows: self.rows,
            cols: other.cols,
            col_ptr,
            row_idx,
            values,
        })
    }

    /// `self = self * other`.
    ///
    /// # Errors
    ///
    /// Returns [`LinalgError::ShapeMismatch`] if `self.cols() != other.rows()`.
    pub fn try_mul_assign(&mut self, other: &SparseMatrix) -> Result<()> {
        let product = self.try_mul(other)?;
        self.assign(&product);
        Ok(())
    }

    /// Dense copy.
    #[must_use]
    pub fn to_dense(&self) -> DenseMatrix {
        let mut dense = DenseMatrix::zeros(self.rows, self.cols);
        for Triplet { row, col, value } in self.iter() {
            dense[(row, col)] = value;
        }
        dense
    }
}

/// Clones into storage from the resource active at the time of the clone.
impl Clone for SparseMatrix {
    fn clone(&self) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            col_ptr: storage::copied(&self.col_ptr),
            row_idx: storage::copied(&self.row_idx),
            values: storage::copied(&self.values),
        }
    }

    fn clone_from(&mut self, source: &Self) {
        self.assign(source);
    }
}

impl PartialEq for SparseMatrix {
    fn eq(&self, other: &Self) -> bool {
        self.shape() == other.shape()
            && self.col_ptr[..] == other.col_ptr[..]
            && self.row_idx[..] == other.row_idx[..]
            && self.values[..] == other.values[..]
    }
}

impl fmt::Debug for SparseMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SparseMatrix")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("nnz", &self.nnz())
            .finish_non_exhaustive()
    }
}

impl Add for &SparseMatrix {
    type Output = SparseMatrix;

    fn add(self, rhs: &SparseMatrix) -> SparseMatrix {
        self.try_add(rhs).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl AddAssign<&SparseMatrix> for SparseMatrix {
    fn add_assign(&mut self, rhs: &SparseMatrix) {
        if let Err(err) = self.try_add_assign(rhs) {
            panic!("{err}");
        }
    }
}

impl Mul for &SparseMatrix {
    type Output = SparseMatrix;

    fn mul(self, rhs: &SparseMatrix) -> SparseMatrix {
        self.try_mul(rhs).unwrap_or_else(|err| panic!("{err}"))
    }
}

impl MulAssign<&SparseMatrix> for SparseMatrix {
    fn mul_assign(&mut self, rhs: &SparseMatrix) {
        if let Err(err) = self.try_mul_assign(rhs) {
            panic!("{err}");
        }
    }
}
