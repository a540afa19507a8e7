//! Error types for matrix operations.

use std::fmt;

/// Errors produced by matrix construction and arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinalgError {
    /// Operand shapes are incompatible for the operation.
    ShapeMismatch {
        /// Operation name, e.g. `"add"`.
        op: &'static str,
        /// Shape of the left operand as `(rows, cols)`.
        left: (usize, usize),
        /// Shape of the right operand as `(rows, cols)`.
        right: (usize, usize),
    },

    /// An index lies outside the matrix.
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// `rows * cols` (or the column-pointer count) does not fit in `usize`.
    DimensionOverflow { rows: usize, cols: usize },

    /// The active resource could not provide storage.
    AllocationFailed {
        /// Number of elements requested.
        elements: usize,
    },
}

impl fmt::Display for LinalgError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinalgError::ShapeMismatch { op, left, right } => write!(
                f,
                "shape mismatch in {op}: {}x{} and {}x{}",
                left.0, left.1, right.0, right.1
            ),
            LinalgError::IndexOutOfBounds {
                row,
                col,
                rows,
                cols,
            } => write!(f, "index ({row}, {col}) out of bounds for {rows}x{cols} matrix"),
            LinalgError::DimensionOverflow { rows, cols } => {
                write!(f, "{rows}x{cols} matrix is too large to address")
            }
            LinalgError::AllocationFailed { elements } => {
                write!(f, "active resource could not allocate {elements} elements")
            }
        }
    }
}

impl std::error::Error for LinalgError {}

/// Result type for matrix operations.
pub type Result<T> = std::result::Result<T, LinalgError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            LinalgError::ShapeMismatch {
                op: "mul",
                left: (2, 3),
                right: (2, 3)
            }
            .to_string(),
            "shape mismatch in mul: 2x3 and 2x3"
        );
        assert_eq!(
            LinalgError::IndexOutOfBounds {
                row: 4,
                col: 0,
                rows: 3,
                cols: 3
            }
            .to_string(),
            "index (4, 0) out of bounds for 3x3 matrix"
        );
        assert_eq!(
            LinalgError::DimensionOverflow { rows: 2, cols: 3 }.to_string(),
            "2x3 matrix is too large to address"
        );
    }
}
