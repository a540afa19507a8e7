//! Dense and sparse matrices over strata memory resources.
//!
//! Matrices here never take an allocator argument. Each buffer binds to the
//! registry's active resource when it is created (see [`storage`]), so the
//! allocation strategy for a whole computation is chosen by installing a
//! resource around it:
//!
//! ```
//! use strata_linalg::DenseMatrix;
//! use strata_mem::{DebugResource, registry, system_resource};
//!
//! let debug = DebugResource::new(system_resource());
//! {
//!     // SAFETY: every matrix below is dropped before `debug`.
//!     let _guard = unsafe { registry::install(&debug) };
//!     let a = DenseMatrix::identity(4);
//!     let b = &a * &a;
//!     assert_eq!(b, a);
//! }
//! assert_eq!(debug.num_allocations(), 2);
//! assert_eq!(debug.current_bytes_outstanding(), 0);
//! ```

pub mod dense;
pub mod error;
pub mod sparse;
pub mod storage;

pub use dense::DenseMatrix;
pub use error::{LinalgError, Result};
pub use sparse::{SparseMatrix, Triplet};
pub use storage::Buffer;
