//! Error types for memory resources.
//!
//! Resources report failure through [`ResourceError`]. Strategies and
//! decorators never translate or swallow an upstream error: the value a caller
//! sees is the one produced by the resource that actually failed.

use std::fmt;

/// Errors produced by memory resources.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceError {
    /// The resource could not satisfy the request.
    OutOfMemory {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// The alignment is zero or not a power of two.
    InvalidAlignment {
        /// The rejected alignment.
        align: usize,
    },

    /// Size rounded up to the alignment overflows `isize`.
    SizeOverflow {
        /// Requested size in bytes.
        size: usize,
        /// Requested alignment in bytes.
        align: usize,
    },

    /// A resource was torn down while allocations made through it were
    /// still outstanding.
    LiveAllocations {
        /// Number of allocations never deallocated.
        allocations: u64,
        /// Bytes still outstanding.
        bytes: i64,
    },
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::OutOfMemory { size, align } => {
                write!(f, "out of memory: {size} bytes aligned to {align}")
            }
            ResourceError::InvalidAlignment { align } => {
                write!(f, "invalid alignment: {align} is not a power of two")
            }
            ResourceError::SizeOverflow { size, align } => {
                write!(f, "size overflow: {size} bytes aligned to {align}")
            }
            ResourceError::LiveAllocations { allocations, bytes } => {
                write!(
                    f,
                    "resource released with {allocations} live allocations ({bytes} bytes outstanding)"
                )
            }
        }
    }
}

impl std::error::Error for ResourceError {}

/// Result type for memory resource operations.
pub type Result<T> = std::result::Result<T, ResourceError>;
