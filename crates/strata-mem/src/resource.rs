//! The memory resource capability.
//!
//! [`MemoryResource`] is the contract every strategy and decorator in this
//! crate implements. Resources are shared by reference (`&dyn
//! MemoryResource`); a resource built on top of another one borrows its
//! upstream, so the borrow checker enforces that an upstream outlives
//! everything layered over it.
//!
//! # Contract
//!
//! - `allocate(size, align)` returns a block of at least `size` bytes aligned
//!   to `align`, or an error. There is no partial success.
//! - `deallocate(ptr, size, align)` must receive a pointer obtained from
//!   `allocate` on an equal resource, with the same `size` and `align`, at
//!   most once. Strategies may choose to ignore individual deallocations.
//! - `is_equal(other)` is `true` only when memory allocated through one
//!   resource may be deallocated through the other.
//!
//! # Example
//!
//! ```
//! use strata_mem::{MemoryResource, system_resource};
//!
//! let system = system_resource();
//! let ptr = system.allocate(64, 8).unwrap();
//! assert_eq!(ptr.as_ptr().addr() % 8, 0);
//!
//! // SAFETY: `ptr` came from `system` with the same size and alignment.
//! unsafe { system.deallocate(ptr, 64, 8) };
//! ```

use crate::error::{ResourceError, Result};
use std::alloc::Layout;
use std::ptr::{self, NonNull};

/// Largest alignment every resource in this crate is required to honor.
///
/// Matches the alignment of the platform's `max_align_t` on the targets we
/// build for. Requests above it are still served where a strategy can do so
/// cheaply, but pools forward them upstream untouched.
pub const MAX_ALIGN: usize = 16;

/// A polymorphic source of raw memory.
pub trait MemoryResource {
    /// Allocates `size` bytes aligned to `align`.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::InvalidAlignment`] if `align` is not a power
    /// of two, and [`ResourceError::OutOfMemory`] (or whatever the failing
    /// upstream produced) when the request cannot be satisfied.
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>>;

    /// Returns a block to the resource.
    ///
    /// # Safety
    ///
    /// `ptr` must have been returned by [`allocate`](Self::allocate) on this
    /// resource (or one it [`is_equal`](Self::is_equal) to) with exactly the
    /// same `size` and `align`, and must not have been deallocated already.
    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize);

    /// Returns `true` if memory from `self` can be released through `other`.
    ///
    /// The default is address identity.
    fn is_equal(&self, other: &dyn MemoryResource) -> bool {
        ptr::addr_eq(self as *const Self, other as *const dyn MemoryResource)
    }
}

impl PartialEq for dyn MemoryResource + '_ {
    fn eq(&self, other: &Self) -> bool {
        resources_equal(self, other)
    }
}

/// Compares two resources the way containers do before exchanging memory:
/// identical addresses short-circuit, otherwise `a.is_equal(b)` decides.
pub fn resources_equal(a: &dyn MemoryResource, b: &dyn MemoryResource) -> bool {
    ptr::addr_eq(a as *const dyn MemoryResource, b as *const dyn MemoryResource)
        || a.is_equal(b)
}

/// Validates a size/alignment pair and turns it into a [`Layout`].
pub(crate) fn layout_for(size: usize, align: usize) -> Result<Layout> {
    if !align.is_power_of_two() {
        return Err(ResourceError::InvalidAlignment { align });
    }
    Layout::from_size_align(size, align).map_err(|_| ResourceError::SizeOverflow { size, align })
}

/// Rounds `value` up to a multiple of `align` (a power of two).
#[inline]
pub(crate) fn align_up(value: usize, align: usize) -> Option<usize> {
    debug_assert!(align.is_power_of_two());
    Some(value.checked_add(align - 1)? & !(align - 1))
}
