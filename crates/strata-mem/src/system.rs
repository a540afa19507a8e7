//! Leaf resources: the global heap and a resource that always fails.

use crate::error::{ResourceError, Result};
use crate::resource::{MemoryResource, layout_for};
use std::alloc::{self, Layout};
use std::ptr::NonNull;

/// Resource backed by the global allocator (`std::alloc`).
///
/// Zero-sized requests are served as one-byte allocations so every call
/// returns a distinct pointer.
///
/// There is exactly one instance, reached through [`system_resource`]:
/// memory from the global heap can be released through any handle to it, so
/// identity-based [`is_equal`](MemoryResource::is_equal) must see a single
/// address. The byte of state keeps it apart from the null resource.
#[derive(Debug)]
pub struct SystemResource {
    _tag: u8,
}

impl SystemResource {
    const fn new() -> Self {
        Self { _tag: 0 }
    }
}

impl MemoryResource for SystemResource {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let layout = layout_for(size.max(1), align)?;

        // SAFETY: `layout` has a non-zero size.
        let ptr = unsafe { alloc::alloc(layout) };
        NonNull::new(ptr).ok_or(ResourceError::OutOfMemory { size, align })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        // SAFETY: the caller passes back the size and alignment `allocate`
        // accepted, so this is the layout the block was allocated with.
        unsafe {
            let layout = Layout::from_size_align_unchecked(size.max(1), align);
            alloc::dealloc(ptr.as_ptr(), layout);
        }
    }
}

/// Resource that fails every allocation.
///
/// Useful as the upstream of a strategy that must never grow, and as the
/// registry target under [`FallbackPolicy::Reject`](crate::FallbackPolicy).
///
/// Like [`SystemResource`], the only instance is [`null_resource`].
#[derive(Debug)]
pub struct NullResource {
    _tag: u8,
}

impl NullResource {
    const fn new() -> Self {
        Self { _tag: 0 }
    }
}

impl MemoryResource for NullResource {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        layout_for(size, align)?;
        Err(ResourceError::OutOfMemory { size, align })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        panic!(
            "NullResource never allocates, but was asked to deallocate {ptr:p} ({size} bytes, align {align})"
        );
    }
}

static SYSTEM: SystemResource = SystemResource::new();
static NULL: NullResource = NullResource::new();

/// Returns the process-wide system resource.
#[must_use]
pub fn system_resource() -> &'static SystemResource {
    &SYSTEM
}

/// Returns the process-wide null resource.
#[must_use]
pub fn null_resource() -> &'static NullResource {
    &NULL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_allocation_is_aligned_and_writable() {
        let system = system_resource();

        for align in [1, 2, 8, 16, 64, 4096] {
            let ptr = system.allocate(100, align).unwrap();
            assert_eq!(ptr.as_ptr().addr() % align, 0);

            unsafe {
                ptr.as_ptr().write_bytes(0xAB, 100);
                assert_eq!(*ptr.as_ptr().add(99), 0xAB);
                system.deallocate(ptr, 100, align);
            }
        }
    }

    #[test]
    fn test_system_zero_size_allocations_are_distinct() {
        let system = system_resource();
        let a = system.allocate(0, 8).unwrap();
        let b = system.allocate(0, 8).unwrap();
        assert_ne!(a, b);

        unsafe {
            system.deallocate(a, 0, 8);
            system.deallocate(b, 0, 8);
        }
    }

    #[test]
    fn test_system_rejects_bad_alignment() {
        assert_eq!(
            system_resource().allocate(8, 12),
            Err(ResourceError::InvalidAlignment { align: 12 })
        );
    }

    #[test]
    fn test_null_always_fails() {
        assert_eq!(
            null_resource().allocate(32, 8),
            Err(ResourceError::OutOfMemory { size: 32, align: 8 })
        );
    }

    #[test]
    fn test_singletons_are_stable() {
        assert!(std::ptr::eq(system_resource(), system_resource()));
        assert!(std::ptr::eq(null_resource(), null_resource()));
    }

    #[test]
    fn test_system_equality_matches_deallocation_safety() {
        let a: &dyn MemoryResource = system_resource();
        let b: &dyn MemoryResource = system_resource();
        assert!(a.is_equal(b));
        assert!(!a.is_equal(null_resource()));

        let ptr = a.allocate(24, 8).unwrap();
        unsafe { b.deallocate(ptr, 24, 8) };
    }
}
