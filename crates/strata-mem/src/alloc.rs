//! Adapters from [`MemoryResource`] to the `allocator-api2` [`Allocator`]
//! trait, so standard-shaped containers can allocate through a resource.
//!
//! - [`ResourceAlloc`] borrows a resource explicitly; containers built with it
//!   cannot outlive the resource.
//! - [`ActiveAlloc`] captures whatever the registry holds at construction and
//!   keeps using it, like a container that remembers its allocator.
//!
//! Allocation failure surfaces as [`AllocError`]; growable containers turn it
//! into `handle_alloc_error`.

use crate::registry::{self, ResourceHandle};
use crate::resource::MemoryResource;
use allocator_api2::alloc::{AllocError, Allocator, Layout};
use fxhash::FxBuildHasher;
use std::fmt;
use std::ptr::NonNull;
use strata_log::trace;

/// Vector allocating from a borrowed resource.
pub type ResVec<'r, T> = allocator_api2::vec::Vec<T, ResourceAlloc<'r>>;

/// Hash map allocating from a borrowed resource.
pub type ResMap<'r, K, V> = hashbrown::HashMap<K, V, FxBuildHasher, ResourceAlloc<'r>>;

/// Creates an empty [`ResMap`] over `resource`.
#[must_use]
pub fn res_map<'r, K, V>(resource: &'r dyn MemoryResource) -> ResMap<'r, K, V> {
    ResMap::with_hasher_in(FxBuildHasher::default(), ResourceAlloc::new(resource))
}

fn allocate_from(resource: &dyn MemoryResource, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
    match resource.allocate(layout.size(), layout.align()) {
        Ok(ptr) => Ok(NonNull::slice_from_raw_parts(ptr, layout.size())),
        Err(err) => {
            trace!("allocator adapter: {err}");
            Err(AllocError)
        }
    }
}

/// Allocator over a borrowed resource.
#[derive(Clone, Copy)]
pub struct ResourceAlloc<'r> {
    resource: &'r dyn MemoryResource,
}

impl<'r> ResourceAlloc<'r> {
    #[must_use]
    pub fn new(resource: &'r dyn MemoryResource) -> Self {
        Self { resource }
    }

    /// The resource this allocator draws from.
    #[must_use]
    pub fn resource(&self) -> &'r dyn MemoryResource {
        self.resource
    }
}

// SAFETY: blocks come from `resource.allocate` with the layout's size and
// alignment and are returned to the same resource with the same layout.
// Copies share the resource, so memory may be freed through any copy.
unsafe impl Allocator for ResourceAlloc<'_> {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        allocate_from(self.resource, layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: the `Allocator` contract guarantees `ptr` was allocated by
        // this allocator (or a copy) with `layout`.
        unsafe { self.resource.deallocate(ptr, layout.size(), layout.align()) }
    }
}

impl PartialEq for ResourceAlloc<'_> {
    fn eq(&self, other: &Self) -> bool {
        crate::resource::resources_equal(self.resource, other.resource)
    }
}

impl fmt::Debug for ResourceAlloc<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceAlloc({:p})", self.resource as *const dyn MemoryResource)
    }
}

/// Allocator bound to the resource that was active when it was created.
///
/// Its validity rests on the contract of [`registry::install`]: the
/// installed resource outlives every allocation made through the registry.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ActiveAlloc {
    handle: ResourceHandle,
}

impl ActiveAlloc {
    /// Captures the currently active resource.
    #[must_use]
    pub fn current() -> Self {
        Self {
            handle: registry::get_active_resource(),
        }
    }

    /// The captured resource.
    #[must_use]
    pub fn handle(&self) -> ResourceHandle {
        self.handle
    }

    fn resource(&self) -> &dyn MemoryResource {
        // SAFETY: the handle came from the registry, whose installers keep
        // the resource alive for every allocation made through it.
        unsafe { self.handle.as_resource() }
    }
}

impl Default for ActiveAlloc {
    fn default() -> Self {
        Self::current()
    }
}

// SAFETY: as for `ResourceAlloc`; every copy refers to the same resource.
unsafe impl Allocator for ActiveAlloc {
    fn allocate(&self, layout: Layout) -> Result<NonNull<[u8]>, AllocError> {
        allocate_from(self.resource(), layout)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, layout: Layout) {
        // SAFETY: see `ResourceAlloc::deallocate`.
        unsafe {
            self.resource()
                .deallocate(ptr, layout.size(), layout.align());
        }
    }
}

impl fmt::Debug for ActiveAlloc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActiveAlloc").field(&self.handle).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaResource;
    use crate::debug::DebugResource;
    use crate::system::{null_resource, system_resource};

    #[test]
    fn test_vec_allocates_through_resource() {
        let debug = DebugResource::new(system_resource());
        {
            let mut values: ResVec<'_, u64> = ResVec::new_in(ResourceAlloc::new(&debug));
            values.extend(0..1000);
            assert_eq!(values.iter().sum::<u64>(), 999 * 1000 / 2);
            assert!(debug.num_allocations() >= 1);
        }
        assert_eq!(debug.current_bytes_outstanding(), 0);
        assert_eq!(debug.num_allocations(), debug.num_deallocations());
    }

    #[test]
    fn test_map_allocates_through_resource() {
        let debug = DebugResource::new(system_resource());
        {
            let mut map = res_map::<u32, u32>(&debug);
            for i in 0..500 {
                map.insert(i, i * 2);
            }
            assert_eq!(map.get(&250), Some(&500));
        }
        assert!(debug.num_allocations() >= 1);
        assert_eq!(debug.current_bytes_outstanding(), 0);
    }

    #[test]
    fn test_arena_never_sees_frees() {
        let debug = DebugResource::new(system_resource());
        {
            let arena = ArenaResource::new(&debug);
            let mut values: ResVec<'_, u32> = ResVec::new_in(ResourceAlloc::new(&arena));
            values.extend(0..10_000);
            drop(values);
            assert_eq!(debug.num_deallocations(), 0);
        }
        assert_eq!(debug.current_bytes_outstanding(), 0);
    }

    #[test]
    fn test_failure_is_alloc_error() {
        let alloc = ResourceAlloc::new(null_resource());
        assert!(alloc.allocate(Layout::new::<u64>()).is_err());

        let mut values: ResVec<'_, u8> = ResVec::new_in(alloc);
        assert!(values.try_reserve(16).is_err());
    }

    #[test]
    fn test_active_alloc_keeps_captured_resource() {
        let first = DebugResource::new(system_resource());
        let second = DebugResource::new(system_resource());

        let guard = unsafe { registry::install(&first) };
        let captured = ActiveAlloc::current();
        drop(guard);

        let _guard = unsafe { registry::install(&second) };
        let mut values = allocator_api2::vec::Vec::<u8, _>::new_in(captured);
        values.push(1);

        assert_eq!(first.num_allocations(), 1);
        assert_eq!(second.num_allocations(), 0);
        drop(values);
        assert_eq!(first.current_bytes_outstanding(), 0);
    }

    #[test]
    fn test_allocator_equality() {
        let a = DebugResource::new(system_resource());
        let b = DebugResource::new(system_resource());

        assert_eq!(ResourceAlloc::new(&a), ResourceAlloc::new(&a));
        assert_ne!(ResourceAlloc::new(&a), ResourceAlloc::new(&b));
    }
}
