//! The active-resource registry.
//!
//! A per-thread slot naming the resource that code without an explicit
//! resource parameter should allocate from. Orchestration code installs a
//! resource for a scope; consumers read the slot at each allocation site.
//!
//! The slot is thread-local: resources in this crate are `!Sync`, and a
//! resource installed on one thread is never visible to another.
//!
//! # Lifetimes
//!
//! The slot cannot carry a borrow, so installing a resource is `unsafe`:
//! the caller promises the resource outlives both its time in the slot and
//! every allocation made through it from the slot (including handles
//! captured by containers). [`install`] ties the first half to a guard; the
//! second half is the caller's to keep, typically by dropping all consumers
//! before the guard.
//!
//! # Example
//!
//! ```
//! use strata_mem::registry::{self, get_active_resource};
//! use strata_mem::{DebugResource, MemoryResource, system_resource};
//!
//! let debug = DebugResource::new(system_resource());
//! {
//!     // SAFETY: nothing allocated through the registry outlives `debug`.
//!     let _guard = unsafe { registry::install(&debug) };
//!     registry::with_active_resource(|resource| {
//!         let ptr = resource.allocate(16, 8).unwrap();
//!         unsafe { resource.deallocate(ptr, 16, 8) };
//!     });
//! }
//! assert_eq!(debug.num_allocations(), 1);
//! assert!(get_active_resource().is(system_resource()));
//! ```

use crate::resource::MemoryResource;
use crate::system::{null_resource, system_resource};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::{self, NonNull};
use strata_log::{trace, warn};

/// What an empty slot resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Use the system resource.
    System,
    /// Use the null resource, so any allocation without an installed
    /// resource fails.
    Reject,
}

impl FallbackPolicy {
    /// The policy in effect on a fresh thread. `Reject` when the
    /// `strict-fallback` feature is on, `System` otherwise.
    pub const DEFAULT: Self = if cfg!(feature = "strict-fallback") {
        Self::Reject
    } else {
        Self::System
    };

    fn resource(self) -> &'static dyn MemoryResource {
        match self {
            Self::System => system_resource(),
            Self::Reject => null_resource(),
        }
    }
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Unchecked reference to a resource, as stored in the slot.
///
/// A handle does not keep its resource alive. It is valid as long as the
/// contract under which it was created holds.
#[derive(Clone, Copy)]
pub struct ResourceHandle {
    ptr: NonNull<dyn MemoryResource>,
}

impl ResourceHandle {
    /// Handle to a resource that lives forever.
    #[must_use]
    pub fn from_static(resource: &'static dyn MemoryResource) -> Self {
        Self {
            ptr: NonNull::from(resource),
        }
    }

    /// Handle to a borrowed resource.
    ///
    /// # Safety
    ///
    /// `resource` must outlive every use of the returned handle (and its
    /// copies) through [`as_resource`](Self::as_resource).
    #[must_use]
    pub unsafe fn from_ref<'r>(resource: &'r (dyn MemoryResource + 'r)) -> Self {
        // SAFETY: only the lifetime changes; the caller guarantees the
        // resource outlives the handle's uses.
        let resource = unsafe {
            std::mem::transmute::<&'r (dyn MemoryResource + 'r), &'static (dyn MemoryResource + 'static)>(
                resource,
            )
        };
        Self::from_static(resource)
    }

    /// Borrows the resource behind the handle.
    ///
    /// # Safety
    ///
    /// The resource must still be alive for `'a`.
    #[must_use]
    pub unsafe fn as_resource<'a>(self) -> &'a dyn MemoryResource {
        // SAFETY: upheld by the caller.
        unsafe { self.ptr.as_ref() }
    }

    /// Whether this handle refers to `resource`.
    #[must_use]
    pub fn is(self, resource: &dyn MemoryResource) -> bool {
        ptr::addr_eq(self.ptr.as_ptr(), resource as *const dyn MemoryResource)
    }

    /// Address of the referenced resource.
    #[must_use]
    pub fn addr(self) -> usize {
        self.ptr.as_ptr().addr()
    }
}

impl PartialEq for ResourceHandle {
    fn eq(&self, other: &Self) -> bool {
        ptr::addr_eq(self.ptr.as_ptr(), other.ptr.as_ptr())
    }
}

impl Eq for ResourceHandle {}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceHandle({:#x})", self.addr())
    }
}

thread_local! {
    static ACTIVE: Cell<Option<ResourceHandle>> = const { Cell::new(None) };
    static FALLBACK: Cell<FallbackPolicy> = const { Cell::new(FallbackPolicy::DEFAULT) };
}

/// Returns the active resource, or the fallback when nothing is installed.
#[must_use]
pub fn get_active_resource() -> ResourceHandle {
    ACTIVE
        .get()
        .unwrap_or_else(|| ResourceHandle::from_static(fallback_policy().resource()))
}

/// Runs `f` with the active resource.
///
/// Safe because a resource is only in the slot while its installer
/// guarantees it is alive.
pub fn with_active_resource<R>(f: impl FnOnce(&dyn MemoryResource) -> R) -> R {
    // SAFETY: see the module docs; installers keep the resource alive for as
    // long as it is in the slot.
    f(unsafe { get_active_resource().as_resource() })
}

/// Whether a resource has been installed on this thread.
#[must_use]
pub fn has_active_resource() -> bool {
    ACTIVE.get().is_some()
}

/// Puts `resource` in the slot and returns what was there before.
///
/// No validation is done against allocations made through the previous
/// resource. Prefer [`install`], which restores the previous value.
///
/// # Safety
///
/// `resource` must stay alive while it is in the slot, and until every
/// allocation made through the slot while it was installed is deallocated.
pub unsafe fn set_active_resource(resource: &dyn MemoryResource) -> Option<ResourceHandle> {
    // SAFETY: forwarded to the caller.
    let handle = unsafe { ResourceHandle::from_ref(resource) };
    trace!("registry: active resource set to {:#x}", handle.addr());
    ACTIVE.replace(Some(handle))
}

/// Empties the slot; the fallback policy applies afterwards.
pub fn reset_active_resource() -> Option<ResourceHandle> {
    ACTIVE.replace(None)
}

/// Sets the fallback policy for this thread and returns the previous one.
pub fn set_fallback_policy(policy: FallbackPolicy) -> FallbackPolicy {
    FALLBACK.replace(policy)
}

/// The fallback policy in effect on this thread.
#[must_use]
pub fn fallback_policy() -> FallbackPolicy {
    FALLBACK.get()
}

/// Installs `resource` until the returned guard is dropped.
///
/// # Safety
///
/// The guard must not be leaked (`mem::forget`), and every allocation made
/// through the registry while `resource` is installed must be deallocated
/// before `resource` is dropped.
#[must_use = "the resource is uninstalled as soon as the guard is dropped"]
pub unsafe fn install<'r>(resource: &'r (dyn MemoryResource + 'r)) -> ActiveResourceGuard<'r> {
    // SAFETY: forwarded to the caller.
    let previous = unsafe { set_active_resource(resource) };
    ActiveResourceGuard {
        previous,
        // SAFETY: as above.
        installed: unsafe { ResourceHandle::from_ref(resource) },
        _resource: PhantomData,
    }
}

/// Scope guard returned by [`install`]. Restores the previous resource on
/// drop.
pub struct ActiveResourceGuard<'r> {
    previous: Option<ResourceHandle>,
    installed: ResourceHandle,
    _resource: PhantomData<&'r dyn MemoryResource>,
}

impl ActiveResourceGuard<'_> {
    /// Handle to the resource this guard installed.
    #[must_use]
    pub fn installed(&self) -> ResourceHandle {
        self.installed
    }
}

impl Drop for ActiveResourceGuard<'_> {
    fn drop(&mut self) {
        if ACTIVE.get() != Some(self.installed) {
            warn!(
                "registry: guard for {:#x} dropped while another resource is active",
                self.installed.addr()
            );
        }
        ACTIVE.set(self.previous);
    }
}

impl fmt::Debug for ActiveResourceGuard<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActiveResourceGuard")
            .field("installed", &self.installed)
            .field("previous", &self.previous)
            .finish()
    }
}
