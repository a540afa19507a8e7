//! Monotonic arena resource.
//!
//! [`ArenaResource`] hands out memory by bumping a cursor through regions it
//! requests from an upstream resource. Individual deallocation is a no-op:
//! memory only ever grows during the arena's lifetime and is returned to
//! upstream in bulk by [`ArenaResource::release`] or on drop.
//!
//! # Growth
//!
//! The first region is [`ArenaConfig::initial_region_size`] bytes. Each
//! following region is `growth_factor` times larger, capped at
//! `max_region_size`. A request that does not fit the policy's next size gets
//! a region of exactly its own size.
//!
//! # Example
//!
//! ```
//! use strata_mem::{ArenaResource, DebugResource, MemoryResource, system_resource};
//!
//! let debug = DebugResource::new(system_resource());
//! {
//!     let arena = ArenaResource::new(&debug);
//!     for _ in 0..16 {
//!         let ptr = arena.allocate(32, 8).unwrap();
//!         // No-op: the block stays reserved until the arena goes away.
//!         unsafe { arena.deallocate(ptr, 32, 8) };
//!     }
//!     // 16 * 32 bytes fit in the first 1 KiB region.
//!     assert_eq!(debug.num_allocations(), 1);
//!     assert_eq!(debug.num_deallocations(), 0);
//! }
//! assert_eq!(debug.num_deallocations(), 1);
//! assert_eq!(debug.current_bytes_outstanding(), 0);
//! ```

use crate::error::{ResourceError, Result};
use crate::resource::{MAX_ALIGN, MemoryResource, align_up, layout_for};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr::{self, NonNull};
use strata_log::{debug, trace};

/// Default size of the first region requested from upstream (1 KiB).
pub const DEFAULT_INITIAL_REGION_SIZE: usize = 1024;

/// Default multiplier applied to the region size after every growth.
pub const DEFAULT_GROWTH_FACTOR: usize = 2;

/// Default cap on the policy's region size (1 MiB).
pub const DEFAULT_MAX_REGION_SIZE: usize = 1024 * 1024;

/// Smallest region the arena will request.
const MIN_REGION_SIZE: usize = 64;

/// Region growth policy for [`ArenaResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Size of the first region in bytes.
    pub initial_region_size: usize,
    /// Multiplier applied to the region size after each growth (at least 1).
    pub growth_factor: usize,
    /// Upper bound on the policy's region size. Oversized requests still get
    /// a region of their own size.
    pub max_region_size: usize,
}

impl ArenaConfig {
    /// Creates a config with the given first region size and default growth.
    #[must_use]
    pub const fn new(initial_region_size: usize) -> Self {
        Self {
            initial_region_size,
            growth_factor: DEFAULT_GROWTH_FACTOR,
            max_region_size: DEFAULT_MAX_REGION_SIZE,
        }
    }

    /// Sets the growth factor.
    #[must_use]
    pub const fn with_growth_factor(mut self, growth_factor: usize) -> Self {
        self.growth_factor = growth_factor;
        self
    }

    /// Sets the region size cap.
    #[must_use]
    pub const fn with_max_region_size(mut self, max_region_size: usize) -> Self {
        self.max_region_size = max_region_size;
        self
    }

    /// Clamps every field into its valid range.
    fn normalized(self) -> Self {
        let initial_region_size = self.initial_region_size.max(MIN_REGION_SIZE);
        Self {
            initial_region_size,
            growth_factor: self.growth_factor.max(1),
            max_region_size: self.max_region_size.max(initial_region_size),
        }
    }

    /// Region size the policy picks after a region of `previous` bytes.
    #[must_use]
    pub fn next_region_size(&self, previous: usize) -> usize {
        previous
            .saturating_mul(self.growth_factor)
            .min(self.max_region_size)
            .max(previous.min(self.max_region_size))
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(DEFAULT_INITIAL_REGION_SIZE)
    }
}

/// Snapshot of an arena's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArenaStats {
    /// Regions currently owned (excluding a caller-provided buffer).
    pub region_count: usize,
    /// Total bytes requested from upstream for owned regions.
    pub region_bytes: usize,
    /// Bytes handed out since construction or the last release.
    pub bytes_allocated: usize,
    /// Allocations served since construction or the last release.
    pub allocations: u64,
    /// Bytes left in the region currently being filled.
    pub remaining: usize,
}

/// A region obtained from upstream, returned verbatim on release.
struct Region {
    start: NonNull<u8>,
    size: usize,
    align: usize,
}

/// Bump-pointer resource over an upstream resource.
///
/// Not thread-safe: the cursor lives in a [`Cell`], so the type is `!Sync`.
pub struct ArenaResource<'up> {
    upstream: &'up dyn MemoryResource,
    config: ArenaConfig,
    /// Regions owned by the arena, oldest first.
    regions: RefCell<Vec<Region>>,
    /// Next free byte in the current region; null before the first region.
    cursor: Cell<*mut u8>,
    /// One past the end of the current region.
    end: Cell<*mut u8>,
    /// Size the growth policy will request next.
    next_region_size: Cell<usize>,
    /// Caller-provided buffer served before any region is requested.
    initial_buffer: Option<(NonNull<u8>, usize)>,
    bytes_allocated: Cell<usize>,
    allocations: Cell<u64>,
}

impl<'up> ArenaResource<'up> {
    /// Creates an arena with the default growth policy.
    ///
    /// No memory is requested until the first allocation.
    #[must_use]
    pub fn new(upstream: &'up dyn MemoryResource) -> Self {
        Self::with_config(upstream, ArenaConfig::default())
    }

    /// Creates an arena with a custom growth policy.
    #[must_use]
    pub fn with_config(upstream: &'up dyn MemoryResource, config: ArenaConfig) -> Self {
        let config = config.normalized();
        Self {
            upstream,
            config,
            regions: RefCell::new(Vec::new()),
            cursor: Cell::new(ptr::null_mut()),
            end: Cell::new(ptr::null_mut()),
            next_region_size: Cell::new(config.initial_region_size),
            initial_buffer: None,
            bytes_allocated: Cell::new(0),
            allocations: Cell::new(0),
        }
    }

    /// Creates an arena that serves from `buffer` first and only then grows
    /// from `upstream`.
    ///
    /// The buffer is borrowed, never returned to upstream, and becomes
    /// reusable again after [`release`](Self::release).
    #[must_use]
    pub fn with_buffer(
        buffer: &'up mut [u8],
        upstream: &'up dyn MemoryResource,
        config: ArenaConfig,
    ) -> Self {
        let mut arena = Self::with_config(upstream, config);
        let len = buffer.len();
        let start = NonNull::from(buffer).cast::<u8>();
        arena.initial_buffer = Some((start, len));
        arena.rewind_to_initial_buffer();
        // The policy continues from the buffer's size, like any other region.
        if len > 0 {
            arena
                .next_region_size
                .set(arena.config.next_region_size(len.max(MIN_REGION_SIZE)));
        }
        arena
    }

    /// The resource regions are requested from.
    #[must_use]
    pub fn upstream(&self) -> &'up dyn MemoryResource {
        self.upstream
    }

    /// The normalized growth policy.
    #[must_use]
    pub fn config(&self) -> ArenaConfig {
        self.config
    }

    /// Returns allocation statistics for this arena.
    #[must_use]
    pub fn stats(&self) -> ArenaStats {
        let regions = self.regions.borrow();
        ArenaStats {
            region_count: regions.len(),
            region_bytes: regions.iter().map(|r| r.size).sum(),
            bytes_allocated: self.bytes_allocated.get(),
            allocations: self.allocations.get(),
            remaining: self.end.get().addr() - self.cursor.get().addr(),
        }
    }

    /// Returns every owned region to upstream and rewinds the arena.
    ///
    /// All memory previously handed out becomes invalid. The arena stays
    /// usable and restarts the growth policy from the beginning.
    pub fn release(&mut self) {
        let regions = std::mem::take(&mut *self.regions.borrow_mut());
        if !regions.is_empty() {
            debug!(
                "releasing {} regions ({} bytes) to upstream",
                regions.len(),
                regions.iter().map(|r| r.size).sum::<usize>()
            );
        }

        for region in regions.into_iter().rev() {
            // SAFETY: every region was obtained from `self.upstream` with
            // exactly this size and alignment and is released once, here.
            unsafe {
                self.upstream
                    .deallocate(region.start, region.size, region.align);
            }
        }

        self.rewind_to_initial_buffer();
        self.next_region_size.set(match self.initial_buffer {
            Some((_, len)) if len > 0 => {
                self.config.next_region_size(len.max(MIN_REGION_SIZE))
            }
            _ => self.config.initial_region_size,
        });
        self.bytes_allocated.set(0);
        self.allocations.set(0);
    }

    fn rewind_to_initial_buffer(&self) {
        match self.initial_buffer {
            Some((start, len)) => {
                self.cursor.set(start.as_ptr());
                self.end.set(start.as_ptr().wrapping_add(len));
            }
            None => {
                self.cursor.set(ptr::null_mut());
                self.end.set(ptr::null_mut());
            }
        }
    }

    /// Bumps the cursor within the current region.
    #[inline(always)]
    fn try_bump(&self, size: usize, align: usize) -> Option<NonNull<u8>> {
        let current = self.cursor.get();
        if current.is_null() {
            return None;
        }

        let aligned_start = align_up(current.addr(), align)?;
        let new_addr = aligned_start.checked_add(size)?;
        if new_addr > self.end.get().addr() {
            return None;
        }

        // `with_addr` keeps the provenance of the region pointer; both
        // addresses are within the region (checked above).
        self.cursor.set(current.with_addr(new_addr));
        NonNull::new(current.with_addr(aligned_start))
    }

    /// Requests a new region large enough for `size` bytes at `align`.
    #[cold]
    fn grow(&self, size: usize, align: usize) -> Result<()> {
        let policy_size = self.next_region_size.get();
        let region_size = policy_size.max(size);
        let region_align = align.max(MAX_ALIGN);

        let start = self.upstream.allocate(region_size, region_align)?;

        let mut regions = self.regions.borrow_mut();
        regions.push(Region {
            start,
            size: region_size,
            align: region_align,
        });
        debug!(
            "arena region #{} of {} bytes (requested {} bytes, policy {})",
            regions.len(),
            region_size,
            size,
            policy_size
        );

        self.cursor.set(start.as_ptr());
        self.end.set(start.as_ptr().wrapping_add(region_size));
        self.next_region_size
            .set(self.config.next_region_size(policy_size));
        Ok(())
    }
}

impl MemoryResource for ArenaResource<'_> {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        layout_for(size, align)?;
        // Zero-sized requests still consume a byte so pointers stay distinct.
        let size = size.max(1);

        let ptr = match self.try_bump(size, align) {
            Some(ptr) => ptr,
            None => {
                self.grow(size, align)?;
                // A fresh region starts aligned to at least `align` and holds
                // at least `size` bytes.
                self.try_bump(size, align)
                    .ok_or(ResourceError::OutOfMemory { size, align })?
            }
        };

        self.bytes_allocated.set(self.bytes_allocated.get() + size);
        self.allocations.set(self.allocations.get() + 1);
        trace!("arena allocate {size} bytes (align {align}) at {ptr:p}");
        Ok(ptr)
    }

    /// Intentionally does nothing: arena memory is reclaimed only by
    /// [`ArenaResource::release`] or drop.
    unsafe fn deallocate(&self, _ptr: NonNull<u8>, _size: usize, _align: usize) {}
}

impl Drop for ArenaResource<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for ArenaResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArenaResource")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
