//! Instrumented decorator.
//!
//! [`DebugResource`] forwards every call to its upstream unchanged and keeps
//! counters on the side:
//!
//! - `num_allocations` / `num_deallocations`: successful calls seen
//! - `current_bytes_outstanding`: bytes allocated minus bytes deallocated
//! - `peak_bytes_outstanding`: high-water mark of the above
//!
//! With live tracking enabled (the default in debug builds) it also remembers
//! every outstanding block, so a double free, a foreign pointer or a
//! size/alignment mismatch panics at the offending `deallocate`, and a
//! teardown with blocks still live is reported.

use crate::error::{ResourceError, Result};
use crate::resource::MemoryResource;
use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr::NonNull;
use strata_log::{error, trace};

/// Maximum number of live blocks listed in a leak report.
const LEAK_REPORT_LIMIT: usize = 16;

/// Options for [`DebugResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebugOptions {
    /// Remember every outstanding block to detect misuse.
    pub track_live: bool,
}

impl Default for DebugOptions {
    fn default() -> Self {
        Self {
            track_live: cfg!(debug_assertions),
        }
    }
}

/// Counter snapshot of a [`DebugResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DebugStats {
    /// Successful allocations.
    pub num_allocations: u64,
    /// Deallocations.
    pub num_deallocations: u64,
    /// Bytes allocated and not yet deallocated.
    pub current_bytes_outstanding: i64,
    /// Largest value `current_bytes_outstanding` has reached.
    pub peak_bytes_outstanding: u64,
}

/// An outstanding block seen by a tracking [`DebugResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveAllocation {
    /// Address of the block.
    pub addr: usize,
    /// Size it was allocated with.
    pub size: usize,
    /// Alignment it was allocated with.
    pub align: usize,
}

struct LiveBlock {
    size: usize,
    align: usize,
    #[cfg(feature = "alloc-backtrace")]
    backtrace: backtrace::Backtrace,
}

type LiveMap = HashMap<usize, LiveBlock, FxBuildHasher>;

/// Counting decorator over an upstream resource.
pub struct DebugResource<'up> {
    upstream: &'up dyn MemoryResource,
    label: &'static str,
    num_allocations: Cell<u64>,
    num_deallocations: Cell<u64>,
    current_bytes: Cell<i64>,
    peak_bytes: Cell<u64>,
    live: Option<RefCell<LiveMap>>,
    /// Set once the outstanding state has been checked by `finish`.
    finished: Cell<bool>,
}

impl<'up> DebugResource<'up> {
    /// Wraps `upstream` with default options.
    #[must_use]
    pub fn new(upstream: &'up dyn MemoryResource) -> Self {
        Self::with_options(upstream, DebugOptions::default())
    }

    /// Wraps `upstream` with explicit options.
    #[must_use]
    pub fn with_options(upstream: &'up dyn MemoryResource, options: DebugOptions) -> Self {
        Self {
            upstream,
            label: "debug",
            num_allocations: Cell::new(0),
            num_deallocations: Cell::new(0),
            current_bytes: Cell::new(0),
            peak_bytes: Cell::new(0),
            live: options
                .track_live
                .then(|| RefCell::new(LiveMap::default())),
            finished: Cell::new(false),
        }
    }

    /// Names this resource in log lines and panic messages.
    #[must_use]
    pub fn with_label(mut self, label: &'static str) -> Self {
        self.label = label;
        self
    }

    /// The label given with [`with_label`](Self::with_label).
    #[must_use]
    pub fn label(&self) -> &'static str {
        self.label
    }

    /// The wrapped resource.
    #[must_use]
    pub fn upstream(&self) -> &'up dyn MemoryResource {
        self.upstream
    }

    #[must_use]
    pub fn num_allocations(&self) -> u64 {
        self.num_allocations.get()
    }

    #[must_use]
    pub fn num_deallocations(&self) -> u64 {
        self.num_deallocations.get()
    }

    #[must_use]
    pub fn current_bytes_outstanding(&self) -> i64 {
        self.current_bytes.get()
    }

    #[must_use]
    pub fn peak_bytes_outstanding(&self) -> u64 {
        self.peak_bytes.get()
    }

    /// Returns all counters at once.
    #[must_use]
    pub fn stats(&self) -> DebugStats {
        DebugStats {
            num_allocations: self.num_allocations.get(),
            num_deallocations: self.num_deallocations.get(),
            current_bytes_outstanding: self.current_bytes.get(),
            peak_bytes_outstanding: self.peak_bytes.get(),
        }
    }

    /// Whether outstanding blocks are being tracked.
    #[must_use]
    pub fn is_tracking(&self) -> bool {
        self.live.is_some()
    }

    /// Outstanding blocks ordered by address; empty when not tracking.
    #[must_use]
    pub fn live_allocations(&self) -> Vec<LiveAllocation> {
        let Some(live) = &self.live else {
            return Vec::new();
        };

        let mut blocks: Vec<_> = live
            .borrow()
            .iter()
            .map(|(&addr, block)| LiveAllocation {
                addr,
                size: block.size,
                align: block.align,
            })
            .collect();
        blocks.sort_unstable_by_key(|block| block.addr);
        blocks
    }

    /// Checks that everything allocated through this resource was returned.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::LiveAllocations`] if any bytes or blocks are
    /// still outstanding.
    pub fn check_released(&self) -> Result<()> {
        let outstanding = self
            .num_allocations
            .get()
            .saturating_sub(self.num_deallocations.get());
        let bytes = self.current_bytes.get();

        if outstanding == 0 && bytes == 0 {
            Ok(())
        } else {
            Err(ResourceError::LiveAllocations {
                allocations: outstanding,
                bytes,
            })
        }
    }

    /// Tears the decorator down and returns its final counters.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::LiveAllocations`] (after logging the live
    /// blocks) when allocations made through this resource are still
    /// outstanding. Those blocks are leaked.
    pub fn finish(self) -> Result<DebugStats> {
        self.finished.set(true);
        match self.check_released() {
            Ok(()) => Ok(self.stats()),
            Err(err) => {
                self.report_leaks(&err);
                Err(err)
            }
        }
    }

    fn report_leaks(&self, err: &ResourceError) {
        error!("{}: {}", self.label, err);

        let Some(live) = &self.live else {
            return;
        };
        for (addr, block) in live.borrow().iter().take(LEAK_REPORT_LIMIT) {
            error!(
                "{}:   live block {:#x} ({} bytes, align {})",
                self.label, addr, block.size, block.align
            );
            #[cfg(feature = "alloc-backtrace")]
            {
                let mut backtrace = block.backtrace.clone();
                backtrace.resolve();
                error!("{}:   allocated at:\n{:?}", self.label, backtrace);
            }
        }
    }

    fn track_allocation(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        let Some(live) = &self.live else {
            return;
        };

        let block = LiveBlock {
            size,
            align,
            #[cfg(feature = "alloc-backtrace")]
            backtrace: backtrace::Backtrace::new_unresolved(),
        };
        let previous = live.borrow_mut().insert(ptr.as_ptr().addr(), block);
        assert!(
            previous.is_none(),
            "{}: upstream returned {ptr:p} while it was still live",
            self.label
        );
    }

    fn track_deallocation(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        let Some(live) = &self.live else {
            return;
        };

        let removed = live.borrow_mut().remove(&ptr.as_ptr().addr());
        match removed {
            None => panic!(
                "{}: deallocate of {ptr:p} ({size} bytes, align {align}) which is not live \
                 (double free or pointer from another resource)",
                self.label
            ),
            Some(block) if block.size != size || block.align != align => panic!(
                "{}: deallocate of {ptr:p} with {size} bytes, align {align}, \
                 but it was allocated with {} bytes, align {}",
                self.label, block.size, block.align
            ),
            Some(_) => {}
        }
    }
}

impl MemoryResource for DebugResource<'_> {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let ptr = self.upstream.allocate(size, align)?;

        self.num_allocations.set(self.num_allocations.get() + 1);
        let current = self.current_bytes.get() + size as i64;
        self.current_bytes.set(current);
        if current > 0 && current as u64 > self.peak_bytes.get() {
            self.peak_bytes.set(current as u64);
        }
        self.track_allocation(ptr, size, align);

        trace!(
            "{}: allocate {size} bytes (align {align}) -> {ptr:p}, outstanding {current}",
            self.label
        );
        Ok(ptr)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        self.track_deallocation(ptr, size, align);

        self.num_deallocations.set(self.num_deallocations.get() + 1);
        self.current_bytes.set(self.current_bytes.get() - size as i64);
        trace!("{}: deallocate {size} bytes (align {align}) at {ptr:p}", self.label);

        // SAFETY: forwarded verbatim; the caller upholds the contract for
        // `self`, and `self` only hands out pointers obtained from upstream.
        unsafe { self.upstream.deallocate(ptr, size, align) }
    }
}

impl Drop for DebugResource<'_> {
    fn drop(&mut self) {
        if self.finished.get() {
            return;
        }
        if let Err(err) = self.check_released() {
            self.report_leaks(&err);
        }
    }
}

impl fmt::Debug for DebugResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DebugResource")
            .field("label", &self.label)
            .field("stats", &self.stats())
            .field("tracking", &self.is_tracking())
            .finish_non_exhaustive()
    }
}
