//! Size-class pool strategy.
//!
//! [`PoolResource`] keeps one free list per power-of-two block size, from
//! [`MIN_BLOCK_SIZE`] up to the configured largest pooled block. A request is
//! rounded up to its size class (the size, raised to the alignment and to
//! `MIN_BLOCK_SIZE`, then to the next power of two) and served from that
//! class's free list. Deallocated blocks go back on the list, so a freed
//! block is handed out again before the pool asks upstream for more memory.
//!
//! # Design
//!
//! - **Chunks**: an empty free list is refilled with one upstream chunk,
//!   carved into blocks up front. Each refill of a class doubles its next
//!   chunk, up to `max_blocks_per_chunk` blocks.
//! - **Intrusive lists**: a free block stores the link to the next free
//!   block in its own first word; no bookkeeping is allocated per block.
//! - **Oversized requests**: sizes above the largest class, or alignments
//!   above [`MAX_ALIGN`], go straight to upstream. They are remembered so
//!   [`release`](PoolResource::release) can return them too.
//! - **Teardown**: chunks are only returned upstream on `release` or drop.
//!
//! # Example
//!
//! ```
//! use strata_mem::{MemoryResource, PoolResource, system_resource};
//!
//! let pool = PoolResource::new(system_resource());
//! let a = pool.allocate(24, 8).unwrap();
//! unsafe { pool.deallocate(a, 24, 8) };
//!
//! // Same size class, so the freed block comes straight back.
//! let b = pool.allocate(32, 8).unwrap();
//! assert_eq!(a, b);
//! # unsafe { pool.deallocate(b, 32, 8) };
//! ```

use crate::error::{ResourceError, Result};
use crate::resource::{MAX_ALIGN, MemoryResource, layout_for};
use fxhash::FxBuildHasher;
use hashbrown::HashMap;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr::NonNull;
use strata_log::{debug, trace};

/// Smallest block handed out; every block must fit a free-list link.
pub const MIN_BLOCK_SIZE: usize = 8;

const _: () = assert!(size_of::<FreeBlock>() <= MIN_BLOCK_SIZE);

/// Default cap on blocks carved from a single chunk.
pub const DEFAULT_MAX_BLOCKS_PER_CHUNK: usize = 1024;

/// Default largest size class served from a free list.
pub const DEFAULT_LARGEST_POOL_BLOCK: usize = 4096;

/// Upper bound on `largest_required_pool_block` after normalization.
pub const MAX_LARGEST_POOL_BLOCK: usize = 1 << 30;

/// Blocks in the first chunk of every size class.
const INITIAL_BLOCKS_PER_CHUNK: usize = 4;

/// Tuning options for [`PoolResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Upper bound on the number of blocks carved from one chunk.
    pub max_blocks_per_chunk: usize,
    /// Largest block size served from a free list; bigger requests go
    /// upstream.
    pub largest_required_pool_block: usize,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_blocks_per_chunk: DEFAULT_MAX_BLOCKS_PER_CHUNK,
            largest_required_pool_block: DEFAULT_LARGEST_POOL_BLOCK,
        }
    }
}

impl PoolOptions {
    /// Clamps the options into a usable range: at least one block per chunk,
    /// and a largest block that is a power of two between [`MIN_BLOCK_SIZE`]
    /// and [`MAX_LARGEST_POOL_BLOCK`].
    #[must_use]
    pub fn normalized(self) -> Self {
        let largest = self
            .largest_required_pool_block
            .clamp(MIN_BLOCK_SIZE, MAX_LARGEST_POOL_BLOCK)
            .next_power_of_two();

        Self {
            max_blocks_per_chunk: self.max_blocks_per_chunk.max(1),
            largest_required_pool_block: largest,
        }
    }

    fn class_count(&self) -> usize {
        (self.largest_required_pool_block.trailing_zeros() - MIN_BLOCK_SIZE.trailing_zeros())
            as usize
            + 1
    }
}

/// Counter snapshot of a [`PoolResource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Chunks currently held from upstream.
    pub chunks: usize,
    /// Bytes in those chunks.
    pub chunk_bytes: usize,
    /// Blocks sitting on free lists.
    pub free_blocks: usize,
    /// Oversized blocks currently forwarded to upstream.
    pub oversized: usize,
    /// Bytes in those blocks.
    pub oversized_bytes: usize,
    /// Pooled allocations served without refilling.
    pub hits: u64,
    /// Pooled allocations that needed a new chunk.
    pub misses: u64,
}

impl PoolStats {
    /// Fraction of pooled allocations served from a free list, or `None`
    /// before the first pooled allocation.
    #[must_use]
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.hits + self.misses;
        if total == 0 {
            None
        } else {
            #[allow(clippy::cast_precision_loss)]
            Some(self.hits as f64 / total as f64)
        }
    }
}

/// Link stored in the first word of a free block.
struct FreeBlock {
    next: Option<NonNull<FreeBlock>>,
}

struct SizeClass {
    block_size: usize,
    head: Option<NonNull<FreeBlock>>,
    free: usize,
    next_chunk_blocks: usize,
}

impl SizeClass {
    fn new(block_size: usize, max_blocks_per_chunk: usize) -> Self {
        Self {
            block_size,
            head: None,
            free: 0,
            next_chunk_blocks: INITIAL_BLOCKS_PER_CHUNK.min(max_blocks_per_chunk),
        }
    }

    /// Chunk alignment; blocks sit at multiples of `block_size` from the
    /// chunk start so this also aligns every block.
    fn chunk_align(&self) -> usize {
        self.block_size.min(MAX_ALIGN)
    }

    fn pop(&mut self) -> Option<NonNull<u8>> {
        let block = self.head?;
        // SAFETY: every block on the list was written by `push` and is not
        // handed out while it is on the list.
        self.head = unsafe { block.as_ref().next };
        self.free -= 1;
        Some(block.cast())
    }

    /// # Safety
    ///
    /// `block` must be a block of this class that is not in use.
    unsafe fn push(&mut self, block: NonNull<u8>) {
        let block = block.cast::<FreeBlock>();
        // SAFETY: blocks are at least `MIN_BLOCK_SIZE` bytes and aligned to
        // at least 8, which fits and aligns a `FreeBlock`.
        unsafe { block.write(FreeBlock { next: self.head }) };
        self.head = Some(block);
        self.free += 1;
    }
}

#[derive(Debug, Clone, Copy)]
struct Chunk {
    start: NonNull<u8>,
    size: usize,
    align: usize,
}

#[derive(Debug, Clone, Copy)]
struct Oversized {
    ptr: NonNull<u8>,
    size: usize,
    align: usize,
}

/// How a request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Class(usize),
    Upstream,
}

/// Pooling strategy over an upstream resource.
pub struct PoolResource<'up> {
    upstream: &'up dyn MemoryResource,
    options: PoolOptions,
    classes: RefCell<Vec<SizeClass>>,
    chunks: RefCell<Vec<Chunk>>,
    oversized: RefCell<HashMap<usize, Oversized, FxBuildHasher>>,
    hits: Cell<u64>,
    misses: Cell<u64>,
}

impl<'up> PoolResource<'up> {
    /// Creates a pool with default options.
    #[must_use]
    pub fn new(upstream: &'up dyn MemoryResource) -> Self {
        Self::with_options(upstream, PoolOptions::default())
    }

    /// Creates a pool with the given options (normalized first).
    #[must_use]
    pub fn with_options(upstream: &'up dyn MemoryResource, options: PoolOptions) -> Self {
        let options = options.normalized();
        Self {
            upstream,
            options,
            classes: RefCell::new(Self::fresh_classes(&options)),
            chunks: RefCell::new(Vec::new()),
            oversized: RefCell::new(HashMap::default()),
            hits: Cell::new(0),
            misses: Cell::new(0),
        }
    }

    fn fresh_classes(options: &PoolOptions) -> Vec<SizeClass> {
        (0..options.class_count())
            .map(|index| SizeClass::new(MIN_BLOCK_SIZE << index, options.max_blocks_per_chunk))
            .collect()
    }

    /// The resource chunks and oversized blocks come from.
    #[must_use]
    pub fn upstream(&self) -> &'up dyn MemoryResource {
        self.upstream
    }

    /// The options in effect after normalization.
    #[must_use]
    pub fn options(&self) -> PoolOptions {
        self.options
    }

    /// Returns current usage counters.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        let chunks = self.chunks.borrow();
        let oversized = self.oversized.borrow();

        PoolStats {
            chunks: chunks.len(),
            chunk_bytes: chunks.iter().map(|chunk| chunk.size).sum(),
            free_blocks: self.classes.borrow().iter().map(|class| class.free).sum(),
            oversized: oversized.len(),
            oversized_bytes: oversized.values().map(|block| block.size).sum(),
            hits: self.hits.get(),
            misses: self.misses.get(),
        }
    }

    /// Returns every chunk and oversized block to upstream, whether or not
    /// its blocks were deallocated. Hit and miss counters are kept.
    ///
    /// Pointers previously returned by this pool dangle afterwards.
    pub fn release(&mut self) {
        self.release_all();
    }

    fn release_all(&self) {
        let chunks = std::mem::take(&mut *self.chunks.borrow_mut());
        let oversized = std::mem::take(&mut *self.oversized.borrow_mut());
        *self.classes.borrow_mut() = Self::fresh_classes(&self.options);

        if !chunks.is_empty() || !oversized.is_empty() {
            debug!(
                "pool: releasing {} chunks and {} oversized blocks",
                chunks.len(),
                oversized.len()
            );
        }

        for chunk in chunks.into_iter().rev() {
            // SAFETY: each chunk was allocated from `upstream` with exactly
            // this size and alignment and is returned once.
            unsafe { self.upstream.deallocate(chunk.start, chunk.size, chunk.align) };
        }
        for block in oversized.into_values() {
            self.return_oversized_to_upstream(block);
        }
    }

    fn return_oversized_to_upstream(&self, block: Oversized) {
        // SAFETY: `block.ptr` was returned by `upstream.allocate(block.size,
        // block.align)` and has just been removed from the oversized map.
        unsafe { self.upstream.deallocate(block.ptr, block.size, block.align) };
    }

    fn route(&self, size: usize, align: usize) -> Route {
        if align > MAX_ALIGN {
            return Route::Upstream;
        }

        match size.max(align).max(MIN_BLOCK_SIZE).checked_next_power_of_two() {
            Some(block_size) if block_size <= self.options.largest_required_pool_block => {
                Route::Class((block_size.trailing_zeros() - MIN_BLOCK_SIZE.trailing_zeros()) as usize)
            }
            _ => Route::Upstream,
        }
    }

    /// Pulls a new chunk for `class` from upstream and carves it into free
    /// blocks.
    ///
    /// Fails with [`ResourceError::SizeOverflow`] when the chunk size does
    /// not fit in `usize`; nothing is requested from upstream in that case.
    #[cold]
    fn refill(&self, class: &mut SizeClass) -> Result<()> {
        let blocks = class.next_chunk_blocks;
        let align = class.chunk_align();
        let size = class
            .block_size
            .checked_mul(blocks)
            .ok_or(ResourceError::SizeOverflow {
                size: class.block_size,
                align,
            })?;

        let start = self.upstream.allocate(size, align)?;
        debug!(
            "pool: new chunk of {blocks} x {} bytes at {start:p}",
            class.block_size
        );

        for index in (0..blocks).rev() {
            // SAFETY: `index * block_size < size`, inside the fresh chunk.
            let block = unsafe { start.add(index * class.block_size) };
            // SAFETY: the block is part of a chunk nobody else has seen.
            unsafe { class.push(block) };
        }

        self.chunks.borrow_mut().push(Chunk { start, size, align });
        class.next_chunk_blocks = blocks
            .saturating_mul(2)
            .min(self.options.max_blocks_per_chunk);
        Ok(())
    }

    fn allocate_oversized(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        let ptr = self.upstream.allocate(size, align)?;
        trace!("pool: forwarded {size} bytes (align {align}) upstream -> {ptr:p}");
        self.oversized
            .borrow_mut()
            .insert(ptr.as_ptr().addr(), Oversized { ptr, size, align });
        Ok(ptr)
    }
}

impl MemoryResource for PoolResource<'_> {
    fn allocate(&self, size: usize, align: usize) -> Result<NonNull<u8>> {
        layout_for(size, align)?;

        let index = match self.route(size, align) {
            Route::Class(index) => index,
            Route::Upstream => return self.allocate_oversized(size, align),
        };

        let mut classes = self.classes.borrow_mut();
        let class = &mut classes[index];

        if let Some(block) = class.pop() {
            self.hits.set(self.hits.get() + 1);
            return Ok(block);
        }

        self.misses.set(self.misses.get() + 1);
        self.refill(class)?;
        class.pop().ok_or(ResourceError::OutOfMemory { size, align })
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, size: usize, align: usize) {
        match self.route(size, align) {
            Route::Class(index) => {
                // SAFETY: same size and align route to the class the block
                // was allocated from, and the caller no longer uses it.
                unsafe { self.classes.borrow_mut()[index].push(ptr) };
            }
            Route::Upstream => {
                let removed = self.oversized.borrow_mut().remove(&ptr.as_ptr().addr());
                debug_assert!(
                    removed.is_some(),
                    "pool: oversized block {ptr:p} was not allocated here"
                );
                self.return_oversized_to_upstream(Oversized { ptr, size, align });
            }
        }
    }
}

impl Drop for PoolResource<'_> {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl fmt::Debug for PoolResource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolResource")
            .field("options", &self.options)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}
