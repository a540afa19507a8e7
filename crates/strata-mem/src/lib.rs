//! Polymorphic memory resources for strata.
//!
//! This crate provides composable allocation strategies behind one
//! capability, [`MemoryResource`]:
//!
//! - **Leaf resources**: the global heap ([`SystemResource`]) and a resource
//!   that always fails ([`NullResource`])
//! - **Arena**: monotonic bump allocation with bulk release ([`ArenaResource`])
//! - **Pool**: power-of-two size classes with free lists ([`PoolResource`])
//! - **Debug decorator**: counts traffic and catches misuse ([`DebugResource`])
//! - **Registry**: a per-thread active resource for code that does not take a
//!   resource parameter ([`registry`])
//! - **Allocator adapters**: `allocator-api2` containers over a resource
//!   ([`ResourceAlloc`], [`ActiveAlloc`])
//!
//! Strategies borrow their upstream, so a chain such as
//! `Pool(Arena(Debug(system)))` is built inside out and torn down in reverse
//! by ordinary scoping.
//!
//! # Example
//!
//! ```
//! use strata_mem::{ArenaResource, DebugResource, PoolResource, ResVec, ResourceAlloc, system_resource};
//!
//! let debug = DebugResource::new(system_resource());
//! {
//!     let arena = ArenaResource::new(&debug);
//!     let pool = PoolResource::new(&arena);
//!
//!     let mut values: ResVec<'_, u32> = ResVec::new_in(ResourceAlloc::new(&pool));
//!     values.extend(0..100);
//!     assert_eq!(values.len(), 100);
//! }
//! assert_eq!(debug.current_bytes_outstanding(), 0);
//! ```

pub mod alloc;
pub mod arena;
pub mod debug;
pub mod error;
pub mod pool;
pub mod registry;
pub mod resource;
pub mod system;

pub use alloc::{ActiveAlloc, ResMap, ResVec, ResourceAlloc, res_map};
pub use arena::{ArenaConfig, ArenaResource, ArenaStats};
pub use debug::{DebugOptions, DebugResource, DebugStats, LiveAllocation};
pub use error::{ResourceError, Result};
pub use pool::{PoolOptions, PoolResource, PoolStats};
pub use registry::{
    ActiveResourceGuard, FallbackPolicy, ResourceHandle, get_active_resource,
    set_active_resource,
};
pub use resource::{MAX_ALIGN, MemoryResource, resources_equal};
pub use system::{NullResource, SystemResource, null_resource, system_resource};
