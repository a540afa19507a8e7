//! Named resource chains.
//!
//! Every chain except the baseline ends in a [`DebugResource`] over the
//! system resource, which observes all traffic that leaves the chain. A chain
//! is built bottom-up in nested scopes, handed to the caller, and torn down
//! top-down; only then are the debug counters read.
//!
//! The baseline hands out the system resource itself, so its timings are the
//! reference the strategies are compared against. It has no counters.

use crate::config::BenchConfig;
use clap::ValueEnum;
use std::fmt;
use strata_mem::{
    ArenaResource, DebugResource, DebugStats, MemoryResource, PoolResource, Result,
    system_resource,
};
use strata_log::debug;

/// Resource chains the harness knows how to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum)]
pub enum ChainKind {
    /// `system`, uninstrumented
    Baseline,
    /// `Debug(system)`
    Debug,
    /// `Pool(Debug(system))`
    Pool,
    /// `Arena(Debug(system))`
    Arena,
    /// `Pool(Arena(Debug(system)))`
    PoolOverArena,
    /// `Arena(Pool(Debug(system)))`
    ArenaOverPool,
}

impl ChainKind {
    /// All chains, in report order.
    pub const ALL: [ChainKind; 6] = [
        ChainKind::Baseline,
        ChainKind::Debug,
        ChainKind::Pool,
        ChainKind::Arena,
        ChainKind::PoolOverArena,
        ChainKind::ArenaOverPool,
    ];

    /// Chains with a debug layer at the bottom.
    pub const INSTRUMENTED: [ChainKind; 5] = [
        ChainKind::Debug,
        ChainKind::Pool,
        ChainKind::Arena,
        ChainKind::PoolOverArena,
        ChainKind::ArenaOverPool,
    ];

    /// Report heading.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            ChainKind::Baseline => "no resource",
            ChainKind::Debug => "default resource",
            ChainKind::Pool => "pool resource",
            ChainKind::Arena => "buffer resource",
            ChainKind::PoolOverArena => "buffer backed pool resource",
            ChainKind::ArenaOverPool => "pool backed buffer resource",
        }
    }

    /// Layering, outermost first.
    #[must_use]
    pub const fn layout(self) -> &'static str {
        match self {
            ChainKind::Baseline => "system",
            ChainKind::Debug => "Debug(system)",
            ChainKind::Pool => "Pool(Debug(system))",
            ChainKind::Arena => "Arena(Debug(system))",
            ChainKind::PoolOverArena => "Pool(Arena(Debug(system)))",
            ChainKind::ArenaOverPool => "Arena(Pool(Debug(system)))",
        }
    }

    /// Whether runs on this chain report debug counters.
    #[must_use]
    pub const fn is_instrumented(self) -> bool {
        !matches!(self, ChainKind::Baseline)
    }
}

impl fmt::Display for ChainKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.layout())
    }
}

/// Output of a closure run against a chain, plus the chain's final counters.
#[derive(Debug, Clone, PartialEq)]
pub struct ChainRun<R> {
    pub kind: ChainKind,
    pub output: R,
    /// Counters after teardown; `None` for the baseline.
    pub stats: Option<DebugStats>,
}

/// Builds `kind`, passes its head to `f`, tears the chain down and returns
/// what `f` produced with the debug counters observed after teardown.
///
/// # Errors
///
/// Returns [`ResourceError::LiveAllocations`](strata_mem::ResourceError)
/// when memory obtained from the debug layer is still outstanding after
/// teardown, i.e. `f` leaked through a layer that does not reclaim memory
/// itself.
pub fn run_with_chain<R>(
    kind: ChainKind,
    config: &BenchConfig,
    f: impl FnOnce(&dyn MemoryResource) -> R,
) -> Result<ChainRun<R>> {
    if !kind.is_instrumented() {
        debug!("running on the bare system resource");
        return Ok(ChainRun {
            kind,
            output: f(system_resource()),
            stats: None,
        });
    }

    debug!("building chain {kind}");
    let root = DebugResource::with_options(system_resource(), config.debug).with_label(kind.title());

    let output = match kind {
        ChainKind::Baseline => unreachable!("the baseline has no debug layer"),
        ChainKind::Debug => f(&root),
        ChainKind::Pool => {
            let pool = PoolResource::with_options(&root, config.pool);
            f(&pool)
        }
        ChainKind::Arena => {
            let arena = ArenaResource::with_config(&root, config.arena);
            f(&arena)
        }
        ChainKind::PoolOverArena => {
            let arena = ArenaResource::with_config(&root, config.arena);
            let pool = PoolResource::with_options(&arena, config.pool);
            f(&pool)
        }
        ChainKind::ArenaOverPool => {
            let pool = PoolResource::with_options(&root, config.pool);
            let arena = ArenaResource::with_config(&pool, config.arena);
            f(&arena)
        }
    };

    let stats = root.finish()?;
    debug!("chain {kind} torn down: {stats:?}");
    Ok(ChainRun {
        kind,
        output,
        stats: Some(stats),
    })
}
