//! `strata-bench`: run workloads over every resource chain and print what
//! the debug layer saw.

use clap::Parser;
use std::process::ExitCode;
use strata_bench::{BenchConfig, ChainKind, Suite, run_chain};
use strata_log::{Level, error, warn};

#[derive(Parser, Debug)]
#[command(name = "strata-bench", version)]
#[command(about = "Benchmark workloads over layered memory resource chains")]
struct Args {
    /// Workloads to run
    #[arg(long, value_enum, default_value_t = Suite::All)]
    suite: Suite,

    /// Chain to run; repeat for several (default: all)
    #[arg(long = "chain", value_enum)]
    chains: Vec<ChainKind>,

    /// Times each workload is repeated
    #[arg(long)]
    repeats: Option<usize>,

    /// Inner iterations of the matrix workloads
    #[arg(long)]
    iterations: Option<usize>,

    /// Use the small test-scale configuration
    #[arg(long, default_value_t = false)]
    quick: bool,

    /// Log level (overrides STRATA_LOG)
    #[arg(long)]
    log_level: Option<Level>,
}

impl Args {
    fn config(&self) -> BenchConfig {
        let mut config = if self.quick {
            BenchConfig::quick()
        } else {
            BenchConfig::default()
        };
        if let Some(repeats) = self.repeats {
            config.repeats = repeats;
        }
        if let Some(iterations) = self.iterations {
            config.iterations = iterations;
        }
        config
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(err) = strata_log::init_from_env("STRATA_LOG") {
        warn!("ignoring STRATA_LOG: {err}");
    }
    if let Some(level) = args.log_level {
        strata_log::set_level(level);
    }

    let config = args.config();
    let workloads = args.suite.workloads();
    let chains = if args.chains.is_empty() {
        ChainKind::ALL.to_vec()
    } else {
        args.chains.clone()
    };

    let mut failed = false;
    for kind in chains {
        match run_chain(kind, &workloads, &config) {
            Ok(report) => println!("{report}"),
            Err(err) => {
                error!("{}: {err}", kind.title());
                failed = true;
            }
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
