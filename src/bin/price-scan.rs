//! CLI entrypoint (spec.md §6 "CLI surface"): exactly one command, "run one
//! cycle". Exit codes: 0 success, 1 fatal configuration error.

use clap::{Parser, Subcommand};
use price_scan_core::config::CycleConfig;
use price_scan_core::monitor;
use price_scan_core::store::InMemoryStore;
use tracing::error;

#[derive(Parser)]
#[command(name = "price-scan")]
#[command(about = "Price-scan scheduling and notification fan-out core", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run exactly one scan cycle and exit.
    Run,
}

#[tokio::main]
async fn main() {
    #[cfg(feature = "observability")]
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Cli { command } = Cli::parse();

    let exit_code = match command {
        Command::Run => run_once().await,
    };
    std::process::exit(exit_code);
}

async fn run_once() -> i32 {
    let config = match CycleConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            return 1;
        }
    };

    // The in-memory store stands in for a real document-store adapter;
    // swapping it out means implementing `store::Store` against one.
    let store = InMemoryStore::new();

    match monitor::run_cycle(store.as_ref(), &config).await {
        Ok(()) => 0,
        Err(e) => {
            error!(error = %e, "cycle failed");
            1
        }
    }
}
