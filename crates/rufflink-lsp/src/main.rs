//! rufflink-lsp binary entry point.

use std::path::PathBuf;

use clap::Parser;
use rufflink_core::engine::DEFAULT_MAX_WORKERS;
use rufflink_core::EngineOptions;

#[derive(Parser)]
#[command(name = "rufflink-lsp")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Ruff executable bundled with the editor extension
    #[arg(long, value_name = "PATH")]
    bundle: Option<PathBuf>,

    /// Maximum number of concurrent requests and Ruff processes
    #[arg(long, value_name = "N", default_value_t = DEFAULT_MAX_WORKERS)]
    max_workers: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let log = rufflink_lsp::logging::init()?;

    let options = EngineOptions {
        max_workers: cli.max_workers,
        bundle: cli.bundle,
    };
    rufflink_lsp::start_server(options, Some(log)).await
}
