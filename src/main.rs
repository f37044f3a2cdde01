mod cli;
mod config;
mod diff;
mod fetch;
mod format;
mod model;
mod notify;
mod parse;
mod pipeline;
mod storage;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let filter = if cli.verbose {
        "blackout=debug"
    } else {
        "blackout=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    if let Err(e) = cli::run(cli).await {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
