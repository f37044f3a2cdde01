//! CLI interface for Blackout.
//!
//! - `blackout watch`: poll the schedule on a fixed interval until Ctrl-C.
//! - `blackout check`: one pipeline run, outcome printed.
//! - `blackout show`: print a stored schedule.
//!
//! Dates are written `dd-MM-yyyy` and default to today in the configured zone.

mod format;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::fetch::HttpSource;
use crate::format::format_snapshot;
use crate::model::ScheduleDate;
use crate::notify::TelegramNotifier;
use crate::pipeline::Pipeline;
use crate::storage::{SnapshotStore, Storage};

use format::describe_outcome;

/// Blackout: watch the outage schedule and announce changes.
#[derive(Debug, Parser)]
#[command(name = "blackout", version)]
pub struct Cli {
    /// Config file (default: `~/.blackout/config.toml`).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Debug logging. `RUST_LOG` takes precedence.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Send notifications even if the config has delivery off.
    #[arg(long, global = true)]
    pub deliver: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check the schedule every `interval-secs` until interrupted.
    Watch,

    /// Check the schedule once.
    Check {
        /// Date to check (dd-MM-yyyy). Defaults to today.
        #[arg(long)]
        date: Option<ScheduleDate>,
    },

    /// Print the stored schedule for a date.
    ///
    /// The notes listed above the queues are those stored with the last
    /// slot change; edits to the notes alone do not update the stored copy.
    Show {
        /// Date to show (dd-MM-yyyy). Defaults to today.
        #[arg(long)]
        date: Option<ScheduleDate>,

        /// Only this sub-queue, as `queue.subqueue` (e.g. `3.1`).
        #[arg(long, value_parser = parse_routing_key)]
        queue: Option<(u32, u32)>,
    },
}

/// Run the CLI, returning an error message on failure.
pub async fn run(cli: Cli) -> Result<(), String> {
    let mut config = Config::load(cli.config.as_deref()).map_err(|e| e.to_string())?;
    if cli.deliver {
        config.deliver = true;
        config.validate().map_err(|e| e.to_string())?;
    }

    let root = config.data_dir().map_err(|e| e.to_string())?;
    let storage =
        Storage::new(&root).map_err(|e| format!("failed to initialize storage: {e}"))?;

    match cli.command {
        Command::Watch => cmd_watch(&config, storage).await,
        Command::Check { date } => cmd_check(&config, storage, date).await,
        Command::Show { date, queue } => cmd_show(&config, &storage, date, queue),
    }
}

fn build_pipeline(config: &Config, storage: Storage) -> Result<Pipeline, String> {
    let source = HttpSource::new(&config.source_url, config.fetch_timeout())
        .map_err(|e| format!("failed to build HTTP client: {e}"))?;
    let notifier = TelegramNotifier::new(&config.telegram, config.deliver)
        .map_err(|e| format!("failed to build Telegram client: {e}"))?;
    Ok(Pipeline::new(
        Box::new(source),
        Box::new(storage),
        Box::new(notifier),
    ))
}

fn resolve_date(config: &Config, date: Option<ScheduleDate>) -> Result<ScheduleDate, String> {
    match date {
        Some(date) => Ok(date),
        None => config.today().map_err(|e| e.to_string()),
    }
}

async fn cmd_watch(config: &Config, storage: Storage) -> Result<(), String> {
    let pipeline = build_pipeline(config, storage)?;

    let today = || match config.today() {
        Ok(date) => Some(date),
        Err(e) => {
            tracing::error!(error = %e, "could not determine today's date");
            None
        }
    };

    let shutdown = async {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("interrupted, shutting down"),
            Err(e) => {
                tracing::error!(error = %e, "could not listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        }
    };

    tracing::info!(deliver = config.deliver, source = %config.source_url, "starting");
    pipeline.watch(config.interval(), today, shutdown).await;
    Ok(())
}

async fn cmd_check(
    config: &Config,
    storage: Storage,
    date: Option<ScheduleDate>,
) -> Result<(), String> {
    let date = resolve_date(config, date)?;
    let pipeline = build_pipeline(config, storage)?;

    let outcome = pipeline
        .run(date)
        .await
        .map_err(|e| format!("check for {date} failed: {e}"))?;

    println!("{}", describe_outcome(date, &outcome));
    Ok(())
}

fn cmd_show(
    config: &Config,
    storage: &Storage,
    date: Option<ScheduleDate>,
    queue: Option<(u32, u32)>,
) -> Result<(), String> {
    let date = resolve_date(config, date)?;
    let snapshot = storage
        .load(date)
        .map_err(|e| format!("failed to load schedule for {date}: {e}"))?
        .ok_or_else(|| format!("no stored schedule for {date}"))?;

    if let Some((q, s)) = queue
        && snapshot.slots(q, s).is_none()
    {
        return Err(format!("no sub-queue {q}.{s} in schedule for {date}"));
    }

    print!("{}", format_snapshot(&snapshot, queue));
    Ok(())
}

/// Parse a `queue.subqueue` routing key.
fn parse_routing_key(s: &str) -> Result<(u32, u32), String> {
    let (q, sq) = s
        .split_once('.')
        .ok_or_else(|| format!("'{s}' is not of the form queue.subqueue"))?;
    let q = q
        .trim()
        .parse()
        .map_err(|_| format!("invalid queue in '{s}'"))?;
    let sq = sq
        .trim()
        .parse()
        .map_err(|_| format!("invalid sub-queue in '{s}'"))?;
    Ok((q, sq))
}
