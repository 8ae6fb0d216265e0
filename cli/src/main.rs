//! `rewatch`: re-run a command whenever watched directories settle.

mod cli;
mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use rewatch_directory_watcher::{attach, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::runner::CommandRunner;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let settings = Cli::parse().into_settings()?;
    info!(
        roots = ?settings.watch.roots,
        debounce_ms = settings.watch.debounce_ms,
        "watching for changes"
    );

    let mut runner =
        CommandRunner::new(settings.command, settings.once, settings.halt_on_failure)?;
    let (notifications, halt) = watch(settings.watch).context("failed to start watching")?;

    let interrupt = halt.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted, stopping");
            interrupt.halt();
        }
    });

    attach(notifications, halt.clone(), move || runner.run()).await;
    halt.stopped().await;
    info!("stopped watching");

    Ok(())
}
