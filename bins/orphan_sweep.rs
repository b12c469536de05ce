//! Remove catalog records whose parent no longer exists.
//!
//! Prints the sweep report as JSON.

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use dotenvy::dotenv;
use tracing::info;

use service::maintenance::OrphanSweeper;
use service::registry::EntityServiceRegistry;

#[derive(Parser, Debug)]
#[command(name = "orphan_sweep")]
#[command(about = "Remove catalog records whose parent no longer exists")]
struct Args {
    /// Report orphans without deleting anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    dotenv().ok();
    let (cfg, _) = server::startup::load_config()?;
    common::utils::logging::init_logging(&cfg.server.log_format);

    let store = server::startup::build_store(&cfg).await.context("connect document store")?;
    let sweeper = OrphanSweeper::new(Arc::new(EntityServiceRegistry::new(store)));

    info!(dry_run = args.dry_run, "starting orphan sweep");
    let report = sweeper.sweep(args.dry_run).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
