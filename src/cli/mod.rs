//! Command-line interface for the pulse binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{load_settings_with_options, LoadOptions};
use crate::context::AppContext;
use crate::models::Platform;

#[derive(Parser)]
#[command(name = "pulse", about = "Social profile metrics acquisition and reconciliation")]
pub struct Cli {
    /// Path to a JSON config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the data directory.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one live update cycle and print the summary.
    Update {
        /// Print the updated record as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run update cycles on an interval until interrupted.
    Watch {
        /// Minutes between cycles.
        #[arg(long, default_value_t = 60)]
        interval_mins: u64,
    },
    /// Print the current record and derived metrics.
    Show {
        /// Print as JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
    /// Print provenance and freshness of the current record.
    Status,
    /// Cache maintenance.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
pub enum CacheAction {
    /// Drop every cached entry.
    Clear,
    /// Drop expired entries.
    Prune,
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let settings = load_settings_with_options(LoadOptions {
        config_path: cli.config,
        data_dir: cli.data_dir,
    })
    .await;

    let context = AppContext::initialize(settings).await?;

    match cli.command {
        Command::Update { json } => update(&context, json).await,
        Command::Watch { interval_mins } => watch(&context, interval_mins).await,
        Command::Show { json } => show(&context, json).await,
        Command::Status => status(&context).await,
        Command::Cache { action } => cache(&context, action).await,
    }
}

async fn update(context: &AppContext, json: bool) -> anyhow::Result<()> {
    let summary = context.reconciler.update_all().await;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&context.reconciler.export().await)?
        );
    } else {
        println!(
            "update cycle: {}/{} accepted, {} rejected, {} fallbacks (quality: {:?})",
            summary.accepted,
            summary.attempted,
            summary.rejected,
            summary.fallbacks,
            summary.overall_quality
        );
    }
    Ok(())
}

async fn watch(context: &AppContext, interval_mins: u64) -> anyhow::Result<()> {
    let interval = std::time::Duration::from_secs(interval_mins.max(1) * 60);
    println!("updating every {} minute(s); ctrl-c to stop", interval_mins.max(1));

    loop {
        let summary = context.reconciler.update_all().await;
        println!(
            "cycle: {}/{} accepted, {} fallbacks",
            summary.accepted, summary.attempted, summary.fallbacks
        );

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            result = tokio::signal::ctrl_c() => {
                result?;
                println!("stopped");
                return Ok(());
            }
        }
    }
}

async fn show(context: &AppContext, json: bool) -> anyhow::Result<()> {
    let view = context.reconciler.snapshot().await;
    if json {
        println!("{}", serde_json::to_string_pretty(&view)?);
        return Ok(());
    }

    let metrics = &view.metrics;
    println!("{} (@{})", view.record.profile.name, view.record.profile.username);
    println!(
        "  instagram: {} followers (@{})",
        view.record.instagram.followers, view.record.instagram.handle
    );
    println!(
        "  tiktok:    {} followers (@{})",
        view.record.tiktok.followers, view.record.tiktok.handle
    );
    println!(
        "  total {} | engagement {:.2}% | reach {} | tier {:?}",
        metrics.total_followers, metrics.weighted_engagement, metrics.monthly_reach, metrics.tier
    );
    println!(
        "  score {} | earnings {}-{} {}",
        metrics.influencer_score,
        metrics.estimated_earnings.min,
        metrics.estimated_earnings.max,
        metrics.estimated_earnings.currency
    );
    Ok(())
}

async fn status(context: &AppContext) -> anyhow::Result<()> {
    let view = context.reconciler.snapshot().await;
    let metadata = &view.record.metadata;

    println!("last updated: {}", metadata.last_updated.to_rfc3339());
    println!("overall quality: {:?}", metadata.data_quality.overall);
    for platform in Platform::ALL {
        let stats = view.record.platform(platform);
        println!(
            "  {}: quality {:?}, source {:?}, last attempt {}",
            platform,
            metadata.data_quality.get(platform),
            metadata.sources.get(platform),
            stats
                .last_scraped
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| "never".to_string()),
        );
    }
    Ok(())
}

async fn cache(context: &AppContext, action: CacheAction) -> anyhow::Result<()> {
    match action {
        CacheAction::Clear => {
            let dropped = context.cache.clear().await;
            println!("cleared {dropped} cached entries");
        }
        CacheAction::Prune => {
            let dropped = context.cache.prune_expired().await;
            println!("pruned {dropped} expired entries");
        }
    }
    Ok(())
}
