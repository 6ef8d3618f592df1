//! CLI administration tool for smart-bookmark.
//!
//! Works directly on the storage file, so it can inspect and maintain the
//! engine's state while the server is stopped.
//!
//! # Usage
//!
//! ```bash
//! # Current month overview
//! cargo run --bin admin -- stats
//!
//! # Another month
//! cargo run --bin admin -- stats --month 2025-05
//!
//! # Pending promotions
//! cargo run --bin admin -- queue
//!
//! # Retention cleanup (skipped while autoCleanup is off)
//! cargo run --bin admin -- cleanup
//!
//! # Delete all statistics and restore default settings
//! cargo run --bin admin -- reset -y
//! ```
//!
//! # Environment Variables
//!
//! - `STORAGE_PATH` (required): JSON storage file used by the server
//! - `STORAGE_QUOTA_BYTES` (optional): Quota, default 10 MiB

use smart_bookmark::application::services::{CleanupOutcome, Engine};
use smart_bookmark::config::Config;
use smart_bookmark::domain::time_bucket::MonthKey;
use smart_bookmark::server::build_engine;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::Confirm;

/// CLI tool for managing smart-bookmark storage.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show visit statistics for a month
    Stats {
        /// Month as YYYY-MM (default: current month)
        #[arg(short, long)]
        month: Option<String>,
    },

    /// List promotions waiting in the retry queue
    Queue,

    /// Remove month buckets older than the retention window
    Cleanup,

    /// Delete all statistics and queued promotions, restore default settings
    Reset {
        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    if !config.is_persistent() {
        anyhow::bail!("STORAGE_PATH must be set");
    }

    let engine = build_engine(&config).await?;

    match cli.command {
        Commands::Stats { month } => show_stats(&engine, month).await?,
        Commands::Queue => show_queue(&engine).await,
        Commands::Cleanup => cleanup(&engine).await?,
        Commands::Reset { yes } => reset(&engine, yes).await?,
    }

    Ok(())
}

/// Prints the month overview and storage usage.
async fn show_stats(engine: &Engine, month: Option<String>) -> Result<()> {
    let month = match month {
        Some(raw) => raw
            .parse::<MonthKey>()
            .with_context(|| format!("Invalid month '{raw}'"))?,
        None => MonthKey::from_datetime(Utc::now()),
    };

    let summary = engine.stats().month_summary(month).await;
    let usage = engine
        .storage_usage()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read storage usage: {}", e))?;

    println!("{}", format!("📊 Statistics for {}", summary.month).bright_blue().bold());
    println!();
    println!("  Tracked sites:  {}", summary.tracked_sites.to_string().cyan());
    println!("  Promoted sites: {}", summary.promoted_sites.to_string().green());
    println!(
        "  Storage:        {} / {} bytes ({:.1}%)",
        usage.bytes_in_use,
        usage.quota_bytes,
        usage.ratio() * 100.0
    );
    println!();

    if summary.top_sites.is_empty() {
        println!("{}", "  No visits recorded".yellow());
        return Ok(());
    }

    println!(
        "  {:<6} {:<10} {}",
        "Visits".bright_white().bold(),
        "Promoted".bright_white().bold(),
        "Site".bright_white().bold()
    );
    println!("  {}", "─".repeat(60).bright_black());

    for site in &summary.top_sites {
        let promoted = if site.promoted { "yes".green() } else { "no".bright_black() };
        println!(
            "  {:<6} {:<10} {} {}",
            site.total_count,
            promoted,
            site.title.cyan(),
            site.url.bright_black()
        );
    }
    println!();

    Ok(())
}

/// Lists queued promotions, oldest first.
async fn show_queue(engine: &Engine) {
    let entries = engine.retry_queue().snapshot().await;

    println!("{}", "⏳ Retry queue".bright_blue().bold());
    println!();

    if entries.is_empty() {
        println!("{}", "  Queue is empty".green());
        return;
    }

    for entry in &entries {
        println!(
            "  {:<3} {} {} {}",
            entry.attempts.to_string().yellow(),
            entry
                .enqueued_at
                .format("%Y-%m-%d %H:%M")
                .to_string()
                .bright_black(),
            entry.request.title.cyan(),
            entry.url().bright_black()
        );
    }
    println!();
    println!("  Total: {}", entries.len().to_string().bright_white().bold());
}

async fn cleanup(engine: &Engine) -> Result<()> {
    let outcome = engine
        .cleanup_now(Utc::now())
        .await
        .map_err(|e| anyhow::anyhow!("Cleanup failed: {}", e))?;

    match outcome {
        CleanupOutcome::Skipped => {
            println!("{}", "⚠️  autoCleanup is disabled, nothing removed".yellow());
        }
        CleanupOutcome::Completed { cutoff, report } => {
            println!("{}", "✅ Cleanup finished".green().bold());
            println!("  Kept months from: {}", cutoff.to_string().cyan());
            println!("  Buckets removed:  {}", report.buckets_removed.len());
            println!("  Records removed:  {}", report.records_removed);
            println!("  Records trimmed:  {}", report.records_trimmed);
        }
    }

    Ok(())
}

async fn reset(engine: &Engine, skip_confirm: bool) -> Result<()> {
    if !skip_confirm {
        let confirmed = Confirm::new()
            .with_prompt("Delete all visit statistics and queued promotions?")
            .default(false)
            .interact()?;

        if !confirmed {
            println!("{}", "❌ Cancelled".red());
            return Ok(());
        }
    }

    let report = engine
        .reset()
        .await
        .map_err(|e| anyhow::anyhow!("Reset failed: {}", e))?;

    println!("{}", "✅ Data reset".green().bold());
    println!("  Records removed: {}", report.records_removed);
    println!("  Retries removed: {}", report.retries_removed);
    println!("  Settings restored to defaults");

    Ok(())
}
