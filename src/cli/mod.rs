//! Command-line interface.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use console::style;

use crate::config::Settings;
use crate::logging::FileLogs;
use crate::models::Trigger;
use crate::repository::DbContext;
use crate::scrapers::Scraper;
use crate::server::AppState;

#[derive(Parser)]
#[command(name = "wmscout", about = "webMethods ecosystem content aggregator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the admin API server (and the cron scheduler when enabled).
    Serve,
    /// Run a one-shot scrape of all adapters, or a single one.
    Scrape {
        /// Adapter name (see `wmscout status` for the list).
        #[arg(long)]
        adapter: Option<String>,
    },
    /// Show store totals and adapter registry.
    Status,
    /// Remove aged and expired records now.
    Cleanup {
        /// Retention override in days.
        #[arg(long)]
        days: Option<i64>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Arc::new(Settings::from_env());
    let db = DbContext::new(&settings.database_path)?;
    let file_logs = Arc::new(FileLogs::new(&settings.log_dir));
    install_panic_hook(file_logs.clone());
    let scraper = Arc::new(Scraper::new(settings.clone(), db.clone(), file_logs));

    match cli.command {
        Command::Serve => {
            let _scheduler = crate::scheduler::start(&settings, scraper.clone()).await?;
            let state = AppState::new(scraper, db, settings);
            crate::server::serve(state).await
        }
        Command::Scrape { adapter } => {
            let handle = match adapter.as_deref() {
                Some(name) => scraper.clone().start_one(name, Trigger::Manual, None)?,
                None => scraper.clone().start_all(Trigger::Manual, None)?,
            };
            println!("{} Scraping...", style("→").cyan());
            handle.await?;

            let status = scraper.status().await;
            println!(
                "{} Done: {} found, {} inserted, {} errors",
                style("✓").green(),
                status.totals.total_scraped,
                status.totals.total_inserted,
                status.totals.total_errors
            );
            for (name, entry) in &status.adapters {
                println!("  {:<10} {:?}", name, entry.status);
            }
            Ok(())
        }
        Command::Status => {
            let content = db.content();
            println!("\n{}", style("wmscout status").bold());
            println!("{}", "-".repeat(40));
            println!("{:<20} {}", "Database:", settings.database_path.display());
            println!("{:<20} {}", "Records:", content.count()?);
            let stats = content.stats()?;
            for (category, count) in &stats.by_type {
                println!("{:<20} {}", format!("  {category}:"), count);
            }
            println!(
                "{:<20} {}",
                "Adapters:",
                scraper.adapter_names().join(", ")
            );
            Ok(())
        }
        Command::Cleanup { days } => {
            let content = db.content();
            let removed = content.cleanup(days.unwrap_or(settings.content_max_age_days))?;
            let expired = content.expire_due()?;
            let logs_removed = db.run_logs().cleanup_expired()?;
            println!(
                "{} Removed {} aged, {} expired records, {} old run logs",
                style("✓").green(),
                removed,
                expired,
                logs_removed
            );
            Ok(())
        }
    }
}

/// Route panics into `exceptions.log` before the default hook prints.
fn install_panic_hook(file_logs: Arc<FileLogs>) {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        file_logs.log(
            crate::logging::Channel::Exceptions,
            "error",
            "panic",
            serde_json::json!({ "info": info.to_string() }),
        );
        default_hook(info);
    }));
}
