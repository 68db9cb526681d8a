use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use feedwell::config::Config;
use feedwell::feed::{refresh_source, RefreshOptions};
use feedwell::scheduler::{Scheduler, SchedulerOptions};
use feedwell::storage::{Database, NewSource};

#[derive(Parser, Debug)]
#[command(name = "feedwell", about = "Scheduled RSS/Atom feed syndication service")]
struct Args {
    /// Path to the configuration file
    #[arg(long, default_value = "feedwell.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the refresh scheduler until interrupted
    Run,
    /// Refresh a single source immediately
    Refresh {
        /// Id of the source to refresh
        source_id: i64,
    },
    /// Register a new source
    AddSource {
        /// Display name (must be unique)
        name: String,
        /// RSS/Atom feed URL (must be unique)
        feed_url: String,
        /// Per-source sync interval in minutes (defaults to the global value)
        #[arg(long)]
        interval: Option<i64>,
        /// Homepage URL of the site behind the feed
        #[arg(long)]
        homepage: Option<String>,
    },
    /// List all configured sources
    Sources,
    /// Show the latest stored entries
    Entries {
        /// Maximum number of entries to show
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },
}

fn format_timestamp(ts: Option<i64>) -> String {
    ts.and_then(|t| DateTime::from_timestamp(t, 0))
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "-".to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config = Config::load(&args.config).context("Failed to load configuration")?;
    let db = Database::open(&config.database_path)
        .await
        .context("Failed to open database")?;
    let client = reqwest::Client::new();

    match args.command {
        Command::Run => {
            let mut scheduler = Scheduler::new(
                db,
                client,
                SchedulerOptions {
                    sync_interval_minutes: config.sync_interval_minutes,
                    max_concurrent_fetches: config.max_concurrent_fetches,
                    http_timeout: Duration::from_secs(config.http_timeout_secs),
                    user_agent: config.user_agent.clone(),
                },
            );
            scheduler.start();

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            println!("Shutting down...");
            scheduler.stop().await;
        }

        Command::Refresh { source_id } => {
            let options = RefreshOptions {
                http_timeout: Duration::from_secs(config.http_timeout_secs),
                user_agent: config.user_agent.clone(),
            };
            let outcome = refresh_source(&db, &client, &options, source_id).await?;
            println!(
                "Source {} ({}): {} — {} new entries",
                outcome.source.id,
                outcome.source.name,
                outcome.log.status,
                outcome.log.entries_fetched
            );
            if let Some(message) = &outcome.log.error_message {
                println!("  error: {}", message);
            }
        }

        Command::AddSource {
            name,
            feed_url,
            interval,
            homepage,
        } => {
            url::Url::parse(&feed_url).context("Invalid feed URL")?;
            if let Some(homepage) = &homepage {
                url::Url::parse(homepage).context("Invalid homepage URL")?;
            }

            let source = db
                .create_source(NewSource {
                    name,
                    feed_url,
                    homepage_url: homepage,
                    description: None,
                    is_active: true,
                    sync_interval_minutes: interval,
                })
                .await?;
            println!("Added source {} ({})", source.id, source.name);
        }

        Command::Sources => {
            let sources = db.list_sources().await?;
            if sources.is_empty() {
                println!("No sources configured. Add one with `feedwell add-source`.");
            }
            for source in sources {
                println!(
                    "{:>4}  {:<30}  {:<8}  last synced {}  {}",
                    source.id,
                    source.name,
                    if source.is_active { "active" } else { "disabled" },
                    format_timestamp(source.last_synced_at),
                    source.feed_url
                );
            }
        }

        Command::Entries { limit } => {
            let entries = db.latest_entries(limit).await?;
            for entry in entries {
                println!(
                    "[{}] {}  {}",
                    format_timestamp(entry.published_at),
                    entry.title,
                    entry.link.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}
