use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use beacon::config::{Config, SiteRegistry};
use beacon::models::EventType;
use beacon::storage::{SqliteStorage, Storage};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Longest look-back accepted by `--days`
const MAX_DAYS: i64 = 100 * 365;

#[derive(Parser)]
#[command(name = "beacon-admin")]
#[command(about = "Beacon event log reporting CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List configured sites
    Sites,
    /// Event counts by type from the durable log
    Totals {
        /// Site host, as configured
        #[arg(long)]
        site: String,
        /// Look back this many days
        #[arg(long, default_value_t = 7, value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
        days: i64,
    },
    /// Most frequent pageview referers
    Referers {
        #[arg(long)]
        site: String,
        #[arg(long, default_value_t = 30, value_parser = clap::value_parser!(i64).range(1..=MAX_DAYS))]
        days: i64,
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
    /// Most recent stored events
    Events {
        #[arg(long)]
        site: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
    /// Most recent contact form submissions
    Mail {
        #[arg(long)]
        site: String,
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

/// Start of a look-back window of `days` ending at `now`
fn window_start(now: i64, days: i64) -> i64 {
    now.saturating_sub(days.saturating_mul(SECONDS_PER_DAY))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let sites = SiteRegistry::load(&config.site_config_path)
        .with_context(|| format!("failed to load site config from {}", config.site_config_path))?;

    if let Commands::Sites = cli.command {
        println!("{:<30} {:<8} {}", "Host", "Contacts", "Allowed origins");
        println!("{}", "-".repeat(80));
        for site in sites.sites() {
            println!(
                "{:<30} {:<8} {}",
                site.host,
                site.contacts.len(),
                site.allowed_origins.join(", ")
            );
        }
        return Ok(());
    }

    let url = sites
        .database_url()
        .context("no database_url configured")?;
    let storage = SqliteStorage::new(url, 1).await?;
    storage.init().await?;

    let now = chrono::Utc::now().timestamp();

    match cli.command {
        Commands::Sites => {}
        Commands::Totals { site, days } => {
            let since = window_start(now, days);
            println!("Events for '{}' in the last {} days:", site, days);
            for event in EventType::ALL {
                let count = storage.count_events(&site, event, since).await?;
                println!("{:<12} {}", event, count);
            }
        }
        Commands::Referers { site, days, limit } => {
            let since = window_start(now, days);
            let referers = storage.top_referers(&site, since, limit).await?;
            if referers.is_empty() {
                println!("No referers recorded for '{}'.", site);
            } else {
                println!("{:<8} {}", "Count", "Referer");
                for referer in referers {
                    println!("{:<8} {}", referer.count, referer.referer);
                }
            }
        }
        Commands::Events { site, limit } => {
            for event in storage.recent_events(&site, limit).await? {
                let when = chrono::DateTime::from_timestamp(event.occurred_at, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| event.occurred_at.to_string());
                println!(
                    "{} {} {} {}",
                    when, event.ip, event.page, event.raw_event
                );
            }
        }
        Commands::Mail { site, limit } => {
            for entry in storage.recent_mail(&site, limit).await? {
                println!(
                    "{} {} <{}> ({}): {}",
                    entry.timestamp, entry.name, entry.details, entry.org, entry.msg
                );
            }
        }
    }

    Ok(())
}
