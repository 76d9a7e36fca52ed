use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use newsdigest::admin;
use newsdigest::cache::KvStore;
use newsdigest::config::Config;
use newsdigest::storage::{Database, DatabaseError, Edition};

#[derive(Parser, Debug)]
#[command(name = "newsdigest", about = "News collection and digest pipeline")]
struct Args {
    /// Config file path
    #[arg(long, value_name = "FILE", default_value = "newsdigest.toml")]
    config: PathBuf,

    /// Database path (overrides the config file)
    #[arg(long, value_name = "FILE")]
    database: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect from configured sources
    Collect {
        /// Restrict the run to these source ids (repeatable)
        #[arg(long = "source", value_name = "ID")]
        sources: Vec<String>,
    },
    /// Run LLM processing and compile a digest
    Digest {
        /// Digest edition
        #[arg(long, value_parser = parse_edition)]
        edition: Edition,

        /// Compile without any LLM processing
        #[arg(long)]
        skip_llm: bool,

        /// Only summarize articles collected within the last N hours
        #[arg(long, value_name = "HOURS")]
        collected_within_hours: Option<i64>,
    },
    /// Show aggregate pipeline counters
    Status,
    /// Set the daily LLM call limit
    SetQuotaLimit {
        /// New daily cap
        limit: u32,
    },
    /// Delete old unbookmarked articles
    Cleanup {
        /// Age threshold in days
        #[arg(long, default_value_t = 7)]
        older_than_days: i64,

        /// Count what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

fn parse_edition(s: &str) -> Result<Edition, String> {
    Edition::parse(s).ok_or_else(|| format!("invalid edition '{}' (expected am or pm)", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debug logging
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let mut config = Config::load(&args.config).context("Failed to load configuration")?;
    if let Some(database) = args.database {
        config.database_path = database;
    }

    let db = match Database::open(&config.database_path).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: the database is locked by another process. Please close it and try again.");
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    // The SQLite kv_cache table stands in for the external counter/cache
    // collaborator.
    let kv: Arc<dyn KvStore> = Arc::new(db.clone());
    let http = reqwest::Client::new();
    let now = Utc::now().timestamp();

    match args.command {
        Command::Collect { sources } => {
            let source_ids = (!sources.is_empty()).then_some(sources);
            let results =
                admin::run_collect(&db, &http, &config, source_ids.as_deref(), now).await?;
            println!("{}", serde_json::to_string_pretty(&results)?);
        }
        Command::Digest {
            edition,
            skip_llm,
            collected_within_hours,
        } => {
            let report = admin::run_digest(
                &db,
                Some(kv),
                &http,
                &config,
                edition,
                skip_llm,
                collected_within_hours,
                now,
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Status => {
            let report = admin::status(&db, Some(kv.as_ref()), &config, now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SetQuotaLimit { limit } => {
            let stored = admin::set_quota_limit(kv.as_ref(), limit).await?;
            println!("Daily LLM call limit set to {}", stored);
        }
        Command::Cleanup {
            older_than_days,
            dry_run,
        } => {
            let report = admin::cleanup(&db, older_than_days, dry_run, now).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
