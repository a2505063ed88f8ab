mod config;
mod models;
mod pipeline;
mod scraper;
mod storage;
mod strategies;
mod utils;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::AppConfig;
use crate::models::{Game, NoCandidateReason, RunOutcome};
use crate::pipeline::{selector, validator, Pipeline};
use crate::storage::CsvStore;
use crate::utils::fmt_numbers;

#[derive(Parser)]
#[command(name = "toto-etl", about = "Lottery result extraction and merge", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Override `[game] name` from the config
    #[arg(long, value_enum, global = true)]
    game: Option<Game>,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch the latest draw and merge it into the store
    Update {
        /// Decide the merge but leave the store untouched
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the extractors over a saved HTML page and print ranked candidates
    Extract {
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Create an empty store file if none exists
    Init,

    /// Report store rows that break ordering, uniqueness or range rules
    Check,

    /// Show store statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "toto_etl=info,warn",
        1 => "toto_etl=debug,info",
        _ => "trace",
    };

    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(EnvFilter::new(filter))
        .init();

    let mut config = AppConfig::load()?;
    if let Some(game) = cli.game {
        config.game.name = game;
    }
    let rules = config.game.name.rules();
    let storage = config.storage.clone();

    match cli.command {
        Command::Update { dry_run } => {
            let _t = utils::Timer::start("Update run");
            match Pipeline::new(config).dry_run(dry_run).run().await? {
                RunOutcome::Updated(record) if dry_run => println!("Would add {}", record),
                RunOutcome::Updated(record) => println!("Updated: {}", record),
                RunOutcome::Unchanged => println!("Unchanged: store already has the latest draw"),
                RunOutcome::NoCandidateFound(reason) => {
                    println!("No candidate found: {}", reason);
                    if let NoCandidateReason::Transport(failures) = reason {
                        for f in failures {
                            info!("  {}", f);
                        }
                    }
                }
            }
        }

        Command::Extract { file } => {
            let html = std::fs::read_to_string(&file).with_context(|| format!("Failed to read {:?}", file))?;
            let today = Local::now().date_naive();
            let pipeline = Pipeline::new(config);
            let mut candidates = pipeline.extract_candidates(&[html.as_str()], today);
            selector::rank_all(&mut candidates);

            if candidates.is_empty() {
                println!("No candidates in {:?}", file);
                return Ok(());
            }
            println!("{} candidate(s):", candidates.len());
            for (i, c) in candidates.iter().enumerate() {
                println!("  {:>2}. {}", i + 1, c);
            }
            match validator::validate(&candidates[0], pipeline.rules(), today) {
                Ok(record) => println!("Best: {}", record),
                Err(rejection) => println!("Best candidate rejected: {}", rejection),
            }
        }

        Command::Init => {
            if CsvStore::create_empty(&storage.csv_path)? {
                println!("Created {:?}", storage.csv_path);
            } else {
                println!("{:?} already exists", storage.csv_path);
            }
        }

        Command::Check => {
            let store = CsvStore::open(&storage.csv_path, rules, &storage.date_format)?;
            let problems = store.check();
            if problems.is_empty() {
                println!("{} records, no problems", store.len());
            } else {
                for p in &problems {
                    println!("  {}", p);
                }
                anyhow::bail!("{} problem(s) in {:?}", problems.len(), storage.csv_path);
            }
        }

        Command::Stats => {
            let store = CsvStore::open(&storage.csv_path, rules, &storage.date_format)?;
            let records = store.records();
            let newest = records.first();
            let oldest = records.last();
            println!("─────────────────────────────────");
            println!("  {} store", store.rules().name);
            println!("─────────────────────────────────");
            println!("  File     : {:?}", store.path());
            println!("  Draws    : {}", store.len());
            println!("  From     : {}", oldest.map(|r| r.date.to_string()).unwrap_or("—".into()));
            println!("  To       : {}", newest.map(|r| r.date.to_string()).unwrap_or("—".into()));
            if let Some(head) = newest {
                println!("  Latest   : {}", fmt_numbers(&head.primary, store.rules()));
                if !head.secondary.is_empty() {
                    println!("  Extra    : {}", fmt_numbers(&head.secondary, store.rules()));
                }
            }
            println!("─────────────────────────────────");
        }
    }

    Ok(())
}
