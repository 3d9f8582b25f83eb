//! tracefold - personal activity timeline from exported logs
//!
//! Ingests version-control logs, chat exports and calendars into one event
//! store and renders day-by-hour heatmaps over it.
//!
//! Uses XDG Base Directory specification for file locations:
//! - Database: $XDG_DATA_HOME/tracefold/events.db (~/.local/share/tracefold/events.db)
//! - Logs: $XDG_STATE_HOME/tracefold/tracefold.log (~/.local/state/tracefold/tracefold.log)
//! - Config: $XDG_CONFIG_HOME/tracefold/config.toml (~/.config/tracefold/config.toml)

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use tracefold_core::analytics::{aggregate_window, digest_window, ActivitySummary};
use tracefold_core::format::{format_relative_time, render_heatmap};
use tracefold_core::github::SyncGithubClient;
use tracefold_core::ingest::{decode, expand_glob, parse_document, BatchResult};
use tracefold_core::{AggregateQuery, Config, Database, IngestCoordinator, Source};

#[derive(Parser)]
#[command(name = "tracefold")]
#[command(about = "Ingest activity exports and render heatmaps")]
#[command(version)]
struct Args {
    /// Verbose output (-v per-file details)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest files (paths or glob patterns)
    Ingest {
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Render the day-by-hour heatmap
    Aggregate {
        /// Window in days (default: from config)
        #[arg(short, long)]
        days: Option<u32>,

        /// Only events from this source
        #[arg(long)]
        source: Option<Source>,

        /// Only events by this actor
        #[arg(long)]
        actor: Option<String>,

        /// Only events carrying this tag
        #[arg(long)]
        tag: Option<String>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Summary statistics for a window
    Stats {
        #[arg(short, long)]
        days: Option<u32>,

        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Daily per-source event counts as JSON
    Digest {
        #[arg(short, long)]
        days: Option<u32>,
    },

    /// Print the detected format of a file without storing it
    Detect { path: PathBuf },

    /// Import a user's public GitHub events
    Github {
        user: String,

        /// Access token (default: config, then GITHUB_TOKEN)
        #[arg(long)]
        token: Option<String>,
    },

    /// Show recent ingestions
    Runs {
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Delete every stored event
    Clear {
        /// Confirm the deletion
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        tracefold_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // `detect` never touches the store
    if let Command::Detect { path } = &args.command {
        return run_detect(path, &config, args.verbose);
    }

    let db_path = Config::database_path();
    tracing::info!(path = %db_path.display(), "Opening database");

    let db = Database::open(&db_path).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Command::Ingest { paths } => run_ingest(db, &config, &paths, args.verbose),
        Command::Aggregate {
            days,
            source,
            actor,
            tag,
            format,
        } => {
            let query = AggregateQuery {
                days: days.unwrap_or(config.aggregate.default_days),
                source,
                actor,
                tag,
            };
            run_aggregate(&db, &config, &query, format)
        }
        Command::Stats { days, format } => {
            let days = days.unwrap_or(config.aggregate.default_days);
            run_stats(&db, &config, days, format)
        }
        Command::Digest { days } => {
            let days = days.unwrap_or(config.aggregate.default_days);
            let digest = digest_window(&db, days, &config.aggregate, Utc::now())
                .context("failed to build digest")?;
            println!("{}", serde_json::to_string_pretty(&digest)?);
            Ok(())
        }
        Command::Github { user, token } => run_github(db, &config, &user, token),
        Command::Runs { limit } => run_runs(&db, limit),
        Command::Clear { yes } => {
            if !yes {
                anyhow::bail!("refusing to delete all events without --yes");
            }
            let removed = db.clear_events().context("failed to clear events")?;
            println!("Removed {} events", removed);
            Ok(())
        }
        Command::Detect { .. } => Ok(()),
    }
}

/// Ingest every file named or matched by `patterns`, with a progress bar
fn run_ingest(db: Database, config: &Config, patterns: &[String], verbose: u8) -> Result<()> {
    let mut paths = Vec::new();
    let mut missing = Vec::new();
    for pattern in patterns {
        let matched = expand_glob(pattern).context("failed to expand path")?;
        if matched.is_empty() {
            missing.push(pattern.as_str());
        }
        paths.extend(matched);
    }

    let coordinator = IngestCoordinator::new(db, config.ingest.clone());

    let pb = ProgressBar::new(paths.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    let result = coordinator.ingest_paths(&paths, |current, _total, path| {
        pb.set_position(current as u64);
        pb.set_message(
            path.file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("...")
                .to_string(),
        );
    });

    pb.finish_and_clear();

    print_batch_result(&result, verbose);
    for pattern in &missing {
        println!("  {}: no such file", pattern);
    }

    tracing::info!(
        files = result.reports.len(),
        produced = result.events_produced(),
        inserted = result.events_inserted(),
        errors = result.errors.len(),
        "tracefold ingest complete"
    );

    let failed = result.errors.len() + missing.len();
    if failed > 0 {
        anyhow::bail!("{} input(s) could not be ingested", failed);
    }
    Ok(())
}

fn print_batch_result(result: &BatchResult, verbose: u8) {
    for report in &result.reports {
        println!(
            "{}: {} ({} events, {} new)",
            report.name, report.detected, report.count, report.inserted
        );
        if verbose >= 1 && (report.duplicates > 0 || report.skipped > 0) {
            println!(
                "  {} already stored, {} skipped",
                report.duplicates, report.skipped
            );
        }
    }

    println!(
        "\nIngested {} file(s): {} events, {} new",
        result.reports.len(),
        result.events_produced(),
        result.events_inserted()
    );

    if !result.errors.is_empty() {
        println!("\nErrors ({}):", result.errors.len());
        for (path, err) in &result.errors {
            println!("  {}: {}", path.display(), err);
        }
    }
}

fn run_aggregate(
    db: &Database,
    config: &Config,
    query: &AggregateQuery,
    format: OutputFormat,
) -> Result<()> {
    let now = Local::now();
    let aggregate =
        aggregate_window(db, query, &config.aggregate, &now).context("failed to aggregate")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&aggregate)?),
        OutputFormat::Text => {
            print!("{}", render_heatmap(&aggregate, now.date_naive()));
            println!("\n{} events in the last {} days", aggregate.total(), query.days);

            if !aggregate.actors.is_empty() {
                println!("\nTop actors:");
                for actor in aggregate.actors.iter().take(10) {
                    println!("  {:>6}  {}", actor.count, actor.name);
                }
            }
        }
    }
    Ok(())
}

fn run_stats(db: &Database, config: &Config, days: u32, format: OutputFormat) -> Result<()> {
    let now = Local::now();
    let aggregate = aggregate_window(db, &AggregateQuery::new(days), &config.aggregate, &now)
        .context("failed to aggregate")?;
    let summary = ActivitySummary::from_aggregate(&aggregate, now.date_naive());

    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Last {} days:", summary.days);
    println!("  Events:         {}", summary.total_events);
    println!(
        "  Active days:    {} ({:.0}%)",
        summary.active_days,
        summary.activity_percentage()
    );
    println!("  Current streak: {} days", summary.current_streak);
    println!("  Longest streak: {} days", summary.longest_streak);
    if let Some(peak) = summary.format_peak_hour() {
        println!("  Peak hour:      {}", peak);
    }
    if let Some(day) = summary.busiest_day {
        println!("  Busiest day:    {}", day);
    }

    if !summary.sources.is_empty() {
        println!("\nSources:");
        for entry in &summary.sources {
            println!("  {:>6}  {}", entry.count, entry.source.display_name());
        }
    }
    Ok(())
}

fn run_detect(path: &Path, config: &Config, verbose: u8) -> Result<()> {
    let size = std::fs::metadata(path)
        .with_context(|| format!("failed to read {}", path.display()))?
        .len();
    if size > config.ingest.max_upload_bytes {
        anyhow::bail!(
            "{} is {} bytes, over the {} byte limit",
            path.display(),
            size,
            config.ingest.max_upload_bytes
        );
    }

    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let parsed = parse_document(&decode::decode(&bytes), Utc::now());

    println!("{}", parsed.detected);
    if verbose >= 1 {
        println!("  {} events, {} skipped", parsed.events.len(), parsed.skipped);
    }
    Ok(())
}

fn run_github(db: Database, config: &Config, user: &str, token: Option<String>) -> Result<()> {
    let client =
        SyncGithubClient::new(&config.github, token).context("failed to create GitHub client")?;
    let fetched = client
        .fetch_user_events(user)
        .with_context(|| format!("failed to fetch events for {}", user))?;

    let coordinator = IngestCoordinator::new(db, config.ingest.clone());
    let name = format!("github:{}", user);
    let appended = coordinator
        .ingest_events(&name, Source::GithubApi.as_str(), &fetched.events)
        .context("failed to store GitHub events")?;

    println!(
        "{}: {} events, {} new",
        name,
        fetched.events.len(),
        appended.inserted
    );
    Ok(())
}

fn run_runs(db: &Database, limit: usize) -> Result<()> {
    let runs = db
        .recent_ingest_runs(limit)
        .context("failed to load ingest history")?;

    if runs.is_empty() {
        println!("No ingestions yet.");
        println!("Run 'tracefold ingest <PATH>' to import a file.");
        return Ok(());
    }

    let now = Utc::now();
    for run in &runs {
        println!(
            "{:>10}  {:<18} {:>6} events {:>6} new  {}",
            format_relative_time(run.ingested_at, now),
            run.detected,
            run.produced,
            run.inserted,
            run.name
        );
    }
    Ok(())
}
