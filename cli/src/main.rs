//! ViraxLog command-line tool.
//!
//! Every command prints one JSON document on stdout.
//!
//! Usage:
//!   virax --db audit.db audit
//!   virax --db audit.db audit --limit 500
//!   virax --db audit.db query --category AUTH --level error --limit 20
//!   virax --db audit.db simulate --producers 8 --events 1000
//!   virax --config virax.toml maintain

use std::{path::PathBuf, process::ExitCode, sync::Arc, thread, time::Instant};

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use virax::{PipelineConfig, QueryFilter, ViraxLogger, ViraxResult};

// ── CLI definition ────────────────────────────────────────────────────────────

/// Inspect and exercise a tamper-evident ViraxLog store.
#[derive(Parser)]
#[command(
    name = "virax",
    about = "Audit, query, and maintain a ViraxLog event store",
    long_about = "Works on the SQLite store written by the virax library.\n\
                  Output is JSON. `audit` exits with status 2 when the chain is broken."
)]
struct Cli {
    /// Store path; overrides `store_path` from the config file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify the stored chain.
    Audit {
        /// Only verify the most recent N records; 0 audits everything.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// List records, newest first.
    Query {
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        level: Option<String>,
        /// Inclusive lower bound, e.g. 2024-01-01T00:00:00+00:00.
        #[arg(long)]
        since: Option<String>,
        /// Inclusive upper bound.
        #[arg(long)]
        until: Option<String>,
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Log synthetic events from concurrent producers, then audit.
    Simulate {
        #[arg(long, default_value_t = 4)]
        producers: usize,
        #[arg(long, default_value_t = 250)]
        events: usize,
        #[arg(long, default_value = "SIMULATION")]
        category: String,
    },
    /// Prune old heartbeats and compact the database.
    Maintain,
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("virax: {e}");
            return ExitCode::FAILURE;
        }
    };

    // RUST_LOG wins; otherwise the configured level.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let result = match cli.command {
        Command::Audit { limit } => run_audit(config, limit),
        Command::Query {
            category,
            level,
            since,
            until,
            limit,
        } => run_query(
            config,
            QueryFilter {
                category,
                level: level.map(|l| l.to_uppercase()),
                since,
                until,
            },
            limit,
        ),
        Command::Simulate {
            producers,
            events,
            category,
        } => run_simulate(config, producers, events, &category),
        Command::Maintain => run_maintain(config),
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("virax: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> ViraxResult<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(db) = &cli.db {
        config.store_path = db.clone();
    }
    Ok(config)
}

/// Read-only commands should not add heartbeat rows.
fn quiet(config: PipelineConfig) -> PipelineConfig {
    PipelineConfig {
        heartbeat_enabled: false,
        ..config
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn run_audit(config: PipelineConfig, limit: Option<usize>) -> ViraxResult<ExitCode> {
    let logger = ViraxLogger::open(quiet(config))?;
    let report = logger.audit(limit);
    logger.shutdown()?;

    print_json(&json!(report));
    Ok(if report.is_intact() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn run_query(config: PipelineConfig, filter: QueryFilter, limit: usize) -> ViraxResult<ExitCode> {
    let logger = ViraxLogger::open(quiet(config))?;
    let rows = logger.query(&filter, limit)?;
    logger.shutdown()?;

    print_json(&json!(rows));
    Ok(ExitCode::SUCCESS)
}

fn run_simulate(
    config: PipelineConfig,
    producers: usize,
    events: usize,
    category: &str,
) -> ViraxResult<ExitCode> {
    let logger = Arc::new(ViraxLogger::open(config.clone())?);
    let started = Instant::now();

    let handles: Vec<_> = (0..producers)
        .map(|producer| {
            let logger = Arc::clone(&logger);
            let category = category.to_string();
            thread::spawn(move || {
                for event in 0..events {
                    logger.info(&category, &json!({ "producer": producer, "event": event }));
                }
            })
        })
        .collect();
    for handle in handles {
        if handle.join().is_err() {
            tracing::error!("producer thread panicked");
        }
    }
    logger.shutdown()?;
    let stats = logger.stats();
    let elapsed = started.elapsed();
    info!(elapsed_ms = elapsed.as_millis() as u64, "simulation finished");

    // The logger closed its store on shutdown; audit through a fresh one.
    let auditor = ViraxLogger::open(quiet(config))?;
    let report = auditor.audit(None);
    let total = auditor.count()?;
    auditor.shutdown()?;

    print_json(&json!({
        "stats": stats,
        "elapsed_ms": elapsed.as_millis() as u64,
        "records_in_store": total,
        "audit": report,
    }));
    Ok(if report.is_intact() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(2)
    })
}

fn run_maintain(config: PipelineConfig) -> ViraxResult<ExitCode> {
    let logger = ViraxLogger::open(quiet(config))?;
    let report = logger.maintain()?;
    logger.shutdown()?;

    print_json(&json!(report));
    Ok(ExitCode::SUCCESS)
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{text}"),
        Err(e) => eprintln!("virax: failed to render output: {e}"),
    }
}
