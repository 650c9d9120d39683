//! CLI for tally request counters.
//!
//! Provides commands for inspecting a directory-backed counter store and a
//! demo host that counts synthetic requests and checkpoints them on a timer.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tally::{CounterStore, FileView, LiveCounter, PeriodKey, RolloverCoordinator, TallyConfig};
use tracing_subscriber::EnvFilter;

/// tally — Durable month-bucketed request counters.
#[derive(Parser)]
#[command(name = "tally", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Print every stored month, oldest first.
    History {
        /// Path to the store directory.
        store_path: PathBuf,

        /// Output format.
        #[arg(long, default_value = "csv")]
        format: OutputFormat,
    },

    /// Print the stored total of one month.
    Current {
        /// Path to the store directory.
        store_path: PathBuf,

        /// Any RFC 3339 time within the month (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Add requests to the stored total of one month.
    Record {
        /// Path to the store directory.
        store_path: PathBuf,

        /// Number of requests to add.
        #[arg(long)]
        count: u64,

        /// Any RFC 3339 time within the month (defaults to now).
        #[arg(long)]
        at: Option<String>,
    },

    /// Count synthetic requests from worker threads and checkpoint them periodically.
    Run {
        /// Path to the store directory (overrides the config file).
        store_path: Option<PathBuf>,

        /// JSON config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Number of request-handling threads.
        #[arg(long, default_value = "4")]
        workers: u32,

        /// Delay between synthetic requests on each worker, in microseconds.
        #[arg(long, default_value = "1000")]
        request_interval_us: u64,

        /// Save interval in milliseconds (overrides the config file).
        #[arg(long)]
        save_interval_ms: Option<u64>,

        /// How long to run before the final checkpoint, in seconds.
        #[arg(long, default_value = "10")]
        duration_secs: u64,
    },
}

/// Output format for history.
#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Comma-separated values.
    Csv,
    /// JSON document.
    Json,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::History { store_path, format } => cmd_history(&store_path, &format),
        Commands::Current { store_path, at } => cmd_current(&store_path, at.as_deref()),
        Commands::Record {
            store_path,
            count,
            at,
        } => cmd_record(&store_path, count, at.as_deref()),
        Commands::Run {
            store_path,
            config,
            workers,
            request_interval_us,
            save_interval_ms,
            duration_secs,
        } => resolve_config(store_path, config.as_deref(), save_interval_ms).and_then(|config| {
            cmd_run(
                &config,
                workers,
                Duration::from_micros(request_interval_us),
                Duration::from_secs(duration_secs),
            )
        }),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Opens the store at `store_path` with a fresh live counter.
fn open_store(store_path: &Path) -> Result<CounterStore<FileView>, Box<dyn std::error::Error>> {
    if !store_path.is_dir() {
        return Err(format!("No store found at '{}'", store_path.display()).into());
    }
    let view = FileView::open(store_path)?;
    Ok(CounterStore::new(view, Arc::new(LiveCounter::new())))
}

/// Parses `--at`, defaulting to the current time.
fn parse_at(at: Option<&str>) -> Result<DateTime<FixedOffset>, Box<dyn std::error::Error>> {
    match at {
        Some(s) => Ok(DateTime::parse_from_rfc3339(s)?),
        None => Ok(Utc::now().fixed_offset()),
    }
}

/// Implements `tally history <store_path>`.
fn cmd_history(store_path: &Path, format: &OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(store_path)?;
    let history = store.load_all()?;

    match format {
        OutputFormat::Csv => {
            println!("period,start_time,total");
            let Some(history) = history else {
                eprintln!("No request counters stored in '{}'", store_path.display());
                return Ok(());
            };
            for entry in &history.dated {
                let period = PeriodKey::from_datetime(&entry.period_start)?;
                let total = entry
                    .counter
                    .total
                    .map_or_else(String::new, |t| t.to_string());
                println!("{period},{},{total}", entry.period_start.to_rfc3339());
            }
            println!("# periods={}, total={}", history.len(), history.grand_total());
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&history)?);
        }
    }

    Ok(())
}

/// Implements `tally current <store_path>`.
fn cmd_current(store_path: &Path, at: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(store_path)?;
    let period = PeriodKey::from_datetime(&parse_at(at)?)?;

    match store.load_period(period)?.and_then(|record| record.total) {
        Some(total) => println!("{period}: {total}"),
        None => println!("{period}: no record"),
    }
    Ok(())
}

/// Implements `tally record <store_path> --count N`.
fn cmd_record(store_path: &Path, count: u64, at: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let view = FileView::open(store_path)?;
    let store = CounterStore::new(view, Arc::new(LiveCounter::new()));
    let at = parse_at(at)?;

    store.load_current(&at)?;
    store.counter().add(count)?;
    let total = store.save_current(&at)?;

    println!("{}: {total}", PeriodKey::from_datetime(&at)?);
    Ok(())
}

/// Builds the effective config for `tally run`: file first, then flag overrides.
fn resolve_config(
    store_path: Option<PathBuf>,
    config_path: Option<&Path>,
    save_interval_ms: Option<u64>,
) -> Result<TallyConfig, Box<dyn std::error::Error>> {
    let mut config = match (config_path, store_path.as_ref()) {
        (Some(path), _) => TallyConfig::load(path)?,
        (None, Some(store_path)) => TallyConfig::new(store_path.clone()),
        (None, None) => return Err("either a store path or --config is required".into()),
    };
    if let Some(store_path) = store_path {
        config.store_path = store_path;
    }
    if let Some(ms) = save_interval_ms {
        config.save_interval = Duration::from_millis(ms);
    }
    config.validate()?;
    Ok(config)
}

/// Implements `tally run`.
fn cmd_run(
    config: &TallyConfig,
    workers: u32,
    request_interval: Duration,
    duration: Duration,
) -> Result<(), Box<dyn std::error::Error>> {
    let counter = Arc::new(LiveCounter::new());
    let store = Arc::new(CounterStore::new(
        FileView::open(&config.store_path)?,
        Arc::clone(&counter),
    ));

    let started = Utc::now();
    let restored = store.load_current(&started)?;
    let rollover = store.rollover_coordinator_at(&started)?;
    tracing::info!(
        store = %config.store_path.display(),
        restored = ?restored.and_then(|r| r.total),
        workers,
        save_interval = ?config.save_interval,
        "starting request counter host"
    );

    let stop = Arc::new(AtomicBool::new(false));

    let worker_handles: Vec<_> = (0..workers)
        .map(|_| {
            let counter = Arc::clone(&counter);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    counter.increment();
                    thread::sleep(request_interval);
                }
            })
        })
        .collect();

    let maintenance = {
        let store = Arc::clone(&store);
        let stop = Arc::clone(&stop);
        let interval = config.save_interval;
        thread::spawn(move || maintenance_loop(&store, rollover, &stop, interval))
    };

    thread::sleep(duration);
    stop.store(true, Ordering::Relaxed);

    for handle in worker_handles {
        handle
            .join()
            .map_err(|_| "request worker panicked".to_string())?;
    }
    let mut rollover = maintenance
        .join()
        .map_err(|_| "maintenance thread panicked".to_string())?;

    // Final checkpoint so nothing counted since the last tick is lost.
    let saved = store.checkpoint(&mut rollover, &Utc::now())?;
    tracing::info!(period = %saved.period, total = saved.total, "final checkpoint");
    Ok(())
}

// ── Maintenance loop ────────────────────────────────────────────────

/// Checkpoints the live counter every `interval` until `stop` is set.
///
/// Errors are logged and the loop keeps ticking; the next tick retries with a
/// fresh snapshot. Returns the coordinator so the caller can run a final
/// checkpoint against the same rollover state.
fn maintenance_loop(
    store: &CounterStore<FileView>,
    mut rollover: RolloverCoordinator,
    stop: &AtomicBool,
    interval: Duration,
) -> RolloverCoordinator {
    let mut next_tick = Instant::now() + interval;

    while !stop.load(Ordering::Relaxed) {
        let now = Instant::now();
        if now < next_tick {
            thread::sleep((next_tick - now).min(Duration::from_millis(50)));
            continue;
        }
        next_tick += interval;

        match store.checkpoint(&mut rollover, &Utc::now()) {
            Ok(saved) if saved.rolled_over => {
                tracing::info!(period = %saved.period, total = saved.total, "checkpoint after rollover");
            }
            Ok(saved) => {
                tracing::debug!(period = %saved.period, total = saved.total, "checkpoint");
            }
            Err(e) => {
                tracing::warn!("checkpoint error: {e}");
            }
        }
    }

    rollover
}
