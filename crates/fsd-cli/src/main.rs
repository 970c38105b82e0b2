//! CLI entry point for file-based target discovery.
//!
//! This binary watches target files and prints the current set of target
//! groups whenever it changes, or validates target files once.
//!
//! # Usage
//!
//! ```bash
//! fsd [OPTIONS] <COMMAND>
//!
//! # Stream snapshots as JSON lines
//! fsd --file '/etc/sd/*.yml' watch
//!
//! # Re-scan on the timer only
//! fsd --config fsd.json --refresh-interval 30 watch --no-watch
//!
//! # Validate target files once
//! fsd --file 'sd/*.json' check --format json
//! ```
//!
//! Logs go to stderr, so stdout carries only snapshots and reports.

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use clap::{Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{WrapErr, eyre};
use fsd_core::{Config, TargetGroup};
use fsd_discovery::{Discovery, FileState, StatsSnapshot};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// File-based target discovery.
///
/// Reads groups of targets from JSON or YAML files matching glob patterns and
/// keeps them up to date as the files change.
#[derive(Parser)]
#[command(name = "fsd", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Command to execute.
    #[command(subcommand)]
    command: Commands,

    /// Path to a JSON configuration file.
    #[arg(short, long, global = true, env = "FSD_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Target file pattern, e.g. `sd/*.yml`. Repeatable.
    ///
    /// Replaces the patterns from the configuration file.
    #[arg(short, long = "file", global = true, value_name = "PATTERN")]
    files: Vec<String>,

    /// Fallback re-scan interval in seconds.
    #[arg(long, global = true, env = "FSD_REFRESH_INTERVAL", value_name = "SECONDS")]
    refresh_interval: Option<u64>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    no_color: bool,
}

/// Available subcommands.
#[derive(Subcommand)]
enum Commands {
    /// Watch target files and print every new snapshot as one JSON line.
    Watch {
        /// Disable change notifications and rely on the refresh interval.
        #[arg(long)]
        no_watch: bool,
    },

    /// Parse all target files once and report per-file results.
    Check {
        /// Output format.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

/// Report output format.
#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text.
    Text,
    /// JSON format.
    Json,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging to stderr.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},mio=warn,notify=warn"))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(false)
                .with_ansi(use_ansi)
                .with_writer(std::io::stderr),
        )
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the configuration file and CLI overrides.
///
/// # Errors
///
/// Returns an error if the configuration file cannot be loaded or the
/// resulting configuration is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .wrap_err_with(|| format!("Failed to load configuration from {path}"))?,
        None => Config::default(),
    };

    if !cli.files.is_empty() {
        config.discovery.files.clone_from(&cli.files);
    }
    if let Some(secs) = cli.refresh_interval {
        config.discovery.refresh_interval_secs = secs;
    }

    config.validate().wrap_err("Invalid configuration")?;
    Ok(config)
}

/// Completes on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = sigterm.recv() => {}
        }
    }

    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    Ok(())
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

/// Streams snapshots to stdout until interrupted.
///
/// # Errors
///
/// Returns an error if writing to stdout fails or the discovery task panics.
async fn run_watch(mut config: Config, no_watch: bool) -> color_eyre::Result<()> {
    config.watch.enabled = !no_watch;
    info!(
        patterns = ?config.discovery.files,
        watch = config.watch.enabled,
        "Starting discovery"
    );

    let cancel = CancellationToken::new();
    let discovery = Discovery::new(&config);
    let stats = discovery.stats();
    let (mut snapshots, task) = discovery.spawn(cancel.clone(), 1);

    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(()) => {
                info!("Received shutdown signal");
                signal_cancel.cancel();
            }
            Err(error) => warn!(error = %error, "Failed to listen for shutdown signals"),
        }
    });

    let written = write_snapshots(&mut snapshots).await;
    if written.is_err() {
        cancel.cancel();
    }
    drop(snapshots);

    task.await.wrap_err("Discovery task failed")?;
    info!(stats = ?stats.snapshot(), "Discovery finished");

    written
}

/// Writes each snapshot as one JSON line until the stream closes.
async fn write_snapshots(
    snapshots: &mut tokio::sync::mpsc::Receiver<Vec<TargetGroup>>,
) -> color_eyre::Result<()> {
    while let Some(groups) = snapshots.recv().await {
        let stdout = std::io::stdout();
        let mut handle = stdout.lock();
        serde_json::to_writer(&mut handle, &groups)?;
        writeln!(handle)?;
        handle.flush()?;
    }
    Ok(())
}

/// Runs one refresh cycle and reports per-file results.
///
/// # Errors
///
/// Returns an error if a pattern cannot be expanded or any matched file
/// failed to parse.
fn run_check(config: &Config, format: OutputFormat) -> color_eyre::Result<()> {
    info!(patterns = ?config.discovery.files, "Checking target files");

    let mut discovery = Discovery::new(config);
    discovery.refresh_now()?;

    let report = CheckReport::new(&discovery);
    let content = match format {
        OutputFormat::Text => report.to_text(),
        OutputFormat::Json => serde_json::to_string_pretty(&report)
            .map_err(|e| eyre!("Failed to serialize JSON: {}", e))?,
    };

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    writeln!(handle, "{content}")?;

    let failed = report.failed();
    if failed > 0 {
        return Err(eyre!("{failed} of {} target files failed to parse", report.files.len()));
    }
    Ok(())
}

// =============================================================================
// OUTPUT HELPERS
// =============================================================================

/// Result of checking one target file.
#[derive(Debug, Serialize)]
struct FileReport<'a> {
    path: &'a Utf8Path,
    groups: usize,
    targets: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
}

impl<'a> From<&'a FileState> for FileReport<'a> {
    fn from(state: &'a FileState) -> Self {
        Self {
            path: &state.path,
            groups: state.last_groups.len(),
            targets: state.last_groups.iter().map(|g| g.targets.len()).sum(),
            error: state.last_error.as_deref(),
        }
    }
}

/// Result of a `check` run.
#[derive(Debug, Serialize)]
struct CheckReport<'a> {
    files: Vec<FileReport<'a>>,
    groups: Vec<TargetGroup>,
    stats: StatsSnapshot,
}

impl<'a> CheckReport<'a> {
    fn new(discovery: &'a Discovery) -> Self {
        Self {
            files: discovery
                .file_states()
                .sorted()
                .into_iter()
                .map(FileReport::from)
                .collect(),
            groups: discovery.snapshot(),
            stats: discovery.stats().snapshot(),
        }
    }

    fn failed(&self) -> usize {
        self.files.iter().filter(|f| f.error.is_some()).count()
    }

    fn to_text(&self) -> String {
        use std::fmt::Write;

        let mut output = String::new();
        if self.files.is_empty() {
            output.push_str("No target files matched.");
            return output;
        }

        for file in &self.files {
            // Use write! to avoid extra allocation from format!
            let _ = match file.error {
                Some(error) => writeln!(output, "FAIL  {}: {error}", file.path),
                None => writeln!(
                    output,
                    "OK    {} ({} groups, {} targets)",
                    file.path, file.groups, file.targets
                ),
            };
        }

        let _ = write!(
            output,
            "\n{} files, {} failed, {} groups",
            self.files.len(),
            self.failed(),
            self.groups.len()
        );
        output
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Merge configuration file and flags
    let config = build_config(&cli)?;

    // 5. Route to appropriate command
    match cli.command {
        Commands::Watch { no_watch } => run_watch(config, no_watch).await,
        Commands::Check { format } => run_check(&config, format),
    }
}
