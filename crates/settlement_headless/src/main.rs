//! Headless settlement runner.
//!
//! # Usage
//!
//! ```bash
//! # Run a scenario and print a JSON summary
//! cargo run -p settlement_headless -- run --scenario scenarios/village.ron --ticks 2400
//!
//! # Verify determinism with parallel runs
//! cargo run -p settlement_headless -- verify --scenario scenarios/village.ron --runs 8
//!
//! # Dump the built-in building catalog as RON
//! cargo run -p settlement_headless -- catalog
//! ```

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use settlement_core::catalog::BuildingCatalog;
use settlement_core::simulation::TICK_DURATION_MS;
use settlement_headless::{verify_determinism, HeadlessConfig, HeadlessRunner, Scenario};

#[derive(Parser)]
#[command(name = "settlement_headless")]
#[command(about = "Headless settlement logistics runner")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a scenario and print a JSON summary
    Run {
        /// Scenario file to load (built-in village if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Building catalog override (RON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Number of ticks to run
        #[arg(short, long, default_value = "1200")]
        ticks: u64,

        /// Milliseconds per tick
        #[arg(long, default_value_t = TICK_DURATION_MS)]
        delta_ms: u32,

        /// Tiles each agent walks per tick
        #[arg(long, default_value = "1")]
        tiles_per_step: u32,

        /// Pretty-print the JSON output
        #[arg(long)]
        pretty: bool,
    },

    /// Run a scenario several times in parallel and compare state hashes
    Verify {
        /// Scenario file to load (built-in village if omitted)
        #[arg(short, long)]
        scenario: Option<PathBuf>,

        /// Building catalog override (RON)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Number of ticks per run
        #[arg(short, long, default_value = "1200")]
        ticks: u64,

        /// Number of runs
        #[arg(short, long, default_value = "4")]
        runs: u32,
    },

    /// Print the built-in building catalog as RON
    Catalog,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the JSON report
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Run {
            scenario,
            catalog,
            ticks,
            delta_ms,
            tiles_per_step,
            pretty,
        } => cmd_run(
            scenario.as_deref(),
            catalog.as_deref(),
            ticks,
            HeadlessConfig {
                delta_ms,
                tiles_per_step,
            },
            pretty,
        ),
        Commands::Verify {
            scenario,
            catalog,
            ticks,
            runs,
        } => cmd_verify(scenario.as_deref(), catalog.as_deref(), ticks, runs),
        Commands::Catalog => cmd_catalog(),
    };

    match result {
        Ok(code) => code,
        Err(message) => {
            tracing::error!("{message}");
            eprintln!("FATAL: {message}");
            ExitCode::FAILURE
        }
    }
}

fn load_scenario(path: Option<&Path>) -> Result<Scenario, String> {
    match path {
        Some(path) => {
            tracing::info!(path = %path.display(), "loading scenario");
            Scenario::load(path).map_err(|e| e.to_string())
        }
        None => Ok(Scenario::village()),
    }
}

fn load_catalog(path: Option<&Path>) -> Result<BuildingCatalog, String> {
    let Some(path) = path else {
        return Ok(BuildingCatalog::standard());
    };
    let text = std::fs::read_to_string(path)
        .map_err(|e| format!("Failed to read catalog {}: {e}", path.display()))?;
    BuildingCatalog::from_ron_str(&text, &path.display().to_string()).map_err(|e| e.to_string())
}

/// Run a single scenario
fn cmd_run(
    scenario: Option<&Path>,
    catalog: Option<&Path>,
    ticks: u64,
    config: HeadlessConfig,
    pretty: bool,
) -> Result<ExitCode, String> {
    let scenario = load_scenario(scenario)?;
    let catalog = load_catalog(catalog)?;
    let mut runner =
        HeadlessRunner::from_scenario(&scenario, catalog, config).map_err(|e| e.to_string())?;

    runner.run(ticks);

    let summary = runner.summary();
    let json = if pretty {
        serde_json::to_string_pretty(&summary)
    } else {
        serde_json::to_string(&summary)
    }
    .map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(ExitCode::SUCCESS)
}

/// Verify determinism
fn cmd_verify(
    scenario: Option<&Path>,
    catalog: Option<&Path>,
    ticks: u64,
    runs: u32,
) -> Result<ExitCode, String> {
    let scenario = load_scenario(scenario)?;
    let catalog = load_catalog(catalog)?;
    tracing::info!(scenario = %scenario.name, ticks, runs, "verifying determinism");

    let report = verify_determinism(&scenario, &catalog, HeadlessConfig::default(), ticks, runs)
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string(&report).map_err(|e| e.to_string())?;
    println!("{json}");

    if report.deterministic {
        eprintln!("PASS: All {runs} runs produced identical results");
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("FAIL: Non-determinism detected!");
        Ok(ExitCode::FAILURE)
    }
}

/// Dump the standard catalog
fn cmd_catalog() -> Result<ExitCode, String> {
    let text = ron::ser::to_string_pretty(
        &BuildingCatalog::standard(),
        ron::ser::PrettyConfig::default(),
    )
    .map_err(|e| e.to_string())?;
    println!("{text}");
    Ok(ExitCode::SUCCESS)
}
