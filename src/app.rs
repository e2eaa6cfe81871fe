//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - reads configs and run files
//! - runs the reconstruction pipeline or the event generator
//! - writes exports and prints the run summary

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{CONFIG_ENV, Cli, Command, ReconstructArgs, SimulateArgs};
use crate::data::{NoiseLevel, SimulationConfig, simulate_run};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `reco` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_logging(cli.log_level.as_deref());

    match cli.command {
        Command::Reconstruct(args) => handle_reconstruct(args),
        Command::Simulate(args) => handle_simulate(args),
        Command::Methods => {
            print!("{}", crate::report::format_methods());
            Ok(())
        }
    }
}

fn init_logging(level: Option<&str>) {
    let filter = match level {
        Some(l) => EnvFilter::new(l),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    // Already set when embedded in a test harness.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_reconstruct(args: ReconstructArgs) -> Result<(), AppError> {
    let config_path = resolve_config_path(args.config.clone())?;
    let config = crate::io::read_config(&config_path)?;
    let run = crate::io::read_run(&args.input)?;

    let output = pipeline::run_reconstruction(&config, &run)?;

    crate::io::write_records_jsonl(&args.output, run.run_number, &output.events)?;
    info!(path = %args.output.display(), "wrote records");
    if let Some(path) = &args.csv {
        crate::io::write_records_csv(path, run.run_number, &output.events)?;
        info!(path = %path.display(), "wrote CSV export");
    }

    if !args.quiet {
        println!("{}", crate::report::format_run_summary(&output.summary));
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = simulation_config_from_args(&args);
    let run = simulate_run(&config)?;
    crate::io::write_run(&args.output, &run)?;
    info!(
        path = %args.output.display(),
        events = run.events.len(),
        telescopes = run.telescopes.len(),
        "wrote simulated run"
    );
    Ok(())
}

/// `--config` wins over `$STEREO_RECO_CONFIG`.
fn resolve_config_path(arg: Option<PathBuf>) -> Result<PathBuf, AppError> {
    if let Some(path) = arg {
        return Ok(path);
    }
    match std::env::var(CONFIG_ENV) {
        Ok(v) if !v.trim().is_empty() => Ok(PathBuf::from(v)),
        _ => Err(AppError::config(format!(
            "No reconstruction config given; pass --config or set {CONFIG_ENV}."
        ))),
    }
}

pub fn simulation_config_from_args(args: &SimulateArgs) -> SimulationConfig {
    SimulationConfig {
        telescopes: args.telescopes,
        events: args.events,
        seed: args.seed,
        spacing: args.spacing,
        elevation: args.elevation,
        azimuth: args.azimuth,
        max_offset: args.max_offset,
        max_core: args.max_core,
        noise: if args.no_noise {
            NoiseLevel::none()
        } else {
            NoiseLevel::default()
        },
        ..SimulationConfig::default()
    }
}
