//! Command-line parsing for the `reco` binary.
//!
//! Argument parsing and dispatch stay out of the reconstruction code.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Environment variable holding the default reconstruction config path.
pub const CONFIG_ENV: &str = "STEREO_RECO_CONFIG";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "reco", version, about = "Stereoscopic air-shower direction and core reconstruction")]
pub struct Cli {
    /// Log filter (e.g. `debug`, `stereo_reco=trace`); overrides RUST_LOG.
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconstruct every event of a run with the configured methods.
    Reconstruct(ReconstructArgs),
    /// Generate a synthetic run with known shower directions and cores.
    Simulate(SimulateArgs),
    /// List reconstruction method ids and names.
    Methods,
}

#[derive(Debug, Args, Clone)]
pub struct ReconstructArgs {
    /// Reconstruction config JSON (defaults to $STEREO_RECO_CONFIG).
    #[arg(short, long, value_name = "JSON")]
    pub config: Option<PathBuf>,

    /// Run input JSON.
    #[arg(short, long, value_name = "JSON")]
    pub input: PathBuf,

    /// Output records, one JSON object per line.
    #[arg(short, long, value_name = "JSONL")]
    pub output: PathBuf,

    /// Also write the records as CSV.
    #[arg(long, value_name = "CSV")]
    pub csv: Option<PathBuf>,

    /// Do not print the run summary.
    #[arg(long)]
    pub quiet: bool,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output run JSON.
    #[arg(short, long, value_name = "JSON")]
    pub output: PathBuf,

    /// Number of telescopes on the ring.
    #[arg(short, long, default_value_t = 4)]
    pub telescopes: usize,

    /// Number of events.
    #[arg(short = 'n', long, default_value_t = 100)]
    pub events: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Distance of each telescope from the array centre [m].
    #[arg(long, default_value_t = 100.0)]
    pub spacing: f64,

    /// Array pointing elevation [deg].
    #[arg(long, default_value_t = 70.0)]
    pub elevation: f64,

    /// Array pointing azimuth [deg].
    #[arg(long, default_value_t = 180.0)]
    pub azimuth: f64,

    /// Maximum source offset from the pointing direction [deg].
    #[arg(long, default_value_t = 1.0)]
    pub max_offset: f64,

    /// Maximum core coordinate [m].
    #[arg(long, default_value_t = 150.0)]
    pub max_core: f64,

    /// Generate noise-free images and pointing.
    #[arg(long)]
    pub no_noise: bool,
}
