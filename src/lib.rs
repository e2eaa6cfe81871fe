//! `stereo-reco` library crate.
//!
//! Multi-telescope stereoscopic reconstruction of air-shower arrival
//! directions and core positions from per-telescope image parameters.
//!
//! The binary (`reco`) is a thin wrapper around this library so that:
//!
//! - reconstruction logic is testable without spawning processes
//! - the engine can be embedded by other analysis tools

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod estimators;
pub mod io;
pub mod math;
pub mod reco;
pub mod report;
