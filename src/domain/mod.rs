//! Domain types used throughout the reconstruction.
//!
//! This module defines:
//!
//! - inputs: images, telescope geometry, pointing, run/event containers
//! - configuration: reconstruction methods, cuts, estimator sources
//! - outputs: `ReconstructionRecord` and its `FitStatus`

pub mod types;

pub use types::*;
