//! Synthetic data generation.

pub mod sample;

pub use sample::{NoiseLevel, SimulationConfig, ring_layout, simulate_run, synthetic_event};
