//! Event reconstruction.
//!
//! Per event the flow is:
//!
//! 1. [`EventContext::prepare`]: apply pointing corrections and collect
//!    everything the methods share (geometry, pointing frame, images)
//! 2. per configured method, select images ([`selection`])
//! 3. reconstruct a direction (geometric, disp or blend)
//! 4. reconstruct the core with that direction ([`impact`])
//!
//! [`Reconstructor`] drives steps 2-4 and always returns one record per
//! configured method.

use crate::domain::{DispContribution, FitStatus};

pub mod blend;
pub mod context;
pub mod disp;
pub mod engine;
pub mod geometric;
pub mod impact;
pub mod pointing;
pub mod selection;

pub use context::{EventContext, SelectedImage};
pub use engine::{EstimatorId, Reconstructor};
pub use pointing::PointingMismatchStats;

/// Direction found by one method, as an offset from the array pointing in
/// camera coordinates [deg].
#[derive(Debug, Clone, PartialEq)]
pub struct DirectionEstimate {
    pub x: f64,
    pub y: f64,
    /// Spread of the contributing lines/points around the result.
    pub std: f64,
    pub disp_diff: Option<f64>,
    pub contributions: Vec<DispContribution>,
}

impl DirectionEstimate {
    pub fn new(x: f64, y: f64, std: f64) -> Self {
        Self {
            x,
            y,
            std,
            disp_diff: None,
            contributions: Vec::new(),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Direction stage result plus diagnostics that survive a failure.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutcome {
    pub direction: Result<DirectionEstimate, FitStatus>,
    /// Angle between the axes of a two-image selection.
    pub axes_angle_deg: Option<f64>,
}

impl MethodOutcome {
    pub fn failed(status: FitStatus) -> Self {
        Self {
            direction: Err(status),
            axes_angle_deg: None,
        }
    }
}
