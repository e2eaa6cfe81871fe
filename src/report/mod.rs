//! Run-level summaries of reconstruction results.

use chrono::{DateTime, Utc};

use crate::domain::{EventReconstruction, FitStatus, ReconstructionMethod};
use crate::reco::pointing::MismatchSummary;

pub mod format;

pub use format::{format_methods, format_run_summary};

/// Outcome counts and accuracy of one configured method.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodSummary {
    pub method: ReconstructionMethod,
    pub n_events: usize,
    pub n_success: usize,
    pub n_insufficient: usize,
    pub n_degenerate: usize,
    pub n_numerical: usize,
    pub n_estimator: usize,
    pub n_out_of_plane: usize,
    /// Mean distance to the true source over successful events [deg].
    pub mean_angular_error: Option<f64>,
    /// Mean distance to the true core [m].
    pub mean_core_error: Option<f64>,
}

impl MethodSummary {
    fn new(method: ReconstructionMethod) -> Self {
        Self {
            method,
            n_events: 0,
            n_success: 0,
            n_insufficient: 0,
            n_degenerate: 0,
            n_numerical: 0,
            n_estimator: 0,
            n_out_of_plane: 0,
            mean_angular_error: None,
            mean_core_error: None,
        }
    }

    pub fn success_fraction(&self) -> f64 {
        if self.n_events == 0 {
            0.0
        } else {
            self.n_success as f64 / self.n_events as f64
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_number: u64,
    pub n_events: usize,
    pub methods: Vec<MethodSummary>,
    pub pointing: Vec<MismatchSummary>,
    pub generated_at: DateTime<Utc>,
}

/// Aggregate per-method statistics over all events.
///
/// Methods are taken in record order from the first event; every event
/// carries one record per configured method.
pub fn summarize(run_number: u64, events: &[EventReconstruction], pointing: Vec<MismatchSummary>) -> RunSummary {
    let mut methods: Vec<MethodSummary> = events
        .first()
        .map(|ev| ev.records.iter().map(|r| MethodSummary::new(r.method)).collect())
        .unwrap_or_default();
    let mut ang_sums = vec![(0.0, 0usize); methods.len()];
    let mut core_sums = vec![(0.0, 0usize); methods.len()];

    for ev in events {
        for (i, rec) in ev.records.iter().enumerate().take(methods.len()) {
            let m = &mut methods[i];
            m.n_events += 1;
            match rec.status {
                FitStatus::Success => m.n_success += 1,
                FitStatus::InsufficientImages => m.n_insufficient += 1,
                FitStatus::DegenerateGeometry => m.n_degenerate += 1,
                FitStatus::NumericalFailure => m.n_numerical += 1,
                FitStatus::EstimatorUnavailable => m.n_estimator += 1,
                FitStatus::CoreOutOfPlane => m.n_out_of_plane += 1,
                FitStatus::NotReconstructed => {}
            }
            let (Some(truth), true) = (ev.truth, rec.is_success()) else {
                continue;
            };
            let ang = (rec.x_offset - truth.x_offset).hypot(rec.y_offset - truth.y_offset);
            ang_sums[i].0 += ang;
            ang_sums[i].1 += 1;
            if rec.core_x != crate::domain::SENTINEL {
                core_sums[i].0 += (rec.core_x - truth.core_x).hypot(rec.core_y - truth.core_y);
                core_sums[i].1 += 1;
            }
        }
    }

    for (m, ((a, na), (c, nc))) in methods.iter_mut().zip(ang_sums.into_iter().zip(core_sums)) {
        m.mean_angular_error = (na > 0).then(|| a / na as f64);
        m.mean_core_error = (nc > 0).then(|| c / nc as f64);
    }

    RunSummary {
        run_number,
        n_events: events.len(),
        methods,
        pointing,
        generated_at: Utc::now(),
    }
}
