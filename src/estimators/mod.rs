//! Learned per-image disp estimators.
//!
//! A disp estimator predicts, from one image's parameters, the angular
//! distance between the image centroid and the source along the major axis.
//! The reconstruction only sees the [`DispEstimator`] trait; three model
//! families sit behind it:
//!
//! - [`MlpEstimator`]: small feed-forward network (`disp_mlp`)
//! - [`BdtEstimator`]: boosted regression trees (`disp_bdt`, `zenith_blend`)
//! - [`TableEstimator`]: binned lookup table (`disp_table`)
//!
//! Models are JSON files. A file that is missing or unparsable is a fatal
//! configuration error; a file that parses but describes an unusable model
//! (`"valid": false`, inconsistent shapes) loads as an *invalid* estimator
//! and every event then reports the method as estimator-unavailable.

use std::fmt;
use std::fs::File;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::domain::{ImageRecord, ReconstructionMethod, ZenithModel};
use crate::error::AppError;

pub mod bdt;
pub mod mlp;
pub mod table;

pub use bdt::BdtEstimator;
pub use mlp::MlpEstimator;
pub use table::TableEstimator;

/// Inputs to a disp estimator for one image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispFeatures {
    pub width: f64,
    pub length: f64,
    pub asymmetry: f64,
    pub dist: f64,
    pub size: f64,
    pub mean_pedvar: f64,
    pub tgrad: f64,
    pub loss: f64,
    pub cen_x: f64,
    pub cen_y: f64,
    /// Seed direction from the geometric reconstruction [deg].
    pub seed_x: f64,
    pub seed_y: f64,
    pub tel_type: u64,
    pub zenith: f64,
    pub azimuth: f64,
}

impl DispFeatures {
    pub fn from_image(image: &ImageRecord, seed: (f64, f64), zenith: f64, azimuth: f64) -> Self {
        Self {
            width: image.width,
            length: image.length,
            asymmetry: image.asymmetry,
            dist: image.dist,
            size: image.size,
            mean_pedvar: image.mean_pedvar,
            tgrad: image.tgrad,
            loss: image.loss,
            cen_x: image.cen_x,
            cen_y: image.cen_y,
            seed_x: seed.0,
            seed_y: seed.1,
            tel_type: image.tel_type,
            zenith,
            azimuth,
        }
    }
}

/// Named model input, so model files can choose and order their inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Width,
    Length,
    /// `width / length`
    ShapeRatio,
    Asymmetry,
    Dist,
    Size,
    /// `log10(size)`
    LogSize,
    MeanPedvar,
    Tgrad,
    Loss,
    CenX,
    CenY,
    SeedX,
    SeedY,
    TelType,
    Zenith,
    Azimuth,
}

impl Feature {
    pub fn value(self, f: &DispFeatures) -> f64 {
        match self {
            Feature::Width => f.width,
            Feature::Length => f.length,
            Feature::ShapeRatio => {
                if f.length > 0.0 {
                    f.width / f.length
                } else {
                    1.0
                }
            }
            Feature::Asymmetry => f.asymmetry,
            Feature::Dist => f.dist,
            Feature::Size => f.size,
            Feature::LogSize => f.size.max(1e-9).log10(),
            Feature::MeanPedvar => f.mean_pedvar,
            Feature::Tgrad => f.tgrad,
            Feature::Loss => f.loss,
            Feature::CenX => f.cen_x,
            Feature::CenY => f.cen_y,
            Feature::SeedX => f.seed_x,
            Feature::SeedY => f.seed_y,
            Feature::TelType => f.tel_type as f64,
            Feature::Zenith => f.zenith,
            Feature::Azimuth => f.azimuth,
        }
    }

    /// Default input list: every raw image feature plus seed and pointing.
    pub fn default_inputs() -> Vec<Feature> {
        vec![
            Feature::Width,
            Feature::Length,
            Feature::Asymmetry,
            Feature::Dist,
            Feature::Size,
            Feature::MeanPedvar,
            Feature::Tgrad,
            Feature::Loss,
            Feature::CenX,
            Feature::CenY,
            Feature::SeedX,
            Feature::SeedY,
            Feature::TelType,
            Feature::Zenith,
            Feature::Azimuth,
        ]
    }
}

/// Build the model input vector for a feature list.
pub fn feature_vector(inputs: &[Feature], f: &DispFeatures) -> Vec<f64> {
    inputs.iter().map(|feat| feat.value(f)).collect()
}

/// Estimated displacement and (optionally) its uncertainty [deg].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DispPrediction {
    pub disp: f64,
    pub uncertainty: Option<f64>,
}

impl DispPrediction {
    fn checked(disp: f64, uncertainty: Option<f64>) -> Option<Self> {
        if !disp.is_finite() {
            return None;
        }
        let uncertainty = uncertainty.filter(|u| u.is_finite() && *u > 0.0);
        Some(Self { disp, uncertainty })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimatorKind {
    Mlp,
    Bdt,
    Table,
}

impl EstimatorKind {
    /// Model family used by a reconstruction method.
    pub fn for_method(method: ReconstructionMethod) -> Option<Self> {
        match method {
            ReconstructionMethod::DispMlp => Some(EstimatorKind::Mlp),
            ReconstructionMethod::DispBdt | ReconstructionMethod::ZenithBlend => {
                Some(EstimatorKind::Bdt)
            }
            ReconstructionMethod::DispTable => Some(EstimatorKind::Table),
            _ => None,
        }
    }
}

impl fmt::Display for EstimatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EstimatorKind::Mlp => "mlp",
            EstimatorKind::Bdt => "bdt",
            EstimatorKind::Table => "table",
        };
        write!(f, "{s}")
    }
}

/// Single-image displacement estimator.
pub trait DispEstimator: fmt::Debug {
    fn kind(&self) -> EstimatorKind;

    /// `false` if the model was flagged unusable at load time.
    fn is_valid(&self) -> bool;

    /// `None` when the model cannot produce a finite prediction.
    fn evaluate(&self, features: &DispFeatures) -> Option<DispPrediction>;
}

/// Pick the model whose zenith bin is closest to `zenith`.
pub fn select_model(models: &[ZenithModel], zenith: f64) -> Option<&ZenithModel> {
    models.iter().min_by(|a, b| {
        let da = (a.zenith_deg - zenith).abs();
        let db = (b.zenith_deg - zenith).abs();
        da.partial_cmp(&db).unwrap_or(std::cmp::Ordering::Equal)
    })
}

/// Load an estimator of the given family from a JSON model file.
pub fn load_estimator(kind: EstimatorKind, path: &Path) -> Result<Box<dyn DispEstimator>, AppError> {
    let estimator: Box<dyn DispEstimator> = match kind {
        EstimatorKind::Mlp => Box::new(MlpEstimator::from_model(read_model(path)?)),
        EstimatorKind::Bdt => Box::new(BdtEstimator::from_model(read_model(path)?)),
        EstimatorKind::Table => Box::new(TableEstimator::from_model(read_model(path)?)),
    };

    if estimator.is_valid() {
        info!(kind = %kind, path = %path.display(), "loaded disp estimator");
    } else {
        warn!(kind = %kind, path = %path.display(), "disp estimator marked invalid");
    }
    Ok(estimator)
}

fn read_model<T: DeserializeOwned>(path: &Path) -> Result<T, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::config(format!("Failed to open disp model '{}': {e}", path.display()))
    })?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::input(format!("Invalid disp model '{}': {e}", path.display())))
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    pub(crate) fn sample_features() -> DispFeatures {
        DispFeatures {
            width: 0.1,
            length: 0.3,
            asymmetry: 0.2,
            dist: 1.0,
            size: 1000.0,
            mean_pedvar: 5.0,
            tgrad: 1.2,
            loss: 0.0,
            cen_x: 0.5,
            cen_y: -0.2,
            seed_x: 0.0,
            seed_y: 0.0,
            tel_type: 1,
            zenith: 20.0,
            azimuth: 180.0,
        }
    }

    #[test]
    fn derived_features() {
        let f = sample_features();
        assert!((Feature::ShapeRatio.value(&f) - 1.0 / 3.0).abs() < 1e-12);
        assert!((Feature::LogSize.value(&f) - 3.0).abs() < 1e-12);
        assert_eq!(feature_vector(&Feature::default_inputs(), &f).len(), 15);
    }

    #[test]
    fn closest_zenith_model_is_selected() {
        let models = vec![
            ZenithModel { zenith_deg: 20.0, path: PathBuf::from("ze20.json") },
            ZenithModel { zenith_deg: 40.0, path: PathBuf::from("ze40.json") },
            ZenithModel { zenith_deg: 60.0, path: PathBuf::from("ze60.json") },
        ];
        assert_eq!(select_model(&models, 47.0).unwrap().zenith_deg, 40.0);
        assert_eq!(select_model(&models, 5.0).unwrap().zenith_deg, 20.0);
        assert!(select_model(&[], 5.0).is_none());
    }

    #[test]
    fn missing_model_file_is_fatal() {
        let err = load_estimator(EstimatorKind::Bdt, Path::new("/nonexistent/bdt.json")).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_CONFIG);
    }

    #[test]
    fn prediction_drops_unusable_uncertainty() {
        let p = DispPrediction::checked(0.8, Some(-1.0)).unwrap();
        assert_eq!(p.uncertainty, None);
        assert!(DispPrediction::checked(f64::NAN, None).is_none());
    }
}
