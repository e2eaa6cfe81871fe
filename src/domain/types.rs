//! Shared domain types.
//!
//! Inputs (images, geometry, pointing) are plain serde structs so a run can be
//! described in a single JSON file. The per-method output record is kept as
//! an in-memory type; the exporter flattens it (and packs the telescope
//! selection into a bitcode) at the persistence boundary.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Largest telescope count the selection bitcode can represent.
pub const MAX_TELESCOPES: usize = 64;

/// Value written into direction/core fields that were not reconstructed.
pub const SENTINEL: f64 = -99999.0;

/// Position of a telescope in the run's telescope list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TelescopeIndex(pub usize);

impl TelescopeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for TelescopeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0 + 1)
    }
}

/// How an image's parameters were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitState {
    /// Plain second-moment (Hillas) parameterization.
    #[default]
    Moments,
    /// Log-likelihood image fit converged.
    Converged,
    /// Log-likelihood image fit was attempted and failed.
    Failed,
}

/// Second moments of the image about its centroid [deg^2].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SecondMoments {
    pub sigma_x2: f64,
    pub sigma_y2: f64,
    pub sigma_xy: f64,
}

fn default_true() -> bool {
    true
}

/// Ellipse parameterization of one telescope image.
///
/// All angular quantities are in degrees in the camera frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRecord {
    pub cen_x: f64,
    pub cen_y: f64,
    /// Orientation of the major axis.
    pub phi: f64,
    pub size: f64,
    pub width: f64,
    pub length: f64,
    #[serde(default)]
    pub loss: f64,
    /// Distance of the centroid from the camera centre.
    #[serde(default)]
    pub dist: f64,
    #[serde(default)]
    pub asymmetry: f64,
    /// Time gradient along the major axis.
    #[serde(default)]
    pub tgrad: f64,
    #[serde(default)]
    pub ntubes: u32,
    #[serde(default)]
    pub mean_pedvar: f64,
    #[serde(default)]
    pub tel_type: u64,
    #[serde(default)]
    pub fit_status: FitState,
    #[serde(default)]
    pub moments: Option<SecondMoments>,
    /// Angular distance to the closest bright star, if the star check ran.
    #[serde(default)]
    pub star_distance: Option<f64>,
    #[serde(default = "default_true")]
    pub local_trigger: bool,
}

impl ImageRecord {
    /// `width / length`; 1 for a degenerate (zero-length) image.
    pub fn shape_ratio(&self) -> f64 {
        if self.length > 0.0 {
            self.width / self.length
        } else {
            1.0
        }
    }

    /// `1 - width / length`.
    pub fn ellipticity(&self) -> f64 {
        1.0 - self.shape_ratio()
    }

    /// Slope of the major axis in the camera frame.
    pub fn axis_slope(&self) -> f64 {
        self.phi.to_radians().tan()
    }
}

/// Static telescope description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelescopeGeometry {
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub z: f64,
    /// Focal length [m].
    pub focal_length: f64,
    #[serde(default)]
    pub tel_type: u64,
}

/// Per-telescope pointing for one event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointingRecord {
    pub elevation: f64,
    pub azimuth: f64,
    /// Pointing-error offsets in the camera frame [deg].
    #[serde(default)]
    pub error_dx: Option<f64>,
    #[serde(default)]
    pub error_dy: Option<f64>,
}

/// Array reference pointing for one event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrayPointing {
    pub elevation: f64,
    pub azimuth: f64,
}

impl ArrayPointing {
    pub fn zenith(&self) -> f64 {
        90.0 - self.elevation
    }
}

/// Everything one telescope contributes to an event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelescopeEvent {
    #[serde(default)]
    pub image: Option<ImageRecord>,
    /// Optional log-likelihood fit variant of the same image.
    #[serde(default)]
    pub likelihood_image: Option<ImageRecord>,
    #[serde(default)]
    pub pointing: Option<PointingRecord>,
}

/// True shower parameters, present for simulated events.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShowerTruth {
    pub x_offset: f64,
    pub y_offset: f64,
    pub core_x: f64,
    pub core_y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    pub event_number: u64,
    pub array_pointing: ArrayPointing,
    pub telescopes: Vec<TelescopeEvent>,
    #[serde(default)]
    pub truth: Option<ShowerTruth>,
}

/// A full run: detector layout plus its events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInput {
    pub run_number: u64,
    pub telescopes: Vec<TelescopeGeometry>,
    pub events: Vec<EventInput>,
}

impl RunInput {
    /// Mean array zenith over all events (used to pick estimator models).
    pub fn mean_zenith(&self) -> Option<f64> {
        if self.events.is_empty() {
            return None;
        }
        let sum: f64 = self.events.iter().map(|e| e.array_pointing.zenith()).sum();
        Some(sum / self.events.len() as f64)
    }
}

/// Reconstruction algorithm variants.
///
/// The numeric ids are the ones used in output files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconstructionMethod {
    /// Global weighted intersection of all image axes.
    Intersection,
    /// Pairwise intersections, HEGRA weighting.
    HegraPair,
    /// Pairwise intersections, ellipticity weighting.
    ModifiedPair,
    DispMlp,
    DispBdt,
    DispTable,
    /// Zenith-weighted blend of `ModifiedPair` and `DispBdt`.
    ZenithBlend,
}

impl ReconstructionMethod {
    pub const ALL: [ReconstructionMethod; 7] = [
        ReconstructionMethod::Intersection,
        ReconstructionMethod::HegraPair,
        ReconstructionMethod::ModifiedPair,
        ReconstructionMethod::DispMlp,
        ReconstructionMethod::DispBdt,
        ReconstructionMethod::DispTable,
        ReconstructionMethod::ZenithBlend,
    ];

    pub fn id(self) -> u8 {
        match self {
            ReconstructionMethod::Intersection => 0,
            ReconstructionMethod::HegraPair => 3,
            ReconstructionMethod::ModifiedPair => 4,
            ReconstructionMethod::DispMlp => 5,
            ReconstructionMethod::DispBdt => 6,
            ReconstructionMethod::DispTable => 7,
            ReconstructionMethod::ZenithBlend => 8,
        }
    }

    pub fn from_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.id() == id)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            ReconstructionMethod::Intersection => "intersection",
            ReconstructionMethod::HegraPair => "hegra_pair",
            ReconstructionMethod::ModifiedPair => "modified_pair",
            ReconstructionMethod::DispMlp => "disp_mlp",
            ReconstructionMethod::DispBdt => "disp_bdt",
            ReconstructionMethod::DispTable => "disp_table",
            ReconstructionMethod::ZenithBlend => "zenith_blend",
        }
    }

    /// Pure line-intersection methods.
    pub fn is_geometric(self) -> bool {
        matches!(
            self,
            ReconstructionMethod::Intersection
                | ReconstructionMethod::HegraPair
                | ReconstructionMethod::ModifiedPair
        )
    }

    /// Methods that evaluate a learned disp estimator.
    pub fn needs_estimator(self) -> bool {
        !self.is_geometric()
    }
}

impl fmt::Display for ReconstructionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id())
    }
}

/// Which image parameterization a method consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageVariant {
    #[default]
    Geometric,
    /// Likelihood-fit image when present, otherwise the geometric one.
    Likelihood,
}

/// Per-method image acceptance thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageCuts {
    pub size_min: f64,
    pub ntubes_min: u32,
    pub shape_ratio_min: f64,
    pub shape_ratio_max: f64,
    pub dist_max: Option<f64>,
    pub loss_max: Option<f64>,
    /// Accepted telescope types; all types when empty.
    pub tel_types: Vec<u64>,
    pub require_local_trigger: bool,
    /// Minimum angular distance to a bright star.
    pub star_distance_min: Option<f64>,
}

impl Default for ImageCuts {
    fn default() -> Self {
        Self {
            size_min: 0.0,
            ntubes_min: 0,
            shape_ratio_min: 0.0,
            shape_ratio_max: 1.0,
            dist_max: None,
            loss_max: None,
            tel_types: Vec::new(),
            require_local_trigger: false,
            star_distance_min: None,
        }
    }
}

/// Run `method` instead when more than `above_images` images are selected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DemoteRule {
    pub above_images: usize,
    pub method: ReconstructionMethod,
}

/// A model file valid around one zenith angle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZenithModel {
    pub zenith_deg: f64,
    pub path: PathBuf,
}

/// Where a disp method gets its estimator from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EstimatorSource {
    /// Load the model whose zenith bin is closest to the run's mean zenith.
    Models { models: Vec<ZenithModel> },
    /// Reuse the estimator of another configured method (index into the
    /// method list).
    SameAs { same_as: usize },
}

fn default_min_images() -> usize {
    2
}

fn default_min_axes_angle() -> f64 {
    10.0
}

/// Static configuration of one reconstruction method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodConfig {
    pub method: ReconstructionMethod,
    #[serde(default = "default_min_images")]
    pub min_images: usize,
    /// Minimum angle between two image axes [deg].
    #[serde(default = "default_min_axes_angle")]
    pub min_axes_angle_deg: f64,
    #[serde(default)]
    pub cuts: ImageCuts,
    #[serde(default)]
    pub image_variant: ImageVariant,
    #[serde(default)]
    pub require_converged_fit: bool,
    #[serde(default)]
    pub estimator: Option<EstimatorSource>,
    #[serde(default)]
    pub demote: Option<DemoteRule>,
}

impl MethodConfig {
    pub fn new(method: ReconstructionMethod) -> Self {
        Self {
            method,
            min_images: default_min_images(),
            min_axes_angle_deg: default_min_axes_angle(),
            cuts: ImageCuts::default(),
            image_variant: ImageVariant::default(),
            require_converged_fit: false,
            estimator: None,
            demote: None,
        }
    }
}

/// Outcome class of one method on one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    NotReconstructed,
    Success,
    InsufficientImages,
    /// Two image axes (nearly) parallel.
    DegenerateGeometry,
    NumericalFailure,
    EstimatorUnavailable,
    /// Core back-transform left the ground plane by more than 1 km.
    CoreOutOfPlane,
}

impl FitStatus {
    /// Legacy `chi2` status code.
    pub fn chi2(self) -> f64 {
        match self {
            FitStatus::NotReconstructed => SENTINEL,
            FitStatus::Success => 0.0,
            FitStatus::InsufficientImages | FitStatus::DegenerateGeometry => -1.0,
            FitStatus::NumericalFailure | FitStatus::EstimatorUnavailable => -2.0,
            FitStatus::CoreOutOfPlane => -9999.0,
        }
    }
}

/// Per-image contribution to a disp direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispContribution {
    pub tel: TelescopeIndex,
    pub disp: f64,
    pub uncertainty: Option<f64>,
    /// Chosen candidate source position [deg].
    pub x: f64,
    pub y: f64,
    pub weight: f64,
}

/// Result of one reconstruction method for one event.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconstructionRecord {
    /// Method as configured.
    pub method: ReconstructionMethod,
    /// Method that actually ran (differs after demotion).
    pub method_used: ReconstructionMethod,
    pub status: FitStatus,
    pub selected: BTreeSet<TelescopeIndex>,
    /// Direction offset from the array pointing in the camera frame [deg].
    pub x_offset: f64,
    pub y_offset: f64,
    pub direction_std: f64,
    pub zenith: f64,
    pub azimuth: f64,
    /// Core in ground coordinates [m].
    pub core_x: f64,
    pub core_y: f64,
    /// Core in the shower plane [m].
    pub shower_core_x: f64,
    pub shower_core_y: f64,
    pub core_std: f64,
    /// Angle between the two image axes of a two-image event [deg].
    pub axes_angle_deg: f64,
    pub disp_diff: f64,
    pub disp_contributions: Vec<DispContribution>,
}

impl ReconstructionRecord {
    /// Fresh record with every field at its sentinel.
    pub fn reset(method: ReconstructionMethod) -> Self {
        Self {
            method,
            method_used: method,
            status: FitStatus::NotReconstructed,
            selected: BTreeSet::new(),
            x_offset: SENTINEL,
            y_offset: SENTINEL,
            direction_std: SENTINEL,
            zenith: SENTINEL,
            azimuth: SENTINEL,
            core_x: SENTINEL,
            core_y: SENTINEL,
            shower_core_x: SENTINEL,
            shower_core_y: SENTINEL,
            core_std: SENTINEL,
            axes_angle_deg: SENTINEL,
            disp_diff: SENTINEL,
            disp_contributions: Vec::new(),
        }
    }

    /// Mark the record as failed, putting direction and core back to sentinel.
    ///
    /// Selection and diagnostics (angle, disp spread) are kept.
    pub fn fail(&mut self, status: FitStatus) {
        self.status = status;
        self.x_offset = SENTINEL;
        self.y_offset = SENTINEL;
        self.direction_std = SENTINEL;
        self.zenith = SENTINEL;
        self.azimuth = SENTINEL;
        self.core_x = SENTINEL;
        self.core_y = SENTINEL;
        self.shower_core_x = SENTINEL;
        self.shower_core_y = SENTINEL;
        self.core_std = SENTINEL;
    }

    pub fn n_images(&self) -> usize {
        self.selected.len()
    }

    pub fn chi2(&self) -> f64 {
        self.status.chi2()
    }

    pub fn is_success(&self) -> bool {
        self.status == FitStatus::Success
    }

    /// Bit `i` set iff telescope `i` took part in the fit.
    pub fn selection_bitcode(&self) -> u64 {
        self.selected
            .iter()
            .filter(|t| t.index() < MAX_TELESCOPES)
            .fold(0u64, |acc, t| acc | (1u64 << t.index()))
    }
}

/// All records of one event, plus the truth when it is known.
#[derive(Debug, Clone, PartialEq)]
pub struct EventReconstruction {
    pub event_number: u64,
    pub records: Vec<ReconstructionRecord>,
    pub truth: Option<ShowerTruth>,
}
