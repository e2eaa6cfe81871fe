//! Zenith-dependent blend of geometric and disp directions (method 8).

use crate::domain::FitStatus;
use crate::reco::DirectionEstimate;

/// Below this `cos(zenith)` the disp result is used alone.
pub const BLEND_COS_THRESHOLD: f64 = 0.4;
const BLEND_SLOPE: f64 = 12.5;

/// Weight of the disp direction: 1 for `cos ze < 0.4`, otherwise
/// `exp(−12.5·(cos ze − 0.4)²)`.
pub fn blend_weight(cos_zenith: f64) -> f64 {
    if cos_zenith < BLEND_COS_THRESHOLD {
        1.0
    } else {
        (-BLEND_SLOPE * (cos_zenith - BLEND_COS_THRESHOLD).powi(2)).exp()
    }
}

/// Combine the two directions. If only one succeeded it is used unblended.
pub fn blend(
    geometric: Result<DirectionEstimate, FitStatus>,
    disp: Result<DirectionEstimate, FitStatus>,
    cos_zenith: f64,
) -> Result<DirectionEstimate, FitStatus> {
    match (geometric, disp) {
        (Ok(g), Ok(d)) => {
            let w = blend_weight(cos_zenith);
            let mut out = DirectionEstimate::new(
                (1.0 - w) * g.x + w * d.x,
                (1.0 - w) * g.y + w * d.y,
                (1.0 - w) * g.std + w * d.std,
            );
            out.disp_diff = d.disp_diff;
            out.contributions = d.contributions;
            Ok(out)
        }
        (Ok(g), Err(_)) => Ok(g),
        (Err(_), Ok(d)) => Ok(d),
        // The disp failure is the more specific one.
        (Err(_), Err(e)) => Err(e),
    }
}
