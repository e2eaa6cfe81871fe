//! Direction reconstruction from per-image displacement estimates.
//!
//! Each image yields two candidate source positions, `centroid ± disp` along
//! its major axis. One candidate per image is chosen, then the chosen points
//! are averaged with weights `1/uncertainty` (or `ntubes·(1 − width/length)`
//! when the estimator gives no uncertainty).
//!
//! Candidate choice:
//! - with a seed direction: the candidate closest to the seed
//! - without a seed, 2..=12 images: the sign combination with the smallest
//!   weighted spread
//! - otherwise: the head-tail asymmetry decides

use tracing::debug;

use crate::domain::{DispContribution, FitStatus, ImageRecord};
use crate::estimators::{DispEstimator, DispFeatures, DispPrediction};
use crate::reco::{DirectionEstimate, EventContext, SelectedImage};

/// Largest image count for the exhaustive sign search.
pub const MAX_EXHAUSTIVE_IMAGES: usize = 12;

#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    image: &'a SelectedImage<'a>,
    prediction: DispPrediction,
    /// `[centroid − disp·u, centroid + disp·u]` with `u` along `phi`.
    points: [(f64, f64); 2],
    weight: f64,
}

/// Reconstruct the direction with a disp estimator.
pub fn reconstruct(
    ctx: &EventContext<'_>,
    images: &[SelectedImage<'_>],
    estimator: &dyn DispEstimator,
    seed: Option<(f64, f64)>,
) -> Result<DirectionEstimate, FitStatus> {
    if !estimator.is_valid() {
        return Err(FitStatus::EstimatorUnavailable);
    }
    let zenith = ctx.array_pointing.zenith();
    let azimuth = ctx.array_pointing.azimuth;
    let seed_feature = seed.unwrap_or((0.0, 0.0));

    let mut candidates = Vec::with_capacity(images.len());
    for s in images {
        let features = DispFeatures::from_image(s.image, seed_feature, zenith, azimuth);
        let Some(prediction) = estimator.evaluate(&features) else {
            debug!(event = ctx.event_number, tel = %s.tel, "no disp prediction");
            continue;
        };
        candidates.push(Candidate {
            image: s,
            prediction,
            points: candidate_points(s.image, prediction.disp),
            weight: weight(s.image, &prediction),
        });
    }
    if candidates.is_empty() {
        return Err(FitStatus::EstimatorUnavailable);
    }

    let choice = match seed {
        Some(seed) => closest_to_seed(&candidates, seed),
        None if (2..=MAX_EXHAUSTIVE_IMAGES).contains(&candidates.len()) => min_spread(&candidates),
        None => by_asymmetry(&candidates),
    };
    let chosen: Vec<(f64, f64)> = candidates
        .iter()
        .zip(&choice)
        .map(|(c, &k)| c.points[k])
        .collect();
    let weights: Vec<f64> = candidates.iter().map(|c| c.weight).collect();

    let (x, y, std) = weighted_mean(&chosen, &weights).ok_or(FitStatus::NumericalFailure)?;

    let mut disp_diff = 0.0;
    for (i, p) in chosen.iter().enumerate() {
        for q in &chosen[i + 1..] {
            disp_diff += (p.0 - q.0).powi(2) + (p.1 - q.1).powi(2);
        }
    }

    let contributions = candidates
        .iter()
        .zip(&chosen)
        .map(|(c, &(px, py))| DispContribution {
            tel: c.image.tel,
            disp: c.prediction.disp,
            uncertainty: c.prediction.uncertainty,
            x: px,
            y: py,
            weight: c.weight,
        })
        .collect();

    Ok(DirectionEstimate {
        x,
        y,
        std,
        disp_diff: Some(disp_diff),
        contributions,
    })
}

fn candidate_points(image: &ImageRecord, disp: f64) -> [(f64, f64); 2] {
    let (sin, cos) = image.phi.to_radians().sin_cos();
    [
        (image.cen_x - disp * cos, image.cen_y - disp * sin),
        (image.cen_x + disp * cos, image.cen_y + disp * sin),
    ]
}

fn weight(image: &ImageRecord, prediction: &DispPrediction) -> f64 {
    match prediction.uncertainty {
        Some(u) => 1.0 / u,
        None => image.ntubes as f64 * image.ellipticity(),
    }
}

fn closest_to_seed(candidates: &[Candidate<'_>], seed: (f64, f64)) -> Vec<usize> {
    let dist2 = |p: (f64, f64)| (p.0 - seed.0).powi(2) + (p.1 - seed.1).powi(2);
    candidates
        .iter()
        .map(|c| usize::from(dist2(c.points[1]) < dist2(c.points[0])))
        .collect()
}

/// Positive asymmetry: the source lies on the head side, against `phi`.
fn by_asymmetry(candidates: &[Candidate<'_>]) -> Vec<usize> {
    candidates
        .iter()
        .map(|c| usize::from(c.image.image.asymmetry < 0.0))
        .collect()
}

fn min_spread(candidates: &[Candidate<'_>]) -> Vec<usize> {
    let n = candidates.len();
    let weights: Vec<f64> = candidates.iter().map(|c| c.weight).collect();
    let mut best: Option<(f64, u32)> = None;
    let mut points = Vec::with_capacity(n);

    for mask in 0u32..(1u32 << n) {
        points.clear();
        points.extend(
            candidates
                .iter()
                .enumerate()
                .map(|(i, c)| c.points[((mask >> i) & 1) as usize]),
        );
        let Some((_, _, std)) = weighted_mean(&points, &weights) else {
            continue;
        };
        if best.is_none_or(|(s, _)| std < s) {
            best = Some((std, mask));
        }
    }

    match best {
        Some((_, mask)) => (0..n).map(|i| ((mask >> i) & 1) as usize).collect(),
        None => by_asymmetry(candidates),
    }
}

/// Weighted mean and weighted RMS spread; `None` without positive weight.
fn weighted_mean(points: &[(f64, f64)], weights: &[f64]) -> Option<(f64, f64, f64)> {
    let w_sum: f64 = weights.iter().sum();
    if !(w_sum > 0.0 && w_sum.is_finite()) {
        return None;
    }
    let x = points.iter().zip(weights).map(|(p, w)| w * p.0).sum::<f64>() / w_sum;
    let y = points.iter().zip(weights).map(|(p, w)| w * p.1).sum::<f64>() / w_sum;
    let ss: f64 = points
        .iter()
        .zip(weights)
        .map(|(p, w)| w * ((p.0 - x).powi(2) + (p.1 - y).powi(2)))
        .sum();
    let std = (ss / w_sum).sqrt();
    (x.is_finite() && y.is_finite()).then_some((x, y, std))
}
