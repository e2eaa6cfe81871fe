//! Direction reconstruction from intersecting image axes.
//!
//! - `Intersection` (0): one weighted perpendicular fit of all axes
//! - `HegraPair` (3): weighted mean of pairwise intersections
//! - `ModifiedPair` (4): as 3 with ellipticity-based (squared) pair weights
//!
//! Methods 0 and 3 work in focal-plane millimetres using the array's mean
//! focal length; method 4 works in degrees. A two-image selection must pass
//! the axes-angle test before anything is fitted; larger selections need at
//! least one pair of axes that passes it.

use std::f64::consts::PI;

use crate::domain::{FitStatus, ImageRecord, ReconstructionMethod};
use crate::math::{Line, axes_angle_deg, axes_too_parallel, intersect_two, perpendicular_fit};
use crate::reco::{DirectionEstimate, MethodOutcome, SelectedImage};

/// Reconstruct the direction with one of the geometric methods.
pub fn reconstruct(
    method: ReconstructionMethod,
    images: &[SelectedImage<'_>],
    mean_focal_length: f64,
    min_axes_angle_deg: f64,
) -> MethodOutcome {
    let axes_angle = two_image_angle(images);
    if let Some(angle) = axes_angle {
        if axes_too_parallel(angle, min_axes_angle_deg) {
            return MethodOutcome {
                direction: Err(FitStatus::DegenerateGeometry),
                axes_angle_deg: axes_angle,
            };
        }
    }
    if !has_crossing_pair(images, min_axes_angle_deg) {
        return MethodOutcome {
            direction: Err(FitStatus::DegenerateGeometry),
            axes_angle_deg: axes_angle,
        };
    }

    let direction = match method {
        ReconstructionMethod::Intersection => intersection(images, mean_focal_length),
        ReconstructionMethod::HegraPair => hegra_pair(images, mean_focal_length, min_axes_angle_deg),
        ReconstructionMethod::ModifiedPair => modified_pair(images, min_axes_angle_deg),
        _ => Err(FitStatus::NotReconstructed),
    };
    MethodOutcome {
        direction,
        axes_angle_deg: axes_angle,
    }
}

/// Angle between the two axes of a two-image selection.
pub fn two_image_angle(images: &[SelectedImage<'_>]) -> Option<f64> {
    match images {
        [a, b] => Some(axes_angle_deg(a.image.axis_slope(), b.image.axis_slope())),
        _ => None,
    }
}

/// Whether any two selected axes are far enough from parallel to intersect.
fn has_crossing_pair(images: &[SelectedImage<'_>], min_axes_angle_deg: f64) -> bool {
    images.iter().enumerate().any(|(i, a)| {
        images[i + 1..].iter().any(|b| {
            let angle = axes_angle_deg(a.image.axis_slope(), b.image.axis_slope());
            !axes_too_parallel(angle, min_axes_angle_deg)
        })
    })
}

/// Focal-plane millimetres per degree.
fn mm_per_degree(focal_length: f64) -> f64 {
    focal_length * 1000.0 * PI / 180.0
}

fn axis_line(image: &ImageRecord, scale: f64, weight: f64) -> Line {
    Line::new(image.cen_x * scale, image.cen_y * scale, image.axis_slope(), weight)
}

/// Method 0.
pub fn intersection(
    images: &[SelectedImage<'_>],
    mean_focal_length: f64,
) -> Result<DirectionEstimate, FitStatus> {
    let scale = mm_per_degree(mean_focal_length);
    if !(scale.is_finite() && scale > 0.0) {
        return Err(FitStatus::NumericalFailure);
    }
    let lines: Vec<Line> = images
        .iter()
        .map(|s| {
            let w = s.image.size * s.image.ellipticity();
            axis_line(s.image, scale, w * w)
        })
        .collect();

    let fit = perpendicular_fit(&lines);
    if !fit.is_finite() {
        return Err(FitStatus::NumericalFailure);
    }
    Ok(DirectionEstimate::new(fit.x / scale, fit.y / scale, fit.std / scale))
}

#[derive(Debug, Clone, Copy)]
struct PairPoint {
    x: f64,
    y: f64,
    weight: f64,
}

/// Intersections of all sufficiently non-parallel pairs, in the units of
/// `scale`. `pair_weight` receives both images and `sin(Δ)`.
fn pair_points<F>(images: &[SelectedImage<'_>], scale: f64, min_axes_angle_deg: f64, pair_weight: F) -> Vec<PairPoint>
where
    F: Fn(&ImageRecord, &ImageRecord, f64) -> f64,
{
    let mut points = Vec::new();
    for (i, a) in images.iter().enumerate() {
        for b in &images[i + 1..] {
            let angle = axes_angle_deg(a.image.axis_slope(), b.image.axis_slope());
            if axes_too_parallel(angle, min_axes_angle_deg) {
                continue;
            }
            let p = intersect_two(&axis_line(a.image, scale, 1.0), &axis_line(b.image, scale, 1.0));
            let weight = pair_weight(a.image, b.image, angle.to_radians().sin());
            if p.is_finite() && weight.is_finite() {
                points.push(PairPoint { x: p.x, y: p.y, weight });
            }
        }
    }
    points
}

/// Weighted mean and weighted RMS spread of pair points.
fn weighted_mean(points: &[PairPoint]) -> Result<(f64, f64, f64), FitStatus> {
    if points.is_empty() {
        return Err(FitStatus::DegenerateGeometry);
    }
    let w_sum: f64 = points.iter().map(|p| p.weight).sum();
    if !(w_sum > 0.0 && w_sum.is_finite()) {
        return Err(FitStatus::NumericalFailure);
    }
    let x = points.iter().map(|p| p.weight * p.x).sum::<f64>() / w_sum;
    let y = points.iter().map(|p| p.weight * p.y).sum::<f64>() / w_sum;
    let ss: f64 = points
        .iter()
        .map(|p| p.weight * ((p.x - x).powi(2) + (p.y - y).powi(2)))
        .sum();
    Ok((x, y, (ss / w_sum).sqrt()))
}

fn reduced_size(a: &ImageRecord, b: &ImageRecord) -> f64 {
    1.0 / (1.0 / a.size + 1.0 / b.size)
}

/// Method 3.
pub fn hegra_pair(
    images: &[SelectedImage<'_>],
    mean_focal_length: f64,
    min_axes_angle_deg: f64,
) -> Result<DirectionEstimate, FitStatus> {
    let scale = mm_per_degree(mean_focal_length);
    if !(scale.is_finite() && scale > 0.0) {
        return Err(FitStatus::NumericalFailure);
    }
    let points = pair_points(images, scale, min_axes_angle_deg, |a, b, sin_delta| {
        reduced_size(a, b) / (a.length + b.length) * sin_delta
    });
    let (x, y, std) = weighted_mean(&points)?;
    Ok(DirectionEstimate::new(x / scale, y / scale, std / scale))
}

/// Method 4.
///
/// The pair weight is squared; `disp_diff` is the sum of squared distances
/// between all pairs of pair-intersection points [deg²].
pub fn modified_pair(
    images: &[SelectedImage<'_>],
    min_axes_angle_deg: f64,
) -> Result<DirectionEstimate, FitStatus> {
    let points = pair_points(images, 1.0, min_axes_angle_deg, |a, b, sin_delta| {
        let w = reduced_size(a, b) * a.ellipticity() * b.ellipticity() * sin_delta;
        w * w
    });
    let (x, y, std) = weighted_mean(&points)?;

    let mut disp_diff = 0.0;
    for (i, p) in points.iter().enumerate() {
        for q in &points[i + 1..] {
            disp_diff += (p.x - q.x).powi(2) + (p.y - q.y).powi(2);
        }
    }

    let mut est = DirectionEstimate::new(x, y, std);
    est.disp_diff = Some(disp_diff);
    Ok(est)
}
