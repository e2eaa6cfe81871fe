//! Shower core (impact point) reconstruction.
//!
//! Telescope positions are rotated into the shower frame of the
//! reconstructed direction: first into the array pointing frame, then by the
//! small offset rotation that puts the reconstructed direction on the z axis.
//! In that frame the core lies on every line through a telescope whose
//! direction is the image axis (source towards centroid). The perpendicular
//! fit of those lines gives the core in the shower plane, which is mapped
//! back to the ground along the reconstructed axis.

use nalgebra::Vector3;

use crate::domain::FitStatus;
use crate::math::{DeltaRotation, Line, offset_direction, perpendicular_fit, rotate_by_delta};
use crate::reco::{EventContext, SelectedImage};

/// Centroids closer than this to the source use the image orientation [deg].
const SAME_POINT_EPS: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CoreEstimate {
    /// Ground core [m].
    pub x: f64,
    pub y: f64,
    /// Core in the shower plane [m].
    pub shower_x: f64,
    pub shower_y: f64,
    pub std: f64,
}

/// Core for a direction `source` (camera offset, deg).
///
/// Returns `Ok(None)` when fewer than two images are available.
pub fn reconstruct_core(
    ctx: &EventContext<'_>,
    images: &[SelectedImage<'_>],
    source: (f64, f64),
) -> Result<Option<CoreEstimate>, FitStatus> {
    if images.len() < 2 {
        return Ok(None);
    }
    let (xs, ys) = source;
    let positions: Vec<Vector3<f64>> = images
        .iter()
        .map(|s| ctx.frame.to_shower(&Vector3::new(s.geometry.x, s.geometry.y, s.geometry.z)))
        .collect();
    let rotated = rotate_by_delta(&positions, xs.to_radians(), ys.to_radians());

    let lines: Vec<Line> = images
        .iter()
        .zip(&rotated)
        .map(|(s, t)| {
            let w = s.image.size * s.image.ellipticity();
            Line::new(t.x, t.y, axis_slope_from_source(s, source), w * w)
        })
        .collect();

    let fit = perpendicular_fit(&lines);
    if !fit.is_finite() {
        return Err(FitStatus::NumericalFailure);
    }

    let axis = ctx.frame.to_ground(&offset_direction(xs, ys));
    let delta = DeltaRotation::from_offset_deg(xs, ys);
    let pointing_frame_point = delta.invert(&Vector3::new(fit.x, fit.y, 0.0));
    let ground = ctx
        .frame
        .project_to_ground(&pointing_frame_point, &axis)
        .ok_or(FitStatus::NumericalFailure)?;
    if !ground.is_in_plane() {
        return Err(FitStatus::CoreOutOfPlane);
    }
    if !(ground.x.is_finite() && ground.y.is_finite()) {
        return Err(FitStatus::NumericalFailure);
    }

    Ok(Some(CoreEstimate {
        x: ground.x,
        y: ground.y,
        shower_x: fit.x,
        shower_y: fit.y,
        std: fit.std,
    }))
}

/// Slope of the line from the source to the image centroid.
fn axis_slope_from_source(s: &SelectedImage<'_>, source: (f64, f64)) -> f64 {
    let dx = s.image.cen_x - source.0;
    let dy = s.image.cen_y - source.1;
    if dx.hypot(dy) < SAME_POINT_EPS {
        s.image.axis_slope()
    } else {
        dy.atan2(dx).tan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ArrayPointing, EventInput, FitState, ImageRecord, TelescopeEvent, TelescopeGeometry, TelescopeIndex,
    };

    fn image(cen_x: f64, cen_y: f64) -> ImageRecord {
        ImageRecord {
            cen_x,
            cen_y,
            phi: 0.0,
            size: 600.0,
            width: 0.1,
            length: 0.3,
            loss: 0.0,
            dist: 1.0,
            asymmetry: 0.0,
            tgrad: 0.0,
            ntubes: 10,
            mean_pedvar: 0.0,
            tel_type: 1,
            fit_status: FitState::Moments,
            moments: None,
            star_distance: None,
            local_trigger: true,
        }
    }

    #[test]
    fn core_round_trip() {
        let geo = vec![
            TelescopeGeometry { x: -60.0, y: 40.0, z: 2.0, focal_length: 12.0, tel_type: 1 },
            TelescopeGeometry { x: 70.0, y: 55.0, z: -1.0, focal_length: 12.0, tel_type: 1 },
            TelescopeGeometry { x: 10.0, y: -80.0, z: 0.0, focal_length: 12.0, tel_type: 1 },
        ];
        let pointing = ArrayPointing { elevation: 60.0, azimuth: 200.0 };
        let source = (0.7, -0.4);
        let core = Vector3::new(35.0, -20.0, 0.0);

        let frame = crate::math::ShowerFrame::from_zenith_azimuth(pointing.zenith(), pointing.azimuth);
        let delta = DeltaRotation::from_offset_deg(source.0, source.1);
        let c = delta.apply(&frame.to_shower(&core));

        // Centroids placed along (core - telescope) from the source.
        let telescopes = geo
            .iter()
            .map(|g| {
                let t = delta.apply(&frame.to_shower(&Vector3::new(g.x, g.y, g.z)));
                let k = 0.01;
                TelescopeEvent {
                    image: Some(image(source.0 + k * (c.x - t.x), source.1 + k * (c.y - t.y))),
                    ..TelescopeEvent::default()
                }
            })
            .collect();
        let event = EventInput { event_number: 1, array_pointing: pointing, telescopes, truth: None };
        let ctx = EventContext::prepare(&geo, &event);
        let images: Vec<SelectedImage<'_>> = (0..3)
            .map(|i| SelectedImage {
                tel: TelescopeIndex(i),
                image: ctx.images[i].geometric.as_ref().unwrap(),
                geometry: &geo[i],
            })
            .collect();

        let est = reconstruct_core(&ctx, &images, source).unwrap().unwrap();
        assert!((est.x - core.x).abs() < 1e-6, "x = {}", est.x);
        assert!((est.y - core.y).abs() < 1e-6, "y = {}", est.y);
        assert!((est.shower_x - c.x).abs() < 1e-6);
        assert!((est.shower_y - c.y).abs() < 1e-6);
        assert!(est.std < 1e-6);
    }

    #[test]
    fn single_image_has_no_core() {
        let geo = vec![TelescopeGeometry { x: 0.0, y: 0.0, z: 0.0, focal_length: 12.0, tel_type: 1 }];
        let event = EventInput {
            event_number: 1,
            array_pointing: ArrayPointing { elevation: 80.0, azimuth: 0.0 },
            telescopes: vec![TelescopeEvent { image: Some(image(0.5, 0.5)), ..TelescopeEvent::default() }],
            truth: None,
        };
        let ctx = EventContext::prepare(&geo, &event);
        let images = ctx.selected_images(&[TelescopeIndex(0)].into_iter().collect(), Default::default());
        assert_eq!(reconstruct_core(&ctx, &images, (0.0, 0.0)), Ok(None));
    }

    #[test]
    fn centroid_on_source_uses_orientation() {
        let geo = TelescopeGeometry { x: 0.0, y: 0.0, z: 0.0, focal_length: 12.0, tel_type: 1 };
        let mut img = image(1.0, 1.0);
        img.phi = 45.0;
        let s = SelectedImage { tel: TelescopeIndex(0), image: &img, geometry: &geo };
        assert!((axis_slope_from_source(&s, (1.0, 1.0)) - 1.0).abs() < 1e-12);
        assert!((axis_slope_from_source(&s, (0.0, 1.0))).abs() < 1e-12);
    }
}
