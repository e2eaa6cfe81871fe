//! Pointing corrections and telescope/array pointing mismatch bookkeeping.

use serde::Serialize;

use crate::domain::{ArrayPointing, EventInput, FitState, ImageRecord, PointingRecord, TelescopeIndex};

const MOMENT_EPS: f64 = 1e-12;

/// Apply a telescope's pointing-error offsets to an image.
///
/// The centroid is shifted by `(error_dx, error_dy)`. Unless the image comes
/// from a converged likelihood fit, the orientation is re-derived from the
/// second moments with the shifted centroid. Images without moments keep
/// their `phi`.
pub fn correct_image(image: &ImageRecord, pointing: Option<&PointingRecord>) -> ImageRecord {
    let mut out = image.clone();
    let Some(p) = pointing else {
        return out;
    };
    let dx = p.error_dx.unwrap_or(0.0);
    let dy = p.error_dy.unwrap_or(0.0);
    if dx == 0.0 && dy == 0.0 {
        return out;
    }
    out.cen_x += dx;
    out.cen_y += dy;

    if out.fit_status == FitState::Converged {
        return out;
    }
    if let Some(m) = out.moments {
        if let Some(phi) = phi_from_moments(m.sigma_x2, m.sigma_y2, m.sigma_xy, out.cen_x, out.cen_y) {
            out.phi = phi;
        }
    }
    out
}

/// Major-axis orientation [deg] from second moments, oriented by the centroid.
///
/// Returns `None` when the moments do not define an axis.
pub fn phi_from_moments(sx2: f64, sy2: f64, sxy: f64, xm: f64, ym: f64) -> Option<f64> {
    let d = sy2 - sx2;
    let z = (d * d + 4.0 * sxy * sxy).sqrt();
    let ac = (d + z) * ym + 2.0 * sxy * xm;
    let bc = 2.0 * sxy * ym - (d - z) * xm;
    if ac.abs() < MOMENT_EPS && bc.abs() < MOMENT_EPS {
        return None;
    }
    let phi = ac.atan2(bc).to_degrees();
    phi.is_finite().then_some(phi)
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    n: u64,
    sum_el: f64,
    sum_el2: f64,
    sum_az: f64,
    sum_az2: f64,
}

/// Per-telescope mismatch summary [deg].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MismatchSummary {
    pub tel: TelescopeIndex,
    pub n_events: u64,
    pub mean_elevation: f64,
    pub rms_elevation: f64,
    /// Azimuth difference scaled by `cos(elevation)`.
    pub mean_azimuth: f64,
    pub rms_azimuth: f64,
}

/// Run-level accumulator of telescope vs. array pointing differences.
#[derive(Debug, Clone)]
pub struct PointingMismatchStats {
    per_tel: Vec<Accumulator>,
}

impl PointingMismatchStats {
    pub fn new(n_telescopes: usize) -> Self {
        Self {
            per_tel: vec![Accumulator::default(); n_telescopes],
        }
    }

    pub fn record(&mut self, event: &EventInput) {
        for (acc, tel) in self.per_tel.iter_mut().zip(&event.telescopes) {
            if let Some(p) = &tel.pointing {
                let (d_el, d_az) = pointing_difference(p, &event.array_pointing);
                acc.n += 1;
                acc.sum_el += d_el;
                acc.sum_el2 += d_el * d_el;
                acc.sum_az += d_az;
                acc.sum_az2 += d_az * d_az;
            }
        }
    }

    /// Summaries for telescopes that had pointing data.
    pub fn summaries(&self) -> Vec<MismatchSummary> {
        self.per_tel
            .iter()
            .enumerate()
            .filter(|(_, a)| a.n > 0)
            .map(|(i, a)| {
                let n = a.n as f64;
                MismatchSummary {
                    tel: TelescopeIndex(i),
                    n_events: a.n,
                    mean_elevation: a.sum_el / n,
                    rms_elevation: (a.sum_el2 / n).sqrt(),
                    mean_azimuth: a.sum_az / n,
                    rms_azimuth: (a.sum_az2 / n).sqrt(),
                }
            })
            .collect()
    }
}

/// `(Δel, Δaz·cos el)` between a telescope and the array pointing [deg].
fn pointing_difference(tel: &PointingRecord, array: &ArrayPointing) -> (f64, f64) {
    let d_el = tel.elevation - array.elevation;
    let mut d_az = (tel.azimuth - array.azimuth).rem_euclid(360.0);
    if d_az > 180.0 {
        d_az -= 360.0;
    }
    (d_el, d_az * array.elevation.to_radians().cos())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SecondMoments, TelescopeEvent};

    fn image() -> ImageRecord {
        ImageRecord {
            cen_x: 0.5,
            cen_y: 0.5,
            phi: 12.0,
            size: 500.0,
            width: 0.1,
            length: 0.3,
            loss: 0.0,
            dist: 0.7,
            asymmetry: 0.1,
            tgrad: 0.0,
            ntubes: 20,
            mean_pedvar: 5.0,
            tel_type: 1,
            fit_status: FitState::Moments,
            moments: Some(SecondMoments { sigma_x2: 0.01, sigma_y2: 0.09, sigma_xy: 0.0 }),
            star_distance: None,
            local_trigger: true,
        }
    }

    fn pointing(dx: f64, dy: f64) -> PointingRecord {
        PointingRecord { elevation: 70.0, azimuth: 180.0, error_dx: Some(dx), error_dy: Some(dy) }
    }

    #[test]
    fn shifts_centroid_and_recomputes_phi() {
        let out = correct_image(&image(), Some(&pointing(0.1, -0.2)));
        assert!((out.cen_x - 0.6).abs() < 1e-12);
        assert!((out.cen_y - 0.3).abs() < 1e-12);
        // sigma_y2 > sigma_x2 and no correlation: vertical major axis
        assert!((out.phi.abs() - 90.0).abs() < 1e-9, "phi = {}", out.phi);
    }

    #[test]
    fn converged_likelihood_fit_keeps_phi() {
        let mut img = image();
        img.fit_status = FitState::Converged;
        let out = correct_image(&img, Some(&pointing(0.1, 0.1)));
        assert_eq!(out.phi, 12.0);
        assert!((out.cen_x - 0.6).abs() < 1e-12);
    }

    #[test]
    fn no_offsets_leave_image_untouched() {
        assert_eq!(correct_image(&image(), None), image());
        assert_eq!(correct_image(&image(), Some(&pointing(0.0, 0.0))), image());
    }

    #[test]
    fn phi_follows_correlated_moments() {
        // Elongated along the diagonal.
        let phi = phi_from_moments(0.05, 0.05, 0.04, 1.0, 1.0).unwrap();
        assert!((phi - 45.0).abs() < 1e-9, "phi = {phi}");
        assert!(phi_from_moments(0.05, 0.05, 0.0, 1.0, 1.0).is_none());
    }

    #[test]
    fn mismatch_statistics() {
        let mut stats = PointingMismatchStats::new(2);
        for d_el in [0.1, -0.1] {
            let event = EventInput {
                event_number: 1,
                array_pointing: ArrayPointing { elevation: 60.0, azimuth: 359.0 },
                telescopes: vec![
                    TelescopeEvent {
                        pointing: Some(PointingRecord {
                            elevation: 60.0 + d_el,
                            azimuth: 1.0,
                            error_dx: None,
                            error_dy: None,
                        }),
                        ..TelescopeEvent::default()
                    },
                    TelescopeEvent::default(),
                ],
                truth: None,
            };
            stats.record(&event);
        }
        let s = stats.summaries();
        assert_eq!(s.len(), 1);
        assert_eq!(s[0].n_events, 2);
        assert!(s[0].mean_elevation.abs() < 1e-12);
        assert!((s[0].rms_elevation - 0.1).abs() < 1e-9);
        // 2 deg across the 0/360 wrap, scaled by cos(60 deg)
        assert!((s[0].mean_azimuth - 1.0).abs() < 1e-9);
    }
}
