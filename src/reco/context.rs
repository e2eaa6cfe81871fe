//! Per-event state shared by every reconstruction method.

use std::collections::BTreeSet;

use crate::domain::{
    ArrayPointing, EventInput, ImageRecord, ImageVariant, TelescopeGeometry, TelescopeIndex,
};
use crate::math::ShowerFrame;
use crate::reco::pointing::correct_image;

/// Pointing-corrected images of one telescope.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelescopeImages {
    pub geometric: Option<ImageRecord>,
    pub likelihood: Option<ImageRecord>,
}

/// Immutable view of one event, prepared once and passed to every method.
#[derive(Debug, Clone)]
pub struct EventContext<'a> {
    pub event_number: u64,
    pub geometry: &'a [TelescopeGeometry],
    pub array_pointing: ArrayPointing,
    /// Shower-aligned frame of the array pointing direction.
    pub frame: ShowerFrame,
    /// Mean focal length of the array [m].
    pub mean_focal_length: f64,
    pub images: Vec<TelescopeImages>,
}

/// One image taking part in a fit.
#[derive(Debug, Clone, Copy)]
pub struct SelectedImage<'a> {
    pub tel: TelescopeIndex,
    pub image: &'a ImageRecord,
    pub geometry: &'a TelescopeGeometry,
}

impl<'a> EventContext<'a> {
    /// Build the context, applying each telescope's pointing correction.
    ///
    /// Telescopes beyond the geometry list are ignored; missing entries are
    /// treated as telescopes without an image.
    pub fn prepare(geometry: &'a [TelescopeGeometry], event: &EventInput) -> Self {
        let images = (0..geometry.len())
            .map(|i| match event.telescopes.get(i) {
                Some(tel) => TelescopeImages {
                    geometric: tel.image.as_ref().map(|img| correct_image(img, tel.pointing.as_ref())),
                    likelihood: tel
                        .likelihood_image
                        .as_ref()
                        .map(|img| correct_image(img, tel.pointing.as_ref())),
                },
                None => TelescopeImages::default(),
            })
            .collect();

        let pointing = event.array_pointing;
        Self {
            event_number: event.event_number,
            geometry,
            array_pointing: pointing,
            frame: ShowerFrame::from_zenith_azimuth(pointing.zenith(), pointing.azimuth),
            mean_focal_length: mean_focal_length(geometry),
            images,
        }
    }

    pub fn n_telescopes(&self) -> usize {
        self.geometry.len()
    }

    /// Image of `tel` in the requested variant.
    ///
    /// The likelihood variant falls back to the geometric image.
    pub fn image(&self, tel: TelescopeIndex, variant: ImageVariant) -> Option<&ImageRecord> {
        let slot = self.images.get(tel.index())?;
        match variant {
            ImageVariant::Geometric => slot.geometric.as_ref(),
            ImageVariant::Likelihood => slot.likelihood.as_ref().or(slot.geometric.as_ref()),
        }
    }

    /// Resolve a selection into images and geometry, in telescope order.
    pub fn selected_images(
        &self,
        selected: &BTreeSet<TelescopeIndex>,
        variant: ImageVariant,
    ) -> Vec<SelectedImage<'_>> {
        selected
            .iter()
            .filter_map(|&tel| {
                Some(SelectedImage {
                    tel,
                    image: self.image(tel, variant)?,
                    geometry: self.geometry.get(tel.index())?,
                })
            })
            .collect()
    }

    /// Cosine of the array pointing zenith angle.
    pub fn cos_zenith(&self) -> f64 {
        self.array_pointing.zenith().to_radians().cos()
    }
}

fn mean_focal_length(geometry: &[TelescopeGeometry]) -> f64 {
    if geometry.is_empty() {
        return f64::NAN;
    }
    geometry.iter().map(|g| g.focal_length).sum::<f64>() / geometry.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitState, PointingRecord, TelescopeEvent};

    fn geometry() -> Vec<TelescopeGeometry> {
        vec![
            TelescopeGeometry { x: 0.0, y: 0.0, z: 0.0, focal_length: 12.0, tel_type: 1 },
            TelescopeGeometry { x: 80.0, y: 0.0, z: 0.0, focal_length: 16.0, tel_type: 1 },
        ]
    }

    fn img(cen_x: f64, status: FitState) -> ImageRecord {
        ImageRecord {
            cen_x,
            cen_y: 0.0,
            phi: 0.0,
            size: 100.0,
            width: 0.1,
            length: 0.2,
            loss: 0.0,
            dist: cen_x.abs(),
            asymmetry: 0.0,
            tgrad: 0.0,
            ntubes: 10,
            mean_pedvar: 0.0,
            tel_type: 1,
            fit_status: status,
            moments: None,
            star_distance: None,
            local_trigger: true,
        }
    }

    #[test]
    fn prepares_corrected_images_and_variants() {
        let geo = geometry();
        let event = EventInput {
            event_number: 7,
            array_pointing: ArrayPointing { elevation: 90.0, azimuth: 0.0 },
            telescopes: vec![
                TelescopeEvent {
                    image: Some(img(0.5, FitState::Moments)),
                    likelihood_image: Some(img(0.6, FitState::Converged)),
                    pointing: Some(PointingRecord {
                        elevation: 90.0,
                        azimuth: 0.0,
                        error_dx: Some(0.1),
                        error_dy: None,
                    }),
                },
                TelescopeEvent {
                    image: Some(img(-0.3, FitState::Moments)),
                    ..TelescopeEvent::default()
                },
            ],
            truth: None,
        };
        let ctx = EventContext::prepare(&geo, &event);
        assert_eq!(ctx.n_telescopes(), 2);
        assert!((ctx.mean_focal_length - 14.0).abs() < 1e-12);

        let t0 = TelescopeIndex(0);
        let t1 = TelescopeIndex(1);
        assert!((ctx.image(t0, ImageVariant::Geometric).unwrap().cen_x - 0.6).abs() < 1e-12);
        assert!((ctx.image(t0, ImageVariant::Likelihood).unwrap().cen_x - 0.7).abs() < 1e-12);
        // no likelihood image: fall back
        assert_eq!(ctx.image(t1, ImageVariant::Likelihood).unwrap().cen_x, -0.3);

        let sel: BTreeSet<_> = [t0, t1].into_iter().collect();
        let images = ctx.selected_images(&sel, ImageVariant::Geometric);
        assert_eq!(images.len(), 2);
        assert_eq!(images[1].geometry.x, 80.0);
    }
}
