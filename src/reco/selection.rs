//! Per-method image eligibility.
//!
//! A telescope takes part in a method's fit when its image (in the method's
//! variant) passes every configured cut. Missing cuts accept everything.

use std::collections::BTreeSet;

use crate::domain::{FitState, ImageCuts, ImageRecord, MethodConfig, TelescopeIndex};
use crate::reco::EventContext;

/// Whether one image passes the acceptance cuts.
pub fn passes_cuts(image: &ImageRecord, cuts: &ImageCuts, require_converged_fit: bool) -> bool {
    if !(image.cen_x.is_finite() && image.cen_y.is_finite() && image.phi.is_finite()) {
        return false;
    }
    if image.size < cuts.size_min || image.ntubes < cuts.ntubes_min {
        return false;
    }
    let ratio = image.shape_ratio();
    if ratio < cuts.shape_ratio_min || ratio > cuts.shape_ratio_max {
        return false;
    }
    if cuts.dist_max.is_some_and(|max| image.dist > max) {
        return false;
    }
    if cuts.loss_max.is_some_and(|max| image.loss > max) {
        return false;
    }
    if !cuts.tel_types.is_empty() && !cuts.tel_types.contains(&image.tel_type) {
        return false;
    }
    if cuts.require_local_trigger && !image.local_trigger {
        return false;
    }
    if let Some(min) = cuts.star_distance_min {
        // No star check result means no nearby star.
        if image.star_distance.is_some_and(|d| d < min) {
            return false;
        }
    }
    if require_converged_fit && image.fit_status != FitState::Converged {
        return false;
    }
    true
}

/// Telescopes selected for `config` in this event.
pub fn select_images(ctx: &EventContext<'_>, config: &MethodConfig) -> BTreeSet<TelescopeIndex> {
    (0..ctx.n_telescopes())
        .map(TelescopeIndex)
        .filter(|&tel| {
            ctx.image(tel, config.image_variant)
                .is_some_and(|img| passes_cuts(img, &config.cuts, config.require_converged_fit))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ArrayPointing, EventInput, ImageVariant, ReconstructionMethod, TelescopeEvent, TelescopeGeometry,
    };

    fn image(size: f64, width: f64) -> ImageRecord {
        ImageRecord {
            cen_x: 0.4,
            cen_y: 0.1,
            phi: 30.0,
            size,
            width,
            length: 0.3,
            loss: 0.05,
            dist: 0.5,
            asymmetry: 0.0,
            tgrad: 0.0,
            ntubes: 12,
            mean_pedvar: 4.0,
            tel_type: 2,
            fit_status: FitState::Moments,
            moments: None,
            star_distance: None,
            local_trigger: true,
        }
    }

    #[test]
    fn default_cuts_accept_sane_image() {
        assert!(passes_cuts(&image(200.0, 0.1), &ImageCuts::default(), false));
    }

    #[test]
    fn each_cut_rejects() {
        let img = image(200.0, 0.1);
        let base = ImageCuts::default();

        let c = ImageCuts { size_min: 300.0, ..base.clone() };
        assert!(!passes_cuts(&img, &c, false));
        let c = ImageCuts { ntubes_min: 13, ..base.clone() };
        assert!(!passes_cuts(&img, &c, false));
        let c = ImageCuts { shape_ratio_min: 0.5, ..base.clone() };
        assert!(!passes_cuts(&img, &c, false));
        let c = ImageCuts { dist_max: Some(0.4), ..base.clone() };
        assert!(!passes_cuts(&img, &c, false));
        let c = ImageCuts { loss_max: Some(0.01), ..base.clone() };
        assert!(!passes_cuts(&img, &c, false));
        let c = ImageCuts { tel_types: vec![1, 3], ..base.clone() };
        assert!(!passes_cuts(&img, &c, false));

        let mut untriggered = img.clone();
        untriggered.local_trigger = false;
        let c = ImageCuts { require_local_trigger: true, ..base.clone() };
        assert!(!passes_cuts(&untriggered, &c, false));

        let mut near_star = img.clone();
        near_star.star_distance = Some(0.1);
        let c = ImageCuts { star_distance_min: Some(0.2), ..base.clone() };
        assert!(!passes_cuts(&near_star, &c, false));
        assert!(passes_cuts(&img, &c, false));

        assert!(!passes_cuts(&img, &base, true));
    }

    #[test]
    fn non_finite_image_is_rejected() {
        let mut img = image(200.0, 0.1);
        img.phi = f64::NAN;
        assert!(!passes_cuts(&img, &ImageCuts::default(), false));
    }

    #[test]
    fn selects_passing_telescopes() {
        let geo: Vec<TelescopeGeometry> = (0..3)
            .map(|i| TelescopeGeometry { x: i as f64 * 50.0, y: 0.0, z: 0.0, focal_length: 12.0, tel_type: 2 })
            .collect();
        let event = EventInput {
            event_number: 1,
            array_pointing: ArrayPointing { elevation: 70.0, azimuth: 180.0 },
            telescopes: vec![
                TelescopeEvent { image: Some(image(500.0, 0.1)), ..TelescopeEvent::default() },
                TelescopeEvent { image: Some(image(50.0, 0.1)), ..TelescopeEvent::default() },
                TelescopeEvent::default(),
            ],
            truth: None,
        };
        let ctx = EventContext::prepare(&geo, &event);
        let mut cfg = MethodConfig::new(ReconstructionMethod::Intersection);
        cfg.cuts.size_min = 100.0;
        cfg.image_variant = ImageVariant::Likelihood;
        let sel = select_images(&ctx, &cfg);
        assert_eq!(sel.into_iter().collect::<Vec<_>>(), vec![TelescopeIndex(0)]);
    }
}
