//! Per-event orchestration of all configured methods.

use tracing::{debug, info, warn};

use crate::domain::{
    EstimatorSource, FitStatus, MAX_TELESCOPES, MethodConfig, ReconstructionMethod, ReconstructionRecord,
    ZenithModel,
};
use crate::error::AppError;
use crate::estimators::{DispEstimator, EstimatorKind, load_estimator, select_model};
use crate::math::{offset_direction, zenith_azimuth};
use crate::reco::{
    DirectionEstimate, EventContext, MethodOutcome, SelectedImage, blend, disp, geometric, impact,
    selection,
};

/// Handle into the reconstructor's estimator arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatorId(usize);

/// Runs every configured method on an event.
#[derive(Debug)]
pub struct Reconstructor {
    methods: Vec<MethodConfig>,
    estimators: Vec<Box<dyn DispEstimator>>,
    /// Estimator used by each method (parallel to `methods`).
    method_estimator: Vec<Option<EstimatorId>>,
}

impl Reconstructor {
    /// Validate the configuration and load estimator models from disk.
    ///
    /// Each estimator source loads the model whose zenith bin is closest to
    /// `zenith`.
    pub fn new(methods: Vec<MethodConfig>, n_telescopes: usize, zenith: f64) -> Result<Self, AppError> {
        Self::with_loader(methods, n_telescopes, |kind, models| {
            let model = select_model(models, zenith)
                .ok_or_else(|| AppError::config("Estimator source lists no models."))?;
            info!(kind = %kind, zenith_bin = model.zenith_deg, "selected disp model");
            load_estimator(kind, &model.path)
        })
    }

    /// As [`Reconstructor::new`] with a custom estimator loader.
    pub fn with_loader<F>(methods: Vec<MethodConfig>, n_telescopes: usize, mut load: F) -> Result<Self, AppError>
    where
        F: FnMut(EstimatorKind, &[ZenithModel]) -> Result<Box<dyn DispEstimator>, AppError>,
    {
        validate(&methods, n_telescopes)?;

        let mut estimators: Vec<Box<dyn DispEstimator>> = Vec::new();
        let mut method_estimator = vec![None; methods.len()];

        // Owned models first, aliases second.
        for (i, cfg) in methods.iter().enumerate() {
            if let (Some(kind), Some(EstimatorSource::Models { models })) =
                (EstimatorKind::for_method(cfg.method), &cfg.estimator)
            {
                if models.is_empty() {
                    return Err(AppError::config(format!(
                        "Method {} (entry {i}) lists no estimator models.",
                        cfg.method
                    )));
                }
                let est = load(kind, models)?;
                if est.kind() != kind {
                    return Err(AppError::config(format!(
                        "Method {} needs a {kind} estimator, got {}.",
                        cfg.method,
                        est.kind()
                    )));
                }
                method_estimator[i] = Some(EstimatorId(estimators.len()));
                estimators.push(est);
            }
        }
        for (i, cfg) in methods.iter().enumerate() {
            if let Some(EstimatorSource::SameAs { same_as }) = &cfg.estimator {
                if cfg.method.needs_estimator() {
                    method_estimator[i] = method_estimator[*same_as];
                }
            }
        }

        for (cfg, id) in methods.iter().zip(&method_estimator) {
            if cfg.method.needs_estimator() && id.is_none() {
                return Err(AppError::config(format!("Method {} has no disp estimator.", cfg.method)));
            }
        }

        Ok(Self {
            methods,
            estimators,
            method_estimator,
        })
    }

    pub fn methods(&self) -> &[MethodConfig] {
        &self.methods
    }

    pub fn estimator_of(&self, method_index: usize) -> Option<EstimatorId> {
        self.method_estimator.get(method_index).copied().flatten()
    }

    fn estimator(&self, id: EstimatorId) -> &dyn DispEstimator {
        self.estimators[id.0].as_ref()
    }

    /// One record per configured method, in configuration order.
    pub fn reconstruct_event(&self, ctx: &EventContext<'_>) -> Vec<ReconstructionRecord> {
        self.methods
            .iter()
            .enumerate()
            .map(|(i, cfg)| self.reconstruct_method(ctx, cfg, self.method_estimator[i]))
            .collect()
    }

    fn reconstruct_method(
        &self,
        ctx: &EventContext<'_>,
        cfg: &MethodConfig,
        estimator: Option<EstimatorId>,
    ) -> ReconstructionRecord {
        let mut rec = ReconstructionRecord::reset(cfg.method);
        rec.selected = selection::select_images(ctx, cfg);

        if rec.selected.len() < cfg.min_images {
            rec.fail(FitStatus::InsufficientImages);
            debug!(
                event = ctx.event_number,
                method = %cfg.method,
                selected = rec.selected.len(),
                "too few images"
            );
            return rec;
        }

        let method = match cfg.demote {
            Some(rule) if rec.selected.len() > rule.above_images => rule.method,
            _ => cfg.method,
        };
        rec.method_used = method;

        let images = ctx.selected_images(&rec.selected, cfg.image_variant);
        let outcome = self.run_direction(ctx, cfg, method, &images, estimator);
        if let Some(angle) = outcome.axes_angle_deg {
            rec.axes_angle_deg = angle;
        }

        let direction = match outcome.direction {
            Ok(d) if d.is_finite() => d,
            Ok(_) => {
                rec.fail(FitStatus::NumericalFailure);
                return rec;
            }
            Err(status) => {
                debug!(event = ctx.event_number, method = %cfg.method, ?status, "direction failed");
                rec.fail(status);
                return rec;
            }
        };

        // Only images the estimator could evaluate took part in a disp fit.
        let images = if matches!(
            method,
            ReconstructionMethod::DispMlp | ReconstructionMethod::DispBdt | ReconstructionMethod::DispTable
        ) {
            keep_contributing(&mut rec, images, &direction)
        } else {
            images
        };

        if let Err(status) = apply_direction(&mut rec, ctx, &images, direction) {
            debug!(event = ctx.event_number, method = %cfg.method, ?status, "core failed");
            rec.fail(status);
        }
        rec
    }

    fn run_direction(
        &self,
        ctx: &EventContext<'_>,
        cfg: &MethodConfig,
        method: ReconstructionMethod,
        images: &[SelectedImage<'_>],
        estimator: Option<EstimatorId>,
    ) -> MethodOutcome {
        let seed_direction = || {
            geometric::reconstruct(
                ReconstructionMethod::ModifiedPair,
                images,
                ctx.mean_focal_length,
                cfg.min_axes_angle_deg,
            )
        };

        match method {
            ReconstructionMethod::Intersection
            | ReconstructionMethod::HegraPair
            | ReconstructionMethod::ModifiedPair => {
                geometric::reconstruct(method, images, ctx.mean_focal_length, cfg.min_axes_angle_deg)
            }
            ReconstructionMethod::DispMlp | ReconstructionMethod::DispBdt | ReconstructionMethod::DispTable => {
                let Some(id) = estimator else {
                    return MethodOutcome::failed(FitStatus::EstimatorUnavailable);
                };
                let seed = seed_direction();
                let seed_point = seed.direction.as_ref().ok().map(|d| (d.x, d.y));
                MethodOutcome {
                    direction: disp::reconstruct(ctx, images, self.estimator(id), seed_point),
                    axes_angle_deg: seed.axes_angle_deg,
                }
            }
            ReconstructionMethod::ZenithBlend => {
                let seed = seed_direction();
                let disp_result = match estimator {
                    Some(id) => {
                        let seed_point = seed.direction.as_ref().ok().map(|d| (d.x, d.y));
                        disp::reconstruct(ctx, images, self.estimator(id), seed_point)
                    }
                    None => Err(FitStatus::EstimatorUnavailable),
                };
                MethodOutcome {
                    direction: blend::blend(seed.direction, disp_result, ctx.cos_zenith()),
                    axes_angle_deg: seed.axes_angle_deg,
                }
            }
        }
    }
}

/// Narrow the selection to the telescopes listed in the disp contributions.
fn keep_contributing<'a>(
    rec: &mut ReconstructionRecord,
    images: Vec<SelectedImage<'a>>,
    direction: &DirectionEstimate,
) -> Vec<SelectedImage<'a>> {
    rec.selected = direction.contributions.iter().map(|c| c.tel).collect();
    images.into_iter().filter(|s| rec.selected.contains(&s.tel)).collect()
}

/// Fill direction, sky coordinates and core into a record.
fn apply_direction(
    rec: &mut ReconstructionRecord,
    ctx: &EventContext<'_>,
    images: &[SelectedImage<'_>],
    direction: DirectionEstimate,
) -> Result<(), FitStatus> {
    rec.status = FitStatus::Success;
    rec.x_offset = direction.x;
    rec.y_offset = direction.y;
    rec.direction_std = direction.std;
    if let Some(diff) = direction.disp_diff {
        rec.disp_diff = diff;
    }
    rec.disp_contributions = direction.contributions;

    let axis = ctx.frame.to_ground(&offset_direction(direction.x, direction.y));
    let (zenith, azimuth) = zenith_azimuth(&axis);
    rec.zenith = zenith;
    rec.azimuth = azimuth;

    if let Some(core) = impact::reconstruct_core(ctx, images, (direction.x, direction.y))? {
        rec.core_x = core.x;
        rec.core_y = core.y;
        rec.shower_core_x = core.shower_x;
        rec.shower_core_y = core.shower_y;
        rec.core_std = core.std;
    }
    Ok(())
}

/// Static consistency checks of the method list.
fn validate(methods: &[MethodConfig], n_telescopes: usize) -> Result<(), AppError> {
    if methods.is_empty() {
        return Err(AppError::config("No reconstruction methods configured."));
    }
    if n_telescopes > MAX_TELESCOPES {
        return Err(AppError::config(format!(
            "{n_telescopes} telescopes exceed the supported maximum of {MAX_TELESCOPES}."
        )));
    }

    for (i, cfg) in methods.iter().enumerate() {
        if cfg.min_images == 0 {
            return Err(AppError::config(format!("Method {} (entry {i}): min_images must be >= 1.", cfg.method)));
        }
        if !(cfg.min_axes_angle_deg.is_finite() && (0.0..90.0).contains(&cfg.min_axes_angle_deg)) {
            return Err(AppError::config(format!(
                "Method {} (entry {i}): min_axes_angle_deg must be in [0, 90).",
                cfg.method
            )));
        }
        if let Some(rule) = &cfg.demote {
            if !rule.method.is_geometric() {
                return Err(AppError::config(format!(
                    "Method {} (entry {i}): demotion target {} is not a geometric method.",
                    cfg.method, rule.method
                )));
            }
        }

        match (&cfg.estimator, cfg.method.needs_estimator()) {
            (None, true) => {
                return Err(AppError::config(format!("Method {} (entry {i}) needs an estimator.", cfg.method)));
            }
            (Some(_), false) => {
                warn!(method = %cfg.method, "estimator ignored for geometric method");
            }
            (Some(EstimatorSource::SameAs { same_as }), true) => {
                let Some(target) = methods.get(*same_as) else {
                    return Err(AppError::config(format!(
                        "Method {} (entry {i}): same_as {same_as} is out of range.",
                        cfg.method
                    )));
                };
                if *same_as == i || !matches!(target.estimator, Some(EstimatorSource::Models { .. })) {
                    return Err(AppError::config(format!(
                        "Method {} (entry {i}): same_as must name a method that loads its own models.",
                        cfg.method
                    )));
                }
                if EstimatorKind::for_method(target.method) != EstimatorKind::for_method(cfg.method) {
                    return Err(AppError::config(format!(
                        "Method {} (entry {i}) cannot share the estimator of {}.",
                        cfg.method, target.method
                    )));
                }
            }
            _ => {}
        }
    }
    Ok(())
}
