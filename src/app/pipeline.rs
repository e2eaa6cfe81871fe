//! Shared reconstruction pipeline used by the CLI and the integration tests.
//!
//! config + run -> estimator loading -> per-event reconstruction -> summary
//!
//! The front-end only decides where the results go (files, terminal).

use tracing::{debug, info};

use crate::domain::{EventReconstruction, RunInput};
use crate::error::AppError;
use crate::io::RecoConfig;
use crate::reco::{EventContext, PointingMismatchStats, Reconstructor};
use crate::report::{RunSummary, summarize};

/// All computed outputs of a single `reco reconstruct` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub events: Vec<EventReconstruction>,
    pub summary: RunSummary,
}

/// Build the reconstructor for `run` and reconstruct every event.
pub fn run_reconstruction(config: &RecoConfig, run: &RunInput) -> Result<RunOutput, AppError> {
    let zenith = run.mean_zenith().unwrap_or(0.0);
    let reconstructor = Reconstructor::new(config.methods.clone(), run.telescopes.len(), zenith)?;
    Ok(reconstruct_run(&reconstructor, run))
}

/// Reconstruct every event of `run` with an already configured reconstructor.
pub fn reconstruct_run(reconstructor: &Reconstructor, run: &RunInput) -> RunOutput {
    info!(
        run = run.run_number,
        events = run.events.len(),
        telescopes = run.telescopes.len(),
        methods = reconstructor.methods().len(),
        "reconstructing run"
    );

    let mut mismatch = PointingMismatchStats::new(run.telescopes.len());
    let mut events = Vec::with_capacity(run.events.len());

    for event in &run.events {
        mismatch.record(event);
        let ctx = EventContext::prepare(&run.telescopes, event);
        let records = reconstructor.reconstruct_event(&ctx);
        debug!(
            event = event.event_number,
            ok = records.iter().filter(|r| r.is_success()).count(),
            "event done"
        );
        events.push(EventReconstruction {
            event_number: event.event_number,
            records,
            truth: event.truth,
        });
    }

    let summary = summarize(run.run_number, &events, mismatch.summaries());
    info!(run = run.run_number, events = events.len(), "run finished");

    RunOutput { events, summary }
}
