//! Run input files: telescope layout plus events, as JSON.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::domain::RunInput;
use crate::error::AppError;

/// Read and validate a run file.
pub fn read_run(path: &Path) -> Result<RunInput, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open run input '{}': {e}", path.display())))?;
    let run: RunInput = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::input(format!("Invalid run input '{}': {e}", path.display())))?;
    validate_run(&run)?;
    Ok(run)
}

/// Write a run file (pretty JSON).
pub fn write_run(path: &Path, run: &RunInput) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create run file '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), run)
        .map_err(|e| AppError::input(format!("Failed to write run file: {e}")))
}

/// Structural checks that do not depend on the reconstruction config.
pub fn validate_run(run: &RunInput) -> Result<(), AppError> {
    if run.telescopes.is_empty() {
        return Err(AppError::input("Run input lists no telescopes."));
    }
    for (i, tel) in run.telescopes.iter().enumerate() {
        if !(tel.focal_length.is_finite() && tel.focal_length > 0.0) {
            return Err(AppError::input(format!(
                "Telescope {} has an invalid focal length ({}).",
                i + 1,
                tel.focal_length
            )));
        }
        if !(tel.x.is_finite() && tel.y.is_finite() && tel.z.is_finite()) {
            return Err(AppError::input(format!("Telescope {} has a non-finite position.", i + 1)));
        }
    }
    for event in &run.events {
        if event.telescopes.len() > run.telescopes.len() {
            return Err(AppError::input(format!(
                "Event {} lists {} telescopes, the layout has {}.",
                event.event_number,
                event.telescopes.len(),
                run.telescopes.len()
            )));
        }
        let p = event.array_pointing;
        if !(p.elevation.is_finite() && p.azimuth.is_finite()) {
            return Err(AppError::input(format!(
                "Event {} has a non-finite array pointing.",
                event.event_number
            )));
        }
    }
    Ok(())
}
