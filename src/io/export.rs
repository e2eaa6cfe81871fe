//! Export reconstruction records.
//!
//! - JSON lines: one object per (event, method), including per-image disp
//!   contributions
//! - CSV: the same rows without the contributions, for spreadsheets
//!
//! The telescope selection is written as a bitcode here and nowhere else.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::domain::{DispContribution, EventReconstruction, FitStatus, ReconstructionRecord};
use crate::error::AppError;

/// Flat, serialisable view of one record.
#[derive(Debug, Clone, Serialize)]
pub struct ExportRow<'a> {
    pub run_number: u64,
    pub event_number: u64,
    pub method: u8,
    pub method_name: &'static str,
    pub method_used: u8,
    pub status: FitStatus,
    pub chi2: f64,
    pub n_images: usize,
    pub bitcode: u64,
    pub x_offset: f64,
    pub y_offset: f64,
    pub direction_std: f64,
    pub zenith: f64,
    pub azimuth: f64,
    pub core_x: f64,
    pub core_y: f64,
    pub shower_core_x: f64,
    pub shower_core_y: f64,
    pub core_std: f64,
    pub axes_angle_deg: f64,
    pub disp_diff: f64,
    #[serde(skip_serializing_if = "no_contributions")]
    pub disp_contributions: &'a [DispContribution],
}

impl<'a> ExportRow<'a> {
    pub fn new(run_number: u64, event_number: u64, rec: &'a ReconstructionRecord) -> Self {
        Self {
            run_number,
            event_number,
            method: rec.method.id(),
            method_name: rec.method.display_name(),
            method_used: rec.method_used.id(),
            status: rec.status,
            chi2: rec.chi2(),
            n_images: rec.n_images(),
            bitcode: rec.selection_bitcode(),
            x_offset: rec.x_offset,
            y_offset: rec.y_offset,
            direction_std: rec.direction_std,
            zenith: rec.zenith,
            azimuth: rec.azimuth,
            core_x: rec.core_x,
            core_y: rec.core_y,
            shower_core_x: rec.shower_core_x,
            shower_core_y: rec.shower_core_y,
            core_std: rec.core_std,
            axes_angle_deg: rec.axes_angle_deg,
            disp_diff: rec.disp_diff,
            disp_contributions: &rec.disp_contributions,
        }
    }
}

fn no_contributions(c: &&[DispContribution]) -> bool {
    c.is_empty()
}

fn rows(run_number: u64, events: &[EventReconstruction]) -> impl Iterator<Item = ExportRow<'_>> {
    events.iter().flat_map(move |ev| {
        ev.records
            .iter()
            .map(move |rec| ExportRow::new(run_number, ev.event_number, rec))
    })
}

/// Write one JSON object per line.
pub fn write_records_jsonl(path: &Path, run_number: u64, events: &[EventReconstruction]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create output '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    for row in rows(run_number, events) {
        serde_json::to_writer(&mut out, &row)
            .map_err(|e| AppError::input(format!("Failed to write output record: {e}")))?;
        writeln!(out).map_err(|e| AppError::input(format!("Failed to write output record: {e}")))?;
    }
    out.flush()
        .map_err(|e| AppError::input(format!("Failed to flush output '{}': {e}", path.display())))
}

/// Write a CSV table of all records.
pub fn write_records_csv(path: &Path, run_number: u64, events: &[EventReconstruction]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    let mut file = BufWriter::new(file);

    writeln!(
        file,
        "run,event,method,method_used,chi2,n_images,bitcode,x_offset,y_offset,direction_std,zenith,azimuth,\
         core_x,core_y,shower_core_x,shower_core_y,core_std,axes_angle_deg,disp_diff"
    )
    .map_err(|e| AppError::input(format!("Failed to write export CSV header: {e}")))?;

    for r in rows(run_number, events) {
        writeln!(
            file,
            "{},{},{},{},{},{},{},{:.6},{:.6},{:.6},{:.6},{:.6},{:.3},{:.3},{:.3},{:.3},{:.3},{:.4},{:.6}",
            r.run_number,
            r.event_number,
            r.method,
            r.method_used,
            r.chi2,
            r.n_images,
            r.bitcode,
            r.x_offset,
            r.y_offset,
            r.direction_std,
            r.zenith,
            r.azimuth,
            r.core_x,
            r.core_y,
            r.shower_core_x,
            r.shower_core_y,
            r.core_std,
            r.axes_angle_deg,
            r.disp_diff,
        )
        .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    file.flush()
        .map_err(|e| AppError::input(format!("Failed to flush export CSV '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ReconstructionMethod, TelescopeIndex};

    #[test]
    fn row_carries_status_and_bitcode() {
        let mut rec = ReconstructionRecord::reset(ReconstructionMethod::HegraPair);
        rec.selected.insert(TelescopeIndex(1));
        rec.selected.insert(TelescopeIndex(2));
        rec.fail(FitStatus::DegenerateGeometry);

        let row = ExportRow::new(10, 4, &rec);
        assert_eq!(row.method, 3);
        assert_eq!(row.chi2, -1.0);
        assert_eq!(row.bitcode, 0b110);
        assert_eq!(row.n_images, 2);

        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["status"], "degenerate_geometry");
        assert_eq!(json["x_offset"], -99999.0);
        assert!(json.get("disp_contributions").is_none());
    }
}
