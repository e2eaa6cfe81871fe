//! Terminal formatting of run summaries and the method list.

use crate::domain::ReconstructionMethod;
use crate::report::RunSummary;

/// Format the end-of-run summary.
pub fn format_run_summary(summary: &RunSummary) -> String {
    let mut out = String::new();

    out.push_str("=== reco - stereo reconstruction ===\n");
    out.push_str(&format!("Run: {}\n", summary.run_number));
    out.push_str(&format!(
        "Finished: {}\n",
        summary.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Events: {}\n", summary.n_events));

    out.push_str("\nMethods:\n");
    out.push_str(&format!(
        "{:<16} {:>7} {:>7} {:>6} {:>6} {:>6} {:>6} {:>6} {:>10} {:>10}\n",
        "method", "events", "ok", "-1/n", "-1/g", "-2/n", "-2/e", "-9999", "err[deg]", "core[m]"
    ));
    for m in &summary.methods {
        out.push_str(&format!(
            "{:<16} {:>7} {:>7} {:>6} {:>6} {:>6} {:>6} {:>6} {:>10} {:>10}\n",
            m.method.display_name(),
            m.n_events,
            m.n_success,
            m.n_insufficient,
            m.n_degenerate,
            m.n_numerical,
            m.n_estimator,
            m.n_out_of_plane,
            fmt_opt(m.mean_angular_error, 4),
            fmt_opt(m.mean_core_error, 2),
        ));
    }

    if !summary.pointing.is_empty() {
        out.push_str("\nPointing mismatch (telescope - array) [deg]:\n");
        out.push_str(&format!(
            "{:<5} {:>7} {:>10} {:>10} {:>10} {:>10}\n",
            "tel", "events", "mean el", "rms el", "mean az", "rms az"
        ));
        for p in &summary.pointing {
            out.push_str(&format!(
                "{:<5} {:>7} {:>10.5} {:>10.5} {:>10.5} {:>10.5}\n",
                p.tel.to_string(),
                p.n_events,
                p.mean_elevation,
                p.rms_elevation,
                p.mean_azimuth,
                p.rms_azimuth
            ));
        }
    }

    out
}

/// Method ids and names, one per line.
pub fn format_methods() -> String {
    let mut out = String::new();
    for m in ReconstructionMethod::ALL {
        let kind = if m.is_geometric() { "geometric" } else { "disp" };
        out.push_str(&format!("{:>2}  {:<14} {kind}\n", m.id(), m.display_name()));
    }
    out
}

fn fmt_opt(v: Option<f64>, digits: usize) -> String {
    match v {
        Some(x) => format!("{x:.digits$}"),
        None => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::summarize;

    #[test]
    fn method_list_has_all_ids() {
        let s = format_methods();
        assert_eq!(s.lines().count(), 7);
        assert!(s.contains(" 8  zenith_blend"));
    }

    #[test]
    fn summary_mentions_run() {
        let s = format_run_summary(&summarize(17, &[], Vec::new()));
        assert!(s.contains("Run: 17"));
        assert!(s.contains("Events: 0"));
    }
}
