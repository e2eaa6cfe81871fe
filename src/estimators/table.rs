//! Lookup-table disp estimator.
//!
//! The table is binned in `log10(size)` (rows) and `width/length` (columns).
//! Values outside the edges are clamped into the first/last bin.

use serde::{Deserialize, Serialize};

use super::{DispEstimator, DispFeatures, DispPrediction, EstimatorKind, Feature};

/// On-disk table model. `disp[i][j]` covers log-size bin `i`, shape bin `j`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    #[serde(default = "super::default_true")]
    pub valid: bool,
    pub log_size_edges: Vec<f64>,
    pub shape_edges: Vec<f64>,
    pub disp: Vec<Vec<f64>>,
    /// Spread of disp in each bin.
    #[serde(default)]
    pub sigma: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Clone)]
pub struct TableEstimator {
    model: TableModel,
    valid: bool,
}

fn edges_ok(edges: &[f64]) -> bool {
    edges.len() >= 2 && edges.iter().all(|e| e.is_finite()) && edges.windows(2).all(|w| w[0] < w[1])
}

fn grid_ok(grid: &[Vec<f64>], rows: usize, cols: usize) -> bool {
    grid.len() == rows && grid.iter().all(|r| r.len() == cols)
}

/// Bin index of `v`, clamped to the table.
fn bin(edges: &[f64], v: f64) -> usize {
    let n_bins = edges.len() - 1;
    edges[1..]
        .iter()
        .position(|upper| v < *upper)
        .unwrap_or(n_bins - 1)
}

impl TableEstimator {
    pub fn from_model(model: TableModel) -> Self {
        let valid = model.valid
            && edges_ok(&model.log_size_edges)
            && edges_ok(&model.shape_edges)
            && {
                let rows = model.log_size_edges.len() - 1;
                let cols = model.shape_edges.len() - 1;
                grid_ok(&model.disp, rows, cols)
                    && model.sigma.as_ref().is_none_or(|s| grid_ok(s, rows, cols))
            };
        Self { model, valid }
    }

    fn lookup(&self, f: &DispFeatures) -> (usize, usize) {
        let i = bin(&self.model.log_size_edges, Feature::LogSize.value(f));
        let j = bin(&self.model.shape_edges, Feature::ShapeRatio.value(f));
        (i, j)
    }
}

impl DispEstimator for TableEstimator {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Table
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn evaluate(&self, features: &DispFeatures) -> Option<DispPrediction> {
        if !self.valid {
            return None;
        }
        let (i, j) = self.lookup(features);
        let disp = self.model.disp[i][j];
        // Empty bins are stored as zero or negative.
        if disp.is_nan() || disp <= 0.0 {
            return None;
        }
        let sigma = self.model.sigma.as_ref().map(|s| s[i][j]);
        DispPrediction::checked(disp, sigma)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::tests::sample_features;

    fn model() -> TableModel {
        TableModel {
            valid: true,
            log_size_edges: vec![2.0, 2.5, 3.5, 5.0],
            shape_edges: vec![0.0, 0.5, 1.0],
            disp: vec![vec![0.4, 0.2], vec![0.9, 0.5], vec![1.3, 0.0]],
            sigma: Some(vec![vec![0.1, 0.1], vec![0.15, 0.1], vec![0.2, 0.2]]),
        }
    }

    #[test]
    fn looks_up_bin() {
        let est = TableEstimator::from_model(model());
        assert!(est.is_valid());
        // log10(1000) = 3, shape 1/3
        let p = est.evaluate(&sample_features()).unwrap();
        assert_eq!(p.disp, 0.9);
        assert_eq!(p.uncertainty, Some(0.15));
    }

    #[test]
    fn clamps_out_of_range_values() {
        let est = TableEstimator::from_model(model());
        let mut f = sample_features();
        f.size = 10.0;
        assert_eq!(est.evaluate(&f).unwrap().disp, 0.4);
        f.size = 1e9;
        f.width = 0.1;
        assert_eq!(est.evaluate(&f).unwrap().disp, 1.3);
    }

    #[test]
    fn empty_bin_gives_no_prediction() {
        let est = TableEstimator::from_model(model());
        let mut f = sample_features();
        f.size = 1e6;
        f.width = 0.25;
        assert!(est.evaluate(&f).is_none());
    }

    #[test]
    fn ragged_grid_is_invalid() {
        let mut m = model();
        m.disp[1].pop();
        assert!(!TableEstimator::from_model(m).is_valid());

        let mut m = model();
        m.shape_edges = vec![0.5, 0.2, 1.0];
        assert!(!TableEstimator::from_model(m).is_valid());
    }
}
