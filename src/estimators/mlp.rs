//! Feed-forward network disp estimator.
//!
//! Layout: standardised inputs, `tanh` hidden layers, linear output layer.
//! The first output is the displacement; a second output, when present, is
//! read as its uncertainty.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use super::{DispEstimator, DispFeatures, DispPrediction, EstimatorKind, Feature, feature_vector};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpLayer {
    /// One row per output neuron.
    pub weights: Vec<Vec<f64>>,
    pub biases: Vec<f64>,
}

/// On-disk MLP model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpModel {
    #[serde(default = "super::default_true")]
    pub valid: bool,
    #[serde(default = "Feature::default_inputs")]
    pub inputs: Vec<Feature>,
    #[serde(default)]
    pub input_mean: Vec<f64>,
    #[serde(default)]
    pub input_scale: Vec<f64>,
    pub layers: Vec<MlpLayer>,
}

#[derive(Debug, Clone)]
struct Layer {
    weights: DMatrix<f64>,
    biases: DVector<f64>,
}

#[derive(Debug, Clone)]
pub struct MlpEstimator {
    inputs: Vec<Feature>,
    mean: DVector<f64>,
    scale: DVector<f64>,
    layers: Vec<Layer>,
    valid: bool,
}

impl MlpEstimator {
    /// Build the network; shape mismatches yield an invalid estimator.
    pub fn from_model(model: MlpModel) -> Self {
        let n_in = model.inputs.len();
        let mean = if model.input_mean.is_empty() {
            DVector::zeros(n_in)
        } else {
            DVector::from_vec(model.input_mean.clone())
        };
        let scale = if model.input_scale.is_empty() {
            DVector::from_element(n_in, 1.0)
        } else {
            DVector::from_vec(model.input_scale.clone())
        };

        let mut valid = model.valid
            && n_in > 0
            && mean.len() == n_in
            && scale.len() == n_in
            && scale.iter().all(|s| s.is_finite() && *s != 0.0)
            && !model.layers.is_empty();

        let mut layers = Vec::with_capacity(model.layers.len());
        let mut width = n_in;
        for layer in &model.layers {
            let rows = layer.weights.len();
            let consistent = rows > 0
                && layer.biases.len() == rows
                && layer.weights.iter().all(|r| r.len() == width);
            if !consistent {
                valid = false;
                break;
            }
            let flat: Vec<f64> = layer.weights.iter().flatten().copied().collect();
            layers.push(Layer {
                weights: DMatrix::from_row_slice(rows, width, &flat),
                biases: DVector::from_vec(layer.biases.clone()),
            });
            width = rows;
        }

        Self {
            inputs: model.inputs,
            mean,
            scale,
            layers,
            valid,
        }
    }

    fn forward(&self, x: DVector<f64>) -> DVector<f64> {
        let last = self.layers.len().saturating_sub(1);
        let mut a = x;
        for (i, layer) in self.layers.iter().enumerate() {
            let z = &layer.weights * &a + &layer.biases;
            a = if i == last { z } else { z.map(f64::tanh) };
        }
        a
    }
}

impl DispEstimator for MlpEstimator {
    fn kind(&self) -> EstimatorKind {
        EstimatorKind::Mlp
    }

    fn is_valid(&self) -> bool {
        self.valid
    }

    fn evaluate(&self, features: &DispFeatures) -> Option<DispPrediction> {
        if !self.valid {
            return None;
        }
        let raw = DVector::from_vec(feature_vector(&self.inputs, features));
        let x = (raw - &self.mean).component_div(&self.scale);
        let out = self.forward(x);
        let disp = out[0];
        let uncertainty = if out.len() > 1 { Some(out[1].abs()) } else { None };
        DispPrediction::checked(disp, uncertainty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimators::tests::sample_features;

    fn linear_model() -> MlpModel {
        // disp = 2 * length + 0.1, through one identity-like hidden unit.
        MlpModel {
            valid: true,
            inputs: vec![Feature::Length],
            input_mean: vec![],
            input_scale: vec![],
            layers: vec![
                MlpLayer { weights: vec![vec![1e-3]], biases: vec![0.0] },
                MlpLayer { weights: vec![vec![2.0e3]], biases: vec![0.1] },
            ],
        }
    }

    #[test]
    fn evaluates_small_network() {
        let est = MlpEstimator::from_model(linear_model());
        assert!(est.is_valid());
        let f = sample_features();
        let p = est.evaluate(&f).unwrap();
        // tanh(x) ≈ x for tiny x.
        assert!((p.disp - (2.0 * f.length + 0.1)).abs() < 1e-6, "disp = {}", p.disp);
        assert_eq!(p.uncertainty, None);
    }

    #[test]
    fn second_output_is_uncertainty() {
        let mut model = linear_model();
        model.layers[1] = MlpLayer {
            weights: vec![vec![2.0e3], vec![0.0]],
            biases: vec![0.1, -0.05],
        };
        let p = MlpEstimator::from_model(model).evaluate(&sample_features()).unwrap();
        assert_eq!(p.uncertainty, Some(0.05));
    }

    #[test]
    fn inconsistent_shapes_mark_model_invalid() {
        let mut model = linear_model();
        model.layers[1].weights = vec![vec![1.0, 2.0]];
        let est = MlpEstimator::from_model(model);
        assert!(!est.is_valid());
        assert!(est.evaluate(&sample_features()).is_none());
    }

    #[test]
    fn model_flag_marks_invalid() {
        let mut model = linear_model();
        model.valid = false;
        assert!(!MlpEstimator::from_model(model).is_valid());
    }
}
