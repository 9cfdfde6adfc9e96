//! Multinomial logistic regression trained with full-batch gradient descent.
//!
//! Inputs are standardized with the training mean and standard deviation
//! before fitting; the learned statistics travel with the model so that
//! inference applies the same transform.
//!
//! The objective is the mean cross-entropy plus an L2 penalty on the weights
//! (intercepts are not penalized):
//!
//! ```text
//! J(W, b) = mean_i( -log softmax(W·x_i + b)[y_i] ) + ||W||² / (2·C·n)
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Classifier;
use crate::error::ModelError;

/// Training hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hyperparameters {
    /// Maximum gradient-descent iterations.
    pub max_iter: usize,
    /// Step size.
    pub learning_rate: f64,
    /// Inverse regularization strength; smaller is stronger.
    pub c: f64,
    /// Stop once every gradient component is below this magnitude.
    pub tolerance: f64,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            max_iter: 1000,
            learning_rate: 0.5,
            c: 1.0,
            tolerance: 1e-4,
        }
    }
}

impl Hyperparameters {
    /// Reject values that would make training diverge or never start.
    pub fn validate(&self) -> Result<(), ModelError> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if self.max_iter == 0 {
            return Err(ModelError::InvalidHyperparameters(
                "max_iter must be at least 1".to_string(),
            ));
        }
        if !positive(self.learning_rate) {
            return Err(ModelError::InvalidHyperparameters(
                "learning_rate must be positive".to_string(),
            ));
        }
        if !positive(self.c) {
            return Err(ModelError::InvalidHyperparameters(
                "C must be positive".to_string(),
            ));
        }
        if !positive(self.tolerance) {
            return Err(ModelError::InvalidHyperparameters(
                "tolerance must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A fitted multinomial logistic-regression model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    /// Sorted class labels; row `k` of `weights` scores `classes[k]`.
    classes: Vec<String>,
    /// Per-feature training mean.
    mean: Vec<f64>,
    /// Per-feature training standard deviation (1.0 for constant columns).
    scale: Vec<f64>,
    /// `[class][feature]` weights in standardized space.
    weights: Vec<Vec<f64>>,
    /// Per-class intercepts.
    intercepts: Vec<f64>,
    /// Iterations actually run.
    n_iter: usize,
}

impl LogisticRegression {
    /// Fit a model on `x` (one row per sample) and labels `y`.
    pub fn fit(x: &[Vec<f64>], y: &[String], params: &Hyperparameters) -> Result<Self, ModelError> {
        params.validate()?;
        if x.is_empty() {
            return Err(ModelError::EmptyTrainingSet);
        }
        if x.len() != y.len() {
            return Err(ModelError::LabelMismatch {
                samples: x.len(),
                labels: y.len(),
            });
        }

        let n = x.len();
        let d = x[0].len();
        for row in x {
            check_row(row, d)?;
        }

        let classes: Vec<String> = y
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if classes.len() < 2 {
            return Err(ModelError::TooFewClasses {
                found: classes.len(),
            });
        }
        let k = classes.len();
        let targets: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let (mean, scale) = standardization(x, d);
        let z: Vec<Vec<f64>> = x
            .iter()
            .map(|row| standardize(row, &mean, &scale))
            .collect();

        let mut weights = vec![vec![0.0; d]; k];
        let mut intercepts = vec![0.0; k];
        let inv_n = 1.0 / n as f64;
        let penalty = 1.0 / (params.c * n as f64);

        let mut n_iter = 0;
        for iter in 0..params.max_iter {
            n_iter = iter + 1;

            let mut grad_w = vec![vec![0.0; d]; k];
            let mut grad_b = vec![0.0; k];
            for (row, &target) in z.iter().zip(&targets) {
                let probs = softmax(&scores(&weights, &intercepts, row));
                for (class, p) in probs.iter().enumerate() {
                    let residual = p - if class == target { 1.0 } else { 0.0 };
                    grad_b[class] += residual;
                    for (g, xj) in grad_w[class].iter_mut().zip(row) {
                        *g += residual * xj;
                    }
                }
            }

            let mut max_grad: f64 = 0.0;
            for class in 0..k {
                grad_b[class] *= inv_n;
                max_grad = max_grad.max(grad_b[class].abs());
                for j in 0..d {
                    grad_w[class][j] = grad_w[class][j] * inv_n + penalty * weights[class][j];
                    max_grad = max_grad.max(grad_w[class][j].abs());
                }
            }

            if max_grad < params.tolerance {
                break;
            }

            for class in 0..k {
                intercepts[class] -= params.learning_rate * grad_b[class];
                for j in 0..d {
                    weights[class][j] -= params.learning_rate * grad_w[class][j];
                }
            }
        }

        debug!(n_iter, classes = k, features = d, "Logistic regression fitted");

        Ok(Self {
            classes,
            mean,
            scale,
            weights,
            intercepts,
            n_iter,
        })
    }

    /// Class probabilities for one sample, aligned with [`Classifier::classes`].
    pub fn predict_proba(&self, features: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_row(features, self.mean.len())?;
        let z = standardize(features, &self.mean, &self.scale);
        Ok(softmax(&scores(&self.weights, &self.intercepts, &z)))
    }

    /// Iterations run during fitting.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    /// Check that deserialized parameters agree in shape and are finite.
    pub fn validate(&self) -> Result<(), ModelError> {
        let d = self.mean.len();
        let k = self.classes.len();
        if k < 2 {
            return Err(ModelError::Corrupt(format!("need at least two classes, found {k}")));
        }
        if self.weights.len() != k || self.intercepts.len() != k {
            return Err(ModelError::Corrupt(format!(
                "{k} classes but {} weight rows and {} intercepts",
                self.weights.len(),
                self.intercepts.len()
            )));
        }
        if self.scale.len() != d {
            return Err(ModelError::Corrupt(format!(
                "{d} feature means but {} scales",
                self.scale.len()
            )));
        }
        if let Some(row) = self.weights.iter().position(|w| w.len() != d) {
            return Err(ModelError::Corrupt(format!(
                "weight row {row} has {} entries, expected {d}",
                self.weights[row].len()
            )));
        }
        if self.scale.iter().any(|s| !s.is_finite() || *s == 0.0) {
            return Err(ModelError::Corrupt(
                "feature scales must be finite and non-zero".to_string(),
            ));
        }
        let finite = self
            .mean
            .iter()
            .chain(&self.intercepts)
            .chain(self.weights.iter().flatten())
            .all(|v| v.is_finite());
        if !finite {
            return Err(ModelError::Corrupt(
                "parameters must be finite numbers".to_string(),
            ));
        }
        Ok(())
    }
}

impl Classifier for LogisticRegression {
    fn predict(&self, features: &[f64]) -> Result<String, ModelError> {
        let probs = self.predict_proba(features)?;
        let best = probs
            .iter()
            .enumerate()
            .fold(0, |best, (i, p)| if *p > probs[best] { i } else { best });
        self.classes.get(best).cloned().ok_or_else(|| {
            ModelError::Corrupt(format!(
                "score {best} has no class among {} labels",
                self.classes.len()
            ))
        })
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.mean.len()
    }
}

fn check_row(row: &[f64], expected: usize) -> Result<(), ModelError> {
    if row.len() != expected {
        return Err(ModelError::FeatureCount {
            expected,
            actual: row.len(),
        });
    }
    if let Some(index) = row.iter().position(|v| !v.is_finite()) {
        return Err(ModelError::NonFinite { index });
    }
    Ok(())
}

fn standardization(x: &[Vec<f64>], d: usize) -> (Vec<f64>, Vec<f64>) {
    let n = x.len() as f64;
    let mut mean = vec![0.0; d];
    for row in x {
        for (m, v) in mean.iter_mut().zip(row) {
            *m += v;
        }
    }
    mean.iter_mut().for_each(|m| *m /= n);

    let mut scale = vec![0.0; d];
    for row in x {
        for ((s, v), m) in scale.iter_mut().zip(row).zip(&mean) {
            *s += (v - m).powi(2);
        }
    }
    for s in scale.iter_mut() {
        let std = (*s / n).sqrt();
        *s = if std > f64::EPSILON { std } else { 1.0 };
    }
    (mean, scale)
}

fn standardize(row: &[f64], mean: &[f64], scale: &[f64]) -> Vec<f64> {
    row.iter()
        .zip(mean)
        .zip(scale)
        .map(|((v, m), s)| (v - m) / s)
        .collect()
}

fn scores(weights: &[Vec<f64>], intercepts: &[f64], row: &[f64]) -> Vec<f64> {
    weights
        .iter()
        .zip(intercepts)
        .map(|(w, b)| b + w.iter().zip(row).map(|(wj, xj)| wj * xj).sum::<f64>())
        .collect()
}

fn softmax(scores: &[f64]) -> Vec<f64> {
    let max = scores.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = scores.iter().map(|s| (s - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}
