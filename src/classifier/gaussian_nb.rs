//! Gaussian Naive Bayes over the seven damage features.

use super::ClassifierError;
use crate::models::damage_record::{DamageLevel, FEATURE_COUNT};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Fraction of the largest feature variance added to every variance.
pub const VAR_SMOOTHING: f64 = 1e-9;

type FeatureVector = [f64; FEATURE_COUNT];

/// A fitted Gaussian Naive Bayes model.
///
/// Classes are kept in canonical [`DamageLevel`] order; classes that did not
/// appear in the training labels are absent and always get probability 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GaussianNb {
    pub classes: Vec<DamageLevel>,
    pub class_count: Vec<usize>,
    pub class_prior: Vec<f64>,
    pub theta: Vec<FeatureVector>,
    pub var: Vec<FeatureVector>,
    pub epsilon: f64,
}

impl GaussianNb {
    /// Estimate priors, means, and variances from labelled samples.
    pub fn fit(samples: &[FeatureVector], labels: &[DamageLevel]) -> Result<Self, ClassifierError> {
        if samples.len() != labels.len() {
            return Err(ClassifierError::LengthMismatch {
                samples: samples.len(),
                labels: labels.len(),
            });
        }
        if samples.is_empty() {
            return Err(ClassifierError::EmptyTrainingSet);
        }

        let max_var = (0..FEATURE_COUNT)
            .map(|j| variance(samples.iter().map(|s| s[j])))
            .fold(0.0_f64, f64::max);
        let epsilon = if max_var > 0.0 {
            VAR_SMOOTHING * max_var
        } else {
            VAR_SMOOTHING
        };

        let total = samples.len() as f64;
        let mut model = GaussianNb {
            classes: Vec::new(),
            class_count: Vec::new(),
            class_prior: Vec::new(),
            theta: Vec::new(),
            var: Vec::new(),
            epsilon,
        };

        for level in DamageLevel::ALL {
            let rows: Vec<&FeatureVector> = samples
                .iter()
                .zip(labels)
                .filter(|(_, l)| **l == level)
                .map(|(s, _)| s)
                .collect();
            if rows.is_empty() {
                continue;
            }

            let mut theta = [0.0; FEATURE_COUNT];
            let mut var = [0.0; FEATURE_COUNT];
            for j in 0..FEATURE_COUNT {
                theta[j] = mean(rows.iter().map(|r| r[j]));
                var[j] = variance(rows.iter().map(|r| r[j])) + epsilon;
            }

            model.classes.push(level);
            model.class_count.push(rows.len());
            model.class_prior.push(rows.len() as f64 / total);
            model.theta.push(theta);
            model.var.push(var);
        }

        Ok(model)
    }

    /// Per-class joint log-likelihood, aligned with `self.classes`.
    fn joint_log_likelihood(&self, x: &FeatureVector) -> Vec<f64> {
        self.classes
            .iter()
            .enumerate()
            .map(|(i, _)| {
                let mut ll = self.class_prior[i].ln();
                for j in 0..FEATURE_COUNT {
                    let var = self.var[i][j];
                    let diff = x[j] - self.theta[i][j];
                    ll -= 0.5 * (2.0 * PI * var).ln();
                    ll -= 0.5 * diff * diff / var;
                }
                ll
            })
            .collect()
    }

    /// Posterior probability of each fitted class.
    ///
    /// `None` when `x` lies so far from every class that no likelihood is
    /// representable (all log-likelihoods overflow to `-inf`).
    pub fn predict_proba(&self, x: &FeatureVector) -> Option<Vec<(DamageLevel, f64)>> {
        let jll = self.joint_log_likelihood(x);
        let max = jll.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return None;
        }
        let log_norm = max + jll.iter().map(|v| (v - max).exp()).sum::<f64>().ln();

        let proba: Vec<(DamageLevel, f64)> = self
            .classes
            .iter()
            .copied()
            .zip(jll.iter().map(|v| (v - log_norm).exp()))
            .collect();
        proba
            .iter()
            .all(|(_, p)| p.is_finite() && (0.0..=1.0).contains(p))
            .then_some(proba)
    }

    /// Most probable class and its probability.
    pub fn predict(&self, x: &FeatureVector) -> Option<(DamageLevel, f64)> {
        self.predict_proba(x)?
            .into_iter()
            .reduce(|best, cur| if cur.1 > best.1 { cur } else { best })
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

/// Population variance (ddof = 0).
fn variance(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let m = mean(values.clone());
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + (v - m) * (v - m), n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}
