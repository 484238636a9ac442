//! Damage level classification: Gaussian Naive Bayes, seeded stratified
//! splitting, and evaluation.

pub mod evaluation;
pub mod gaussian_nb;
pub mod split;

use crate::models::damage_record::{DamageLevel, FEATURE_COUNT};
use evaluation::Evaluation;
use gaussian_nb::GaussianNb;
use thiserror::Error;

/// Fewest labelled samples accepted for training.
pub const MIN_TRAINING_SAMPLES: usize = 10;

/// Seed of the train/test shuffle so repeated runs on the same data agree.
pub const SPLIT_SEED: u64 = 42;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClassifierError {
    #[error(
        "Insufficient training data. Found {found}, minimum {min} required.",
        min = MIN_TRAINING_SAMPLES
    )]
    InsufficientSamples { found: usize },
    #[error("test_size must be between 0 and 1 (exclusive), got {0}")]
    InvalidTestSize(f64),
    #[error("damage level `{0}` has fewer than 2 samples; every class needs at least 2")]
    ClassTooSmall(DamageLevel),
    #[error(
        "train ({train}) and test ({test}) splits must each hold at least {classes} samples"
    )]
    SplitTooSmall {
        train: usize,
        test: usize,
        classes: usize,
    },
    #[error("got {samples} samples but {labels} labels")]
    LengthMismatch { samples: usize, labels: usize },
    #[error("no training samples")]
    EmptyTrainingSet,
    #[error("Feature values are too far from the training data to classify")]
    Unclassifiable,
}

/// A fitted model with its held-out evaluation.
#[derive(Debug, Clone)]
pub struct Trained {
    pub model: GaussianNb,
    pub evaluation: Evaluation,
    pub training_samples: usize,
    pub test_samples: usize,
}

/// Split, fit on the training side, and score on the test side.
pub fn train(
    samples: &[[f64; FEATURE_COUNT]],
    labels: &[DamageLevel],
    test_size: f64,
) -> Result<Trained, ClassifierError> {
    if samples.len() != labels.len() {
        return Err(ClassifierError::LengthMismatch {
            samples: samples.len(),
            labels: labels.len(),
        });
    }
    if samples.len() < MIN_TRAINING_SAMPLES {
        return Err(ClassifierError::InsufficientSamples {
            found: samples.len(),
        });
    }

    let split = split::stratified_split(labels, test_size, SPLIT_SEED)?;
    let pick = |idx: &[usize]| -> (Vec<[f64; FEATURE_COUNT]>, Vec<DamageLevel>) {
        idx.iter().map(|&i| (samples[i], labels[i])).unzip()
    };
    let (x_train, y_train) = pick(&split.train);
    let (x_test, y_test) = pick(&split.test);

    let model = GaussianNb::fit(&x_train, &y_train)?;
    let y_pred = x_test
        .iter()
        .map(|x| {
            model
                .predict(x)
                .map(|(level, _)| level)
                .ok_or(ClassifierError::Unclassifiable)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let evaluation = evaluation::evaluate(&y_test, &y_pred);

    Ok(Trained {
        model,
        evaluation,
        training_samples: x_train.len(),
        test_samples: x_test.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_fewer_than_ten_samples() {
        let x = vec![[1.0; FEATURE_COUNT]; 9];
        let y = vec![DamageLevel::Ringan; 9];
        assert_eq!(
            train(&x, &y, 0.2).unwrap_err(),
            ClassifierError::InsufficientSamples { found: 9 }
        );
    }

    #[test]
    fn trains_on_separable_data() {
        let mut x = Vec::new();
        let mut y = Vec::new();
        for i in 0..10 {
            let d = i as f64 * 0.05;
            x.push([2.0 + d, 0.5 + d, 1.0, 6.0, 2.0, 1.0, 0.1 + d]);
            y.push(DamageLevel::Ringan);
            x.push([25.0 + d, 3.0 + d, 5.0, 24.0, 5.0, 3.0, 2.0 + d]);
            y.push(DamageLevel::Sedang);
            x.push([80.0 + d, 9.0 + d, 12.0, 60.0, 9.0, 5.0, 8.0 + d]);
            y.push(DamageLevel::Berat);
        }

        let trained = train(&x, &y, 0.2).unwrap();
        assert_eq!(trained.test_samples, 6);
        assert_eq!(trained.training_samples, 24);
        assert_eq!(trained.evaluation.accuracy, 1.0);
        assert_eq!(trained.model.classes.len(), 3);
    }
}
