//! Accuracy, per-class precision/recall/F1, and confusion matrix.

use crate::models::{
    damage_record::DamageLevel,
    model_metrics::{ClassMetrics, ClassificationReport},
};

/// Scores of a classifier on a held-out set.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub accuracy: f64,
    /// Support-weighted averages over the reported classes.
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub report: ClassificationReport,
    pub confusion_matrix: Vec<Vec<u32>>,
}

/// Compare predictions against the truth.
///
/// Classes that appear in neither `y_true` nor `y_pred` are left out of the
/// report; undefined ratios count as 0.
pub fn evaluate(y_true: &[DamageLevel], y_pred: &[DamageLevel]) -> Evaluation {
    let k = DamageLevel::ALL.len();
    let mut matrix = vec![vec![0u32; k]; k];
    for (t, p) in y_true.iter().zip(y_pred) {
        matrix[t.index()][p.index()] += 1;
    }

    let total = y_true.len().min(y_pred.len());
    let correct: u32 = (0..k).map(|i| matrix[i][i]).sum();
    let accuracy = ratio(f64::from(correct), total as f64);

    let mut report = ClassificationReport::new();
    let (mut w_precision, mut w_recall, mut w_f1, mut w_support) = (0.0, 0.0, 0.0, 0u32);
    for level in DamageLevel::ALL {
        let i = level.index();
        let tp = f64::from(matrix[i][i]);
        let support: u32 = matrix[i].iter().sum();
        let predicted: u32 = (0..k).map(|r| matrix[r][i]).sum();
        if support == 0 && predicted == 0 {
            continue;
        }

        let precision = ratio(tp, f64::from(predicted));
        let recall = ratio(tp, f64::from(support));
        let f1 = ratio(2.0 * precision * recall, precision + recall);

        w_precision += precision * f64::from(support);
        w_recall += recall * f64::from(support);
        w_f1 += f1 * f64::from(support);
        w_support += support;

        report.insert(
            level.as_str().to_string(),
            ClassMetrics {
                precision,
                recall,
                f1_score: f1,
                support,
            },
        );
    }

    let weight = f64::from(w_support);
    Evaluation {
        accuracy,
        precision: ratio(w_precision, weight),
        recall: ratio(w_recall, weight),
        f1_score: ratio(w_f1, weight),
        report,
        confusion_matrix: matrix,
    }
}

fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { 0.0 } else { num / den }
}
