//! Evaluation metrics recorded for each training run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Precision/recall/F1 for one class.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    #[serde(rename = "f1-score")]
    pub f1_score: f64,
    pub support: u32,
}

/// Per-class metrics keyed by damage level name.
pub type ClassificationReport = BTreeMap<String, ClassMetrics>;

/// One training session's stored metrics.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct ModelMetrics {
    pub id: Uuid,

    /// Size of the training split.
    pub training_samples: i64,

    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,

    pub classification_report: Json<ClassificationReport>,

    /// Rows are true labels, columns predictions, both in canonical order.
    pub confusion_matrix: Json<Vec<Vec<u32>>>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Body of `POST /predictions/train`.
#[derive(Deserialize, Debug, Clone)]
pub struct TrainingRequest {
    #[serde(default = "default_test_size")]
    pub test_size: f64,
    pub notes: Option<String>,
}

impl Default for TrainingRequest {
    fn default() -> Self {
        Self {
            test_size: default_test_size(),
            notes: None,
        }
    }
}

fn default_test_size() -> f64 {
    0.2
}

/// Response of `POST /predictions/train`.
#[derive(Serialize, Debug, Clone)]
pub struct TrainingResult {
    pub success: bool,
    pub message: String,
    pub training_samples: usize,
    pub test_samples: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub classification_report: ClassificationReport,
    pub confusion_matrix: Vec<Vec<u32>>,
    pub metrics_id: Uuid,
}

/// Metrics history listing.
#[derive(Serialize, Debug, Clone)]
pub struct ModelMetricsList {
    pub items: Vec<ModelMetrics>,
    pub total: i64,
}

/// Current classifier state.
#[derive(Serialize, Debug, Clone, Default)]
pub struct ModelStatus {
    pub is_trained: bool,
    pub training_samples: Option<usize>,
    pub last_trained_at: Option<DateTime<Utc>>,
    pub accuracy: Option<f64>,
}

/// Fitted classifier parameters.
#[derive(Serialize, Debug, Clone)]
pub struct ModelInfo {
    pub class_count: usize,
    pub classes: Vec<String>,
    pub feature_count: usize,
    pub feature_names: Vec<String>,
    pub class_prior: Vec<f64>,
    /// Mean of each feature per class.
    pub theta: Vec<Vec<f64>>,
    /// Variance of each feature per class.
    pub var: Vec<Vec<f64>>,
}
