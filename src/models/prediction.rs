//! Prediction requests, results, and stored prediction history.

use crate::models::{
    component::Component,
    damage_record::{DamageFeatures, DamageLevel},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use uuid::Uuid;

/// Probability of each damage level.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct Probabilities {
    pub ringan: f64,
    pub sedang: f64,
    pub berat: f64,
}

impl Probabilities {
    /// Every probability is a finite value in `0..=1`.
    pub fn is_valid(&self) -> bool {
        [self.ringan, self.sedang, self.berat]
            .iter()
            .all(|p| p.is_finite() && (0.0..=1.0).contains(p))
    }

    pub fn set(&mut self, level: DamageLevel, value: f64) {
        match level {
            DamageLevel::Ringan => self.ringan = value,
            DamageLevel::Sedang => self.sedang = value,
            DamageLevel::Berat => self.berat = value,
        }
    }
}

/// Body of `POST /predictions/predict`.
#[derive(Deserialize, Debug, Clone)]
pub struct PredictionRequest {
    pub component_id: Uuid,
    #[serde(flatten)]
    pub features: DamageFeatures,
    pub notes: Option<String>,
}

/// Classifier output for a single feature vector.
#[derive(Serialize, Debug, Clone)]
pub struct PredictionResult {
    pub predicted_level: DamageLevel,
    pub confidence: f64,
    pub probabilities: Probabilities,
    pub features_used: DamageFeatures,
    /// Set when the prediction was saved to history.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

/// A saved prediction.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct PredictionHistory {
    pub id: Uuid,
    pub component_id: Uuid,

    #[sqlx(flatten)]
    #[serde(rename = "features_used")]
    pub features: DamageFeatures,

    pub predicted_level: DamageLevel,

    /// Probability of the predicted level (0-1).
    pub confidence: f64,

    pub probabilities: Json<Probabilities>,

    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Saved prediction together with its component.
#[derive(Serialize, Debug, Clone)]
pub struct PredictionResponse {
    #[serde(flatten)]
    pub prediction: PredictionHistory,
    pub component: Option<Component>,
}
