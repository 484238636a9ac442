//! Dashboard summary payload.

use crate::models::{
    damage_record::DamageDistribution, model_metrics::ModelStatus, prediction::PredictionResponse,
};
use serde::Serialize;

#[derive(Serialize, Debug, Clone)]
pub struct DashboardSummary {
    pub total_components: i64,
    pub total_damage_records: i64,
    pub total_predictions: i64,
    pub damage_distribution: DamageDistribution,
    pub model_status: ModelStatus,
    pub recent_predictions: Vec<PredictionResponse>,
}
