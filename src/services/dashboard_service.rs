//! DashboardService: aggregate counts for the dashboard view.

use crate::{
    errors::ServiceResult,
    models::dashboard::DashboardSummary,
    services::{
        component_service::ComponentService, damage_record_service::DamageRecordService,
        model_metrics_service::ModelMetricsService, prediction_service::PredictionService,
    },
};
use tracing::debug;

const RECENT_PREDICTIONS: i64 = 5;

#[derive(Clone)]
pub struct DashboardService {
    components: ComponentService,
    damage_records: DamageRecordService,
    predictions: PredictionService,
    metrics: ModelMetricsService,
}

impl DashboardService {
    pub fn new(
        components: ComponentService,
        damage_records: DamageRecordService,
        predictions: PredictionService,
        metrics: ModelMetricsService,
    ) -> Self {
        Self {
            components,
            damage_records,
            predictions,
            metrics,
        }
    }

    pub async fn summary(&self) -> ServiceResult<DashboardSummary> {
        debug!("Building dashboard summary");
        Ok(DashboardSummary {
            total_components: self.components.count().await?,
            total_damage_records: self.damage_records.count().await?,
            total_predictions: self.predictions.count().await?,
            damage_distribution: self.damage_records.distribution().await?,
            model_status: self.metrics.model_status().await?,
            recent_predictions: self.predictions.recent(RECENT_PREDICTIONS).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        models::damage_record::{DamageFeatures, DamageLevel, NewDamageRecord},
        state::AppState,
    };

    #[tokio::test]
    async fn empty_database_summary() {
        let (state, _dir) = AppState::for_tests().await;
        let summary = state.dashboard.summary().await.unwrap();
        assert_eq!(summary.total_components, 0);
        assert_eq!(summary.total_predictions, 0);
        assert_eq!(summary.damage_distribution.total, 0);
        assert!(!summary.model_status.is_trained);
        assert!(summary.recent_predictions.is_empty());
    }

    #[tokio::test]
    async fn counts_records_per_level() {
        let (state, _dir) = AppState::for_tests().await;
        let component = state
            .components
            .create(crate::models::component::NewComponent {
                code: "KRS-002".into(),
                name: "Left Door".into(),
                category: "Door".into(),
                description: None,
            })
            .await
            .unwrap();
        for level in [DamageLevel::Ringan, DamageLevel::Berat, DamageLevel::Berat] {
            state
                .damage_records
                .create(NewDamageRecord {
                    component_id: component.id,
                    features: DamageFeatures {
                        damage_area: 10.0,
                        damage_depth: 1.0,
                        damage_point_count: 2,
                        component_age: 12,
                        usage_frequency: 4,
                        corrosion_level: 2,
                        deformation: 0.0,
                    },
                    damage_level: level,
                    notes: None,
                })
                .await
                .unwrap();
        }

        let summary = state.dashboard.summary().await.unwrap();
        assert_eq!(summary.total_components, 1);
        assert_eq!(summary.total_damage_records, 3);
        assert_eq!(summary.damage_distribution.berat, 2);
        assert_eq!(summary.damage_distribution.sedang, 0);
    }
}
