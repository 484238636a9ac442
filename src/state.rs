//! Shared application state handed to every handler.

use crate::services::{
    classifier_service::ClassifierService, component_service::ComponentService,
    damage_record_service::DamageRecordService, dashboard_service::DashboardService,
    model_metrics_service::ModelMetricsService, prediction_service::PredictionService,
};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    pub classifier: Arc<ClassifierService>,
    pub components: ComponentService,
    pub damage_records: DamageRecordService,
    pub predictions: PredictionService,
    pub metrics: ModelMetricsService,
    pub dashboard: DashboardService,
}

impl AppState {
    pub fn new(db: Arc<SqlitePool>, classifier: Arc<ClassifierService>) -> Self {
        let components = ComponentService::new(db.clone());
        let damage_records = DamageRecordService::new(db.clone(), components.clone());
        let predictions =
            PredictionService::new(db.clone(), components.clone(), classifier.clone());
        let metrics =
            ModelMetricsService::new(db.clone(), damage_records.clone(), classifier.clone());
        let dashboard = DashboardService::new(
            components.clone(),
            damage_records.clone(),
            predictions.clone(),
            metrics.clone(),
        );
        Self {
            db,
            classifier,
            components,
            damage_records,
            predictions,
            metrics,
            dashboard,
        }
    }

    /// In-memory database and an empty model directory. Keep the returned
    /// directory alive for the duration of the test.
    #[cfg(test)]
    pub async fn for_tests() -> (Self, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("temp model dir");
        let db = Arc::new(crate::db::memory_pool().await);
        let classifier = Arc::new(ClassifierService::untrained(dir.path()));
        (Self::new(db, classifier), dir)
    }
}
