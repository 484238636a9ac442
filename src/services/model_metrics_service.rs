//! ModelMetricsService: training runs and their stored evaluation metrics.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::{
        model_metrics::{ModelMetrics, ModelMetricsList, ModelStatus, TrainingResult},
        pagination::PageParams,
    },
    services::{
        classifier_service::ClassifierService, damage_record_service::DamageRecordService,
    },
};
use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const METRICS_COLUMNS: &str = "id, training_samples, accuracy, precision, recall, f1_score, \
     classification_report, confusion_matrix, notes, created_at, updated_at";

#[derive(Clone)]
pub struct ModelMetricsService {
    pub db: Arc<SqlitePool>,
    damage_records: DamageRecordService,
    classifier: Arc<ClassifierService>,
}

impl ModelMetricsService {
    pub fn new(
        db: Arc<SqlitePool>,
        damage_records: DamageRecordService,
        classifier: Arc<ClassifierService>,
    ) -> Self {
        Self {
            db,
            damage_records,
            classifier,
        }
    }

    /// Retrain on every stored damage record and record the evaluation.
    pub async fn train_model(
        &self,
        test_size: f64,
        notes: Option<String>,
    ) -> ServiceResult<TrainingResult> {
        info!("Starting model training");
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(ServiceError::Validation(
                "test_size must be greater than 0 and less than 1".into(),
            ));
        }

        let (samples, labels) = self.damage_records.training_data().await?;
        let trained = self.classifier.train(&samples, &labels, test_size).await?;
        let eval = &trained.evaluation;

        let now = Utc::now();
        let metrics = ModelMetrics {
            id: Uuid::new_v4(),
            training_samples: trained.training_samples as i64,
            accuracy: eval.accuracy,
            precision: eval.precision,
            recall: eval.recall,
            f1_score: eval.f1_score,
            classification_report: Json(eval.report.clone()),
            confusion_matrix: Json(eval.confusion_matrix.clone()),
            notes,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO model_metrics (
                id, training_samples, accuracy, precision, recall, f1_score,
                classification_report, confusion_matrix, notes, created_at, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(metrics.id)
        .bind(metrics.training_samples)
        .bind(metrics.accuracy)
        .bind(metrics.precision)
        .bind(metrics.recall)
        .bind(metrics.f1_score)
        .bind(&metrics.classification_report)
        .bind(&metrics.confusion_matrix)
        .bind(&metrics.notes)
        .bind(metrics.created_at)
        .bind(metrics.updated_at)
        .execute(&*self.db)
        .await?;

        info!("Model metrics saved: {}", metrics.id);

        Ok(TrainingResult {
            success: true,
            message: "Model trained successfully".into(),
            training_samples: trained.training_samples,
            test_samples: trained.test_samples,
            accuracy: eval.accuracy,
            precision: eval.precision,
            recall: eval.recall,
            f1_score: eval.f1_score,
            classification_report: eval.report.clone(),
            confusion_matrix: eval.confusion_matrix.clone(),
            metrics_id: metrics.id,
        })
    }

    pub async fn latest(&self) -> ServiceResult<Option<ModelMetrics>> {
        let metrics = sqlx::query_as::<_, ModelMetrics>(&format!(
            "SELECT {METRICS_COLUMNS} FROM model_metrics ORDER BY created_at DESC, rowid DESC LIMIT 1"
        ))
        .fetch_optional(&*self.db)
        .await?;
        Ok(metrics)
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<ModelMetrics> {
        sqlx::query_as::<_, ModelMetrics>(&format!(
            "SELECT {METRICS_COLUMNS} FROM model_metrics WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ServiceError::NotFound("Model metrics"))
    }

    pub async fn list(&self, params: PageParams) -> ServiceResult<ModelMetricsList> {
        params.validate().map_err(ServiceError::Validation)?;
        debug!(
            "Getting model metrics: page={}, size={}",
            params.page, params.size
        );

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM model_metrics")
            .fetch_one(&*self.db)
            .await?;
        let items = sqlx::query_as::<_, ModelMetrics>(&format!(
            "SELECT {METRICS_COLUMNS} FROM model_metrics
             ORDER BY created_at DESC, rowid DESC LIMIT ? OFFSET ?"
        ))
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(&*self.db)
        .await?;

        Ok(ModelMetricsList { items, total })
    }

    /// Classifier status with the accuracy of the latest training run.
    pub async fn model_status(&self) -> ServiceResult<ModelStatus> {
        let mut status = self.classifier.status().await;
        if let Some(latest) = self.latest().await? {
            status.accuracy = Some(latest.accuracy);
        }
        Ok(status)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        info!("Deleting model metrics: {}", id);
        let result = sqlx::query("DELETE FROM model_metrics WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Model metrics"));
        }
        info!("Model metrics deleted: {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        classifier::ClassifierError,
        db::memory_pool,
        models::{
            component::NewComponent,
            damage_record::{DamageFeatures, NewDamageRecord},
        },
        services::{
            classifier_service::tests::separable_data, component_service::ComponentService,
        },
    };

    struct Fixture {
        metrics: ModelMetricsService,
        records: DamageRecordService,
        component_id: Uuid,
        _dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(memory_pool().await);
        let dir = tempfile::tempdir().unwrap();
        let components = ComponentService::new(db.clone());
        let component = components
            .create(NewComponent {
                code: "KRS-001".into(),
                name: "Roof Panel".into(),
                category: "Body Panel".into(),
                description: None,
            })
            .await
            .unwrap();
        let records = DamageRecordService::new(db.clone(), components);
        let classifier = Arc::new(ClassifierService::untrained(dir.path()));
        Fixture {
            metrics: ModelMetricsService::new(db, records.clone(), classifier),
            records,
            component_id: component.id,
            _dir: dir,
        }
    }

    async fn seed(f: &Fixture, count: usize) {
        let (x, y) = separable_data();
        for (v, level) in x.into_iter().zip(y).take(count) {
            f.records
                .create(NewDamageRecord {
                    component_id: f.component_id,
                    features: DamageFeatures {
                        damage_area: v[0],
                        damage_depth: v[1],
                        damage_point_count: v[2] as i64,
                        component_age: v[3] as i64,
                        usage_frequency: v[4] as i64,
                        corrosion_level: v[5] as i64,
                        deformation: v[6],
                    },
                    damage_level: level,
                    notes: None,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn training_needs_ten_records() {
        let f = fixture().await;
        seed(&f, 9).await;
        let err = f.metrics.train_model(0.2, None).await.unwrap_err();
        assert!(matches!(
            err,
            ServiceError::Classifier(ClassifierError::InsufficientSamples { found: 9 })
        ));
        assert!(f.metrics.latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn training_records_metrics() {
        let f = fixture().await;
        seed(&f, 30).await;

        let result = f
            .metrics
            .train_model(0.2, Some("first run".into()))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.training_samples + result.test_samples, 30);
        assert_eq!(result.confusion_matrix.len(), 3);

        let latest = f.metrics.latest().await.unwrap().unwrap();
        assert_eq!(latest.id, result.metrics_id);
        assert_eq!(latest.notes.as_deref(), Some("first run"));
        assert_eq!(
            latest.classification_report.0.keys().collect::<Vec<_>>(),
            vec!["berat", "ringan", "sedang"]
        );
        assert_eq!(latest.classification_report.0["berat"].support, 2);

        let status = f.metrics.model_status().await.unwrap();
        assert!(status.is_trained);
        assert_eq!(status.accuracy, Some(result.accuracy));

        f.metrics.train_model(0.3, None).await.unwrap();
        let list = f.metrics.list(PageParams::default()).await.unwrap();
        assert_eq!(list.total, 2);
        assert_eq!(list.items[0].notes, None);

        f.metrics.delete(result.metrics_id).await.unwrap();
        assert!(matches!(
            f.metrics.get(result.metrics_id).await.unwrap_err(),
            ServiceError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn rejects_out_of_range_test_size() {
        let f = fixture().await;
        let err = f.metrics.train_model(1.5, None).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
