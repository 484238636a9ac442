//! PredictionService: classify feature vectors and keep a prediction history.

use crate::{
    errors::{ServiceError, ServiceResult},
    models::{
        damage_record::DamageLevel,
        pagination::{Page, PageParams},
        prediction::{PredictionHistory, PredictionRequest, PredictionResponse, PredictionResult},
    },
    services::{classifier_service::ClassifierService, component_service::ComponentService},
};
use chrono::Utc;
use sqlx::{QueryBuilder, SqlitePool, sqlite::Sqlite, types::Json};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

const HISTORY_COLUMNS: &str = "id, component_id, damage_area, damage_depth, damage_point_count, \
     component_age, usage_frequency, corrosion_level, deformation, predicted_level, confidence, \
     probabilities, notes, created_at, updated_at";

/// Filters accepted by [`PredictionService::history`].
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub component_id: Option<Uuid>,
    pub predicted_level: Option<DamageLevel>,
}

#[derive(Clone)]
pub struct PredictionService {
    pub db: Arc<SqlitePool>,
    components: ComponentService,
    classifier: Arc<ClassifierService>,
}

impl PredictionService {
    pub fn new(
        db: Arc<SqlitePool>,
        components: ComponentService,
        classifier: Arc<ClassifierService>,
    ) -> Self {
        Self {
            db,
            components,
            classifier,
        }
    }

    /// Classify `data`, storing the outcome in history when `save_history`.
    pub async fn predict(
        &self,
        data: PredictionRequest,
        save_history: bool,
    ) -> ServiceResult<PredictionResult> {
        data.features.validate().map_err(ServiceError::Validation)?;
        if !self.classifier.is_trained().await {
            return Err(ServiceError::ModelNotTrained);
        }
        self.components.require(data.component_id).await?;
        info!("Making prediction for component: {}", data.component_id);

        let classification = self.classifier.predict(&data.features).await?;
        if !classification.probabilities.is_valid()
            || !(0.0..=1.0).contains(&classification.confidence)
        {
            return Err(ServiceError::Validation(format!(
                "Classifier produced an invalid confidence ({})",
                classification.confidence
            )));
        }
        let mut result = PredictionResult {
            predicted_level: classification.level,
            confidence: classification.confidence,
            probabilities: classification.probabilities,
            features_used: data.features,
            id: None,
        };

        if save_history {
            let now = Utc::now();
            let history = PredictionHistory {
                id: Uuid::new_v4(),
                component_id: data.component_id,
                features: data.features,
                predicted_level: classification.level,
                confidence: classification.confidence,
                probabilities: Json(classification.probabilities),
                notes: data.notes,
                created_at: now,
                updated_at: now,
            };
            let f = &history.features;
            sqlx::query(
                "INSERT INTO prediction_histories (
                    id, component_id, damage_area, damage_depth, damage_point_count, component_age,
                    usage_frequency, corrosion_level, deformation, predicted_level, confidence,
                    probabilities, notes, created_at, updated_at
                 ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(history.id)
            .bind(history.component_id)
            .bind(f.damage_area)
            .bind(f.damage_depth)
            .bind(f.damage_point_count)
            .bind(f.component_age)
            .bind(f.usage_frequency)
            .bind(f.corrosion_level)
            .bind(f.deformation)
            .bind(history.predicted_level)
            .bind(history.confidence)
            .bind(&history.probabilities)
            .bind(&history.notes)
            .bind(history.created_at)
            .bind(history.updated_at)
            .execute(&*self.db)
            .await?;

            info!("Prediction saved: {}", history.id);
            result.id = Some(history.id);
        }

        Ok(result)
    }

    pub async fn history(
        &self,
        params: PageParams,
        filter: &HistoryFilter,
    ) -> ServiceResult<Page<PredictionResponse>> {
        params.validate().map_err(ServiceError::Validation)?;
        debug!(
            "Getting prediction history: page={}, size={}",
            params.page, params.size
        );

        let mut count =
            QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM prediction_histories WHERE 1 = 1");
        push_filters(&mut count, filter);
        let total: i64 = count.build_query_scalar().fetch_one(&*self.db).await?;

        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {HISTORY_COLUMNS} FROM prediction_histories WHERE 1 = 1"
        ));
        push_filters(&mut builder, filter);
        builder.push(" ORDER BY created_at DESC, rowid DESC LIMIT ");
        builder.push_bind(params.limit());
        builder.push(" OFFSET ");
        builder.push_bind(params.offset());
        let rows: Vec<PredictionHistory> = builder.build_query_as().fetch_all(&*self.db).await?;

        Ok(Page::new(self.with_components(rows).await?, total, params))
    }

    pub async fn get(&self, id: Uuid) -> ServiceResult<PredictionResponse> {
        let prediction = sqlx::query_as::<_, PredictionHistory>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM prediction_histories WHERE id = ?"
        ))
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(ServiceError::NotFound("Prediction"))?;
        let component = self.components.get_by_id(prediction.component_id).await?;
        Ok(PredictionResponse {
            prediction,
            component,
        })
    }

    /// The `limit` most recent predictions.
    pub async fn recent(&self, limit: i64) -> ServiceResult<Vec<PredictionResponse>> {
        let rows = sqlx::query_as::<_, PredictionHistory>(&format!(
            "SELECT {HISTORY_COLUMNS} FROM prediction_histories
             ORDER BY created_at DESC, rowid DESC LIMIT ?"
        ))
        .bind(limit)
        .fetch_all(&*self.db)
        .await?;
        self.with_components(rows).await
    }

    pub async fn count(&self) -> ServiceResult<i64> {
        let total = sqlx::query_scalar("SELECT COUNT(*) FROM prediction_histories")
            .fetch_one(&*self.db)
            .await?;
        Ok(total)
    }

    pub async fn delete(&self, id: Uuid) -> ServiceResult<()> {
        info!("Deleting prediction: {}", id);
        let result = sqlx::query("DELETE FROM prediction_histories WHERE id = ?")
            .bind(id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Prediction"));
        }
        info!("Prediction deleted: {}", id);
        Ok(())
    }

    async fn with_components(
        &self,
        rows: Vec<PredictionHistory>,
    ) -> ServiceResult<Vec<PredictionResponse>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.component_id).collect();
        let components = self.components.get_many(&ids).await?;
        Ok(rows
            .into_iter()
            .map(|prediction| PredictionResponse {
                component: components.get(&prediction.component_id).cloned(),
                prediction,
            })
            .collect())
    }
}

fn push_filters(builder: &mut QueryBuilder<'_, Sqlite>, filter: &HistoryFilter) {
    if let Some(component_id) = filter.component_id {
        builder.push(" AND component_id = ");
        builder.push_bind(component_id);
    }
    if let Some(level) = filter.predicted_level {
        builder.push(" AND predicted_level = ");
        builder.push_bind(level);
    }
}
