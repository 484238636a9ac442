//! HTTP handlers for `/predictions`: classify, history, training and metrics.

use crate::{
    errors::AppError,
    handlers::{
        component_handlers::page_params,
        damage_record_handlers::parse_level,
        extract::{AppJson, AppPath, AppQuery},
    },
    models::{
        model_metrics::{
            ModelInfo, ModelMetrics, ModelMetricsList, ModelStatus, TrainingRequest,
            TrainingResult,
        },
        pagination::Page,
        prediction::{PredictionRequest, PredictionResponse, PredictionResult},
    },
    services::prediction_service::HistoryFilter,
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode};
use bytes::Bytes;
use serde::Deserialize;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct PredictQuery {
    #[serde(default = "save_by_default")]
    pub save_history: bool,
}

fn save_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub component_id: Option<Uuid>,
    pub predicted_level: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MetricsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
}

pub async fn predict(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<PredictQuery>,
    AppJson(body): AppJson<PredictionRequest>,
) -> Result<Json<PredictionResult>, AppError> {
    Ok(Json(state.predictions.predict(body, q.save_history).await?))
}

pub async fn prediction_history(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<HistoryQuery>,
) -> Result<Json<Page<PredictionResponse>>, AppError> {
    let filter = HistoryFilter {
        component_id: q.component_id,
        predicted_level: parse_level("predicted_level", q.predicted_level.as_deref())?,
    };
    let page = state
        .predictions
        .history(page_params(q.page, q.size), &filter)
        .await?;
    Ok(Json(page))
}

pub async fn get_prediction(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<PredictionResponse>, AppError> {
    Ok(Json(state.predictions.get(id).await?))
}

pub async fn delete_prediction(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.predictions.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn model_status(State(state): State<AppState>) -> Result<Json<ModelStatus>, AppError> {
    Ok(Json(state.metrics.model_status().await?))
}

/// `POST /predictions/train`. The JSON body is optional.
pub async fn train_model(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<TrainingResult>, AppError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        TrainingRequest::default()
    } else {
        serde_json::from_slice::<TrainingRequest>(&body).map_err(|e| {
            AppError::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                format!("Invalid training request: {}", e),
            )
        })?
    };
    let result = state
        .metrics
        .train_model(request.test_size, request.notes)
        .await?;
    Ok(Json(result))
}

pub async fn list_metrics(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<MetricsQuery>,
) -> Result<Json<ModelMetricsList>, AppError> {
    Ok(Json(state.metrics.list(page_params(q.page, q.size)).await?))
}

pub async fn latest_metrics(State(state): State<AppState>) -> Result<Json<ModelMetrics>, AppError> {
    state
        .metrics
        .latest()
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("No training metrics found"))
}

pub async fn get_metrics(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<ModelMetrics>, AppError> {
    Ok(Json(state.metrics.get(id).await?))
}

pub async fn delete_metrics(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.metrics.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn model_info(State(state): State<AppState>) -> Result<Json<ModelInfo>, AppError> {
    Ok(Json(state.classifier.model_info().await?))
}
