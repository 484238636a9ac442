//! HTTP handlers for `/damage-records`, including CSV bulk import.

use crate::{
    errors::AppError,
    handlers::{
        component_handlers::page_params,
        extract::{AppJson, AppPath, AppQuery},
    },
    models::{
        damage_record::{
            BulkImportResult, DamageDistribution, DamageLevel, DamageRecordResponse,
            DamageRecordUpdate, NewDamageRecord,
        },
        pagination::Page,
    },
    services::damage_record_service::DamageRecordFilter,
    state::AppState,
};
use axum::{
    Json,
    extract::{Multipart, State, multipart::MultipartRejection},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ListDamageRecordsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub component_id: Option<Uuid>,
    pub damage_level: Option<String>,
}

pub async fn create_damage_record(
    State(state): State<AppState>,
    AppJson(body): AppJson<NewDamageRecord>,
) -> Result<(StatusCode, Json<DamageRecordResponse>), AppError> {
    let record = state.damage_records.create(body).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn list_damage_records(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<ListDamageRecordsQuery>,
) -> Result<Json<Page<DamageRecordResponse>>, AppError> {
    let filter = DamageRecordFilter {
        component_id: q.component_id,
        damage_level: parse_level("damage_level", q.damage_level.as_deref())?,
    };
    let page = state
        .damage_records
        .list(page_params(q.page, q.size), &filter)
        .await?;
    Ok(Json(page))
}

pub async fn damage_distribution(
    State(state): State<AppState>,
) -> Result<Json<DamageDistribution>, AppError> {
    Ok(Json(state.damage_records.distribution().await?))
}

/// `POST /damage-records/bulk-import` with a multipart `file` field.
pub async fn bulk_import(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<BulkImportResult>, AppError> {
    let mut multipart = multipart?;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::bad_request(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if !filename.to_ascii_lowercase().ends_with(".csv") {
            return Err(AppError::bad_request("Only CSV files are supported"));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        let text = std::str::from_utf8(&bytes)
            .map_err(|_| AppError::bad_request("File must be UTF-8 encoded"))?;

        info!("Bulk import of {} ({} bytes)", filename, bytes.len());
        return Ok(Json(state.damage_records.bulk_import(text).await?));
    }
    Err(AppError::bad_request("Missing multipart field `file`"))
}

pub async fn get_damage_record(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<DamageRecordResponse>, AppError> {
    Ok(Json(state.damage_records.get(id).await?))
}

pub async fn update_damage_record(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<DamageRecordUpdate>,
) -> Result<Json<DamageRecordResponse>, AppError> {
    Ok(Json(state.damage_records.update(id, body).await?))
}

pub async fn delete_damage_record(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.damage_records.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Parse an optional level filter, rejecting unknown values with 400.
pub(crate) fn parse_level(
    field: &str,
    value: Option<&str>,
) -> Result<Option<DamageLevel>, AppError> {
    value
        .filter(|v| !v.trim().is_empty())
        .map(|v| {
            v.parse::<DamageLevel>().map_err(|_| {
                AppError::bad_request(format!("{field} must be one of: ringan, sedang, berat"))
            })
        })
        .transpose()
}
