//! HTTP handlers for `/components`.

use crate::{
    errors::AppError,
    handlers::extract::{AppJson, AppPath, AppQuery},
    models::{
        component::{Component, ComponentUpdate, NewComponent},
        pagination::{Page, PageParams},
    },
    services::component_service::ComponentFilter,
    state::AppState,
};
use axum::{Json, extract::State, http::StatusCode};
use serde::Deserialize;
use uuid::Uuid;

/// Query params accepted by `GET /components`.
#[derive(Debug, Deserialize)]
pub struct ListComponentsQuery {
    pub page: Option<u32>,
    pub size: Option<u32>,
    pub category: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

pub async fn create_component(
    State(state): State<AppState>,
    AppJson(body): AppJson<NewComponent>,
) -> Result<(StatusCode, Json<Component>), AppError> {
    let component = state.components.create(body).await?;
    Ok((StatusCode::CREATED, Json(component)))
}

pub async fn list_components(
    State(state): State<AppState>,
    AppQuery(q): AppQuery<ListComponentsQuery>,
) -> Result<Json<Page<Component>>, AppError> {
    let params = page_params(q.page, q.size);
    let filter = ComponentFilter {
        category: q.category,
        is_active: q.is_active,
        search: q.search,
    };
    Ok(Json(state.components.list(params, &filter).await?))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<String>>, AppError> {
    Ok(Json(state.components.categories().await?))
}

pub async fn get_component(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<Json<Component>, AppError> {
    Ok(Json(state.components.require(id).await?))
}

pub async fn update_component(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
    AppJson(body): AppJson<ComponentUpdate>,
) -> Result<Json<Component>, AppError> {
    Ok(Json(state.components.update(id, body).await?))
}

pub async fn delete_component(
    State(state): State<AppState>,
    AppPath(id): AppPath<Uuid>,
) -> Result<StatusCode, AppError> {
    state.components.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build page params from optional query values.
pub(crate) fn page_params(page: Option<u32>, size: Option<u32>) -> PageParams {
    let defaults = PageParams::default();
    PageParams {
        page: page.unwrap_or(defaults.page),
        size: size.unwrap_or(defaults.size),
    }
}
