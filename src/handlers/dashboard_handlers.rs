use crate::{errors::AppError, models::dashboard::DashboardSummary, state::AppState};
use axum::{Json, extract::State};

/// `GET /dashboard/summary`
pub async fn dashboard_summary(
    State(state): State<AppState>,
) -> Result<Json<DashboardSummary>, AppError> {
    Ok(Json(state.dashboard.summary().await?))
}
