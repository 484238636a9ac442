//! `/healthz` answers without I/O. `/readyz` checks the database and that the
//! model directory accepts a model write.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use serde::Serialize;
use std::fmt::Display;
use tracing::warn;

#[derive(Serialize)]
pub struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Check {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<E: Display> From<Result<(), E>> for Check {
    fn from(result: Result<(), E>) -> Self {
        Self {
            ok: result.is_ok(),
            error: result.err().map(|e| e.to_string()),
        }
    }
}

#[derive(Serialize)]
pub struct ReadyResponse {
    status: &'static str,
    database: Check,
    model_dir: Check,
}

pub async fn healthz() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn readyz(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let database = Check::from(
        sqlx::query("SELECT 1")
            .execute(&*state.db)
            .await
            .map(drop),
    );
    let model_dir = Check::from(state.classifier.check_model_dir().await);

    if database.ok && model_dir.ok {
        return (
            StatusCode::OK,
            Json(ReadyResponse {
                status: "ok",
                database,
                model_dir,
            }),
        );
    }
    warn!(?database, ?model_dir, "Readiness check failed");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ReadyResponse {
            status: "unavailable",
            database,
            model_dir,
        }),
    )
}
