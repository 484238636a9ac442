//! Route table for the whole API.
//!
//! ## Structure
//! - `/`, `/docs`, `/healthz`, `/readyz`: service index, reference page, health checks
//! - `/components`: component master data
//! - `/damage-records`: labelled training data, CSV bulk import
//! - `/predictions`: classification, history, training and metrics
//! - `/dashboard/summary`: aggregate counts

use crate::{
    handlers::{
        component_handlers::{
            create_component, delete_component, get_component, list_categories, list_components,
            update_component,
        },
        damage_record_handlers::{
            bulk_import, create_damage_record, damage_distribution, delete_damage_record,
            get_damage_record, list_damage_records, update_damage_record,
        },
        dashboard_handlers::dashboard_summary,
        docs_handlers::{docs, index},
        health_handlers::{healthz, readyz},
        prediction_handlers::{
            delete_metrics, delete_prediction, get_metrics, get_prediction, latest_metrics,
            list_metrics, model_info, model_status, predict, prediction_history, train_model,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
use tower_http::{
    cors::{AllowHeaders, AllowMethods, AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};

/// Build the router for every API route. The router carries `AppState`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(index))
        .route("/docs", get(docs))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Components
        .route("/components", post(create_component).get(list_components))
        .route("/components/categories", get(list_categories))
        .route(
            "/components/{id}",
            get(get_component)
                .put(update_component)
                .delete(delete_component),
        )
        // Damage records
        .route(
            "/damage-records",
            post(create_damage_record).get(list_damage_records),
        )
        .route("/damage-records/distribution", get(damage_distribution))
        .route("/damage-records/bulk-import", post(bulk_import))
        .route(
            "/damage-records/{id}",
            get(get_damage_record)
                .put(update_damage_record)
                .delete(delete_damage_record),
        )
        // Predictions
        .route("/predictions/predict", post(predict))
        .route("/predictions/history", get(prediction_history))
        .route(
            "/predictions/history/{id}",
            get(get_prediction).delete(delete_prediction),
        )
        .route("/predictions/model-status", get(model_status))
        .route("/predictions/train", post(train_model))
        .route("/predictions/metrics", get(list_metrics))
        .route("/predictions/metrics/latest", get(latest_metrics))
        .route(
            "/predictions/metrics/{id}",
            get(get_metrics).delete(delete_metrics),
        )
        .route("/predictions/model-info", get(model_info))
        // Dashboard
        .route("/dashboard/summary", get(dashboard_summary))
}

/// The complete application: routes, state, request tracing and CORS.
pub fn app(state: AppState, cors_origins: &[String]) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(cors_origins))
        .with_state(state)
}

/// `*` allows any origin without credentials. Otherwise only the listed
/// origins are allowed, with credentials, mirroring requested methods and headers.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        tracing::warn!("CORS configured to allow ANY origin");
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    tracing::info!("CORS configured for origins: {:?}", origins);

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}
