//! Service index and the static API reference served at `/docs`.

use axum::{Json, response::Html};
use serde_json::{Value, json};

const SERVICE_NAME: &str = "Karoseri Damage Classification API";

/// Every route the service exposes: (method, path, description).
pub const ENDPOINTS: &[(&str, &str, &str)] = &[
    ("GET", "/", "Service name, version and docs link"),
    ("GET", "/docs", "This page"),
    ("GET", "/healthz", "Liveness check"),
    ("GET", "/readyz", "Readiness check (database and model directory)"),
    ("POST", "/components", "Create a component"),
    ("GET", "/components", "List components (page, size, category, is_active, search)"),
    ("GET", "/components/categories", "Distinct component categories"),
    ("GET", "/components/{id}", "Get a component"),
    ("PUT", "/components/{id}", "Update a component"),
    ("DELETE", "/components/{id}", "Delete a component and its records"),
    ("POST", "/damage-records", "Create a damage record"),
    ("GET", "/damage-records", "List damage records (page, size, component_id, damage_level)"),
    ("GET", "/damage-records/distribution", "Record count per damage level"),
    ("POST", "/damage-records/bulk-import", "Import records from a CSV upload (field `file`)"),
    ("GET", "/damage-records/{id}", "Get a damage record"),
    ("PUT", "/damage-records/{id}", "Update a damage record"),
    ("DELETE", "/damage-records/{id}", "Delete a damage record"),
    ("POST", "/predictions/predict", "Classify damage features (save_history, default true)"),
    ("GET", "/predictions/history", "Prediction history (page, size, component_id, predicted_level)"),
    ("GET", "/predictions/history/{id}", "Get a saved prediction"),
    ("DELETE", "/predictions/history/{id}", "Delete a saved prediction"),
    ("GET", "/predictions/model-status", "Whether a model is trained, and its accuracy"),
    ("POST", "/predictions/train", "Train on all damage records (optional test_size, notes)"),
    ("GET", "/predictions/metrics", "Training metrics history (page, size)"),
    ("GET", "/predictions/metrics/latest", "Metrics of the latest training run"),
    ("GET", "/predictions/metrics/{id}", "Get training metrics"),
    ("DELETE", "/predictions/metrics/{id}", "Delete training metrics"),
    ("GET", "/predictions/model-info", "Fitted model parameters"),
    ("GET", "/dashboard/summary", "Counts, distribution, model status and recent predictions"),
];

/// `GET /`
pub async fn index() -> Json<Value> {
    Json(json!({
        "message": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "docs": "/docs",
    }))
}

/// `GET /docs`
pub async fn docs() -> Html<String> {
    Html(render_docs())
}

fn render_docs() -> String {
    let rows: String = ENDPOINTS
        .iter()
        .map(|(method, path, description)| {
            format!(
                "<tr><td><code>{method}</code></td><td><code>{path}</code></td><td>{description}</td></tr>\n"
            )
        })
        .collect();

    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>{SERVICE_NAME}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table {{ border-collapse: collapse; }}
td, th {{ border: 1px solid #ccc; padding: 0.3rem 0.6rem; text-align: left; }}
</style>
</head>
<body>
<h1>{SERVICE_NAME}</h1>
<p>Version {version}. Request and response bodies are JSON. Errors are returned as
<code>{{"error": "...", "status": 400}}</code>. Damage levels are
<code>ringan</code>, <code>sedang</code> and <code>berat</code>.</p>
<table>
<tr><th>Method</th><th>Path</th><th>Description</th></tr>
{rows}</table>
</body>
</html>
"#,
        version = env!("CARGO_PKG_VERSION"),
    )
}
