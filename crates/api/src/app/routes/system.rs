use std::sync::Arc;

use axum::{extract::Extension, response::IntoResponse, Json};

use crate::app::services::AppServices;

pub async fn health(Extension(services): Extension<Arc<AppServices>>) -> impl IntoResponse {
    let (sweeps, expired, lost_races, errors) = services.sweeper_snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "expiry_worker": {
            "sweeps": sweeps,
            "expired": expired,
            "lost_races": lost_races,
            "errors": errors,
        },
    }))
}
