use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use boxoffice_core::ReservationId;
use boxoffice_infra::ReconcileOutcome;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_reservation))
        .route("/:id/cancel", post(cancel))
        .route("/:id/reconcile", post(reconcile))
}

pub async fn get_reservation(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ReservationId = match parse_id(&id, "reservation") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.get_reservation(id).await {
        Ok(Some(reservation)) => Json(dto::reservation_json(&reservation)).into_response(),
        Ok(None) => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "reservation not found")
        }
        Err(e) => errors::booking_error_to_response(e),
    }
}

/// Voluntary cancellation by the holder.
pub async fn cancel(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Json(body): Json<dto::CancelRequest>,
) -> axum::response::Response {
    let id: ReservationId = match parse_id(&id, "reservation") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.cancel_reservation(id, body.user_id).await {
        Ok(reservation) => Json(dto::reservation_json(&reservation)).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

/// Re-drive a reservation stuck by a gateway timeout to a terminal state.
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: ReservationId = match parse_id(&id, "reservation") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.reconcile(id).await {
        Ok(outcome) => reconcile_response(outcome),
        Err(e) => errors::booking_error_to_response(e),
    }
}

fn reconcile_response(outcome: ReconcileOutcome) -> axum::response::Response {
    match outcome {
        ReconcileOutcome::Settled(receipt) => Json(serde_json::json!({
            "outcome": "settled",
            "receipt": dto::receipt_json(&receipt),
        }))
        .into_response(),
        ReconcileOutcome::AlreadySettled(receipt) => Json(serde_json::json!({
            "outcome": "already_settled",
            "receipt": dto::receipt_json(&receipt),
        }))
        .into_response(),
        ReconcileOutcome::Declined => Json(serde_json::json!({
            "outcome": "declined",
        }))
        .into_response(),
        ReconcileOutcome::StillPending => (
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "outcome": "still_pending",
                "message": "gateway outcome still unknown, retry later",
            })),
        )
            .into_response(),
        ReconcileOutcome::LapsedChargeCaptured => Json(serde_json::json!({
            "outcome": "lapsed_charge_captured",
            "message": "the charge settled after the hold lapsed; a refund is owed",
        }))
        .into_response(),
        ReconcileOutcome::Closed => Json(serde_json::json!({
            "outcome": "closed",
        }))
        .into_response(),
    }
}
