use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use boxoffice_core::{TicketId, UserId};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_ticket))
        .route("/:id/refund", post(refund))
}

pub async fn get_ticket(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TicketId = match parse_id(&id, "ticket") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.get_ticket(id).await {
        Ok(Some(ticket)) => Json(dto::ticket_json(&ticket)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "ticket not found"),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn tickets_for_user(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: UserId = match parse_id(&id, "user") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.tickets_for_user(id).await {
        Ok(tickets) => Json(
            tickets
                .iter()
                .map(dto::ticket_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

/// Refund a ticketed sale and return its units to inventory.
pub async fn refund(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: TicketId = match parse_id(&id, "ticket") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.refund(id).await {
        Ok(payment) => Json(dto::payment_json(&payment)).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}
