use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use boxoffice_core::PaymentId;

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/:id", get(get_payment))
}

pub async fn get_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: PaymentId = match parse_id(&id, "payment") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.get_payment(id).await {
        Ok(Some(payment)) => Json(dto::payment_json(&payment)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "payment not found"),
        Err(e) => errors::booking_error_to_response(e),
    }
}
