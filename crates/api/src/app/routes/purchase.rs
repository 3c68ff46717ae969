use std::sync::Arc;

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, Json,
};

use boxoffice_core::{EventId, TierName};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

/// The whole purchase flow in one call: hold, charge, ticket.
pub async fn purchase(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::PurchaseRequest>,
) -> axum::response::Response {
    let event_id: EventId = match parse_id(&body.event_id, "event") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let tier: TierName = match body.tier.parse() {
        Ok(tier) => tier,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services
        .purchase(body.user_id, event_id, tier, body.quantity)
        .await
    {
        Ok(receipt) => (StatusCode::CREATED, Json(dto::receipt_json(&receipt))).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}
