use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use boxoffice_catalog::{EventListing, TierDef};
use boxoffice_core::{EventId, TierName};

use crate::app::routes::common::parse_id;
use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_event).get(list_events))
        .route("/:id", get(get_event))
        .route("/:id/inventory", get(event_inventory))
        .route("/:id/inventory/:tier", get(tier_inventory))
}

/// Create a listing and seed the ledger with each tier's capacity.
pub async fn create_event(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateEventRequest>,
) -> axum::response::Response {
    let mut tiers = Vec::with_capacity(body.tiers.len());
    for tier in body.tiers {
        let name: TierName = match tier.name.parse() {
            Ok(name) => name,
            Err(e) => return errors::domain_error_to_response(e),
        };
        tiers.push(TierDef {
            name,
            price: tier.price,
            capacity: tier.capacity,
        });
    }

    let event = match EventListing::new(
        body.name,
        body.description,
        body.venue,
        body.organiser,
        body.dates,
        tiers,
        Utc::now(),
    ) {
        Ok(event) => event,
        Err(e) => return errors::domain_error_to_response(e),
    };

    if let Err(e) = services.create_event(&event).await {
        return errors::booking_error_to_response(e);
    }

    (StatusCode::CREATED, Json(dto::event_json(&event))).into_response()
}

pub async fn get_event(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: EventId = match parse_id(&id, "event") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    match services.get_event(id).await {
        Ok(Some(event)) => Json(dto::event_json(&event)).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found"),
        Err(e) => errors::booking_error_to_response(e),
    }
}

pub async fn list_events(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.list_events().await {
        Ok(events) => Json(
            events
                .iter()
                .map(dto::event_json)
                .collect::<Vec<_>>(),
        )
        .into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}

/// Live counters for every tier of an event, keyed by tier name.
pub async fn event_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: EventId = match parse_id(&id, "event") {
        Ok(id) => id,
        Err(resp) => return resp,
    };

    let event = match services.get_event(id).await {
        Ok(Some(event)) => event,
        Ok(None) => {
            return errors::json_error(StatusCode::NOT_FOUND, "not_found", "event not found")
        }
        Err(e) => return errors::booking_error_to_response(e),
    };

    let mut inventory = serde_json::Map::new();
    for tier in &event.tiers {
        match services.tier_counters(id, tier.name.clone()).await {
            Ok(counters) => {
                inventory.insert(tier.name.as_str().to_string(), dto::counters_json(&counters));
            }
            Err(e) => return errors::booking_error_to_response(e),
        }
    }
    Json(serde_json::Value::Object(inventory)).into_response()
}

/// Live counters for one tier: total/available/reserved/purchased.
pub async fn tier_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Path((id, tier)): Path<(String, String)>,
) -> axum::response::Response {
    let id: EventId = match parse_id(&id, "event") {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    let tier: TierName = match tier.parse() {
        Ok(tier) => tier,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.tier_counters(id, tier).await {
        Ok(counters) => Json(dto::counters_json(&counters)).into_response(),
        Err(e) => errors::booking_error_to_response(e),
    }
}
