//! Consistent JSON error responses.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use boxoffice_core::DomainError;
use boxoffice_infra::{BookingError, ManagerError};
use boxoffice_ledger::LedgerError;
use boxoffice_reservations::ReservationError;

pub fn booking_error_to_response(err: BookingError) -> axum::response::Response {
    match err {
        BookingError::UnknownEvent(_)
        | BookingError::UnknownTier { .. }
        | BookingError::UnknownTicket(_)
        | BookingError::UnknownPayment(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        BookingError::GatewayDeclined { reason } => {
            json_error(StatusCode::BAD_GATEWAY, "payment_declined", reason)
        }
        BookingError::GatewayTimeout { reservation } => (
            StatusCode::GATEWAY_TIMEOUT,
            axum::Json(json!({
                "error": "payment_timeout",
                "message": "payment outcome unknown; poll the reservation and reconcile",
                "reservation_id": reservation,
            })),
        )
            .into_response(),
        BookingError::HoldLapsedAfterCharge { reservation } => (
            StatusCode::CONFLICT,
            axum::Json(json!({
                "error": "hold_lapsed_after_charge",
                "message": "the charge settled but the hold had lapsed; a refund is owed",
                "reservation_id": reservation,
            })),
        )
            .into_response(),
        BookingError::PostChargePersistence { reservation, detail } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            axum::Json(json!({
                "error": "post_charge_persistence",
                "message": detail,
                "reservation_id": reservation,
            })),
        )
            .into_response(),
        BookingError::Manager(e) => manager_error_to_response(e),
        BookingError::Domain(e) => domain_error_to_response(e),
        BookingError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

pub fn manager_error_to_response(err: ManagerError) -> axum::response::Response {
    match err {
        ManagerError::Ledger(e) => ledger_error_to_response(e),
        ManagerError::Reservation(e) => reservation_error_to_response(e),
        ManagerError::NotFound(id) => json_error(
            StatusCode::NOT_FOUND,
            "not_found",
            format!("reservation {id} not found"),
        ),
        ManagerError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg)
        }
    }
}

fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match &err {
        LedgerError::InsufficientInventory { .. } => {
            json_error(StatusCode::CONFLICT, "insufficient_inventory", err.to_string())
        }
        LedgerError::UnknownTier(_) | LedgerError::UnknownToken(_) => {
            json_error(StatusCode::NOT_FOUND, "not_found", err.to_string())
        }
        LedgerError::AlreadyConfirmed(_) => {
            json_error(StatusCode::CONFLICT, "already_confirmed", err.to_string())
        }
        LedgerError::ContentionExceeded { .. } => json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "contention_exceeded",
            "too much contention on this tier, retry with backoff",
        ),
        LedgerError::InvalidQuantity => {
            json_error(StatusCode::BAD_REQUEST, "invalid_quantity", err.to_string())
        }
        LedgerError::Integrity(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "integrity_violation",
            err.to_string(),
        ),
        LedgerError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", msg.clone())
        }
    }
}

fn reservation_error_to_response(err: ReservationError) -> axum::response::Response {
    match err {
        ReservationError::HolderMismatch => {
            json_error(StatusCode::FORBIDDEN, "forbidden", err.to_string())
        }
        ReservationError::NotHeld(_)
        | ReservationError::Expired
        | ReservationError::NotExpired
        | ReservationError::ChargeInFlight => {
            json_error(StatusCode::CONFLICT, "state_conflict", err.to_string())
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match &err {
        DomainError::Validation(_) | DomainError::InvalidId(_) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", err.to_string())
        }
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", err.to_string()),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", err.to_string()),
        DomainError::InvariantViolation(_) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "invariant_violation",
            err.to_string(),
        ),
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}
