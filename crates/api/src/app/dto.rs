//! Request DTOs and JSON mapping helpers.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;

use boxoffice_booking::{Payment, PurchaseReceipt, Ticket};
use boxoffice_catalog::EventListing;
use boxoffice_core::UserId;
use boxoffice_ledger::TierCounters;
use boxoffice_reservations::Reservation;

#[derive(Debug, Deserialize)]
pub struct TierRequest {
    pub name: String,
    /// Price in smallest currency unit.
    pub price: u64,
    pub capacity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub name: String,
    pub description: Option<String>,
    pub venue: Option<String>,
    pub organiser: UserId,
    #[serde(default)]
    pub dates: Vec<DateTime<Utc>>,
    pub tiers: Vec<TierRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub user_id: UserId,
    pub event_id: String,
    pub tier: String,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct CancelRequest {
    pub user_id: UserId,
}

pub fn event_json(event: &EventListing) -> serde_json::Value {
    json!({
        "id": event.id,
        "name": event.name,
        "description": event.description,
        "venue": event.venue,
        "organiser": event.organiser,
        "dates": event.dates,
        "tiers": event.tiers,
        "created_at": event.created_at,
    })
}

pub fn counters_json(counters: &TierCounters) -> serde_json::Value {
    json!({
        "total": counters.total,
        "available": counters.available,
        "reserved": counters.reserved,
        "purchased": counters.purchased,
    })
}

pub fn reservation_json(reservation: &Reservation) -> serde_json::Value {
    json!({
        "id": reservation.id,
        "event_id": reservation.event_id,
        "tier": reservation.tier,
        "quantity": reservation.quantity,
        "holder": reservation.holder,
        "status": reservation.status.as_str(),
        "created_at": reservation.created_at,
        "expires_at": reservation.expires_at,
    })
}

pub fn ticket_json(ticket: &Ticket) -> serde_json::Value {
    json!({
        "id": ticket.id,
        "event_id": ticket.event_id,
        "user_id": ticket.user_id,
        "tier": ticket.tier,
        "price": ticket.price,
        "quantity": ticket.quantity,
        "reservation_id": ticket.reservation_id,
        "created_at": ticket.created_at,
    })
}

pub fn payment_json(payment: &Payment) -> serde_json::Value {
    json!({
        "id": payment.id,
        "reservation_id": payment.reservation_id,
        "ticket_id": payment.ticket_id,
        "transaction_id": payment.transaction_id,
        "amount": payment.amount,
        "status": payment.status,
        "failure_reason": payment.failure_reason,
        "created_at": payment.created_at,
    })
}

pub fn receipt_json(receipt: &PurchaseReceipt) -> serde_json::Value {
    json!({
        "reservation_id": receipt.reservation_id,
        "ticket": ticket_json(&receipt.ticket),
        "payment": payment_json(&receipt.payment),
    })
}
