use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boxoffice_core::{Entity, EventId, ReservationId, TicketId, TierName, UserId};

use crate::payment::Payment;

/// An issued ticket.
///
/// Created only when a reservation reaches `Confirmed`, and immutable from
/// then on: a refund releases inventory back to the ledger, it never deletes
/// the ticket record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub tier: TierName,
    /// Unit price in smallest currency unit at time of purchase.
    pub price: u64,
    pub quantity: u32,
    pub reservation_id: ReservationId,
    pub created_at: DateTime<Utc>,
}

impl Entity for Ticket {
    type Id = TicketId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Ticket {
    pub fn issue(
        event_id: EventId,
        user_id: UserId,
        tier: TierName,
        price: u64,
        quantity: u32,
        reservation_id: ReservationId,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TicketId::new(),
            event_id,
            user_id,
            tier,
            price,
            quantity,
            reservation_id,
            created_at: now,
        }
    }
}

/// What a completed purchase hands back to the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    pub reservation_id: ReservationId,
    pub ticket: Ticket,
    pub payment: Payment,
}
