//! Ticket and payment persistence.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryBookingStore;
pub use postgres::PostgresBookingStore;

use async_trait::async_trait;
use std::sync::Arc;

use boxoffice_booking::{Payment, Ticket};
use boxoffice_core::{PaymentId, ReservationId, TicketId, UserId};

use crate::store::StoreError;

/// Storage for the artifacts a completed purchase leaves behind.
///
/// At most one ticket and one payment exist per reservation; the
/// per-reservation lookups are what reconciliation leans on to decide
/// whether a charge already settled.
#[async_trait]
pub trait BookingStore: Send + Sync + 'static {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError>;

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError>;

    async fn ticket_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Ticket>, StoreError>;

    async fn tickets_for_user(&self, user: UserId) -> Result<Vec<Ticket>, StoreError>;

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError>;

    /// Overwrite an existing payment row (status transitions, ticket link).
    async fn update_payment(&self, payment: &Payment) -> Result<(), StoreError>;

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError>;

    async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>, StoreError>;
}

#[async_trait]
impl<S: BookingStore> BookingStore for Arc<S> {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        (**self).insert_ticket(ticket).await
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        (**self).get_ticket(id).await
    }

    async fn ticket_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Ticket>, StoreError> {
        (**self).ticket_for_reservation(reservation).await
    }

    async fn tickets_for_user(&self, user: UserId) -> Result<Vec<Ticket>, StoreError> {
        (**self).tickets_for_user(user).await
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        (**self).insert_payment(payment).await
    }

    async fn update_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        (**self).update_payment(payment).await
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        (**self).get_payment(id).await
    }

    async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>, StoreError> {
        (**self).payment_for_reservation(reservation).await
    }
}
