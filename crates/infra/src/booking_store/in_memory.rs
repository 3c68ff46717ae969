use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use boxoffice_booking::{Payment, Ticket};
use boxoffice_core::{PaymentId, ReservationId, TicketId, UserId};

use super::BookingStore;
use crate::store::StoreError;

/// In-memory ticket and payment store for dev and tests.
#[derive(Debug, Default)]
pub struct InMemoryBookingStore {
    tickets: RwLock<HashMap<TicketId, Ticket>>,
    payments: RwLock<HashMap<PaymentId, Payment>>,
}

impl InMemoryBookingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BookingStore for InMemoryBookingStore {
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        let mut tickets = self
            .tickets
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::Duplicate(ticket.id.to_string()));
        }
        if tickets
            .values()
            .any(|t| t.reservation_id == ticket.reservation_id)
        {
            return Err(StoreError::Duplicate(ticket.reservation_id.to_string()));
        }
        tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let tickets = self
            .tickets
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(tickets.get(&id).cloned())
    }

    async fn ticket_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Ticket>, StoreError> {
        let tickets = self
            .tickets
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(tickets
            .values()
            .find(|t| t.reservation_id == reservation)
            .cloned())
    }

    async fn tickets_for_user(&self, user: UserId) -> Result<Vec<Ticket>, StoreError> {
        let tickets = self
            .tickets
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut out: Vec<Ticket> = tickets
            .values()
            .filter(|t| t.user_id == user)
            .cloned()
            .collect();
        out.sort_by_key(|t| t.created_at);
        Ok(out)
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self
            .payments
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if payments.contains_key(&payment.id) {
            return Err(StoreError::Duplicate(payment.id.to_string()));
        }
        payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn update_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let mut payments = self
            .payments
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let stored = payments.get_mut(&payment.id).ok_or(StoreError::NotFound)?;
        *stored = payment.clone();
        Ok(())
    }

    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let payments = self
            .payments
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(payments.get(&id).cloned())
    }

    async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>, StoreError> {
        let payments = self
            .payments
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(payments
            .values()
            .find(|p| p.reservation_id == reservation)
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::{EventId, TierName};
    use chrono::Utc;

    fn ticket() -> Ticket {
        Ticket::issue(
            EventId::new(),
            UserId::new(),
            "ga".parse::<TierName>().unwrap(),
            2500,
            2,
            ReservationId::new(),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn one_ticket_per_reservation() {
        let store = InMemoryBookingStore::new();
        let first = ticket();
        store.insert_ticket(&first).await.unwrap();

        let mut second = ticket();
        second.reservation_id = first.reservation_id;
        assert!(matches!(
            store.insert_ticket(&second).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn tickets_for_user_filters_by_owner() {
        let store = InMemoryBookingStore::new();
        let mine = ticket();
        let theirs = ticket();
        store.insert_ticket(&mine).await.unwrap();
        store.insert_ticket(&theirs).await.unwrap();

        let found = store.tickets_for_user(mine.user_id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, mine.id);
    }

    #[tokio::test]
    async fn payment_lookup_by_reservation() {
        let store = InMemoryBookingStore::new();
        let reservation = ReservationId::new();
        let payment = Payment::pending(reservation, 5000, Utc::now());
        store.insert_payment(&payment).await.unwrap();

        let found = store
            .payment_for_reservation(reservation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, payment.id);
    }

    #[tokio::test]
    async fn update_payment_requires_existing_row() {
        let store = InMemoryBookingStore::new();
        let payment = Payment::pending(ReservationId::new(), 5000, Utc::now());
        assert!(matches!(
            store.update_payment(&payment).await,
            Err(StoreError::NotFound)
        ));
    }
}
