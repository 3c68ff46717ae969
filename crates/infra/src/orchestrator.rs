//! Booking orchestrator: drives a purchase from catalog lookup through
//! payment to ticket issuance, and cleans up after the ways that can fail.
//!
//! The money-safety rule throughout: once a charge has (or may have)
//! succeeded, inventory is never released automatically. A gateway timeout
//! leaves the hold in place for reconciliation; a persistence failure after
//! a successful charge keeps the units counted as purchased and surfaces an
//! error for repair.

use chrono::Utc;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use boxoffice_booking::{ChargeOutcome, Payment, PaymentStatus, PurchaseReceipt, Ticket};
use boxoffice_catalog::EventListing;
use boxoffice_core::{
    DomainError, EventId, PaymentId, ReservationId, TicketId, TierName, UserId,
};
use boxoffice_ledger::{LedgerError, TierCounters, TierKey};
use boxoffice_reservations::{Reservation, ReservationError, ReservationStatus};

use crate::booking_store::BookingStore;
use crate::catalog_store::CatalogStore;
use crate::gateway::PaymentGateway;
use crate::ledger_store::InventoryLedger;
use crate::manager::{ManagerError, ReservationManager};
use crate::reservation_store::ReservationStore;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum BookingError {
    #[error("event {0} not found")]
    UnknownEvent(EventId),

    #[error("event {event} has no tier '{tier}'")]
    UnknownTier { event: EventId, tier: TierName },

    #[error("ticket {0} not found")]
    UnknownTicket(TicketId),

    #[error("payment {0} not found")]
    UnknownPayment(PaymentId),

    #[error("payment was declined: {reason}")]
    GatewayDeclined { reason: String },

    #[error("payment gateway timed out; reservation {reservation} awaits reconciliation")]
    GatewayTimeout { reservation: ReservationId },

    #[error("charge for reservation {reservation} succeeded but its hold had lapsed")]
    HoldLapsedAfterCharge { reservation: ReservationId },

    #[error("charge for reservation {reservation} succeeded but persisting the sale failed: {detail}")]
    PostChargePersistence {
        reservation: ReservationId,
        detail: String,
    },

    #[error(transparent)]
    Manager(#[from] ManagerError),

    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for BookingError {
    fn from(e: StoreError) -> Self {
        BookingError::Storage(e.to_string())
    }
}

impl From<LedgerError> for BookingError {
    fn from(e: LedgerError) -> Self {
        BookingError::Manager(e.into())
    }
}

/// What a reconciliation pass concluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The charge went through; the sale is now fully recorded.
    Settled(PurchaseReceipt),
    /// Nothing was missing; the sale was already fully recorded.
    AlreadySettled(PurchaseReceipt),
    /// The charge was declined; the hold has been released.
    Declined,
    /// The gateway is still unreachable; try again later.
    StillPending,
    /// The hold lapsed but the charge had settled. The payment is recorded
    /// as succeeded and needs a refund.
    LapsedChargeCaptured,
    /// The hold is gone and no money moved.
    Closed,
}

#[derive(Debug, Clone)]
pub struct BookingOrchestrator<L, R, B, C, G> {
    manager: ReservationManager<L, R>,
    ledger: L,
    bookings: B,
    catalog: C,
    gateway: G,
    gateway_timeout: std::time::Duration,
}

impl<L, R, B, C, G> BookingOrchestrator<L, R, B, C, G>
where
    L: InventoryLedger + Clone,
    R: ReservationStore + Clone,
    B: BookingStore,
    C: CatalogStore,
    G: PaymentGateway,
{
    pub fn new(
        manager: ReservationManager<L, R>,
        ledger: L,
        bookings: B,
        catalog: C,
        gateway: G,
        gateway_timeout: std::time::Duration,
    ) -> Self {
        Self {
            manager,
            ledger,
            bookings,
            catalog,
            gateway,
            gateway_timeout,
        }
    }

    pub fn manager(&self) -> &ReservationManager<L, R> {
        &self.manager
    }

    /// Create a catalog listing and seed the ledger with each tier's
    /// capacity.
    #[instrument(skip(self, event), fields(id = %event.id), err)]
    pub async fn create_event(&self, event: &EventListing) -> Result<(), BookingError> {
        self.catalog.insert_event(event).await?;
        for tier in &event.tiers {
            let key = TierKey::new(event.id, tier.name.clone());
            self.ledger.register_tier(key, tier.capacity).await?;
        }
        info!(event = %event.id, tiers = event.tiers.len(), "event listed");
        Ok(())
    }

    pub async fn get_event(&self, id: EventId) -> Result<Option<EventListing>, BookingError> {
        Ok(self.catalog.get_event(id).await?)
    }

    pub async fn list_events(&self) -> Result<Vec<EventListing>, BookingError> {
        Ok(self.catalog.list_events().await?)
    }

    pub async fn tier_counters(
        &self,
        event: EventId,
        tier: TierName,
    ) -> Result<TierCounters, BookingError> {
        Ok(self.ledger.counters(&TierKey::new(event, tier)).await?)
    }

    pub async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>, BookingError> {
        Ok(self.bookings.get_ticket(id).await?)
    }

    pub async fn tickets_for_user(&self, user: UserId) -> Result<Vec<Ticket>, BookingError> {
        Ok(self.bookings.tickets_for_user(user).await?)
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, BookingError> {
        Ok(self.bookings.get_payment(id).await?)
    }

    /// The whole purchase flow: price the tier, hold inventory, charge, and
    /// issue the ticket.
    #[instrument(skip(self), fields(event = %event_id, tier = %tier), err)]
    pub async fn purchase(
        &self,
        user: UserId,
        event_id: EventId,
        tier: TierName,
        qty: u32,
    ) -> Result<PurchaseReceipt, BookingError> {
        let listing = self
            .catalog
            .get_event(event_id)
            .await?
            .ok_or(BookingError::UnknownEvent(event_id))?;
        let tier_def = listing.tier(&tier).ok_or_else(|| BookingError::UnknownTier {
            event: event_id,
            tier: tier.clone(),
        })?;
        let amount = tier_def.price * u64::from(qty);

        let reservation = self
            .manager
            .create_hold(event_id, tier, qty, user)
            .await?;
        let reservation = self.manager.begin_charge(reservation.id).await?;

        match self.charge_with_timeout(reservation.id, amount).await {
            ChargeOutcome::Succeeded { transaction_id } => {
                self.settle_successful_charge(reservation, amount, transaction_id)
                    .await
            }
            ChargeOutcome::Failed { reason } => {
                self.settle_declined_charge(reservation, amount, reason)
                    .await
            }
            ChargeOutcome::Timeout => {
                // Outcome unknown: the money may have moved, so the hold
                // stays (charge marker included) until reconciliation.
                let payment = Payment::pending(reservation.id, amount, Utc::now());
                self.bookings.insert_payment(&payment).await?;
                warn!(reservation = %reservation.id, "gateway timed out, hold retained");
                Err(BookingError::GatewayTimeout {
                    reservation: reservation.id,
                })
            }
        }
    }

    /// Re-drive a reservation stuck by a gateway timeout (or a recorded sale
    /// missing its ticket) to a terminal state.
    #[instrument(skip(self), err)]
    pub async fn reconcile(
        &self,
        id: ReservationId,
    ) -> Result<ReconcileOutcome, BookingError> {
        let reservation = self
            .manager
            .get(id)
            .await?
            .ok_or(ManagerError::NotFound(id))?;

        match reservation.status {
            ReservationStatus::Confirmed => self.repair_confirmed(reservation).await,
            ReservationStatus::Held => self.redrive_held(reservation).await,
            ReservationStatus::Released | ReservationStatus::Expired => {
                self.close_lapsed(reservation).await
            }
        }
    }

    /// Refund a ticketed sale and return its units to inventory.
    ///
    /// The payment flips to refunded before the restock; a restock failure
    /// leaves a refunded payment with unreturned units, which is the safe
    /// side to err on.
    #[instrument(skip(self), err)]
    pub async fn refund(&self, ticket_id: TicketId) -> Result<Payment, BookingError> {
        let ticket = self
            .bookings
            .get_ticket(ticket_id)
            .await?
            .ok_or(BookingError::UnknownTicket(ticket_id))?;
        let mut payment = self
            .bookings
            .payment_for_reservation(ticket.reservation_id)
            .await?
            .ok_or_else(|| {
                BookingError::Storage(format!("ticket {ticket_id} has no payment on record"))
            })?;

        payment.mark_refunded()?;
        self.bookings.update_payment(&payment).await?;

        let key = TierKey::new(ticket.event_id, ticket.tier.clone());
        self.ledger.restock(&key, ticket.quantity).await?;
        info!(ticket = %ticket.id, reservation = %ticket.reservation_id, "ticket refunded");
        Ok(payment)
    }

    async fn charge_with_timeout(&self, key: ReservationId, amount: u64) -> ChargeOutcome {
        match tokio::time::timeout(self.gateway_timeout, self.gateway.charge(key, amount)).await
        {
            Ok(outcome) => outcome,
            Err(_) => ChargeOutcome::Timeout,
        }
    }

    async fn settle_successful_charge(
        &self,
        reservation: Reservation,
        amount: u64,
        transaction_id: String,
    ) -> Result<PurchaseReceipt, BookingError> {
        let id = reservation.id;
        let confirmed = match self.manager.confirm(reservation).await {
            Ok(confirmed) => confirmed,
            Err(ManagerError::Reservation(
                ReservationError::Expired | ReservationError::NotHeld(_),
            )) => {
                // The hold left Held under us. A racing reconcile may have
                // settled the sale already; only a hold that truly lapsed
                // gets the captured-charge treatment.
                let current = self
                    .manager
                    .get(id)
                    .await?
                    .ok_or(ManagerError::NotFound(id))?;
                if current.status == ReservationStatus::Confirmed {
                    return match self.repair_confirmed(current).await? {
                        ReconcileOutcome::Settled(receipt)
                        | ReconcileOutcome::AlreadySettled(receipt) => Ok(receipt),
                        ReconcileOutcome::StillPending => {
                            Err(BookingError::GatewayTimeout { reservation: id })
                        }
                        other => Err(BookingError::Storage(format!(
                            "reservation {id} confirmed concurrently but settled as {other:?}"
                        ))),
                    };
                }
                error!(reservation = %id, "charge settled after hold lapsed");
                self.record_captured_payment(id, amount, transaction_id)
                    .await?;
                return Err(BookingError::HoldLapsedAfterCharge { reservation: id });
            }
            Err(e) => return Err(e.into()),
        };

        let payment = Payment::succeeded(confirmed.id, amount, transaction_id, Utc::now());
        self.record_sale(&confirmed, payment).await
    }

    async fn settle_declined_charge(
        &self,
        reservation: Reservation,
        amount: u64,
        reason: String,
    ) -> Result<PurchaseReceipt, BookingError> {
        let holder = reservation.holder;
        let resolved = self.manager.resolve_charge(reservation).await?;
        self.manager.cancel(resolved.id, holder).await?;

        let payment = Payment::failed(resolved.id, amount, reason.clone(), Utc::now());
        self.bookings.insert_payment(&payment).await?;
        info!(reservation = %resolved.id, reason, "charge declined, hold released");
        Err(BookingError::GatewayDeclined { reason })
    }

    /// Persist payment and ticket for a confirmed reservation. Failures here
    /// happen after the charge, so inventory is never released; the error
    /// carries enough to repair via `reconcile`.
    async fn record_sale(
        &self,
        confirmed: &Reservation,
        mut payment: Payment,
    ) -> Result<PurchaseReceipt, BookingError> {
        let persist = async {
            self.bookings.insert_payment(&payment).await?;
            let ticket = Ticket::issue(
                confirmed.event_id,
                confirmed.holder,
                confirmed.tier.clone(),
                payment.amount / u64::from(confirmed.quantity.max(1)),
                confirmed.quantity,
                confirmed.id,
                Utc::now(),
            );
            self.bookings.insert_ticket(&ticket).await?;
            payment.attach_ticket(ticket.id);
            self.bookings.update_payment(&payment).await?;
            Ok::<Ticket, StoreError>(ticket)
        };

        match persist.await {
            Ok(ticket) => {
                info!(
                    reservation = %confirmed.id,
                    ticket = %ticket.id,
                    "purchase complete"
                );
                Ok(PurchaseReceipt {
                    reservation_id: confirmed.id,
                    ticket,
                    payment,
                })
            }
            Err(e) => {
                error!(
                    reservation = %confirmed.id,
                    error = %e,
                    "charge settled but recording the sale failed"
                );
                Err(BookingError::PostChargePersistence {
                    reservation: confirmed.id,
                    detail: e.to_string(),
                })
            }
        }
    }

    /// Confirmed reservation: make sure the ledger move and the payment and
    /// ticket rows all happened.
    async fn repair_confirmed(
        &self,
        reservation: Reservation,
    ) -> Result<ReconcileOutcome, BookingError> {
        // The manager commits the status CAS before the ledger move, so a
        // failure between the two leaves the units parked in reserved.
        // Re-driving the confirm is safe: a second confirm of the same hold
        // reports AlreadyConfirmed.
        match self.ledger.confirm(&reservation.hold).await {
            Ok(()) => {
                warn!(
                    reservation = %reservation.id,
                    "reconciliation completed a ledger confirm that was lost"
                );
            }
            Err(LedgerError::AlreadyConfirmed(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let ticket = self.bookings.ticket_for_reservation(reservation.id).await?;
        let payment = self.bookings.payment_for_reservation(reservation.id).await?;

        if let (Some(ticket), Some(payment)) = (ticket.clone(), payment.clone()) {
            return Ok(ReconcileOutcome::AlreadySettled(PurchaseReceipt {
                reservation_id: reservation.id,
                ticket,
                payment,
            }));
        }

        // Replaying the charge with the same key returns the settled outcome
        // without charging again.
        let amount = match &payment {
            Some(p) => p.amount,
            None => self.amount_for(&reservation).await?,
        };
        let transaction_id = match self.charge_with_timeout(reservation.id, amount).await {
            ChargeOutcome::Succeeded { transaction_id } => transaction_id,
            ChargeOutcome::Failed { reason } => {
                // A confirmed reservation with a failed charge should not
                // exist; surface it rather than guessing.
                return Err(BookingError::Storage(format!(
                    "confirmed reservation {} has a declined charge: {reason}",
                    reservation.id
                )));
            }
            ChargeOutcome::Timeout => return Ok(ReconcileOutcome::StillPending),
        };

        let mut payment = match payment {
            Some(mut p) => {
                p.mark_succeeded(transaction_id)?;
                self.bookings.update_payment(&p).await?;
                p
            }
            None => {
                let p = Payment::succeeded(reservation.id, amount, transaction_id, Utc::now());
                self.bookings.insert_payment(&p).await?;
                p
            }
        };

        let ticket = match ticket {
            Some(ticket) => ticket,
            None => {
                let ticket = Ticket::issue(
                    reservation.event_id,
                    reservation.holder,
                    reservation.tier.clone(),
                    amount / u64::from(reservation.quantity.max(1)),
                    reservation.quantity,
                    reservation.id,
                    Utc::now(),
                );
                self.bookings.insert_ticket(&ticket).await?;
                ticket
            }
        };
        payment.attach_ticket(ticket.id);
        self.bookings.update_payment(&payment).await?;

        info!(reservation = %reservation.id, "reconciliation repaired a recorded sale");
        Ok(ReconcileOutcome::Settled(PurchaseReceipt {
            reservation_id: reservation.id,
            ticket,
            payment,
        }))
    }

    /// Held reservation (timed-out charge): replay the charge and settle.
    async fn redrive_held(
        &self,
        reservation: Reservation,
    ) -> Result<ReconcileOutcome, BookingError> {
        let payment = self.bookings.payment_for_reservation(reservation.id).await?;
        let amount = match &payment {
            Some(p) => p.amount,
            None => self.amount_for(&reservation).await?,
        };

        match self.charge_with_timeout(reservation.id, amount).await {
            ChargeOutcome::Succeeded { transaction_id } => {
                let id = reservation.id;
                let confirmed = match self.manager.confirm(reservation).await {
                    Ok(confirmed) => confirmed,
                    Err(ManagerError::Reservation(
                        ReservationError::Expired | ReservationError::NotHeld(_),
                    )) => {
                        // A racing reconcile may have confirmed and settled
                        // the sale first; deferring to it keeps the winner's
                        // payment row intact. Only a hold that truly lapsed
                        // is a captured charge.
                        let current = self
                            .manager
                            .get(id)
                            .await?
                            .ok_or(ManagerError::NotFound(id))?;
                        if current.status == ReservationStatus::Confirmed {
                            return self.repair_confirmed(current).await;
                        }
                        self.record_captured_payment(id, amount, transaction_id)
                            .await?;
                        error!(reservation = %id, "reconciled charge settled after hold lapsed");
                        return Ok(ReconcileOutcome::LapsedChargeCaptured);
                    }
                    Err(e) => return Err(e.into()),
                };

                let settled = match payment {
                    Some(mut p) => {
                        p.mark_succeeded(transaction_id)?;
                        self.bookings.update_payment(&p).await?;
                        p
                    }
                    None => {
                        let p =
                            Payment::succeeded(confirmed.id, amount, transaction_id, Utc::now());
                        self.bookings.insert_payment(&p).await?;
                        p
                    }
                };
                let ticket = Ticket::issue(
                    confirmed.event_id,
                    confirmed.holder,
                    confirmed.tier.clone(),
                    amount / u64::from(confirmed.quantity.max(1)),
                    confirmed.quantity,
                    confirmed.id,
                    Utc::now(),
                );
                self.bookings.insert_ticket(&ticket).await?;
                let mut settled = settled;
                settled.attach_ticket(ticket.id);
                self.bookings.update_payment(&settled).await?;

                info!(reservation = %confirmed.id, "reconciliation settled a timed-out charge");
                Ok(ReconcileOutcome::Settled(PurchaseReceipt {
                    reservation_id: confirmed.id,
                    ticket,
                    payment: settled,
                }))
            }
            ChargeOutcome::Failed { reason } => {
                let holder = reservation.holder;
                let resolved = self.manager.resolve_charge(reservation).await?;
                self.manager.cancel(resolved.id, holder).await?;
                if let Some(mut p) = payment {
                    p.mark_failed(reason.clone())?;
                    self.bookings.update_payment(&p).await?;
                }
                info!(reservation = %resolved.id, reason, "reconciliation found a declined charge");
                Ok(ReconcileOutcome::Declined)
            }
            ChargeOutcome::Timeout => Ok(ReconcileOutcome::StillPending),
        }
    }

    /// The hold is terminal without a sale. Find out whether money moved.
    async fn close_lapsed(
        &self,
        reservation: Reservation,
    ) -> Result<ReconcileOutcome, BookingError> {
        let payment = self.bookings.payment_for_reservation(reservation.id).await?;
        let Some(pending) = payment.clone().filter(|p| p.transaction_id.is_none()) else {
            return Ok(ReconcileOutcome::Closed);
        };

        match self
            .charge_with_timeout(reservation.id, pending.amount)
            .await
        {
            ChargeOutcome::Succeeded { transaction_id } => {
                self.record_captured_payment(reservation.id, pending.amount, transaction_id)
                    .await?;
                error!(reservation = %reservation.id, "lapsed hold has a captured charge");
                Ok(ReconcileOutcome::LapsedChargeCaptured)
            }
            ChargeOutcome::Failed { reason } => {
                if let Some(mut p) = payment {
                    p.mark_failed(reason)?;
                    self.bookings.update_payment(&p).await?;
                }
                Ok(ReconcileOutcome::Closed)
            }
            ChargeOutcome::Timeout => Ok(ReconcileOutcome::StillPending),
        }
    }

    /// Record that a charge settled for a reservation whose hold is gone.
    ///
    /// Reads the payment fresh rather than trusting a copy the caller loaded
    /// earlier: a concurrent reconciler may have settled it in the meantime,
    /// and overwriting its row would detach the ticket or duplicate the
    /// succeeded payment.
    async fn record_captured_payment(
        &self,
        reservation: ReservationId,
        amount: u64,
        transaction_id: String,
    ) -> Result<(), BookingError> {
        match self.bookings.payment_for_reservation(reservation).await? {
            Some(p) if p.status == PaymentStatus::Succeeded => {}
            Some(mut p) => {
                p.mark_succeeded(transaction_id)?;
                self.bookings.update_payment(&p).await?;
            }
            None => {
                let p = Payment::succeeded(reservation, amount, transaction_id, Utc::now());
                self.bookings.insert_payment(&p).await?;
            }
        }
        Ok(())
    }

    async fn amount_for(&self, reservation: &Reservation) -> Result<u64, BookingError> {
        let tier_def = self
            .catalog
            .get_tier(reservation.event_id, &reservation.tier)
            .await?
            .ok_or_else(|| BookingError::UnknownTier {
                event: reservation.event_id,
                tier: reservation.tier.clone(),
            })?;
        Ok(tier_def.price * u64::from(reservation.quantity))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::booking_store::{BookingStore, InMemoryBookingStore};
    use crate::catalog_store::InMemoryCatalogStore;
    use crate::gateway::ScriptedGateway;
    use crate::ledger_store::InMemoryLedger;
    use crate::reservation_store::{InMemoryReservationStore, ReservationStore};
    use boxoffice_catalog::TierDef;
    use boxoffice_core::UserId;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;

    type TestOrchestrator = BookingOrchestrator<
        Arc<InMemoryLedger>,
        Arc<InMemoryReservationStore>,
        Arc<InMemoryBookingStore>,
        Arc<InMemoryCatalogStore>,
        Arc<ScriptedGateway>,
    >;

    struct Fixture {
        orchestrator: TestOrchestrator,
        ledger: Arc<InMemoryLedger>,
        reservations: Arc<InMemoryReservationStore>,
        bookings: Arc<InMemoryBookingStore>,
        event: EventId,
        key: TierKey,
    }

    async fn fixture(capacity: u32, script: Vec<ChargeOutcome>) -> Fixture {
        let ledger = Arc::new(InMemoryLedger::new());
        let reservations = Arc::new(InMemoryReservationStore::new());
        let bookings = Arc::new(InMemoryBookingStore::new());
        let catalog = Arc::new(InMemoryCatalogStore::new());
        let gateway = Arc::new(ScriptedGateway::new(script));

        let manager = ReservationManager::new(
            Arc::clone(&ledger),
            Arc::clone(&reservations),
            ChronoDuration::minutes(5),
        );
        let orchestrator = BookingOrchestrator::new(
            manager,
            Arc::clone(&ledger),
            Arc::clone(&bookings),
            catalog,
            gateway,
            std::time::Duration::from_secs(5),
        );

        let tier_name: TierName = "ga".parse().unwrap();
        let event = boxoffice_catalog::EventListing::new(
            "Rooftop Sessions",
            None,
            None,
            UserId::new(),
            vec![],
            vec![TierDef {
                name: tier_name.clone(),
                price: 2500,
                capacity,
            }],
            Utc::now(),
        )
        .unwrap();
        orchestrator.create_event(&event).await.unwrap();

        Fixture {
            orchestrator,
            ledger,
            reservations,
            bookings,
            event: event.id,
            key: TierKey::new(event.id, tier_name),
        }
    }

    fn ga() -> TierName {
        "ga".parse().unwrap()
    }

    #[tokio::test]
    async fn losing_a_reconcile_race_defers_to_the_settled_sale() {
        let fx = fixture(10, vec![ChargeOutcome::Timeout]).await;
        let err = fx
            .orchestrator
            .purchase(UserId::new(), fx.event, ga(), 2)
            .await
            .unwrap_err();
        let BookingError::GatewayTimeout { reservation } = err else {
            panic!("expected timeout, got {err:?}");
        };

        // The row as a second reconciler would have loaded it, before the
        // first one commits the confirm.
        let stale = fx.reservations.get(reservation).await.unwrap().unwrap();

        let outcome = fx.orchestrator.reconcile(reservation).await.unwrap();
        let ReconcileOutcome::Settled(receipt) = outcome else {
            panic!("expected settled, got {outcome:?}");
        };

        // The loser resumes from its stale Held copy, loses the status CAS,
        // and must defer to the settled sale rather than flag a lapsed
        // capture.
        let outcome = fx.orchestrator.redrive_held(stale).await.unwrap();
        let ReconcileOutcome::AlreadySettled(replayed) = outcome else {
            panic!("expected already settled, got {outcome:?}");
        };
        assert_eq!(replayed.ticket.id, receipt.ticket.id);

        // The winner's payment row survives untouched: succeeded, with the
        // ticket still attached.
        let payment = fx
            .bookings
            .payment_for_reservation(reservation)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(payment.id, receipt.payment.id);
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert_eq!(payment.ticket_id, Some(receipt.ticket.id));
    }

    #[tokio::test]
    async fn reconcile_completes_a_confirm_that_missed_the_ledger() {
        let fx = fixture(10, vec![]).await;
        let user = UserId::new();
        let reservation = fx
            .orchestrator
            .manager()
            .create_hold(fx.event, ga(), 3, user)
            .await
            .unwrap();

        // Status CAS committed, then the process died before the ledger
        // move: the units stay parked in reserved.
        let mut row = fx.reservations.get(reservation.id).await.unwrap().unwrap();
        row.confirm(Utc::now()).unwrap();
        fx.reservations.update(&row).await.unwrap();
        let c = fx.ledger.counters(&fx.key).await.unwrap();
        assert_eq!(c.reserved, 3);
        assert_eq!(c.purchased, 0);

        let outcome = fx.orchestrator.reconcile(reservation.id).await.unwrap();
        assert!(matches!(outcome, ReconcileOutcome::Settled(_)));

        let c = fx.ledger.counters(&fx.key).await.unwrap();
        assert_eq!(c.reserved, 0);
        assert_eq!(c.purchased, 3);
    }
}
