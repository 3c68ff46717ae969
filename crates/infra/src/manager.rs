//! Reservation manager: composes the inventory ledger and the reservation
//! store into the hold lifecycle.
//!
//! Transition ordering is fixed: the status CAS at the store commits first,
//! and only the winner touches the ledger. A transition that loses the CAS
//! never mutates counters, so confirm/cancel/expire races settle with
//! exactly one ledger effect.

use chrono::{Duration, Utc};
use thiserror::Error;
use tracing::{info, instrument, warn};

use boxoffice_core::{EventId, ReservationId, TierName, UserId};
use boxoffice_ledger::{LedgerError, TierKey};
use boxoffice_reservations::{Reservation, ReservationError};

use crate::ledger_store::InventoryLedger;
use crate::reservation_store::ReservationStore;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Reservation(#[from] ReservationError),

    #[error("reservation {0} not found")]
    NotFound(ReservationId),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<StoreError> for ManagerError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Storage(msg) | StoreError::Conflict(msg) | StoreError::Duplicate(msg) => {
                ManagerError::Storage(msg)
            }
            StoreError::NotFound => ManagerError::Storage("row vanished mid-update".into()),
        }
    }
}

/// Tally from one expiry sweep.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Stale holds the sweep looked at.
    pub examined: usize,
    /// Holds expired and released back to inventory.
    pub expired: usize,
    /// Holds skipped because another transition won the CAS first.
    pub lost_races: usize,
}

#[derive(Debug, Clone)]
pub struct ReservationManager<L, R> {
    ledger: L,
    store: R,
    hold_ttl: Duration,
}

impl<L, R> ReservationManager<L, R>
where
    L: InventoryLedger + Clone,
    R: ReservationStore + Clone,
{
    pub fn new(ledger: L, store: R, hold_ttl: Duration) -> Self {
        Self {
            ledger,
            store,
            hold_ttl,
        }
    }

    /// Atomically claim inventory and persist a `Held` reservation.
    ///
    /// If persisting fails after the ledger decrement, the hold is released
    /// again so no inventory leaks.
    #[instrument(skip(self), fields(event = %event_id, tier = %tier), err)]
    pub async fn create_hold(
        &self,
        event_id: EventId,
        tier: TierName,
        qty: u32,
        holder: UserId,
    ) -> Result<Reservation, ManagerError> {
        let key = TierKey::new(event_id, tier.clone());
        let token = self.ledger.reserve(&key, qty).await?;

        let reservation = Reservation::hold(
            event_id,
            tier,
            qty,
            holder,
            token.clone(),
            Utc::now(),
            self.hold_ttl,
        );

        if let Err(e) = self.store.insert(&reservation).await {
            warn!(reservation = %reservation.id, error = %e, "hold insert failed, releasing inventory");
            if let Err(release_err) = self.ledger.release(&token).await {
                // The counters now carry a phantom hold; this needs an operator.
                tracing::error!(
                    hold = %token.id,
                    error = %release_err,
                    "failed to release inventory after insert failure"
                );
            }
            return Err(e.into());
        }

        info!(reservation = %reservation.id, expires_at = %reservation.expires_at, "hold created");
        Ok(reservation)
    }

    pub async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, ManagerError> {
        Ok(self.store.get(id).await?)
    }

    async fn load(&self, id: ReservationId) -> Result<Reservation, ManagerError> {
        self.store
            .get(id)
            .await?
            .ok_or(ManagerError::NotFound(id))
    }

    /// Mark a charge attempt as started on a live hold.
    ///
    /// The version CAS makes this single-flight: a second caller loses and
    /// sees `ChargeInFlight` from the re-read row.
    #[instrument(skip(self), err)]
    pub async fn begin_charge(&self, id: ReservationId) -> Result<Reservation, ManagerError> {
        let mut reservation = self.load(id).await?;
        reservation.begin_charge(Utc::now())?;
        self.update_or_report(reservation).await
    }

    /// Clear the in-flight charge marker without changing status.
    #[instrument(skip(self, reservation), fields(id = %reservation.id), err)]
    pub async fn resolve_charge(
        &self,
        mut reservation: Reservation,
    ) -> Result<Reservation, ManagerError> {
        reservation.resolve_charge();
        self.update_or_report(reservation).await
    }

    /// Settle a hold into `Confirmed` and move its inventory to purchased.
    #[instrument(skip(self, reservation), fields(id = %reservation.id), err)]
    pub async fn confirm(
        &self,
        mut reservation: Reservation,
    ) -> Result<Reservation, ManagerError> {
        reservation.confirm(Utc::now())?;
        let stored = self.update_or_report(reservation).await?;
        self.ledger.confirm(&stored.hold).await?;
        info!(reservation = %stored.id, "reservation confirmed");
        Ok(stored)
    }

    /// Voluntary cancellation by the holder. Refused while a charge attempt
    /// is unresolved.
    #[instrument(skip(self), err)]
    pub async fn cancel(
        &self,
        id: ReservationId,
        holder: UserId,
    ) -> Result<Reservation, ManagerError> {
        let mut reservation = self.load(id).await?;
        reservation.cancel(holder)?;
        let stored = self.update_or_report(reservation).await?;
        self.ledger.release(&stored.hold).await?;
        info!(reservation = %stored.id, "reservation cancelled");
        Ok(stored)
    }

    /// Expire stale holds and return their inventory, up to `limit` rows.
    ///
    /// A hold whose CAS is lost belongs to a racing confirm or cancel and is
    /// left alone; the next sweep will not see it again.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, limit: usize) -> Result<SweepOutcome, ManagerError> {
        let now = Utc::now();
        let stale = self.store.list_stale(now, limit).await?;
        let mut outcome = SweepOutcome {
            examined: stale.len(),
            ..SweepOutcome::default()
        };

        for mut reservation in stale {
            if reservation.expire(now).is_err() {
                // Raced with a transition between the listing and here.
                outcome.lost_races += 1;
                continue;
            }
            match self.store.update(&reservation).await {
                Ok(stored) => {
                    self.ledger.release(&stored.hold).await?;
                    outcome.expired += 1;
                }
                Err(StoreError::Conflict(_)) => {
                    outcome.lost_races += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }

        if outcome.expired > 0 {
            info!(
                expired = outcome.expired,
                lost_races = outcome.lost_races,
                "expiry sweep released stale holds"
            );
        }
        Ok(outcome)
    }

    /// CAS update; on a lost race, re-read and report the winner's status.
    async fn update_or_report(
        &self,
        reservation: Reservation,
    ) -> Result<Reservation, ManagerError> {
        match self.store.update(&reservation).await {
            Ok(stored) => Ok(stored),
            Err(StoreError::Conflict(_)) => {
                let current = self.load(reservation.id).await?;
                if !current.status.is_terminal() && current.charge_started_at.is_some() {
                    Err(ReservationError::ChargeInFlight.into())
                } else {
                    Err(ReservationError::NotHeld(current.status).into())
                }
            }
            Err(e) => Err(e.into()),
        }
    }
}
