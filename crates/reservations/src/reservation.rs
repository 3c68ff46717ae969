use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use boxoffice_core::{Entity, EventId, ReservationId, TierName, UserId};
use boxoffice_ledger::HoldToken;

/// Reservation status lifecycle.
///
/// `Held` is the only non-terminal state. The first transition out of it wins;
/// concurrent confirm/cancel/expire attempts on the same reservation are
/// arbitrated by a compare-and-swap on this field at the store.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationStatus {
    Held,
    Confirmed,
    Released,
    Expired,
}

impl ReservationStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ReservationStatus::Held)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReservationStatus::Held => "held",
            ReservationStatus::Confirmed => "confirmed",
            ReservationStatus::Released => "released",
            ReservationStatus::Expired => "expired",
        }
    }
}

/// Reservation state-machine error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// The reservation is not in `Held`; the client should re-fetch status.
    #[error("reservation is not held (status: {})", .0.as_str())]
    NotHeld(ReservationStatus),

    /// The hold's TTL has passed; it can only be expired, never confirmed.
    #[error("reservation hold has expired")]
    Expired,

    /// Expiry was attempted before the TTL passed.
    #[error("reservation hold has not expired yet")]
    NotExpired,

    /// A charge attempt is in flight and unresolved; cancellation must wait
    /// for its outcome.
    #[error("a charge attempt is in flight for this reservation")]
    ChargeInFlight,

    /// Cancellation attempted by someone other than the holder.
    #[error("reservation does not belong to the requesting user")]
    HolderMismatch,
}

/// A time-bounded claim on tier inventory, pending payment confirmation.
///
/// Owns the ledger `HoldToken` backing it so the manager can confirm or
/// release the underlying counters without a second lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: ReservationId,
    pub event_id: EventId,
    pub tier: TierName,
    pub quantity: u32,
    pub holder: UserId,
    pub hold: HoldToken,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub status: ReservationStatus,
    /// Set while a charge attempt is unresolved; gates cancellation.
    pub charge_started_at: Option<DateTime<Utc>>,
    /// Optimistic-concurrency version, bumped by the store on every update.
    /// The status CAS rides on this: the first writer out of `Held` wins.
    pub version: u64,
}

impl Entity for Reservation {
    type Id = ReservationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Reservation {
    /// Create a fresh `Held` reservation backed by a ledger hold.
    pub fn hold(
        event_id: EventId,
        tier: TierName,
        quantity: u32,
        holder: UserId,
        hold: HoldToken,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            event_id,
            tier,
            quantity,
            holder,
            hold,
            created_at: now,
            expires_at: now + ttl,
            status: ReservationStatus::Held,
            charge_started_at: None,
            version: 0,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    fn ensure_held(&self) -> Result<(), ReservationError> {
        if self.status != ReservationStatus::Held {
            return Err(ReservationError::NotHeld(self.status));
        }
        Ok(())
    }

    /// Mark a charge attempt as started. Only a live hold may be charged.
    pub fn begin_charge(&mut self, now: DateTime<Utc>) -> Result<(), ReservationError> {
        self.ensure_held()?;
        if self.is_expired(now) {
            return Err(ReservationError::Expired);
        }
        if self.charge_started_at.is_some() {
            return Err(ReservationError::ChargeInFlight);
        }
        self.charge_started_at = Some(now);
        Ok(())
    }

    /// Clear the charge-in-flight guard after a definitive gateway outcome.
    pub fn resolve_charge(&mut self) {
        self.charge_started_at = None;
    }

    /// Held → Confirmed. Only while the hold is live; the caller must already
    /// hold a successful charge outcome.
    pub fn confirm(&mut self, now: DateTime<Utc>) -> Result<(), ReservationError> {
        self.ensure_held()?;
        if self.is_expired(now) {
            return Err(ReservationError::Expired);
        }
        self.status = ReservationStatus::Confirmed;
        self.charge_started_at = None;
        Ok(())
    }

    /// Held → Released, on the holder's request. Denied while a charge
    /// attempt is unresolved.
    pub fn cancel(&mut self, holder: UserId) -> Result<(), ReservationError> {
        self.ensure_held()?;
        if self.holder != holder {
            return Err(ReservationError::HolderMismatch);
        }
        if self.charge_started_at.is_some() {
            return Err(ReservationError::ChargeInFlight);
        }
        self.status = ReservationStatus::Released;
        Ok(())
    }

    /// Held → Expired, once the TTL has passed.
    pub fn expire(&mut self, now: DateTime<Utc>) -> Result<(), ReservationError> {
        self.ensure_held()?;
        if !self.is_expired(now) {
            return Err(ReservationError::NotExpired);
        }
        self.status = ReservationStatus::Expired;
        self.charge_started_at = None;
        Ok(())
    }
}
