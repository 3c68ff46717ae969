//! Per-tier inventory counters and their checked transitions.

use serde::{Deserialize, Serialize};

use boxoffice_core::{EventId, TierName, ValueObject};

use crate::error::{LedgerError, LedgerResult};

/// Ledger key: one counter row per (event, tier).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TierKey {
    pub event_id: EventId,
    pub tier: TierName,
}

impl TierKey {
    pub fn new(event_id: EventId, tier: TierName) -> Self {
        Self { event_id, tier }
    }
}

impl core::fmt::Display for TierKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}/{}", self.event_id, self.tier)
    }
}

/// Inventory counters for one tier.
///
/// Invariant: `available + reserved + purchased == total` at all times.
/// Transitions return a new value (value-object semantics) and re-verify the
/// invariant; they never mutate in place.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierCounters {
    pub total: u32,
    pub available: u32,
    pub reserved: u32,
    pub purchased: u32,
}

impl ValueObject for TierCounters {}

impl TierCounters {
    /// Fresh counters: everything available, nothing reserved or purchased.
    pub fn new(total: u32) -> Self {
        Self {
            total,
            available: total,
            reserved: 0,
            purchased: 0,
        }
    }

    /// Check the counter-sum invariant.
    ///
    /// A violation is a fatal internal-consistency error; callers abort the
    /// mutation that produced it and surface `Integrity`, never repair.
    pub fn verify(&self) -> LedgerResult<()> {
        let sum = self.available as u64 + self.reserved as u64 + self.purchased as u64;
        if sum != self.total as u64 {
            return Err(LedgerError::Integrity(format!(
                "available({}) + reserved({}) + purchased({}) != total({})",
                self.available, self.reserved, self.purchased, self.total
            )));
        }
        Ok(())
    }

    /// available → reserved. The atomic check-and-decrement at the core of
    /// oversell prevention; serialization per key is the store's job.
    pub fn reserve(self, qty: u32) -> LedgerResult<Self> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        if self.available < qty {
            return Err(LedgerError::InsufficientInventory {
                requested: qty,
                available: self.available,
            });
        }
        let next = Self {
            available: self.available - qty,
            reserved: self.reserved + qty,
            ..self
        };
        next.verify()?;
        Ok(next)
    }

    /// reserved → purchased (hold confirmed after a successful charge).
    pub fn confirm(self, qty: u32) -> LedgerResult<Self> {
        if self.reserved < qty {
            return Err(LedgerError::Integrity(format!(
                "confirm of {} exceeds reserved {}",
                qty, self.reserved
            )));
        }
        let next = Self {
            reserved: self.reserved - qty,
            purchased: self.purchased + qty,
            ..self
        };
        next.verify()?;
        Ok(next)
    }

    /// reserved → available (hold released or expired).
    pub fn release(self, qty: u32) -> LedgerResult<Self> {
        if self.reserved < qty {
            return Err(LedgerError::Integrity(format!(
                "release of {} exceeds reserved {}",
                qty, self.reserved
            )));
        }
        let next = Self {
            reserved: self.reserved - qty,
            available: self.available + qty,
            ..self
        };
        next.verify()?;
        Ok(next)
    }

    /// purchased → available (refund path; the ticket record itself is kept).
    pub fn restock(self, qty: u32) -> LedgerResult<Self> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        if self.purchased < qty {
            return Err(LedgerError::Integrity(format!(
                "restock of {} exceeds purchased {}",
                qty, self.purchased
            )));
        }
        let next = Self {
            purchased: self.purchased - qty,
            available: self.available + qty,
            ..self
        };
        next.verify()?;
        Ok(next)
    }
}
