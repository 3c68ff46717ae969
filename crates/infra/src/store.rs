//! Shared store error for the reservation/booking/catalog stores.
//!
//! The ledger carries its own richer taxonomy (`LedgerError`); everything
//! else distinguishes only not-found, lost CAS, and backend failure.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    /// An optimistic update lost its version check. The caller should
    /// re-load and re-decide; for reservations this is how the
    /// first-transition-out-of-Held gate manifests to the losers.
    #[error("version conflict: {0}")]
    Conflict(String),

    /// A uniqueness guarantee was violated (duplicate id on insert).
    #[error("duplicate key: {0}")]
    Duplicate(String),

    #[error("storage error: {0}")]
    Storage(String),
}
