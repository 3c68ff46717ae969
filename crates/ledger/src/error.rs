//! Ledger error taxonomy.

use thiserror::Error;

use boxoffice_core::HoldId;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Inventory ledger error.
///
/// `Integrity` means the counter-sum invariant was violated. It is a fatal
/// internal-consistency error: callers must abort the operation, never
/// auto-correct the counters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Not enough available inventory to satisfy the request. User-facing and
    /// retryable (smaller quantity, or later).
    #[error("insufficient inventory: requested {requested}, available {available}")]
    InsufficientInventory { requested: u32, available: u32 },

    /// The (event, tier) key is not registered with the ledger.
    #[error("unknown tier: {0}")]
    UnknownTier(String),

    /// The hold token does not reference a pending hold (it was already
    /// confirmed, released, or never existed).
    #[error("unknown hold token: {0}")]
    UnknownToken(HoldId),

    /// The hold was already confirmed; a repeated confirm is rejected.
    #[error("hold already confirmed: {0}")]
    AlreadyConfirmed(HoldId),

    /// An optimistic update lost too many races in a row. Transient; retry
    /// with backoff.
    #[error("ledger contention exceeded after {attempts} attempts")]
    ContentionExceeded { attempts: u32 },

    /// A zero or otherwise unusable quantity.
    #[error("quantity must be at least 1")]
    InvalidQuantity,

    /// Counter-sum invariant violation. Non-recoverable.
    #[error("ledger integrity violation: {0}")]
    Integrity(String),

    /// Backing storage failed (connection, query, serialization).
    #[error("ledger storage error: {0}")]
    Storage(String),
}
