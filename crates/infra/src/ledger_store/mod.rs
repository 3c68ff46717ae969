//! The durable inventory ledger: the single shared mutable resource of the
//! whole engine, and the source of truth for oversell prevention.

use std::sync::Arc;

use async_trait::async_trait;

use boxoffice_ledger::{HoldToken, LedgerResult, TierCounters, TierKey};

mod in_memory;
mod postgres;

pub use in_memory::InMemoryLedger;
pub use postgres::PostgresLedger;

/// Durable counters per (event, tier) with atomic check-and-decrement.
///
/// Implementations must serialize all counter mutations for one key relative
/// to each other (per-key mutex, row-level lock, or a bounded optimistic
/// retry that surfaces `ContentionExceeded`). No lock may span different
/// keys: tiers are independent and proceed fully in parallel. Concurrent
/// `reserve` calls for the same key are served strictly in arrival order at
/// the atomic check; there are no priority classes.
///
/// Every mutation re-verifies the counter-sum invariant
/// (`available + reserved + purchased == total`). A violation aborts the
/// operation with `LedgerError::Integrity` and is never silently corrected.
#[async_trait]
pub trait InventoryLedger: Send + Sync + 'static {
    /// Seed a tier with its total capacity. Idempotent: re-registering an
    /// existing key is a no-op, so catalog writes can be retried safely.
    async fn register_tier(&self, key: TierKey, total: u32) -> LedgerResult<()>;

    /// Atomically check `available >= qty` and move qty available → reserved.
    /// Returns a token representing the pending hold.
    async fn reserve(&self, key: &TierKey, qty: u32) -> LedgerResult<HoldToken>;

    /// Move the token's quantity reserved → purchased. A second confirm for
    /// the same token fails with `AlreadyConfirmed`.
    async fn confirm(&self, token: &HoldToken) -> LedgerResult<()>;

    /// Move the token's quantity reserved → available. Fails with
    /// `UnknownToken` if the token was already confirmed or released.
    async fn release(&self, token: &HoldToken) -> LedgerResult<()>;

    /// Move qty purchased → available (refund path).
    async fn restock(&self, key: &TierKey, qty: u32) -> LedgerResult<()>;

    /// Read-only snapshot of the counters for one key.
    async fn counters(&self, key: &TierKey) -> LedgerResult<TierCounters>;
}

#[async_trait]
impl<L> InventoryLedger for Arc<L>
where
    L: InventoryLedger + ?Sized,
{
    async fn register_tier(&self, key: TierKey, total: u32) -> LedgerResult<()> {
        (**self).register_tier(key, total).await
    }

    async fn reserve(&self, key: &TierKey, qty: u32) -> LedgerResult<HoldToken> {
        (**self).reserve(key, qty).await
    }

    async fn confirm(&self, token: &HoldToken) -> LedgerResult<()> {
        (**self).confirm(token).await
    }

    async fn release(&self, token: &HoldToken) -> LedgerResult<()> {
        (**self).release(token).await
    }

    async fn restock(&self, key: &TierKey, qty: u32) -> LedgerResult<()> {
        (**self).restock(key, qty).await
    }

    async fn counters(&self, key: &TierKey) -> LedgerResult<TierCounters> {
        (**self).counters(key).await
    }
}
