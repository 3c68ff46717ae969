use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use chrono::Utc;

use boxoffice_core::HoldId;
use boxoffice_ledger::{
    HoldRecord, HoldState, HoldToken, LedgerError, LedgerResult, TierCounters, TierKey,
};

use super::InventoryLedger;

/// One tier's counters plus its hold audit trail, guarded by one mutex.
#[derive(Debug)]
struct TierSlot {
    counters: TierCounters,
    holds: HashMap<HoldId, HoldRecord>,
}

/// In-memory inventory ledger.
///
/// Intended for tests/dev. The outer map lock only guards the map structure;
/// each key carries its own mutex, so mutations on different tiers never
/// contend. Lock acquisition order for one key is FIFO-ish under the OS
/// mutex, which satisfies the arrival-order policy.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    tiers: RwLock<HashMap<TierKey, Arc<Mutex<TierSlot>>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, key: &TierKey) -> LedgerResult<Arc<Mutex<TierSlot>>> {
        let tiers = self
            .tiers
            .read()
            .map_err(|_| LedgerError::Storage("ledger map lock poisoned".to_string()))?;
        tiers
            .get(key)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownTier(key.to_string()))
    }
}

#[async_trait]
impl InventoryLedger for InMemoryLedger {
    async fn register_tier(&self, key: TierKey, total: u32) -> LedgerResult<()> {
        let mut tiers = self
            .tiers
            .write()
            .map_err(|_| LedgerError::Storage("ledger map lock poisoned".to_string()))?;
        tiers.entry(key).or_insert_with(|| {
            Arc::new(Mutex::new(TierSlot {
                counters: TierCounters::new(total),
                holds: HashMap::new(),
            }))
        });
        Ok(())
    }

    async fn reserve(&self, key: &TierKey, qty: u32) -> LedgerResult<HoldToken> {
        let slot = self.slot(key)?;
        let mut slot = slot
            .lock()
            .map_err(|_| LedgerError::Storage("tier slot lock poisoned".to_string()))?;

        // Check-and-decrement under the per-key lock: the atomic unit.
        slot.counters = slot.counters.reserve(qty)?;

        let token = HoldToken::new(key.clone(), qty);
        slot.holds
            .insert(token.id, HoldRecord::pending(&token, Utc::now()));
        Ok(token)
    }

    async fn confirm(&self, token: &HoldToken) -> LedgerResult<()> {
        let slot = self.slot(&token.key)?;
        let mut slot = slot
            .lock()
            .map_err(|_| LedgerError::Storage("tier slot lock poisoned".to_string()))?;

        let state = match slot.holds.get(&token.id) {
            None => return Err(LedgerError::UnknownToken(token.id)),
            Some(h) => h.state,
        };
        match state {
            HoldState::Confirmed => return Err(LedgerError::AlreadyConfirmed(token.id)),
            HoldState::Released => return Err(LedgerError::UnknownToken(token.id)),
            HoldState::Pending => {}
        }

        slot.counters = slot.counters.confirm(token.quantity)?;
        if let Some(h) = slot.holds.get_mut(&token.id) {
            h.state = HoldState::Confirmed;
        }
        Ok(())
    }

    async fn release(&self, token: &HoldToken) -> LedgerResult<()> {
        let slot = self.slot(&token.key)?;
        let mut slot = slot
            .lock()
            .map_err(|_| LedgerError::Storage("tier slot lock poisoned".to_string()))?;

        match slot.holds.get(&token.id).map(|h| h.state) {
            Some(HoldState::Pending) => {}
            // Terminal holds are kept for audit, never reused.
            Some(_) | None => return Err(LedgerError::UnknownToken(token.id)),
        }

        slot.counters = slot.counters.release(token.quantity)?;
        if let Some(h) = slot.holds.get_mut(&token.id) {
            h.state = HoldState::Released;
        }
        Ok(())
    }

    async fn restock(&self, key: &TierKey, qty: u32) -> LedgerResult<()> {
        let slot = self.slot(key)?;
        let mut slot = slot
            .lock()
            .map_err(|_| LedgerError::Storage("tier slot lock poisoned".to_string()))?;
        slot.counters = slot.counters.restock(qty)?;
        Ok(())
    }

    async fn counters(&self, key: &TierKey) -> LedgerResult<TierCounters> {
        let slot = self.slot(key)?;
        let slot = slot
            .lock()
            .map_err(|_| LedgerError::Storage("tier slot lock poisoned".to_string()))?;
        Ok(slot.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::{EventId, TierName};

    fn test_key() -> TierKey {
        TierKey::new(EventId::new(), TierName::new("vip").unwrap())
    }

    async fn seeded(total: u32) -> (InMemoryLedger, TierKey) {
        let ledger = InMemoryLedger::new();
        let key = test_key();
        ledger.register_tier(key.clone(), total).await.unwrap();
        (ledger, key)
    }

    #[tokio::test]
    async fn reserve_unknown_tier_fails() {
        let ledger = InMemoryLedger::new();
        let err = ledger.reserve(&test_key(), 1).await.unwrap_err();
        assert!(matches!(err, LedgerError::UnknownTier(_)));
    }

    #[tokio::test]
    async fn register_is_idempotent() {
        let (ledger, key) = seeded(5).await;
        ledger.reserve(&key, 2).await.unwrap();
        // Re-registering must not reset live counters.
        ledger.register_tier(key.clone(), 5).await.unwrap();
        let c = ledger.counters(&key).await.unwrap();
        assert_eq!(c.available, 3);
        assert_eq!(c.reserved, 2);
    }

    #[tokio::test]
    async fn reserve_confirm_moves_to_purchased() {
        let (ledger, key) = seeded(3).await;
        let token = ledger.reserve(&key, 2).await.unwrap();
        ledger.confirm(&token).await.unwrap();

        let c = ledger.counters(&key).await.unwrap();
        assert_eq!((c.available, c.reserved, c.purchased), (1, 0, 2));
        c.verify().unwrap();
    }

    #[tokio::test]
    async fn reserve_release_round_trips() {
        let (ledger, key) = seeded(3).await;
        let before = ledger.counters(&key).await.unwrap();
        let token = ledger.reserve(&key, 3).await.unwrap();
        ledger.release(&token).await.unwrap();
        assert_eq!(ledger.counters(&key).await.unwrap(), before);
    }

    #[tokio::test]
    async fn double_confirm_fails_already_confirmed() {
        let (ledger, key) = seeded(2).await;
        let token = ledger.reserve(&key, 1).await.unwrap();
        ledger.confirm(&token).await.unwrap();
        assert_eq!(
            ledger.confirm(&token).await.unwrap_err(),
            LedgerError::AlreadyConfirmed(token.id)
        );
        // Counters untouched by the rejected call.
        let c = ledger.counters(&key).await.unwrap();
        assert_eq!((c.available, c.reserved, c.purchased), (1, 0, 1));
    }

    #[tokio::test]
    async fn release_of_settled_token_fails_unknown_token() {
        let (ledger, key) = seeded(2).await;
        let token = ledger.reserve(&key, 1).await.unwrap();
        ledger.confirm(&token).await.unwrap();
        assert_eq!(
            ledger.release(&token).await.unwrap_err(),
            LedgerError::UnknownToken(token.id)
        );

        let token2 = ledger.reserve(&key, 1).await.unwrap();
        ledger.release(&token2).await.unwrap();
        assert_eq!(
            ledger.release(&token2).await.unwrap_err(),
            LedgerError::UnknownToken(token2.id)
        );
    }

    #[tokio::test]
    async fn restock_returns_purchased_inventory() {
        let (ledger, key) = seeded(2).await;
        let token = ledger.reserve(&key, 2).await.unwrap();
        ledger.confirm(&token).await.unwrap();
        ledger.restock(&key, 1).await.unwrap();
        let c = ledger.counters(&key).await.unwrap();
        assert_eq!((c.available, c.purchased), (1, 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reserves_never_oversell() {
        let ledger = Arc::new(InMemoryLedger::new());
        let key = test_key();
        ledger.register_tier(key.clone(), 5).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let ledger = ledger.clone();
            let key = key.clone();
            handles.push(tokio::spawn(async move { ledger.reserve(&key, 1).await }));
        }

        let mut ok = 0;
        let mut insufficient = 0;
        for h in handles {
            match h.await.unwrap() {
                Ok(_) => ok += 1,
                Err(LedgerError::InsufficientInventory { .. }) => insufficient += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        // Exactly k of N succeed when k units are available.
        assert_eq!(ok, 5);
        assert_eq!(insufficient, 15);

        let c = ledger.counters(&key).await.unwrap();
        assert_eq!((c.available, c.reserved, c.purchased), (0, 5, 0));
        c.verify().unwrap();
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn tiers_do_not_contend_with_each_other() {
        let ledger = Arc::new(InMemoryLedger::new());
        let event = EventId::new();
        let keys: Vec<TierKey> = ["a", "b", "c", "d"]
            .iter()
            .map(|n| TierKey::new(event, TierName::new(*n).unwrap()))
            .collect();
        for key in &keys {
            ledger.register_tier(key.clone(), 100).await.unwrap();
        }

        let mut handles = Vec::new();
        for key in &keys {
            for _ in 0..50 {
                let ledger = ledger.clone();
                let key = key.clone();
                handles.push(tokio::spawn(async move {
                    let token = ledger.reserve(&key, 2).await.unwrap();
                    ledger.confirm(&token).await.unwrap();
                }));
            }
        }
        for h in handles {
            h.await.unwrap();
        }

        for key in &keys {
            let c = ledger.counters(key).await.unwrap();
            assert_eq!(c.purchased, 100);
            assert_eq!(c.available, 0);
            c.verify().unwrap();
        }
    }
}
