use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use boxoffice_catalog::{EventListing, TierDef};
use boxoffice_core::{EventId, TierName};

use super::CatalogStore;
use crate::store::StoreError;

/// In-memory catalog for dev and tests.
#[derive(Debug, Default)]
pub struct InMemoryCatalogStore {
    events: RwLock<HashMap<EventId, EventListing>>,
}

impl InMemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn insert_event(&self, event: &EventListing) -> Result<(), StoreError> {
        let mut events = self
            .events
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if events.contains_key(&event.id) {
            return Err(StoreError::Duplicate(event.id.to_string()));
        }
        events.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_event(&self, id: EventId) -> Result<Option<EventListing>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(events.get(&id).cloned())
    }

    async fn list_events(&self) -> Result<Vec<EventListing>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut out: Vec<EventListing> = events.values().cloned().collect();
        out.sort_by_key(|e| e.created_at);
        Ok(out)
    }

    async fn get_tier(
        &self,
        event: EventId,
        tier: &TierName,
    ) -> Result<Option<TierDef>, StoreError> {
        let events = self
            .events
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(events.get(&event).and_then(|e| e.tier(tier).cloned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::UserId;
    use chrono::Utc;

    fn tier(name: &str, price: u64, capacity: u32) -> TierDef {
        TierDef {
            name: name.parse().unwrap(),
            price,
            capacity,
        }
    }

    fn listing() -> EventListing {
        EventListing::new(
            "Glass Animals World Tour",
            None,
            Some("Roundhouse".into()),
            UserId::new(),
            vec![],
            vec![tier("ga", 4500, 500), tier("vip", 12000, 40)],
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn get_tier_resolves_price_and_capacity() {
        let store = InMemoryCatalogStore::new();
        let event = listing();
        store.insert_event(&event).await.unwrap();

        let vip = store
            .get_tier(event.id, &"vip".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(vip.price, 12000);
        assert_eq!(vip.capacity, 40);
    }

    #[tokio::test]
    async fn unknown_tier_is_none() {
        let store = InMemoryCatalogStore::new();
        let event = listing();
        store.insert_event(&event).await.unwrap();
        let missing = store
            .get_tier(event.id, &"balcony".parse().unwrap())
            .await
            .unwrap();
        assert!(missing.is_none());
    }
}
