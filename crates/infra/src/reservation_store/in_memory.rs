use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use boxoffice_core::{ReservationId, UserId};
use boxoffice_reservations::{Reservation, ReservationStatus};

use super::ReservationStore;
use crate::store::StoreError;

/// In-memory reservation store for dev and tests.
#[derive(Debug, Default)]
pub struct InMemoryReservationStore {
    rows: RwLock<HashMap<ReservationId, Reservation>>,
}

impl InMemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        if rows.contains_key(&reservation.id) {
            return Err(StoreError::Duplicate(reservation.id.to_string()));
        }
        rows.insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        Ok(rows.get(&id).cloned())
    }

    async fn update(&self, reservation: &Reservation) -> Result<Reservation, StoreError> {
        let mut rows = self
            .rows
            .write()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let stored = rows
            .get_mut(&reservation.id)
            .ok_or(StoreError::NotFound)?;
        if stored.version != reservation.version {
            return Err(StoreError::Conflict(format!(
                "reservation {} is at version {}, caller had {}",
                reservation.id, stored.version, reservation.version
            )));
        }
        let mut next = reservation.clone();
        next.version += 1;
        *stored = next.clone();
        Ok(next)
    }

    async fn list_stale(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut stale: Vec<Reservation> = rows
            .values()
            .filter(|r| r.status == ReservationStatus::Held && r.expires_at <= now)
            .cloned()
            .collect();
        stale.sort_by_key(|r| r.expires_at);
        stale.truncate(limit);
        Ok(stale)
    }

    async fn list_for_holder(&self, holder: UserId) -> Result<Vec<Reservation>, StoreError> {
        let rows = self
            .rows
            .read()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let mut out: Vec<Reservation> =
            rows.values().filter(|r| r.holder == holder).cloned().collect();
        out.sort_by_key(|r| r.created_at);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boxoffice_core::{EventId, TierName};
    use boxoffice_ledger::{HoldToken, TierKey};
    use chrono::Duration;

    fn held(expires_in: Duration) -> Reservation {
        let key = TierKey::new(EventId::new(), "ga".parse::<TierName>().unwrap());
        let token = HoldToken::new(key.clone(), 2);
        Reservation::hold(
            key.event_id,
            key.tier,
            2,
            UserId::new(),
            token,
            Utc::now(),
            expires_in,
        )
    }

    #[tokio::test]
    async fn insert_then_get_round_trips() {
        let store = InMemoryReservationStore::new();
        let res = held(Duration::minutes(5));
        store.insert(&res).await.unwrap();
        let found = store.get(res.id).await.unwrap().unwrap();
        assert_eq!(found.id, res.id);
        assert_eq!(found.version, 0);
    }

    #[tokio::test]
    async fn duplicate_insert_is_rejected() {
        let store = InMemoryReservationStore::new();
        let res = held(Duration::minutes(5));
        store.insert(&res).await.unwrap();
        assert!(matches!(
            store.insert(&res).await,
            Err(StoreError::Duplicate(_))
        ));
    }

    #[tokio::test]
    async fn update_bumps_version_and_stale_writer_loses() {
        let store = InMemoryReservationStore::new();
        let res = held(Duration::minutes(5));
        store.insert(&res).await.unwrap();

        let mut first = store.get(res.id).await.unwrap().unwrap();
        let second = store.get(res.id).await.unwrap().unwrap();

        first.confirm(Utc::now()).unwrap();
        let stored = store.update(&first).await.unwrap();
        assert_eq!(stored.version, 1);

        // The second copy still carries version 0 and must lose the CAS.
        assert!(matches!(
            store.update(&second).await,
            Err(StoreError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn list_stale_returns_only_expired_holds() {
        let store = InMemoryReservationStore::new();
        let expired = held(Duration::seconds(-10));
        let live = held(Duration::minutes(5));
        store.insert(&expired).await.unwrap();
        store.insert(&live).await.unwrap();

        let stale = store.list_stale(Utc::now(), 100).await.unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].id, expired.id);
    }

    #[tokio::test]
    async fn list_stale_honours_the_limit() {
        let store = InMemoryReservationStore::new();
        for _ in 0..5 {
            store.insert(&held(Duration::seconds(-10))).await.unwrap();
        }
        let stale = store.list_stale(Utc::now(), 3).await.unwrap();
        assert_eq!(stale.len(), 3);
    }
}
