//! Reservation persistence.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryReservationStore;
pub use postgres::PostgresReservationStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use boxoffice_core::{ReservationId, UserId};
use boxoffice_reservations::Reservation;

use crate::store::StoreError;

/// Storage for reservation rows.
///
/// `update` is a compare-and-swap on the reservation's `version`: the write
/// only lands if the stored version still matches the version the caller
/// loaded, and the stored copy gets `version + 1`. A lost CAS comes back as
/// [`StoreError::Conflict`], which is how exactly one of several racing
/// transitions out of `Held` wins.
#[async_trait]
pub trait ReservationStore: Send + Sync + 'static {
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError>;

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError>;

    /// CAS write keyed on `reservation.version`; returns the stored copy with
    /// the bumped version.
    async fn update(&self, reservation: &Reservation) -> Result<Reservation, StoreError>;

    /// Held reservations whose `expires_at` is at or before `now`, oldest
    /// first, capped at `limit`.
    async fn list_stale(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, StoreError>;

    async fn list_for_holder(&self, holder: UserId) -> Result<Vec<Reservation>, StoreError>;
}

#[async_trait]
impl<S: ReservationStore> ReservationStore for Arc<S> {
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        (**self).insert(reservation).await
    }

    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        (**self).get(id).await
    }

    async fn update(&self, reservation: &Reservation) -> Result<Reservation, StoreError> {
        (**self).update(reservation).await
    }

    async fn list_stale(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, StoreError> {
        (**self).list_stale(now, limit).await
    }

    async fn list_for_holder(&self, holder: UserId) -> Result<Vec<Reservation>, StoreError> {
        (**self).list_for_holder(holder).await
    }
}
