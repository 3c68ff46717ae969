//! Event catalog persistence.

mod in_memory;
mod postgres;

pub use in_memory::InMemoryCatalogStore;
pub use postgres::PostgresCatalogStore;

use async_trait::async_trait;
use std::sync::Arc;

use boxoffice_catalog::{EventListing, TierDef};
use boxoffice_core::{EventId, TierName};

use crate::store::StoreError;

/// Storage for event listings and their tier definitions.
///
/// Listings are immutable once created; pricing for a purchase is resolved
/// through `get_tier` at charge time.
#[async_trait]
pub trait CatalogStore: Send + Sync + 'static {
    async fn insert_event(&self, event: &EventListing) -> Result<(), StoreError>;

    async fn get_event(&self, id: EventId) -> Result<Option<EventListing>, StoreError>;

    async fn list_events(&self) -> Result<Vec<EventListing>, StoreError>;

    async fn get_tier(&self, event: EventId, tier: &TierName)
        -> Result<Option<TierDef>, StoreError>;
}

#[async_trait]
impl<S: CatalogStore> CatalogStore for Arc<S> {
    async fn insert_event(&self, event: &EventListing) -> Result<(), StoreError> {
        (**self).insert_event(event).await
    }

    async fn get_event(&self, id: EventId) -> Result<Option<EventListing>, StoreError> {
        (**self).get_event(id).await
    }

    async fn list_events(&self) -> Result<Vec<EventListing>, StoreError> {
        (**self).list_events().await
    }

    async fn get_tier(
        &self,
        event: EventId,
        tier: &TierName,
    ) -> Result<Option<TierDef>, StoreError> {
        (**self).get_tier(event, tier).await
    }
}
