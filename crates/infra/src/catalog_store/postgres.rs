use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tracing::instrument;

use boxoffice_catalog::{EventListing, TierDef};
use boxoffice_core::{EventId, TierName, UserId};

use super::CatalogStore;
use crate::store::StoreError;

/// Postgres catalog store. Dates and tier definitions are owned by the
/// listing and travel with it as jsonb.
#[derive(Debug, Clone)]
pub struct PostgresCatalogStore {
    pool: Arc<PgPool>,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const COLUMNS: &str = "id, name, description, venue, organiser, dates, tiers, created_at";

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    #[instrument(skip(self, event), fields(id = %event.id), err)]
    async fn insert_event(&self, event: &EventListing) -> Result<(), StoreError> {
        let dates = serde_json::to_value(&event.dates)
            .map_err(|e| StoreError::Storage(format!("serialize dates: {e}")))?;
        let tiers = serde_json::to_value(&event.tiers)
            .map_err(|e| StoreError::Storage(format!("serialize tiers: {e}")))?;

        sqlx::query(
            r#"
            INSERT INTO events
                (id, name, description, venue, organiser, dates, tiers, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id.as_uuid())
        .bind(&event.name)
        .bind(event.description.as_deref())
        .bind(event.venue.as_deref())
        .bind(event.organiser.as_uuid())
        .bind(dates)
        .bind(tiers)
        .bind(event.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_event", e, &event.id.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_event(&self, id: EventId) -> Result<Option<EventListing>, StoreError> {
        let row = sqlx::query(&format!("SELECT {COLUMNS} FROM events WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_event", e, ""))?;
        row.map(|r| event_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_events(&self) -> Result<Vec<EventListing>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM events ORDER BY created_at ASC"
        ))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_events", e, ""))?;
        rows.iter().map(event_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn get_tier(
        &self,
        event: EventId,
        tier: &TierName,
    ) -> Result<Option<TierDef>, StoreError> {
        Ok(self
            .get_event(event)
            .await?
            .and_then(|e| e.tier(tier).cloned()))
    }
}

fn event_from_row(row: &sqlx::postgres::PgRow) -> Result<EventListing, StoreError> {
    let dates: serde_json::Value = field(row, "dates")?;
    let tiers: serde_json::Value = field(row, "tiers")?;
    Ok(EventListing {
        id: EventId::from_uuid(field(row, "id")?),
        name: field(row, "name")?,
        description: field(row, "description")?,
        venue: field(row, "venue")?,
        organiser: UserId::from_uuid(field(row, "organiser")?),
        dates: serde_json::from_value(dates)
            .map_err(|e| StoreError::Storage(format!("corrupt dates column: {e}")))?,
        tiers: serde_json::from_value(tiers)
            .map_err(|e| StoreError::Storage(format!("corrupt tiers column: {e}")))?,
        created_at: field(row, "created_at")?,
    })
}

fn field<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Storage(format!("failed to read column {name}: {e}")))
}

fn map_sqlx_error(operation: &str, e: sqlx::Error, id: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            return StoreError::Duplicate(id.to_string());
        }
    }
    StoreError::Storage(format!("{operation}: {e}"))
}
