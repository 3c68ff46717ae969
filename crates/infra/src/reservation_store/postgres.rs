use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use boxoffice_core::{EventId, HoldId, ReservationId, TierName, UserId};
use boxoffice_ledger::{HoldToken, TierKey};
use boxoffice_reservations::{Reservation, ReservationStatus};

use super::ReservationStore;
use crate::store::StoreError;

/// Postgres reservation store. The version column carries the optimistic
/// CAS; `update` writes `WHERE version = $loaded`.
#[derive(Debug, Clone)]
pub struct PostgresReservationStore {
    pool: Arc<PgPool>,
}

impl PostgresReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const COLUMNS: &str = "id, event_id, tier, quantity, holder, hold_id, \
     created_at, expires_at, status, charge_started_at, version";

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    #[instrument(skip(self, reservation), fields(id = %reservation.id), err)]
    async fn insert(&self, reservation: &Reservation) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO reservations
                (id, event_id, tier, quantity, holder, hold_id,
                 created_at, expires_at, status, charge_started_at, version)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(reservation.id.as_uuid())
        .bind(reservation.event_id.as_uuid())
        .bind(reservation.tier.as_str())
        .bind(reservation.quantity as i64)
        .bind(reservation.holder.as_uuid())
        .bind(reservation.hold.id.as_uuid())
        .bind(reservation.created_at)
        .bind(reservation.expires_at)
        .bind(reservation.status.as_str())
        .bind(reservation.charge_started_at)
        .bind(reservation.version as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert", e, Some(reservation.id)))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get(&self, id: ReservationId) -> Result<Option<Reservation>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM reservations WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e, Some(id)))?;

        row.map(|r| reservation_from_row(&r)).transpose()
    }

    #[instrument(skip(self, reservation), fields(id = %reservation.id, version = reservation.version), err)]
    async fn update(&self, reservation: &Reservation) -> Result<Reservation, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE reservations
            SET status = $2,
                charge_started_at = $3,
                version = version + 1
            WHERE id = $1 AND version = $4
            RETURNING {COLUMNS}
            "#
        ))
        .bind(reservation.id.as_uuid())
        .bind(reservation.status.as_str())
        .bind(reservation.charge_started_at)
        .bind(reservation.version as i64)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update", e, Some(reservation.id)))?;

        match row {
            Some(row) => reservation_from_row(&row),
            None => {
                let exists: Option<i64> =
                    sqlx::query_scalar("SELECT version FROM reservations WHERE id = $1")
                        .bind(reservation.id.as_uuid())
                        .fetch_optional(&*self.pool)
                        .await
                        .map_err(|e| map_sqlx_error("update", e, Some(reservation.id)))?;
                match exists {
                    None => Err(StoreError::NotFound),
                    Some(stored) => Err(StoreError::Conflict(format!(
                        "reservation {} is at version {stored}, caller had {}",
                        reservation.id, reservation.version
                    ))),
                }
            }
        }
    }

    #[instrument(skip(self), err)]
    async fn list_stale(
        &self,
        now: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {COLUMNS} FROM reservations
            WHERE status = 'held' AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_stale", e, None))?;

        rows.iter().map(reservation_from_row).collect()
    }

    #[instrument(skip(self), err)]
    async fn list_for_holder(&self, holder: UserId) -> Result<Vec<Reservation>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {COLUMNS} FROM reservations WHERE holder = $1 ORDER BY created_at ASC"
        ))
        .bind(holder.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_for_holder", e, None))?;

        rows.iter().map(reservation_from_row).collect()
    }
}

fn reservation_from_row(row: &sqlx::postgres::PgRow) -> Result<Reservation, StoreError> {
    let event_id = EventId::from_uuid(field(row, "event_id")?);
    let tier: String = field(row, "tier")?;
    let tier = TierName::from_str(&tier)
        .map_err(|e| StoreError::Storage(format!("corrupt tier column: {e}")))?;
    let quantity: i64 = field(row, "quantity")?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| StoreError::Storage(format!("corrupt quantity column: {quantity}")))?;
    let status: String = field(row, "status")?;
    let status = parse_status(&status)?;
    let version: i64 = field(row, "version")?;

    Ok(Reservation {
        id: ReservationId::from_uuid(field(row, "id")?),
        event_id,
        tier: tier.clone(),
        quantity,
        holder: UserId::from_uuid(field(row, "holder")?),
        hold: HoldToken {
            id: HoldId::from_uuid(field(row, "hold_id")?),
            key: TierKey::new(event_id, tier),
            quantity,
        },
        created_at: field(row, "created_at")?,
        expires_at: field(row, "expires_at")?,
        status,
        charge_started_at: field(row, "charge_started_at")?,
        version: version as u64,
    })
}

fn parse_status(s: &str) -> Result<ReservationStatus, StoreError> {
    match s {
        "held" => Ok(ReservationStatus::Held),
        "confirmed" => Ok(ReservationStatus::Confirmed),
        "released" => Ok(ReservationStatus::Released),
        "expired" => Ok(ReservationStatus::Expired),
        other => Err(StoreError::Storage(format!(
            "unknown reservation status: {other}"
        ))),
    }
}

fn field<'r, T>(row: &'r sqlx::postgres::PgRow, name: &str) -> Result<T, StoreError>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Storage(format!("failed to read column {name}: {e}")))
}

fn map_sqlx_error(operation: &str, e: sqlx::Error, id: Option<ReservationId>) -> StoreError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            if let Some(id) = id {
                return StoreError::Duplicate(id.to_string());
            }
        }
    }
    StoreError::Storage(format!("{operation}: {e}"))
}
