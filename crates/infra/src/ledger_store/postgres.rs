//! Postgres-backed inventory ledger.
//!
//! The atomic check-and-decrement is a conditional `UPDATE ... WHERE
//! available_count >= $qty`: the row lock serializes concurrent callers for
//! one (event, tier) key in arrival order, while different keys proceed in
//! parallel. Transient serialization failures are retried a bounded number
//! of times before surfacing `ContentionExceeded`.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Row, Transaction};
use std::sync::Arc;
use tracing::instrument;

use boxoffice_ledger::{HoldToken, LedgerError, LedgerResult, TierCounters, TierKey};

use super::InventoryLedger;

/// Bounded optimistic retry budget for transient conflicts.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone)]
pub struct PostgresLedger {
    pool: Arc<PgPool>,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    async fn begin(&self) -> LedgerResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin", e))
    }

    async fn reserve_once(&self, key: &TierKey, qty: u32) -> LedgerResult<HoldToken> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(
            r#"
            UPDATE tier_inventory
            SET available_count = available_count - $3,
                reserved_count = reserved_count + $3
            WHERE event_id = $1 AND tier = $2 AND available_count >= $3
            RETURNING total_count, available_count, reserved_count, purchased_count
            "#,
        )
        .bind(key.event_id.as_uuid())
        .bind(key.tier.as_str())
        .bind(qty as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("reserve", e))?;

        let counters = match row {
            Some(row) => counters_from_row(&row)?,
            None => {
                // Distinguish an unknown tier from a genuine shortfall.
                let available: Option<i64> = sqlx::query_scalar(
                    "SELECT available_count FROM tier_inventory WHERE event_id = $1 AND tier = $2",
                )
                .bind(key.event_id.as_uuid())
                .bind(key.tier.as_str())
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| map_sqlx_error("reserve", e))?;

                return match available {
                    None => Err(LedgerError::UnknownTier(key.to_string())),
                    Some(available) => Err(LedgerError::InsufficientInventory {
                        requested: qty,
                        available: available.max(0) as u32,
                    }),
                };
            }
        };
        counters.verify()?;

        let token = HoldToken::new(key.clone(), qty);
        sqlx::query(
            r#"
            INSERT INTO ledger_holds (id, event_id, tier, quantity, state, created_at)
            VALUES ($1, $2, $3, $4, 'pending', now())
            "#,
        )
        .bind(token.id.as_uuid())
        .bind(key.event_id.as_uuid())
        .bind(key.tier.as_str())
        .bind(qty as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("reserve", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("reserve", e))?;
        Ok(token)
    }

    /// Flip a pending hold to a terminal state and return an error describing
    /// the current state if the CAS found it already settled.
    async fn settle_hold(
        tx: &mut Transaction<'static, Postgres>,
        token: &HoldToken,
        to_state: &str,
    ) -> LedgerResult<()> {
        let updated = sqlx::query(
            "UPDATE ledger_holds SET state = $2 WHERE id = $1 AND state = 'pending'",
        )
        .bind(token.id.as_uuid())
        .bind(to_state)
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("settle_hold", e))?;

        if updated.rows_affected() == 1 {
            return Ok(());
        }

        let state: Option<String> =
            sqlx::query_scalar("SELECT state FROM ledger_holds WHERE id = $1")
                .bind(token.id.as_uuid())
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| map_sqlx_error("settle_hold", e))?;

        match state.as_deref() {
            Some("confirmed") => Err(LedgerError::AlreadyConfirmed(token.id)),
            _ => Err(LedgerError::UnknownToken(token.id)),
        }
    }
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    #[instrument(skip(self), fields(key = %key), err)]
    async fn register_tier(&self, key: TierKey, total: u32) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tier_inventory
                (event_id, tier, total_count, available_count, reserved_count, purchased_count)
            VALUES ($1, $2, $3, $3, 0, 0)
            ON CONFLICT (event_id, tier) DO NOTHING
            "#,
        )
        .bind(key.event_id.as_uuid())
        .bind(key.tier.as_str())
        .bind(total as i64)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("register_tier", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn reserve(&self, key: &TierKey, qty: u32) -> LedgerResult<HoldToken> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.reserve_once(key, qty).await {
                Err(LedgerError::Storage(msg)) if is_transient(&msg) && attempt < MAX_ATTEMPTS => {
                    tracing::debug!(attempt, "retrying reserve after transient conflict");
                }
                Err(LedgerError::Storage(msg)) if is_transient(&msg) => {
                    return Err(LedgerError::ContentionExceeded { attempts: attempt });
                }
                other => return other,
            }
        }
    }

    #[instrument(skip(self, token), fields(hold_id = %token.id), err)]
    async fn confirm(&self, token: &HoldToken) -> LedgerResult<()> {
        let mut tx = self.begin().await?;
        Self::settle_hold(&mut tx, token, "confirmed").await?;

        let row = sqlx::query(
            r#"
            UPDATE tier_inventory
            SET reserved_count = reserved_count - $3,
                purchased_count = purchased_count + $3
            WHERE event_id = $1 AND tier = $2 AND reserved_count >= $3
            RETURNING total_count, available_count, reserved_count, purchased_count
            "#,
        )
        .bind(token.key.event_id.as_uuid())
        .bind(token.key.tier.as_str())
        .bind(token.quantity as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("confirm", e))?;

        let counters = row.ok_or_else(|| {
            LedgerError::Integrity(format!(
                "confirm of {} exceeds reserved inventory for {}",
                token.quantity, token.key
            ))
        })?;
        counters_from_row(&counters)?.verify()?;

        tx.commit().await.map_err(|e| map_sqlx_error("confirm", e))
    }

    #[instrument(skip(self, token), fields(hold_id = %token.id), err)]
    async fn release(&self, token: &HoldToken) -> LedgerResult<()> {
        let mut tx = self.begin().await?;
        match Self::settle_hold(&mut tx, token, "released").await {
            Ok(()) => {}
            // Releasing a settled hold is always UnknownToken, even when it
            // was settled by confirm.
            Err(LedgerError::AlreadyConfirmed(id)) => return Err(LedgerError::UnknownToken(id)),
            Err(e) => return Err(e),
        }

        let row = sqlx::query(
            r#"
            UPDATE tier_inventory
            SET reserved_count = reserved_count - $3,
                available_count = available_count + $3
            WHERE event_id = $1 AND tier = $2 AND reserved_count >= $3
            RETURNING total_count, available_count, reserved_count, purchased_count
            "#,
        )
        .bind(token.key.event_id.as_uuid())
        .bind(token.key.tier.as_str())
        .bind(token.quantity as i64)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("release", e))?;

        let counters = row.ok_or_else(|| {
            LedgerError::Integrity(format!(
                "release of {} exceeds reserved inventory for {}",
                token.quantity, token.key
            ))
        })?;
        counters_from_row(&counters)?.verify()?;

        tx.commit().await.map_err(|e| map_sqlx_error("release", e))
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn restock(&self, key: &TierKey, qty: u32) -> LedgerResult<()> {
        if qty == 0 {
            return Err(LedgerError::InvalidQuantity);
        }
        let row = sqlx::query(
            r#"
            UPDATE tier_inventory
            SET purchased_count = purchased_count - $3,
                available_count = available_count + $3
            WHERE event_id = $1 AND tier = $2 AND purchased_count >= $3
            RETURNING total_count, available_count, reserved_count, purchased_count
            "#,
        )
        .bind(key.event_id.as_uuid())
        .bind(key.tier.as_str())
        .bind(qty as i64)
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("restock", e))?;

        match row {
            Some(row) => counters_from_row(&row)?.verify(),
            None => Err(LedgerError::Integrity(format!(
                "restock of {qty} exceeds purchased inventory for {key}"
            ))),
        }
    }

    #[instrument(skip(self), fields(key = %key), err)]
    async fn counters(&self, key: &TierKey) -> LedgerResult<TierCounters> {
        let row = sqlx::query(
            r#"
            SELECT total_count, available_count, reserved_count, purchased_count
            FROM tier_inventory
            WHERE event_id = $1 AND tier = $2
            "#,
        )
        .bind(key.event_id.as_uuid())
        .bind(key.tier.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("counters", e))?;

        match row {
            Some(row) => counters_from_row(&row),
            None => Err(LedgerError::UnknownTier(key.to_string())),
        }
    }
}

fn counters_from_row(row: &sqlx::postgres::PgRow) -> LedgerResult<TierCounters> {
    let read = |name: &str| -> LedgerResult<u32> {
        let v: i64 = row
            .try_get(name)
            .map_err(|e| LedgerError::Storage(format!("failed to read column {name}: {e}")))?;
        u32::try_from(v)
            .map_err(|_| LedgerError::Integrity(format!("negative counter in column {name}: {v}")))
    };
    Ok(TierCounters {
        total: read("total_count")?,
        available: read("available_count")?,
        reserved: read("reserved_count")?,
        purchased: read("purchased_count")?,
    })
}

/// Serialization failure / deadlock detected: safe to retry.
fn is_transient(msg: &str) -> bool {
    msg.contains("40001") || msg.contains("40P01")
}

fn map_sqlx_error(operation: &str, e: sqlx::Error) -> LedgerError {
    match &e {
        sqlx::Error::Database(db) => {
            let code = db.code().map(|c| c.to_string()).unwrap_or_default();
            LedgerError::Storage(format!("{operation}: database error [{code}]: {db}"))
        }
        _ => LedgerError::Storage(format!("{operation}: {e}")),
    }
}
