use async_trait::async_trait;
use sqlx::{PgPool, Row};
use std::str::FromStr;
use std::sync::Arc;
use tracing::instrument;

use boxoffice_booking::{Payment, PaymentStatus, Ticket};
use boxoffice_core::{EventId, PaymentId, ReservationId, TicketId, TierName, UserId};

use super::BookingStore;
use crate::store::StoreError;

/// Postgres ticket and payment store. A unique index on
/// `tickets.reservation_id` enforces one ticket per reservation.
#[derive(Debug, Clone)]
pub struct PostgresBookingStore {
    pool: Arc<PgPool>,
}

impl PostgresBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

const TICKET_COLUMNS: &str =
    "id, event_id, user_id, tier, price, quantity, reservation_id, created_at";
const PAYMENT_COLUMNS: &str = "id, reservation_id, ticket_id, transaction_id, amount, status, \
     failure_reason, created_at";

#[async_trait]
impl BookingStore for PostgresBookingStore {
    #[instrument(skip(self, ticket), fields(id = %ticket.id), err)]
    async fn insert_ticket(&self, ticket: &Ticket) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO tickets
                (id, event_id, user_id, tier, price, quantity, reservation_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(ticket.id.as_uuid())
        .bind(ticket.event_id.as_uuid())
        .bind(ticket.user_id.as_uuid())
        .bind(ticket.tier.as_str())
        .bind(ticket.price as i64)
        .bind(ticket.quantity as i64)
        .bind(ticket.reservation_id.as_uuid())
        .bind(ticket.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_ticket", e, &ticket.id.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>, StoreError> {
        let row = sqlx::query(&format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_ticket", e, ""))?;
        row.map(|r| ticket_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn ticket_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Ticket>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE reservation_id = $1"
        ))
        .bind(reservation.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ticket_for_reservation", e, ""))?;
        row.map(|r| ticket_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn tickets_for_user(&self, user: UserId) -> Result<Vec<Ticket>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {TICKET_COLUMNS} FROM tickets WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user.as_uuid())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("tickets_for_user", e, ""))?;
        rows.iter().map(ticket_from_row).collect()
    }

    #[instrument(skip(self, payment), fields(id = %payment.id), err)]
    async fn insert_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO payments
                (id, reservation_id, ticket_id, transaction_id, amount, status,
                 failure_reason, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.reservation_id.as_uuid())
        .bind(payment.ticket_id.map(|t| *t.as_uuid()))
        .bind(payment.transaction_id.as_deref())
        .bind(payment.amount as i64)
        .bind(status_str(payment.status))
        .bind(payment.failure_reason.as_deref())
        .bind(payment.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("insert_payment", e, &payment.id.to_string()))?;
        Ok(())
    }

    #[instrument(skip(self, payment), fields(id = %payment.id), err)]
    async fn update_payment(&self, payment: &Payment) -> Result<(), StoreError> {
        let updated = sqlx::query(
            r#"
            UPDATE payments
            SET ticket_id = $2, transaction_id = $3, status = $4, failure_reason = $5
            WHERE id = $1
            "#,
        )
        .bind(payment.id.as_uuid())
        .bind(payment.ticket_id.map(|t| *t.as_uuid()))
        .bind(payment.transaction_id.as_deref())
        .bind(status_str(payment.status))
        .bind(payment.failure_reason.as_deref())
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_payment", e, ""))?;

        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1"
        ))
        .bind(id.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("get_payment", e, ""))?;
        row.map(|r| payment_from_row(&r)).transpose()
    }

    #[instrument(skip(self), err)]
    async fn payment_for_reservation(
        &self,
        reservation: ReservationId,
    ) -> Result<Option<Payment>, StoreError> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {PAYMENT_COLUMNS} FROM payments
            WHERE reservation_id = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#
        ))
        .bind(reservation.as_uuid())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("payment_for_reservation", e, ""))?;
        row.map(|r| payment_from_row(&r)).transpose()
    }
}

fn ticket_from_row(row: &sqlx::postgres::PgRow) -> Result<Ticket, StoreError> {
    let tier: String = field(row, "tier")?;
    let tier = TierName::from_str(&tier)
        .map_err(|e| StoreError::Storage(format!("corrupt tier column: {e}")))?;
    let price: i64 = field(row, "price")?;
    let quantity: i64 = field(row, "quantity")?;
    Ok(Ticket {
        id: TicketId::from_uuid(field(row, "id")?),
        event_id: EventId::from_uuid(field(row, "event_id")?),
        user_id: UserId::from_uuid(field(row, "user_id")?),
        tier,
        price: price as u64,
        quantity: u32::try_from(quantity)
            .map_err(|_| StoreError::Storage(format!("corrupt quantity column: {quantity}")))?,
        reservation_id: ReservationId::from_uuid(field(row, "reservation_id")?),
        created_at: field(row, "created_at")?,
    })
}

fn payment_from_row(row: &sqlx::postgres::PgRow) -> Result<Payment, StoreError> {
    let status: String = field(row, "status")?;
    let amount: i64 = field(row, "amount")?;
    let ticket_id: Option<uuid::Uuid> = field(row, "ticket_id")?;
    Ok(Payment {
        id: PaymentId::from_uuid(field(row, "id")?),
        reservation_id: ReservationId::from_uuid(field(row, "reservation_id")?),
        ticket_id: ticket_id.map(TicketId::from_uuid),
        transaction_id: field(row, "transaction_id")?,
        amount: amount as u64,
        status: parse_status(&status)?,
        failure_reason: field(row, "failure_reason")?,
        created_at: field(row, "created_at")?,
    })
}

fn status_str(status: PaymentStatus) -> &'static str {
    match status {
        PaymentStatus::Pending => "pending",
        PaymentStatus::Succeeded => "succeeded",
        PaymentStatus::Failed => "failed",
        PaymentStatus::Refunded => "refunded",
    }
}

fn parse_status(s: &str) -> Result<PaymentStatus, StoreError> {
    match s {
        "pending" => Ok(PaymentStatus::Pending),
        "succeeded" => Ok(PaymentStatus::Succeeded),
        "failed" => Ok(PaymentStatus::Failed),
        "refunded" => Ok(PaymentStatus::Refunded),
        other => Err(StoreError::Storage(format!("unknown payment status: {other}"))),
    }
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
