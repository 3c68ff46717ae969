use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boxoffice_core::{DomainError, DomainResult, Entity, PaymentId, ReservationId, TicketId};

/// Payment attempt lifecycle.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Succeeded,
    Failed,
    Refunded,
}

/// Outcome of a gateway charge call.
///
/// `Timeout` means the outcome is unknown: the charge may still succeed
/// out-of-band, so inventory must not be released on this path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum ChargeOutcome {
    Succeeded { transaction_id: String },
    Failed { reason: String },
    Timeout,
}

/// One payment attempt for a reservation.
///
/// Keyed by reservation before the ticket exists; `ticket_id` is attached
/// once issuance succeeds. At most one `Succeeded` payment per ticket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub reservation_id: ReservationId,
    pub ticket_id: Option<TicketId>,
    pub transaction_id: Option<String>,
    /// Total charged amount in smallest currency unit.
    pub amount: u64,
    pub status: PaymentStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Entity for Payment {
    type Id = PaymentId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

impl Payment {
    /// Record an attempt whose outcome is not yet known (gateway timeout).
    pub fn pending(reservation_id: ReservationId, amount: u64, now: DateTime<Utc>) -> Self {
        Self {
            id: PaymentId::new(),
            reservation_id,
            ticket_id: None,
            transaction_id: None,
            amount,
            status: PaymentStatus::Pending,
            failure_reason: None,
            created_at: now,
        }
    }

    pub fn succeeded(
        reservation_id: ReservationId,
        amount: u64,
        transaction_id: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            reservation_id,
            ticket_id: None,
            transaction_id: Some(transaction_id),
            amount,
            status: PaymentStatus::Succeeded,
            failure_reason: None,
            created_at: now,
        }
    }

    pub fn failed(
        reservation_id: ReservationId,
        amount: u64,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            reservation_id,
            ticket_id: None,
            transaction_id: None,
            amount,
            status: PaymentStatus::Failed,
            failure_reason: Some(reason),
            created_at: now,
        }
    }

    /// Pending → Succeeded (reconciliation found the charge went through).
    pub fn mark_succeeded(&mut self, transaction_id: String) -> DomainResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::conflict(
                "only a pending payment can be marked succeeded",
            ));
        }
        self.status = PaymentStatus::Succeeded;
        self.transaction_id = Some(transaction_id);
        Ok(())
    }

    /// Pending → Failed.
    pub fn mark_failed(&mut self, reason: String) -> DomainResult<()> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::conflict(
                "only a pending payment can be marked failed",
            ));
        }
        self.status = PaymentStatus::Failed;
        self.failure_reason = Some(reason);
        Ok(())
    }

    /// Succeeded → Refunded. Money-safety: anything else is a conflict.
    pub fn mark_refunded(&mut self) -> DomainResult<()> {
        if self.status != PaymentStatus::Succeeded {
            return Err(DomainError::conflict(
                "only a succeeded payment can be refunded",
            ));
        }
        self.status = PaymentStatus::Refunded;
        Ok(())
    }

    pub fn attach_ticket(&mut self, ticket_id: TicketId) {
        self.ticket_id = Some(ticket_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pending_resolves_to_succeeded_once() {
        let mut p = Payment::pending(ReservationId::new(), 500, Utc::now());
        p.mark_succeeded("txn-1".to_string()).unwrap();
        assert_eq!(p.status, PaymentStatus::Succeeded);
        assert_eq!(p.transaction_id.as_deref(), Some("txn-1"));

        let err = p.mark_succeeded("txn-2".to_string()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
        assert_eq!(p.transaction_id.as_deref(), Some("txn-1"));
    }

    #[test]
    fn refund_requires_succeeded() {
        let mut p = Payment::failed(ReservationId::new(), 500, "declined".to_string(), Utc::now());
        assert!(p.mark_refunded().is_err());

        let mut ok = Payment::succeeded(ReservationId::new(), 500, "txn".to_string(), Utc::now());
        ok.mark_refunded().unwrap();
        assert_eq!(ok.status, PaymentStatus::Refunded);
    }
}
