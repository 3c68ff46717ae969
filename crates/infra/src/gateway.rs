//! Payment gateway seam.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use boxoffice_booking::ChargeOutcome;
use boxoffice_core::ReservationId;

/// External payment processor.
///
/// `charge` is idempotent per key: calling it again with the same key returns
/// the outcome of the original attempt without charging twice. The
/// reservation id is the idempotency key, which is what makes reconciliation
/// after a timeout safe.
#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn charge(&self, idempotency_key: ReservationId, amount: u64) -> ChargeOutcome;
}

#[async_trait]
impl<G: PaymentGateway> PaymentGateway for Arc<G> {
    async fn charge(&self, idempotency_key: ReservationId, amount: u64) -> ChargeOutcome {
        (**self).charge(idempotency_key, amount).await
    }
}

/// Dev gateway: approves every charge instantly with a synthetic
/// transaction id. Remembers outcomes so repeat keys get the same answer.
#[derive(Debug, Default)]
pub struct AutoApproveGateway {
    seen: Mutex<HashMap<ReservationId, ChargeOutcome>>,
}

impl AutoApproveGateway {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentGateway for AutoApproveGateway {
    async fn charge(&self, idempotency_key: ReservationId, _amount: u64) -> ChargeOutcome {
        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.entry(idempotency_key)
            .or_insert_with(|| ChargeOutcome::Succeeded {
                transaction_id: format!("txn_{}", Uuid::now_v7().simple()),
            })
            .clone()
    }
}

/// Test gateway that plays back a scripted sequence of outcomes.
///
/// First-time keys consume the next scripted outcome (falling back to
/// success once the script runs dry); repeat keys replay their recorded
/// outcome, modelling a real processor's idempotency guarantee. A scripted
/// `Timeout` records a hidden success, so a later retry with the same key
/// reports the charge went through.
#[derive(Debug, Default)]
pub struct ScriptedGateway {
    script: Mutex<Vec<ChargeOutcome>>,
    seen: Mutex<HashMap<ReservationId, ChargeOutcome>>,
    delay: Option<Duration>,
}

impl ScriptedGateway {
    pub fn new(script: Vec<ChargeOutcome>) -> Self {
        Self {
            script: Mutex::new(script),
            seen: Mutex::new(HashMap::new()),
            delay: None,
        }
    }

    /// Add a fixed latency before every first-time charge, for exercising
    /// the caller's timeout path.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn charges_made(&self) -> usize {
        match self.seen.lock() {
            Ok(seen) => seen.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn charge(&self, idempotency_key: ReservationId, _amount: u64) -> ChargeOutcome {
        {
            let seen = match self.seen.lock() {
                Ok(seen) => seen,
                Err(poisoned) => poisoned.into_inner(),
            };
            if let Some(recorded) = seen.get(&idempotency_key) {
                return recorded.clone();
            }
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let scripted = {
            let mut script = match self.script.lock() {
                Ok(script) => script,
                Err(poisoned) => poisoned.into_inner(),
            };
            if script.is_empty() {
                ChargeOutcome::Succeeded {
                    transaction_id: format!("txn_{}", Uuid::now_v7().simple()),
                }
            } else {
                script.remove(0)
            }
        };

        // A timed-out charge still settled on the processor's side. Record
        // the settled outcome so reconciliation sees it.
        let recorded = match &scripted {
            ChargeOutcome::Timeout => ChargeOutcome::Succeeded {
                transaction_id: format!("txn_{}", Uuid::now_v7().simple()),
            },
            other => other.clone(),
        };

        let mut seen = match self.seen.lock() {
            Ok(seen) => seen,
            Err(poisoned) => poisoned.into_inner(),
        };
        seen.insert(idempotency_key, recorded);
        scripted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn auto_approve_is_idempotent_per_key() {
        let gateway = AutoApproveGateway::new();
        let key = ReservationId::new();
        let first = gateway.charge(key, 1000).await;
        let second = gateway.charge(key, 1000).await;
        assert_eq!(first, second);
        assert!(matches!(first, ChargeOutcome::Succeeded { .. }));
    }

    #[tokio::test]
    async fn scripted_timeout_settles_as_success_on_retry() {
        let gateway = ScriptedGateway::new(vec![ChargeOutcome::Timeout]);
        let key = ReservationId::new();
        assert_eq!(gateway.charge(key, 1000).await, ChargeOutcome::Timeout);
        assert!(matches!(
            gateway.charge(key, 1000).await,
            ChargeOutcome::Succeeded { .. }
        ));
        assert_eq!(gateway.charges_made(), 1);
    }

    #[tokio::test]
    async fn script_runs_in_order_then_defaults_to_success() {
        let gateway = ScriptedGateway::new(vec![ChargeOutcome::Failed {
            reason: "card declined".into(),
        }]);
        assert!(matches!(
            gateway.charge(ReservationId::new(), 1000).await,
            ChargeOutcome::Failed { .. }
        ));
        assert!(matches!(
            gateway.charge(ReservationId::new(), 1000).await,
            ChargeOutcome::Succeeded { .. }
        ));
    }
}
