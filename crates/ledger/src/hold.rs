//! Pending holds: the token a `reserve` hands back, and the audit record the
//! ledger keeps for it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use boxoffice_core::HoldId;

use crate::counters::TierKey;

/// Lifecycle of a ledger hold.
///
/// Terminal entries (`Confirmed`, `Released`) are retained for audit, never
/// reused: a confirm on a `Confirmed` hold fails `AlreadyConfirmed`, and a
/// release on any terminal hold fails `UnknownToken`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HoldState {
    Pending,
    Confirmed,
    Released,
}

/// Token returned by `reserve`, consumed by `confirm`/`release`.
///
/// Carries the key and quantity so the ledger can route the token back to the
/// right counter row without a second lookup by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldToken {
    pub id: HoldId,
    pub key: TierKey,
    pub quantity: u32,
}

impl HoldToken {
    pub fn new(key: TierKey, quantity: u32) -> Self {
        Self {
            id: HoldId::new(),
            key,
            quantity,
        }
    }
}

/// Ledger-side record of a hold (pending or terminal).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldRecord {
    pub id: HoldId,
    pub key: TierKey,
    pub quantity: u32,
    pub state: HoldState,
    pub created_at: DateTime<Utc>,
}

impl HoldRecord {
    pub fn pending(token: &HoldToken, created_at: DateTime<Utc>) -> Self {
        Self {
            id: token.id,
            key: token.key.clone(),
            quantity: token.quantity,
            state: HoldState::Pending,
            created_at,
        }
    }
}
