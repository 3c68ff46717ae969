//! `boxoffice-ledger`: pure counter math for per-tier ticket inventory.
//!
//! The durable ledger implementations live in `boxoffice-infra`; this crate
//! holds the checked counter transitions and the oversell invariant they all
//! share: `available + reserved + purchased == total`, always.

pub mod counters;
pub mod error;
pub mod hold;

pub use counters::{TierCounters, TierKey};
pub use error::{LedgerError, LedgerResult};
pub use hold::{HoldRecord, HoldState, HoldToken};
