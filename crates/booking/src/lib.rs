//! `boxoffice-booking`: tickets, payments, and gateway outcomes.
//!
//! Pure record types for the purchase flow. The orchestration that produces
//! them lives in `boxoffice-infra`.

pub mod payment;
pub mod ticket;

pub use payment::{ChargeOutcome, Payment, PaymentStatus};
pub use ticket::{PurchaseReceipt, Ticket};
