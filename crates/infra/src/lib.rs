//! `boxoffice-infra`: durable stores, the reservation manager, the booking
//! orchestrator, and background workers.
//!
//! Every store comes as a trait with two implementations: an in-memory one for
//! dev/tests and a Postgres one for production. The manager and orchestrator
//! compose the traits, so they run unchanged against either backend.

pub mod booking_store;
pub mod catalog_store;
pub mod gateway;
pub mod ledger_store;
pub mod manager;
pub mod orchestrator;
pub mod reservation_store;
pub mod store;
pub mod workers;

#[cfg(test)]
mod integration_tests;

pub use booking_store::{BookingStore, InMemoryBookingStore, PostgresBookingStore};
pub use catalog_store::{CatalogStore, InMemoryCatalogStore, PostgresCatalogStore};
pub use gateway::{AutoApproveGateway, PaymentGateway, ScriptedGateway};
pub use ledger_store::{InMemoryLedger, InventoryLedger, PostgresLedger};
pub use manager::{ManagerError, ReservationManager, SweepOutcome};
pub use orchestrator::{BookingError, BookingOrchestrator, ReconcileOutcome};
pub use reservation_store::{InMemoryReservationStore, PostgresReservationStore, ReservationStore};
pub use store::StoreError;
pub use workers::expiry_worker::{ExpiryWorker, ExpiryWorkerConfig, ExpiryWorkerHandle, SweepStats};
