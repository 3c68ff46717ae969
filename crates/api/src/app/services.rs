//! Service wiring: stores, gateway, orchestrator, and the expiry worker.
//!
//! Two backends behind one enum. In-memory is the default and what the tests
//! run against; `USE_PERSISTENT_STORES=true` switches every store to
//! Postgres (requires `DATABASE_URL`).

use std::sync::Arc;

use boxoffice_booking::{Payment, PurchaseReceipt, Ticket};
use boxoffice_catalog::EventListing;
use boxoffice_core::{EventId, PaymentId, ReservationId, TicketId, TierName, UserId};
use boxoffice_infra::{
    AutoApproveGateway, BookingError, BookingOrchestrator, ExpiryWorker, ExpiryWorkerConfig,
    ExpiryWorkerHandle, InMemoryBookingStore, InMemoryCatalogStore, InMemoryLedger,
    InMemoryReservationStore, PostgresBookingStore, PostgresCatalogStore, PostgresLedger,
    PostgresReservationStore, ReconcileOutcome, ReservationManager,
};
use boxoffice_ledger::TierCounters;
use boxoffice_reservations::Reservation;
use sqlx::PgPool;

type InMemoryOrchestrator = BookingOrchestrator<
    Arc<InMemoryLedger>,
    Arc<InMemoryReservationStore>,
    Arc<InMemoryBookingStore>,
    Arc<InMemoryCatalogStore>,
    Arc<AutoApproveGateway>,
>;

type PersistentOrchestrator = BookingOrchestrator<
    PostgresLedger,
    PostgresReservationStore,
    PostgresBookingStore,
    PostgresCatalogStore,
    Arc<AutoApproveGateway>,
>;

pub enum AppServices {
    InMemory {
        orchestrator: InMemoryOrchestrator,
        sweeper: ExpiryWorkerHandle,
    },
    Persistent {
        orchestrator: PersistentOrchestrator,
        sweeper: ExpiryWorkerHandle,
    },
}

pub async fn build_services(config: &crate::config::ApiConfig) -> AppServices {
    if config.use_persistent_stores {
        build_persistent_services(config).await
    } else {
        build_in_memory_services(config)
    }
}

fn build_in_memory_services(config: &crate::config::ApiConfig) -> AppServices {
    let ledger = Arc::new(InMemoryLedger::new());
    let reservations = Arc::new(InMemoryReservationStore::new());
    let bookings = Arc::new(InMemoryBookingStore::new());
    let catalog = Arc::new(InMemoryCatalogStore::new());
    let gateway = Arc::new(AutoApproveGateway::new());

    let manager = ReservationManager::new(Arc::clone(&ledger), reservations, config.hold_ttl);
    let sweeper = ExpiryWorker::new(
        manager.clone(),
        ExpiryWorkerConfig {
            interval: config.sweep_interval,
            ..ExpiryWorkerConfig::default()
        },
    )
    .spawn();

    let orchestrator = BookingOrchestrator::new(
        manager,
        ledger,
        bookings,
        catalog,
        gateway,
        config.gateway_timeout,
    );

    tracing::info!("using in-memory stores");
    AppServices::InMemory {
        orchestrator,
        sweeper,
    }
}

async fn build_persistent_services(config: &crate::config::ApiConfig) -> AppServices {
    let database_url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set when USE_PERSISTENT_STORES=true");

    let pool = PgPool::connect(&database_url)
        .await
        .expect("failed to connect to Postgres");

    let ledger = PostgresLedger::new(pool.clone());
    let reservations = PostgresReservationStore::new(pool.clone());
    let bookings = PostgresBookingStore::new(pool.clone());
    let catalog = PostgresCatalogStore::new(pool);
    let gateway = Arc::new(AutoApproveGateway::new());

    let manager = ReservationManager::new(ledger.clone(), reservations, config.hold_ttl);
    let sweeper = ExpiryWorker::new(
        manager.clone(),
        ExpiryWorkerConfig {
            interval: config.sweep_interval,
            ..ExpiryWorkerConfig::default()
        },
    )
    .spawn();

    let orchestrator = BookingOrchestrator::new(
        manager,
        ledger,
        bookings,
        catalog,
        gateway,
        config.gateway_timeout,
    );

    tracing::info!("using Postgres-backed stores");
    AppServices::Persistent {
        orchestrator,
        sweeper,
    }
}

macro_rules! delegate {
    ($self:ident, $orchestrator:ident => $body:expr) => {
        match $self {
            AppServices::InMemory { orchestrator: $orchestrator, .. } => $body,
            AppServices::Persistent { orchestrator: $orchestrator, .. } => $body,
        }
    };
}

impl AppServices {
    pub async fn create_event(&self, event: &EventListing) -> Result<(), BookingError> {
        delegate!(self, o => o.create_event(event).await)
    }

    pub async fn get_event(&self, id: EventId) -> Result<Option<EventListing>, BookingError> {
        delegate!(self, o => o.get_event(id).await)
    }

    pub async fn list_events(&self) -> Result<Vec<EventListing>, BookingError> {
        delegate!(self, o => o.list_events().await)
    }

    pub async fn tier_counters(
        &self,
        event: EventId,
        tier: TierName,
    ) -> Result<TierCounters, BookingError> {
        delegate!(self, o => o.tier_counters(event, tier).await)
    }

    pub async fn purchase(
        &self,
        user: UserId,
        event: EventId,
        tier: TierName,
        qty: u32,
    ) -> Result<PurchaseReceipt, BookingError> {
        delegate!(self, o => o.purchase(user, event, tier, qty).await)
    }

    pub async fn get_reservation(
        &self,
        id: ReservationId,
    ) -> Result<Option<Reservation>, BookingError> {
        delegate!(self, o => Ok(o.manager().get(id).await?))
    }

    pub async fn cancel_reservation(
        &self,
        id: ReservationId,
        holder: UserId,
    ) -> Result<Reservation, BookingError> {
        delegate!(self, o => Ok(o.manager().cancel(id, holder).await?))
    }

    pub async fn reconcile(&self, id: ReservationId) -> Result<ReconcileOutcome, BookingError> {
        delegate!(self, o => o.reconcile(id).await)
    }

    pub async fn refund(&self, ticket: TicketId) -> Result<Payment, BookingError> {
        delegate!(self, o => o.refund(ticket).await)
    }

    pub async fn get_ticket(&self, id: TicketId) -> Result<Option<Ticket>, BookingError> {
        delegate!(self, o => o.get_ticket(id).await)
    }

    pub async fn tickets_for_user(&self, user: UserId) -> Result<Vec<Ticket>, BookingError> {
        delegate!(self, o => o.tickets_for_user(user).await)
    }

    pub async fn get_payment(&self, id: PaymentId) -> Result<Option<Payment>, BookingError> {
        delegate!(self, o => o.get_payment(id).await)
    }

    /// Cumulative counters from the expiry worker, for the health surface.
    pub fn sweeper_snapshot(&self) -> (u64, u64, u64, u64) {
        match self {
            AppServices::InMemory { sweeper, .. } => sweeper.stats().snapshot(),
            AppServices::Persistent { sweeper, .. } => sweeper.stats().snapshot(),
        }
    }
}
