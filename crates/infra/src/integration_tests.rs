//! End-to-end flows over the in-memory stores and a scripted gateway.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use boxoffice_booking::{ChargeOutcome, PaymentStatus};
use boxoffice_catalog::{EventListing, TierDef};
use boxoffice_core::{EventId, TierName, UserId};
use boxoffice_ledger::TierKey;
use boxoffice_reservations::ReservationStatus;

use crate::booking_store::{BookingStore, InMemoryBookingStore};
use crate::catalog_store::InMemoryCatalogStore;
use crate::gateway::ScriptedGateway;
use crate::ledger_store::{InMemoryLedger, InventoryLedger};
use crate::manager::ReservationManager;
use crate::orchestrator::{BookingError, BookingOrchestrator, ReconcileOutcome};
use crate::reservation_store::InMemoryReservationStore;

type TestOrchestrator = BookingOrchestrator<
    Arc<InMemoryLedger>,
    Arc<InMemoryReservationStore>,
    Arc<InMemoryBookingStore>,
    Arc<InMemoryCatalogStore>,
    Arc<ScriptedGateway>,
>;

struct Fixture {
    orchestrator: TestOrchestrator,
    ledger: Arc<InMemoryLedger>,
    bookings: Arc<InMemoryBookingStore>,
    gateway: Arc<ScriptedGateway>,
    event: EventId,
    key: TierKey,
}

async fn fixture(capacity: u32, ttl: ChronoDuration, script: Vec<ChargeOutcome>) -> Fixture {
    let ledger = Arc::new(InMemoryLedger::new());
    let reservations = Arc::new(InMemoryReservationStore::new());
    let bookings = Arc::new(InMemoryBookingStore::new());
    let catalog = Arc::new(InMemoryCatalogStore::new());
    let gateway = Arc::new(ScriptedGateway::new(script));

    let manager = ReservationManager::new(Arc::clone(&ledger), reservations, ttl);
    let orchestrator = BookingOrchestrator::new(
        manager,
        Arc::clone(&ledger),
        Arc::clone(&bookings),
        catalog,
        Arc::clone(&gateway),
        Duration::from_secs(5),
    );

    let tier_name: TierName = "ga".parse().unwrap();
    let event = EventListing::new(
        "Warehouse Night",
        None,
        None,
        UserId::new(),
        vec![],
        vec![TierDef {
            name: tier_name.clone(),
            price: 3000,
            capacity,
        }],
        Utc::now(),
    )
    .unwrap();
    orchestrator.create_event(&event).await.unwrap();

    Fixture {
        orchestrator,
        ledger,
        bookings,
        gateway,
        event: event.id,
        key: TierKey::new(event.id, tier_name),
    }
}

fn ga() -> TierName {
    "ga".parse().unwrap()
}

#[tokio::test]
async fn successful_purchase_issues_ticket_and_settles_inventory() {
    let fx = fixture(10, ChronoDuration::minutes(5), vec![]).await;
    let user = UserId::new();

    let receipt = fx
        .orchestrator
        .purchase(user, fx.event, ga(), 2)
        .await
        .unwrap();

    assert_eq!(receipt.ticket.quantity, 2);
    assert_eq!(receipt.payment.amount, 6000);
    assert_eq!(receipt.payment.status, PaymentStatus::Succeeded);
    assert_eq!(receipt.payment.ticket_id, Some(receipt.ticket.id));

    let c = fx.ledger.counters(&fx.key).await.unwrap();
    assert_eq!(c.available, 8);
    assert_eq!(c.reserved, 0);
    assert_eq!(c.purchased, 2);

    let reservation = fx
        .orchestrator
        .manager()
        .get(receipt.reservation_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reservation.status, ReservationStatus::Confirmed);
}

#[tokio::test]
async fn declined_charge_releases_the_hold() {
    let script = vec![ChargeOutcome::Failed {
        reason: "card declined".into(),
    }];
    let fx = fixture(10, ChronoDuration::minutes(5), script).await;

    let err = fx
        .orchestrator
        .purchase(UserId::new(), fx.event, ga(), 3)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::GatewayDeclined { .. }));

    let c = fx.ledger.counters(&fx.key).await.unwrap();
    assert_eq!(c.available, 10);
    assert_eq!(c.reserved, 0);
    assert_eq!(c.purchased, 0);
}

#[tokio::test]
async fn unknown_event_and_tier_are_distinct_errors() {
    let fx = fixture(10, ChronoDuration::minutes(5), vec![]).await;

    let err = fx
        .orchestrator
        .purchase(UserId::new(), EventId::new(), ga(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::UnknownEvent(_)));

    let err = fx
        .orchestrator
        .purchase(UserId::new(), fx.event, "balcony".parse().unwrap(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::UnknownTier { .. }));
}

#[tokio::test]
async fn timed_out_charge_keeps_the_hold_and_reconcile_settles_it() {
    let script = vec![ChargeOutcome::Timeout];
    let fx = fixture(10, ChronoDuration::minutes(5), script).await;
    let user = UserId::new();

    let err = fx
        .orchestrator
        .purchase(user, fx.event, ga(), 2)
        .await
        .unwrap_err();
    let BookingError::GatewayTimeout { reservation } = err else {
        panic!("expected timeout, got {err:?}");
    };

    // Unknown outcome: the units stay reserved, never released.
    let c = fx.ledger.counters(&fx.key).await.unwrap();
    assert_eq!(c.reserved, 2);
    let pending = fx
        .bookings
        .payment_for_reservation(reservation)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(pending.status, PaymentStatus::Pending);

    // The gateway replays the settled outcome for the same idempotency key.
    let outcome = fx.orchestrator.reconcile(reservation).await.unwrap();
    let ReconcileOutcome::Settled(receipt) = outcome else {
        panic!("expected settled, got {outcome:?}");
    };
    assert_eq!(receipt.payment.status, PaymentStatus::Succeeded);
    assert_eq!(fx.gateway.charges_made(), 1);

    let c = fx.ledger.counters(&fx.key).await.unwrap();
    assert_eq!(c.reserved, 0);
    assert_eq!(c.purchased, 2);
}

#[tokio::test]
async fn reconcile_after_expiry_flags_the_captured_charge() {
    let script = vec![ChargeOutcome::Timeout];
    // TTL short enough that the hold lapses before reconciliation runs.
    let fx = fixture(10, ChronoDuration::milliseconds(1), script).await;

    let err = fx
        .orchestrator
        .purchase(UserId::new(), fx.event, ga(), 1)
        .await
        .unwrap_err();
    let BookingError::GatewayTimeout { reservation } = err else {
        panic!("expected timeout, got {err:?}");
    };

    tokio::time::sleep(Duration::from_millis(5)).await;
    fx.orchestrator.manager().expire_stale(10).await.unwrap();

    let outcome = fx.orchestrator.reconcile(reservation).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::LapsedChargeCaptured);

    let payment = fx
        .bookings
        .payment_for_reservation(reservation)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Succeeded);
}

#[tokio::test]
async fn reconcile_of_a_settled_sale_is_a_no_op() {
    let fx = fixture(10, ChronoDuration::minutes(5), vec![]).await;
    let receipt = fx
        .orchestrator
        .purchase(UserId::new(), fx.event, ga(), 1)
        .await
        .unwrap();

    let outcome = fx
        .orchestrator
        .reconcile(receipt.reservation_id)
        .await
        .unwrap();
    assert!(matches!(outcome, ReconcileOutcome::AlreadySettled(_)));
    assert_eq!(fx.gateway.charges_made(), 1);
}

#[tokio::test]
async fn reconcile_of_a_cancelled_hold_closes_without_charging() {
    let fx = fixture(10, ChronoDuration::minutes(5), vec![]).await;
    let user = UserId::new();
    let reservation = fx
        .orchestrator
        .manager()
        .create_hold(fx.event, ga(), 1, user)
        .await
        .unwrap();
    fx.orchestrator
        .manager()
        .cancel(reservation.id, user)
        .await
        .unwrap();

    let outcome = fx.orchestrator.reconcile(reservation.id).await.unwrap();
    assert_eq!(outcome, ReconcileOutcome::Closed);
    assert_eq!(fx.gateway.charges_made(), 0);
}

#[tokio::test]
async fn refund_returns_units_to_inventory() {
    let fx = fixture(10, ChronoDuration::minutes(5), vec![]).await;
    let receipt = fx
        .orchestrator
        .purchase(UserId::new(), fx.event, ga(), 4)
        .await
        .unwrap();

    let refunded = fx.orchestrator.refund(receipt.ticket.id).await.unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);

    let c = fx.ledger.counters(&fx.key).await.unwrap();
    assert_eq!(c.available, 10);
    assert_eq!(c.purchased, 0);

    // A second refund of the same ticket is refused.
    let err = fx.orchestrator.refund(receipt.ticket.id).await.unwrap_err();
    assert!(matches!(err, BookingError::Domain(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_purchases_never_oversell() {
    let fx = fixture(5, ChronoDuration::minutes(5), vec![]).await;
    let orchestrator = Arc::new(fx.orchestrator);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let orchestrator = Arc::clone(&orchestrator);
        let event = fx.event;
        handles.push(tokio::spawn(async move {
            orchestrator.purchase(UserId::new(), event, ga(), 1).await
        }));
    }

    let mut sold = 0;
    let mut rejected = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => sold += 1,
            Err(BookingError::Manager(_)) => rejected += 1,
            Err(e) => panic!("unexpected error: {e:?}"),
        }
    }

    assert_eq!(sold, 5);
    assert_eq!(rejected, 15);

    let c = fx.ledger.counters(&fx.key).await.unwrap();
    assert_eq!(c.purchased, 5);
    assert_eq!(c.available, 0);
    assert_eq!(c.reserved, 0);
}
