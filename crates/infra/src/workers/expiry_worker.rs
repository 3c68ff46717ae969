//! Periodic sweep that expires stale holds and returns their inventory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::ledger_store::InventoryLedger;
use crate::manager::ReservationManager;
use crate::reservation_store::ReservationStore;

#[derive(Debug, Clone)]
pub struct ExpiryWorkerConfig {
    /// Time between sweeps.
    pub interval: Duration,
    /// Cap on stale rows handled per sweep.
    pub batch_size: usize,
}

impl Default for ExpiryWorkerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(1000),
            batch_size: 256,
        }
    }
}

/// Cumulative sweep counters, readable while the worker runs.
#[derive(Debug, Default)]
pub struct SweepStats {
    pub sweeps: AtomicU64,
    pub expired: AtomicU64,
    pub lost_races: AtomicU64,
    pub errors: AtomicU64,
}

impl SweepStats {
    pub fn snapshot(&self) -> (u64, u64, u64, u64) {
        (
            self.sweeps.load(Ordering::Relaxed),
            self.expired.load(Ordering::Relaxed),
            self.lost_races.load(Ordering::Relaxed),
            self.errors.load(Ordering::Relaxed),
        )
    }
}

pub struct ExpiryWorker<L, R> {
    manager: ReservationManager<L, R>,
    config: ExpiryWorkerConfig,
}

/// Handle to a running worker: stats plus graceful shutdown.
pub struct ExpiryWorkerHandle {
    stats: Arc<SweepStats>,
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ExpiryWorkerHandle {
    pub fn stats(&self) -> &SweepStats {
        &self.stats
    }

    /// Signal shutdown and wait for the in-flight sweep to finish.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "expiry worker task panicked");
        }
    }
}

impl<L, R> ExpiryWorker<L, R>
where
    L: InventoryLedger + Clone,
    R: ReservationStore + Clone,
{
    pub fn new(manager: ReservationManager<L, R>, config: ExpiryWorkerConfig) -> Self {
        Self { manager, config }
    }

    /// Spawn the sweep loop on the current runtime.
    pub fn spawn(self) -> ExpiryWorkerHandle {
        let stats = Arc::new(SweepStats::default());
        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        let worker_stats = Arc::clone(&stats);

        let join = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.config.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            info!(interval = ?self.config.interval, "expiry worker started");

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match self.manager.expire_stale(self.config.batch_size).await {
                            Ok(outcome) => {
                                worker_stats.sweeps.fetch_add(1, Ordering::Relaxed);
                                worker_stats
                                    .expired
                                    .fetch_add(outcome.expired as u64, Ordering::Relaxed);
                                worker_stats
                                    .lost_races
                                    .fetch_add(outcome.lost_races as u64, Ordering::Relaxed);
                            }
                            Err(e) => {
                                worker_stats.errors.fetch_add(1, Ordering::Relaxed);
                                error!(error = %e, "expiry sweep failed");
                            }
                        }
                    }
                    _ = shutdown_rx.changed() => {
                        info!("expiry worker stopping");
                        break;
                    }
                }
            }
        });

        ExpiryWorkerHandle {
            stats,
            shutdown: shutdown_tx,
            join,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger_store::InMemoryLedger;
    use crate::reservation_store::InMemoryReservationStore;
    use boxoffice_core::{EventId, TierName, UserId};
    use boxoffice_ledger::TierKey;
    use chrono::Duration as ChronoDuration;

    #[tokio::test]
    async fn worker_sweeps_stale_holds_until_shutdown() {
        let ledger = Arc::new(InMemoryLedger::new());
        let key = TierKey::new(EventId::new(), "ga".parse::<TierName>().unwrap());
        ledger.register_tier(key.clone(), 10).await.unwrap();
        let store = Arc::new(InMemoryReservationStore::new());

        // Negative TTL so every hold is stale the moment it lands.
        let manager = ReservationManager::new(
            Arc::clone(&ledger),
            store,
            ChronoDuration::seconds(-1),
        );
        for _ in 0..4 {
            manager
                .create_hold(key.event_id, key.tier.clone(), 1, UserId::new())
                .await
                .unwrap();
        }

        let worker = ExpiryWorker::new(
            manager,
            ExpiryWorkerConfig {
                interval: Duration::from_millis(10),
                batch_size: 10,
            },
        );
        let handle = worker.spawn();

        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if ledger.counters(&key).await.unwrap().available == 10 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();

        let (sweeps, expired, _, errors) = handle.stats().snapshot();
        assert!(sweeps >= 1);
        assert_eq!(expired, 4);
        assert_eq!(errors, 0);
        handle.shutdown().await;
    }
}
