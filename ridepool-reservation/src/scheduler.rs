use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info};
use ridepool_core::{Clock, Datastore};

use crate::manager::ReservationManager;
use crate::trips::TripController;

/// What one sweep did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub warnings_sent: usize,
    pub trips_completed: usize,
    pub failures: usize,
}

/// Periodic driver of every time-based transition: lapsed holds, due expiry
/// warnings and trips whose departure window has closed.
pub struct ExpiryScheduler {
    store: Arc<dyn Datastore>,
    reservations: Arc<ReservationManager>,
    trips: Arc<TripController>,
    clock: Arc<dyn Clock>,
}

impl ExpiryScheduler {
    pub fn new(
        store: Arc<dyn Datastore>,
        reservations: Arc<ReservationManager>,
        trips: Arc<TripController>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { store, reservations, trips, clock }
    }

    /// One pass. Per-item failures are logged and counted, never propagated.
    pub async fn sweep_once(&self) -> SweepReport {
        let mut report = SweepReport::default();
        let now = self.clock.now();

        // 1. Expiry warnings first, so a hold lapsing in this pass gets no late warning
        match self.store.list_due_tasks(now).await {
            Ok(tasks) => {
                for task in tasks {
                    match self.reservations.fire_expiry_warning(&task).await {
                        Ok(true) => report.warnings_sent += 1,
                        Ok(false) => {}
                        Err(e) => {
                            error!("Expiry warning task {} failed: {}", task.id, e);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to load due tasks: {}", e);
                report.failures += 1;
            }
        }

        // 2. Lapsed holds
        match self.store.list_due_for_expiry(now).await {
            Ok(due) => {
                for reservation in due {
                    match self.reservations.expire(reservation.id).await {
                        Ok(true) => report.expired += 1,
                        Ok(false) => {}
                        Err(e) => {
                            error!("Failed to expire reservation {}: {}", reservation.id, e);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!("Failed to load reservations due for expiry: {}", e);
                report.failures += 1;
            }
        }

        // 3. Trips past their departure window
        match self.trips.complete_lapsed(now).await {
            Ok(n) => report.trips_completed = n,
            Err(e) => {
                error!("Failed to complete lapsed trips: {}", e);
                report.failures += 1;
            }
        }

        if report == SweepReport::default() {
            debug!("Sweep found nothing to do");
        } else {
            info!(
                "Sweep: {} expired, {} warnings, {} trips completed, {} failures",
                report.expired, report.warnings_sent, report.trips_completed, report.failures
            );
        }
        report
    }

    /// Sweep every `period` until shutdown is signalled
    pub async fn run(self: Arc<Self>, period: Duration, mut shutdown: watch::Receiver<bool>) {
        info!("Expiry scheduler started, sweeping every {:?}", period);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_once().await;
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Expiry scheduler stopped");
    }
}
