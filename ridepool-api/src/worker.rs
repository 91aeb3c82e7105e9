use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::info;
use ridepool_reservation::{EventDispatcher, ExpiryScheduler};
use ridepool_shared::DomainEvent;

/// Periodic sweep: expiries, pre-expiry warnings, lapsed trips
pub fn start_expiry_worker(
    scheduler: Arc<ExpiryScheduler>,
    interval: Duration,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!("Starting expiry worker, interval {:?}", interval);
    tokio::spawn(scheduler.run(interval, shutdown))
}

/// Drains the outbox into notification requests
pub fn start_notification_worker(
    dispatcher: EventDispatcher,
    events: mpsc::UnboundedReceiver<DomainEvent>,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    info!("Starting notification worker");
    tokio::spawn(dispatcher.run(events, shutdown))
}

/// Seconds from config, never below one
pub fn sweep_period(seconds: i64) -> Duration {
    Duration::from_secs(seconds.max(1) as u64)
}
