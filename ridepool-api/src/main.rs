use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use ridepool_api::{app, worker, AppState};
use ridepool_core::{Clock, NotificationService, PresenceTracker, SystemClock, UserRepository};
use ridepool_reservation::{EventDispatcher, Marketplace};
use ridepool_store::app_config::{Config, StorageBackend};
use ridepool_store::{DbClient, MemoryNotifier, MemoryStore, RedisClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ridepool_api=debug,ridepool_reservation=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting ridepool API on port {}", config.server.port);

    // Presence & notifications
    let (presence, notifier): (Arc<dyn PresenceTracker>, Arc<dyn NotificationService>) = match &config.redis.url {
        Some(url) => {
            let redis = Arc::new(RedisClient::new(url).await.context("Failed to connect to Redis")?);
            let presence: Arc<dyn PresenceTracker> = redis.clone();
            let notifier: Arc<dyn NotificationService> = redis;
            (presence, notifier)
        }
        None => {
            tracing::warn!("No Redis configured: presence and notifications stay in this process");
            let presence: Arc<dyn PresenceTracker> = Arc::new(MemoryStore::new());
            let notifier: Arc<dyn NotificationService> = Arc::new(MemoryNotifier::new());
            (presence, notifier)
        }
    };

    // Datastore
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let mut rules = config.business_rules.clone();
    let (market, events, users) = match config.storage.backend {
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database.url, config.database.max_connections)
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            rules = db.fetch_business_rules(rules).await.context("Failed to load business rules")?;

            let store = Arc::new(db.store());
            let (market, events) = Marketplace::new(store.clone(), store.clone(), presence, clock, rules.policy());
            let users: Arc<dyn UserRepository> = store;
            (market, events, users)
        }
        StorageBackend::Memory => {
            tracing::warn!("Using the in-memory datastore; all state is lost on exit");
            let store = Arc::new(MemoryStore::new());
            let (market, events) = Marketplace::new(store.clone(), store.clone(), presence, clock, rules.policy());
            let users: Arc<dyn UserRepository> = store;
            (market, events, users)
        }
    };
    tracing::info!(
        "Hold {}s, warning {}s before expiry, sweep every {}s",
        rules.hold_seconds, rules.warning_lead_seconds, rules.sweep_interval_seconds
    );

    // Background workers
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let sweeper = worker::start_expiry_worker(
        market.scheduler.clone(),
        worker::sweep_period(rules.sweep_interval_seconds),
        shutdown_rx.clone(),
    );
    let dispatcher = worker::start_notification_worker(
        EventDispatcher::new(users.clone(), notifier),
        events,
        shutdown_rx,
    );

    let app = app(AppState { market, users });

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Stop workers; the dispatcher flushes queued events first
    let _ = shutdown_tx.send(true);
    let (sweeper, dispatcher) = tokio::join!(sweeper, dispatcher);
    if let Err(e) = sweeper.and(dispatcher) {
        tracing::error!("Worker panicked during shutdown: {}", e);
    }

    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
