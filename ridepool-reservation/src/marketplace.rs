use std::sync::Arc;
use tokio::sync::mpsc;
use ridepool_core::{
    ChatService, Clock, Datastore, KeyedLocks, MetricsRepository, PresenceTracker, ReservationPolicy,
    TripRepository,
};
use ridepool_ledger::SeatLedger;
use ridepool_ranking::RankingEngine;
use ridepool_shared::DomainEvent;

use crate::dispatcher::Outbox;
use crate::manager::ReservationManager;
use crate::scheduler::ExpiryScheduler;
use crate::trips::TripController;

/// The wired-up core. Every component shares one trip lock set and one outbox.
#[derive(Clone)]
pub struct Marketplace {
    pub reservations: Arc<ReservationManager>,
    pub trips: Arc<TripController>,
    pub ledger: Arc<SeatLedger>,
    pub ranking: Arc<RankingEngine>,
    pub scheduler: Arc<ExpiryScheduler>,
    pub presence: Arc<dyn PresenceTracker>,
}

impl Marketplace {
    /// Returns the marketplace and the receiving end of its outbox, to be handed to
    /// an `EventDispatcher`.
    pub fn new<S: Datastore + 'static>(
        store: Arc<S>,
        chats: Arc<dyn ChatService>,
        presence: Arc<dyn PresenceTracker>,
        clock: Arc<dyn Clock>,
        policy: ReservationPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (outbox, events) = Outbox::channel();

        let datastore: Arc<dyn Datastore> = store.clone();
        let trip_repo: Arc<dyn TripRepository> = store.clone();
        let metrics_repo: Arc<dyn MetricsRepository> = store;

        let ledger = Arc::new(SeatLedger::new(trip_repo, Arc::new(KeyedLocks::new()), clock.clone()));
        let ranking = Arc::new(RankingEngine::new(metrics_repo, presence.clone(), clock.clone()));

        let reservations = Arc::new(ReservationManager::new(
            datastore.clone(),
            ledger.clone(),
            ranking.clone(),
            chats.clone(),
            presence.clone(),
            clock.clone(),
            outbox.clone(),
            policy,
        ));
        let trips = Arc::new(TripController::new(
            datastore.clone(),
            ledger.clone(),
            ranking.clone(),
            chats,
            clock.clone(),
            outbox,
        ));
        let scheduler = Arc::new(ExpiryScheduler::new(datastore, reservations.clone(), trips.clone(), clock));

        let marketplace = Self {
            reservations,
            trips,
            ledger,
            ranking,
            scheduler,
            presence,
        };
        (marketplace, events)
    }
}
