#![allow(dead_code)]

use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;
use ridepool_core::{Clock, ManualClock, ReservationPolicy};
use ridepool_reservation::Marketplace;
use ridepool_shared::{DomainEvent, NewTrip, Trip};
use ridepool_store::MemoryStore;

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub clock: Arc<ManualClock>,
    pub market: Marketplace,
    pub events: UnboundedReceiver<DomainEvent>,
}

pub fn harness() -> Harness {
    let store = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let (market, events) = Marketplace::new(
        store.clone(),
        store.clone(),
        store.clone(),
        clock.clone(),
        ReservationPolicy::default(),
    );
    Harness { store, clock, market, events }
}

impl Harness {
    /// Trip departing in one hour with a two hour window
    pub async fn trip(&self, seats: i32) -> Trip {
        self.trip_for(Uuid::new_v4(), seats).await
    }

    pub async fn trip_for(&self, driver_id: Uuid, seats: i32) -> Trip {
        let now = self.clock.now();
        self.market.trips.create_trip(NewTrip {
            driver_id,
            origin: "Bishkek".to_string(),
            destination: "Karakol".to_string(),
            departure_start: now + Duration::hours(1),
            departure_end: now + Duration::hours(3),
            total_seats: seats,
        }).await.unwrap()
    }

    pub async fn available(&self, trip_id: Uuid) -> i32 {
        let entry = self.market.ledger.get_availability(trip_id).await.unwrap();
        assert!(entry.is_balanced(), "ledger out of balance: {:?}", entry);
        entry.available_seats
    }

    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }
}
