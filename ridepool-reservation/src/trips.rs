use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use ridepool_core::{ChatService, Clock, CoreError, CoreResult, Datastore};
use ridepool_ledger::SeatLedger;
use ridepool_ranking::RankingEngine;
use ridepool_shared::{
    ChatStatus, DomainEvent, NewTrip, Reservation, ReservationStatus, SeatLedgerEntry, Trip, TripStatus,
};

use crate::dispatcher::Outbox;
use crate::integrity;

const SEAT_HOLDING: [ReservationStatus; 2] = [ReservationStatus::Pending, ReservationStatus::Confirmed];

/// Outcome of a driver cancelling a trip
#[derive(Debug, Clone, Serialize)]
pub struct TripCancellation {
    pub trip: Trip,
    pub cancelled_reservations: Vec<Reservation>,
    pub released_seats: i32,
}

/// Trip lifecycle: ACTIVE -> COMPLETED | CANCELLED, never back.
pub struct TripController {
    store: Arc<dyn Datastore>,
    ledger: Arc<SeatLedger>,
    ranking: Arc<RankingEngine>,
    chats: Arc<dyn ChatService>,
    clock: Arc<dyn Clock>,
    outbox: Outbox,
}

impl TripController {
    pub fn new(
        store: Arc<dyn Datastore>,
        ledger: Arc<SeatLedger>,
        ranking: Arc<RankingEngine>,
        chats: Arc<dyn ChatService>,
        clock: Arc<dyn Clock>,
        outbox: Outbox,
    ) -> Self {
        Self { store, ledger, ranking, chats, clock, outbox }
    }

    /// Publish a trip and seed its seat ledger entry
    pub async fn create_trip(&self, input: NewTrip) -> CoreResult<Trip> {
        validate_new_trip(&input)?;

        let now = self.clock.now();
        let trip = Trip::new(input, now);
        self.store.insert_trip(&trip, &SeatLedgerEntry::from_trip(&trip, now)).await?;

        info!(
            "Trip {} published by driver {}: {} -> {}, {} seat(s)",
            trip.id, trip.driver_id, trip.origin, trip.destination, trip.total_seats
        );

        if let Err(e) = self.ranking.record_trip_created(trip.driver_id).await {
            warn!("Failed to count trip {} for driver {}: {}", trip.id, trip.driver_id, e);
        }

        Ok(trip)
    }

    pub async fn get_trip(&self, trip_id: Uuid) -> CoreResult<Trip> {
        self.store.get_trip(trip_id).await?
            .ok_or_else(|| CoreError::not_found("trip", trip_id))
    }

    /// Driver's trips, completing any whose departure window has passed first
    pub async fn list_driver_trips(&self, driver_id: Uuid) -> CoreResult<Vec<Trip>> {
        let now = self.clock.now();
        for trip in self.store.list_trips_by_driver(driver_id).await? {
            if trip.is_active() && trip.window_elapsed(now) {
                if let Err(e) = self.finish(trip.id).await {
                    warn!("Could not auto-complete lapsed trip {}: {}", trip.id, e);
                }
            }
        }
        self.store.list_trips_by_driver(driver_id).await
    }

    /// Driver cancels an ACTIVE trip. Every live reservation is cancelled and its seats released.
    pub async fn cancel_trip(&self, trip_id: Uuid, actor_id: Uuid) -> CoreResult<TripCancellation> {
        let guard = self.ledger.locks().lock(trip_id).await;
        let mut trip = self.get_trip(trip_id).await?;
        check_driver_action(&trip, actor_id, "cancel")?;

        // 1. Cascade to reservations still holding seats
        let now = self.clock.now();
        let mut cancelled = self.store.list_for_trip(trip_id, &SEAT_HOLDING).await?;
        let mut released = 0;
        for reservation in cancelled.iter_mut() {
            reservation.update_status(ReservationStatus::Cancelled, now);
            self.store.update_reservation(reservation).await?;
            self.ledger.adjust_locked(&guard, reservation.seat_count).await.map_err(integrity)?;
            released += reservation.seat_count;
        }

        // 2. Close the trip
        self.store.update_trip_status(trip_id, TripStatus::Cancelled, now).await?;
        drop(guard);
        trip = self.get_trip(trip_id).await?;

        info!(
            "Trip {} cancelled by driver: {} reservation(s), {} seat(s) released",
            trip_id, cancelled.len(), released
        );

        // 3. Side effects
        self.archive_chats(&cancelled).await;
        if let Err(e) = self.ranking.record_trip_cancellation(trip.driver_id, released > 0, released).await {
            warn!("Failed to record cancellation of trip {} for driver {}: {}", trip_id, trip.driver_id, e);
        }
        self.outbox.emit(DomainEvent::TripCancelled {
            trip_id,
            driver_id: trip.driver_id,
            passenger_ids: cancelled.iter().map(|r| r.passenger_id).collect(),
        });

        Ok(TripCancellation {
            trip,
            cancelled_reservations: cancelled,
            released_seats: released,
        })
    }

    /// Driver's manual seat correction, e.g. a rider who booked offline. Seats held
    /// by live reservations can never be handed back out.
    pub async fn adjust_seats(&self, trip_id: Uuid, actor_id: Uuid, delta: i32) -> CoreResult<SeatLedgerEntry> {
        let guard = self.ledger.locks().lock(trip_id).await;
        let trip = self.get_trip(trip_id).await?;
        check_driver_action(&trip, actor_id, "adjust seats on")?;

        if delta > 0 {
            let held: i64 = self.store.list_for_trip(trip_id, &SEAT_HOLDING).await?
                .iter()
                .map(|r| i64::from(r.seat_count))
                .sum();
            let releasable = i64::from(trip.total_seats) - held - i64::from(trip.available_seats);
            if i64::from(delta) > releasable {
                return Err(CoreError::Conflict(format!(
                    "trip {} can release at most {} seat(s), {} are held by reservations",
                    trip_id, releasable.max(0), held
                )));
            }
        }

        let entry = self.ledger.adjust_locked(&guard, delta).await?;
        info!("Driver adjusted seats on trip {} by {:+}: {} available", trip_id, delta, entry.available_seats);
        Ok(entry)
    }

    /// Driver marks an ACTIVE trip done
    pub async fn complete_trip(&self, trip_id: Uuid, actor_id: Uuid) -> CoreResult<Trip> {
        let trip = self.get_trip(trip_id).await?;
        check_driver_action(&trip, actor_id, "complete")?;
        self.finish(trip_id).await?;
        self.get_trip(trip_id).await
    }

    /// Complete every ACTIVE trip whose window ended before `now`. Returns how many moved.
    pub async fn complete_lapsed(&self, now: DateTime<Utc>) -> CoreResult<usize> {
        let mut completed = 0;
        for trip in self.store.list_lapsed_trips(now).await? {
            match self.finish(trip.id).await {
                Ok(true) => completed += 1,
                Ok(false) => {}
                Err(e) => warn!("Could not auto-complete lapsed trip {}: {}", trip.id, e),
            }
        }
        Ok(completed)
    }

    /// ACTIVE -> COMPLETED. Unconfirmed holds lapse with the trip, open chats are
    /// archived and confirmed riders are asked for a review.
    /// Returns false if the trip had already left ACTIVE.
    async fn finish(&self, trip_id: Uuid) -> CoreResult<bool> {
        let guard = self.ledger.locks().lock(trip_id).await;
        let trip = self.get_trip(trip_id).await?;
        if !trip.is_active() {
            debug!("Trip {} already {}, not completing", trip_id, trip.status.as_str());
            return Ok(false);
        }

        // 1. Settle holds nobody confirmed before departure
        let now = self.clock.now();
        let mut open = self.store.list_for_trip(trip_id, &SEAT_HOLDING).await?;
        let mut lapsed = Vec::new();
        for reservation in open.iter_mut().filter(|r| r.status == ReservationStatus::Pending) {
            reservation.update_status(ReservationStatus::Expired, now);
            self.store.update_reservation(reservation).await?;
            self.ledger.adjust_locked(&guard, reservation.seat_count).await.map_err(integrity)?;
            lapsed.push(reservation.id);
        }

        // 2. Close the trip
        self.store.update_trip_status(trip_id, TripStatus::Completed, now).await?;
        drop(guard);

        info!("Trip {} completed, {} unconfirmed hold(s) lapsed", trip_id, lapsed.len());

        // 3. Side effects
        self.archive_chats(&open).await;
        for reservation in open.iter().filter(|r| lapsed.contains(&r.id)) {
            self.outbox.emit(DomainEvent::ReservationExpired {
                reservation_id: reservation.id,
                trip_id,
                driver_id: trip.driver_id,
                passenger_id: reservation.passenger_id,
            });
        }
        for reservation in open.iter().filter(|r| r.status == ReservationStatus::Confirmed) {
            self.outbox.emit(DomainEvent::ReviewRequested {
                reservation_id: reservation.id,
                trip_id,
                driver_id: trip.driver_id,
                passenger_id: reservation.passenger_id,
            });
        }
        self.outbox.emit(DomainEvent::TripCompleted { trip_id, driver_id: trip.driver_id });

        Ok(true)
    }

    async fn archive_chats(&self, reservations: &[Reservation]) {
        for chat_id in reservations.iter().filter_map(|r| r.chat_id) {
            if let Err(e) = self.chats.set_chat_status(chat_id, ChatStatus::Archived).await {
                warn!("Could not archive chat {}: {}", chat_id, e);
            }
        }
    }
}

fn validate_new_trip(input: &NewTrip) -> CoreResult<()> {
    if input.origin.trim().is_empty() || input.destination.trim().is_empty() {
        return Err(CoreError::Validation("origin and destination are required".to_string()));
    }
    if input.departure_start >= input.departure_end {
        return Err(CoreError::Validation("departure window must start before it ends".to_string()));
    }
    if input.total_seats < 1 {
        return Err(CoreError::Validation(format!("a trip needs at least 1 seat, got {}", input.total_seats)));
    }
    Ok(())
}

fn check_driver_action(trip: &Trip, actor_id: Uuid, action: &str) -> CoreResult<()> {
    if trip.driver_id != actor_id {
        return Err(CoreError::Conflict(format!("only the driver can {} trip {}", action, trip.id)));
    }
    if !trip.is_active() {
        return Err(CoreError::Conflict(format!(
            "cannot {} trip {}: it is {}",
            action, trip.id, trip.status.as_str()
        )));
    }
    Ok(())
}
